use rfpip::platform::{Compositor, DenyOrigins, EmbedderRequest, HeadlessPlatform};
use rfpip::{
    Error, ExitReason, InputKind, InputPolicy, NavigationOutcome, PictureInPictureWindow,
    PictureInPictureWindowOptions, PipConfig, Window,
};
use std::sync::{Arc, Mutex};

fn open_with(config: PipConfig, platform: Arc<HeadlessPlatform>) -> (Window, PictureInPictureWindow) {
    let window = Window::new("https://example.com/player", config, platform).unwrap();
    window.notify_user_activation();
    let pip = futures::executor::block_on(
        window.request_picture_in_picture_window(PictureInPictureWindowOptions::default()),
    )
    .unwrap();
    (window, pip)
}

#[test]
fn navigation_in_pip_document_closes_instead_of_loading() {
    let (window, pip) = open_with(PipConfig::default(), Arc::new(HeadlessPlatform::new()));
    let doc = pip.document().unwrap();
    let doc_id = doc.id();

    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    window.set_onexitpictureinpicture(move |ev| {
        let d = ev.picture_in_picture_window().document().unwrap();
        *s.lock().unwrap() = Some((d.id(), d.url().as_str().to_string(), ev.exit_reason()));
    });

    let outcome = doc.navigate("https://example.com/somewhere-else").unwrap();

    assert_eq!(outcome, NavigationOutcome::ClosedPictureInPicture);
    assert_eq!(
        *seen.lock().unwrap(),
        Some((doc_id, "about:blank".to_string(), Some(ExitReason::Navigation)))
    );
    assert!(pip.is_closed());
    assert!(!doc.is_active());
    assert_eq!(window.url().as_str(), "https://example.com/player");
}

#[test]
fn reload_in_pip_document_also_closes() {
    let (window, pip) = open_with(PipConfig::default(), Arc::new(HeadlessPlatform::new()));
    let outcome = pip.document().unwrap().reload().unwrap();
    assert_eq!(outcome, NavigationOutcome::ClosedPictureInPicture);
    assert!(pip.is_closed());
    assert!(window.picture_in_picture_window().is_none());
}

#[test]
fn relative_navigation_in_pip_document_closes() {
    let (window, pip) = open_with(PipConfig::default(), Arc::new(HeadlessPlatform::new()));
    let doc = pip.document().unwrap();
    assert_eq!(doc.base_url(), &window.url());
    let outcome = doc.navigate("/other").unwrap();
    assert_eq!(outcome, NavigationOutcome::ClosedPictureInPicture);
    assert!(pip.is_closed());
    assert!(window.picture_in_picture_window().is_none());
    assert_eq!(window.url().as_str(), "https://example.com/player");
}

#[test]
fn malformed_navigation_target_is_a_syntax_error() {
    let (_window, pip) = open_with(PipConfig::default(), Arc::new(HeadlessPlatform::new()));
    let err = pip.document().unwrap().navigate("http://[::1").unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
    assert!(!pip.is_closed());
}

#[test]
fn pip_document_cannot_open_windows_or_download() {
    let platform = Arc::new(HeadlessPlatform::new());
    let (window, pip) = open_with(PipConfig::default(), platform.clone());
    let doc = pip.document().unwrap();

    assert!(matches!(doc.open_window("https://example.com/popup"), Err(Error::NotAllowed(_))));
    assert!(matches!(doc.download("https://example.com/file.zip"), Err(Error::NotAllowed(_))));
    // relative targets resolve against the opener's URL and are refused the same way
    assert!(matches!(doc.open_window("/popup"), Err(Error::NotAllowed(_))));
    assert!(matches!(doc.download("file.zip"), Err(Error::NotAllowed(_))));
    assert!(!pip.is_closed(), "refusals do not tear the window down");
    assert!(platform.recording_embedder().requests().is_empty());

    // the opener's own document still may
    window.document().open_window("/popup").unwrap();
    window.document().download("/file.zip").unwrap();
    let requests = platform.recording_embedder().requests();
    assert_eq!(requests.len(), 2);
    assert!(matches!(&requests[0], EmbedderRequest::OpenWindow(u) if u.path() == "/popup"));
    assert!(matches!(&requests[1], EmbedderRequest::Download(u) if u.path() == "/file.zip"));
}

#[test]
fn exit_from_pip_document_closes_its_window() {
    let (window, pip) = open_with(PipConfig::default(), Arc::new(HeadlessPlatform::new()));
    pip.document().unwrap().exit_picture_in_picture().unwrap();
    assert!(pip.is_closed());
    assert!(window.picture_in_picture_window().is_none());
}

#[test]
fn input_policy_is_enforced() {
    let (_w, open_pip) = open_with(PipConfig::default(), Arc::new(HeadlessPlatform::new()));
    assert!(open_pip.accepts_input());
    open_pip.deliver_input(InputKind::Keyboard).unwrap();

    let restricted = PipConfig {
        input_policy: InputPolicy::Restrict,
        ..Default::default()
    };
    let (_w2, locked) = open_with(restricted, Arc::new(HeadlessPlatform::new()));
    assert!(!locked.accepts_input());
    assert!(matches!(locked.deliver_input(InputKind::Pointer), Err(Error::NotAllowed(_))));
}

#[test]
fn ua_policy_can_deny_an_origin() {
    let policy = DenyOrigins::from_urls(&["https://example.com"]).unwrap();
    let platform = Arc::new(HeadlessPlatform::new().with_permission_policy(Arc::new(policy)));
    let window = Window::new("https://example.com/player", PipConfig::default(), platform.clone()).unwrap();
    window.notify_user_activation();
    let res = futures::executor::block_on(
        window.request_picture_in_picture_window(PictureInPictureWindowOptions::default()),
    );
    assert!(matches!(res, Err(Error::NotAllowed(_))));
    assert!(platform.headless_compositor().live_surfaces().is_empty());
}

#[test]
fn pip_document_is_same_origin_only() {
    let (_window, pip) = open_with(PipConfig::default(), Arc::new(HeadlessPlatform::new()));
    let foreign = Window::with_defaults("https://other.example/").unwrap();
    let node = foreign.document().create_element("div").unwrap();
    let err = pip.document().unwrap().body().unwrap().append_child(&node).unwrap_err();
    assert!(matches!(err, Error::Security(_)));
}

#[test]
fn torn_down_document_rejects_mutation() {
    let (window, pip) = open_with(PipConfig::default(), Arc::new(HeadlessPlatform::new()));
    let doc = pip.document().unwrap();
    let body = doc.body().unwrap();
    window.exit_picture_in_picture().unwrap();

    assert!(matches!(doc.create_element("div"), Err(Error::InvalidState(_))));
    let node = window.document().create_element("div").unwrap();
    assert!(matches!(body.append_child(&node), Err(Error::InvalidState(_))));
    assert!(matches!(doc.navigate("https://example.com/"), Err(Error::InvalidState(_))));
}
