//! Aspect-ratio and sizing behavior of picture-in-picture windows

use proptest::prelude::*;
use rfpip::geometry::SizeBounds;
use rfpip::platform::HeadlessPlatform;
use rfpip::{Error, PictureInPictureWindow, PictureInPictureWindowOptions, PipConfig, Size, Window};
use std::sync::Arc;

fn open(options: PictureInPictureWindowOptions) -> (Window, PictureInPictureWindow, Arc<HeadlessPlatform>) {
    let platform = Arc::new(HeadlessPlatform::new());
    let window = Window::new("https://example.com/", PipConfig::default(), platform.clone()).unwrap();
    window.notify_user_activation();
    let pip = futures::executor::block_on(window.request_picture_in_picture_window(options)).unwrap();
    (window, pip, platform)
}

fn assert_ratio(size: Size, ratio: f64) {
    let actual = size.width as f64 / size.height as f64;
    assert!(
        (actual - ratio).abs() <= ratio / size.height as f64 + 1.0 / size.height as f64,
        "{}x{} is not within a pixel of ratio {}",
        size.width,
        size.height,
        ratio
    );
}

#[tokio::test]
async fn set_aspect_ratio_then_user_resizes_keep_it() {
    let (_window, pip, platform) = open(PictureInPictureWindowOptions::with_size(320, 240));
    pip.set_constrain_aspect_ratio(true);
    pip.set_aspect_ratio(16.0 / 9.0).await.unwrap();

    let size = pip.inner_size();
    assert_eq!(size.width, 320);
    assert_ratio(size, 16.0 / 9.0);
    assert_eq!(platform.headless_compositor().surface_size(pip.surface_id()), Some(size));

    for (w, h) in [(640, 100), (1000, 1000), (150, 700), (5000, 5000)] {
        let applied = pip.resize_by_user(w, h).unwrap();
        assert_ratio(applied, 16.0 / 9.0);
    }
}

#[tokio::test]
async fn invalid_ratio_rejects_and_keeps_previous_enforcement() {
    let (_window, pip, _) = open(PictureInPictureWindowOptions::with_size(400, 200).with_constrained_aspect_ratio(true));
    assert_eq!(pip.aspect_ratio(), Some(2.0));

    for bad in [0.0, -1.0, f32::NAN, f32::INFINITY] {
        let err = pip.set_aspect_ratio(bad).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
    assert_eq!(pip.aspect_ratio(), Some(2.0));
    assert_eq!(pip.resize_by_user(800, 800).unwrap(), Size::new(800, 400));
}

#[tokio::test]
async fn ratio_without_constraint_leaves_geometry_alone() {
    let (_window, pip, _) = open(PictureInPictureWindowOptions::with_size(400, 300));
    pip.set_aspect_ratio(1.0).await.unwrap();
    assert_eq!(pip.inner_size(), Size::new(400, 300));
    assert_eq!(pip.resize_by_user(500, 200).unwrap(), Size::new(500, 200));
}

#[tokio::test]
async fn aspect_ratio_does_not_touch_document() {
    let (_window, pip, _) = open(PictureInPictureWindowOptions::with_size(400, 300).with_constrained_aspect_ratio(true));
    let doc = pip.document().unwrap();
    let before = doc.snapshot_digest();
    pip.set_aspect_ratio(1.0).await.unwrap();
    assert_eq!(pip.inner_size(), Size::new(400, 400));
    assert_eq!(doc.snapshot_digest(), before);
}

#[tokio::test]
async fn closed_window_rejects_geometry_changes() {
    let (window, pip, _) = open(PictureInPictureWindowOptions::default());
    window.exit_picture_in_picture().unwrap();
    assert!(matches!(pip.set_aspect_ratio(1.5).await, Err(Error::InvalidState(_))));
    assert!(matches!(pip.resize_by_user(300, 300), Err(Error::InvalidState(_))));
}

#[test]
fn requested_size_is_clamped_by_the_ua() {
    let (_window, pip, _) = open(PictureInPictureWindowOptions::with_size(4000, 20));
    assert_eq!(pip.inner_size(), Size::new(1536, 100));

    let (_window, pip, _) = open(PictureInPictureWindowOptions::with_size(4000, 2000).with_constrained_aspect_ratio(true));
    assert_eq!(pip.inner_size(), Size::new(1536, 768));
}

proptest! {
    #[test]
    fn clamp_with_ratio_stays_in_bounds_and_near_ratio(ratio in 0.5f64..4.0, width in 1u32..5000) {
        let bounds = SizeBounds::new(Size::new(100, 100), Size::new(1536, 864)).unwrap();
        let s = bounds.clamp_with_ratio(Size::new(width, 0), ratio);
        prop_assert!(s.width >= 100 && s.width <= 1536);
        prop_assert!(s.height >= 100 && s.height <= 864);
        let actual = s.width as f64 / s.height as f64;
        prop_assert!((actual - ratio).abs() <= ratio / s.height as f64 + 1e-9);
    }
}
