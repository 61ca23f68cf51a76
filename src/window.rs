//! The opener window: owns its document, user activation, lifecycle event
//! listeners and at most one picture-in-picture window.

use crate::activation::{ActivationGrant, UserActivation};
use crate::dom::{Document, DocumentHost, NavigationOutcome, NavigationRequest};
use crate::event::{EventHandler, EventListeners, EventType, ExitReason, ListenerId, PictureInPictureEvent};
use crate::geometry::{Size, SizeBounds};
use crate::pip_window::PictureInPictureWindow;
use crate::platform::{
    Compositor, HeadlessPlatform, PermissionDecision, PlatformApi, SurfaceGrant, SurfaceRequest,
};
use crate::state::{Lifecycle, PipState};
use crate::{Error, PictureInPictureWindowOptions, PipConfig, ReopenPolicy, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use url::Url;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct WindowInner {
    id: u64,
    config: PipConfig,
    bounds: SizeBounds,
    platform: Arc<dyn PlatformApi>,
    self_ref: Weak<WindowInner>,
    document: Mutex<Document>,
    activation: Mutex<UserActivation>,
    listeners: Mutex<EventListeners>,
    pip: Mutex<PipSlot>,
    closed: AtomicBool,
}

struct PipSlot {
    lifecycle: Lifecycle,
    window: Option<PictureInPictureWindow>,
    /// Identifies the most recent request; a pending open whose ticket no
    /// longer matches has been abandoned.
    ticket: u64,
    /// Ticket of a pending request that will replace the open window. The
    /// open window stays up until the new surface exists.
    replacing: Option<u64>,
}

/// A page's window, i.e. the opener of picture-in-picture windows.
///
/// Handles are cheap to clone. When the last handle is dropped (or
/// [`Window::close`] is called) any picture-in-picture window is torn down
/// first, so it can never outlive its opener.
#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.inner.id)
            .field("url", &self.url().as_str())
            .field("pip_state", &self.picture_in_picture_state())
            .finish()
    }
}

impl Window {
    pub fn new(url: &str, config: PipConfig, platform: Arc<dyn PlatformApi>) -> Result<Window> {
        let url = Url::parse(url)?;
        let bounds = config.size_bounds()?;
        let document = Document::new(url);
        let activation = UserActivation::new(Duration::from_millis(config.activation_timeout_ms));

        let inner = Arc::new_cyclic(|weak: &Weak<WindowInner>| WindowInner {
            id: NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed),
            config,
            bounds,
            platform,
            self_ref: weak.clone(),
            document: Mutex::new(document.clone()),
            activation: Mutex::new(activation),
            listeners: Mutex::new(EventListeners::default()),
            pip: Mutex::new(PipSlot {
                lifecycle: Lifecycle::new(),
                window: None,
                ticket: 0,
                replacing: None,
            }),
            closed: AtomicBool::new(false),
        });
        document.attach_host(inner.self_ref.clone());
        log::debug!("window {} created for {}", inner.id, document.url());
        Ok(Window { inner })
    }

    /// A window on the headless platform with the default configuration.
    pub fn with_defaults(url: &str) -> Result<Window> {
        Window::new(url, PipConfig::default(), Arc::new(HeadlessPlatform::new()))
    }

    pub(crate) fn from_inner(inner: Arc<WindowInner>) -> Window {
        Window { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The current document. Navigation replaces it.
    pub fn document(&self) -> Document {
        self.inner.current_document()
    }

    pub fn url(&self) -> Url {
        self.document().url().clone()
    }

    pub fn config(&self) -> &PipConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Report a user gesture (click, key press) targeting this window.
    pub fn notify_user_activation(&self) {
        self.inner.lock_activation().notify();
    }

    pub fn has_transient_activation(&self) -> bool {
        self.inner.lock_activation().is_active()
    }

    /// Run `f` as if it were a click handler.
    pub fn with_user_gesture<R>(&self, f: impl FnOnce(&Window) -> R) -> R {
        self.notify_user_activation();
        f(self)
    }

    /// `window.requestPictureInPictureWindow(options)`.
    ///
    /// Activation, UA policy and lifecycle checks run synchronously, inside
    /// the caller's gesture. The returned future settles exactly once, after
    /// the compositor has allocated a surface and `enterpictureinpicture`
    /// has been dispatched.
    pub fn request_picture_in_picture_window(
        &self,
        options: PictureInPictureWindowOptions,
    ) -> impl Future<Output = Result<PictureInPictureWindow>> + Send + 'static {
        let prepared = self.inner.prepare_open(&options);
        async move { prepared?.complete().await }
    }

    pub fn picture_in_picture_window(&self) -> Option<PictureInPictureWindow> {
        self.inner.lock_slot().window.clone()
    }

    pub fn picture_in_picture_state(&self) -> PipState {
        self.inner.lock_slot().lifecycle.state()
    }

    /// Same as `document().exit_picture_in_picture()`.
    pub fn exit_picture_in_picture(&self) -> Result<()> {
        self.document().exit_picture_in_picture()
    }

    pub fn navigate(&self, href: &str) -> Result<NavigationOutcome> {
        self.document().navigate(href)
    }

    pub fn add_event_listener<F>(&self, event_type: EventType, handler: F) -> ListenerId
    where
        F: Fn(&PictureInPictureEvent) + Send + Sync + 'static,
    {
        self.inner.lock_listeners().add(event_type, Arc::new(handler))
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.lock_listeners().remove(id)
    }

    /// `window.onenterpictureinpicture = handler`
    pub fn set_onenterpictureinpicture<F>(&self, handler: F)
    where
        F: Fn(&PictureInPictureEvent) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.inner
            .lock_listeners()
            .set_attribute_handler(EventType::EnterPictureInPicture, Some(handler));
    }

    pub fn clear_onenterpictureinpicture(&self) {
        self.inner
            .lock_listeners()
            .set_attribute_handler(EventType::EnterPictureInPicture, None);
    }

    /// `window.onexitpictureinpicture = handler`
    pub fn set_onexitpictureinpicture<F>(&self, handler: F)
    where
        F: Fn(&PictureInPictureEvent) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.inner
            .lock_listeners()
            .set_attribute_handler(EventType::ExitPictureInPicture, Some(handler));
    }

    pub fn clear_onexitpictureinpicture(&self) {
        self.inner
            .lock_listeners()
            .set_attribute_handler(EventType::ExitPictureInPicture, None);
    }

    /// Close the page. Any picture-in-picture window is torn down (exit
    /// event included) before the page's own document is destroyed.
    pub fn close(&self) {
        self.inner.shutdown();
    }
}

impl WindowInner {
    fn current_document(&self) -> Document {
        self.document.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn lock_activation(&self) -> MutexGuard<'_, UserActivation> {
        self.activation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, EventListeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_slot(&self) -> MutexGuard<'_, PipSlot> {
        self.pip.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prepare_open(&self, options: &PictureInPictureWindowOptions) -> Result<PendingOpen> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::InvalidState("window has been closed".to_string()));
        }
        let document = self.current_document();

        if !self.lock_activation().is_active() {
            log::warn!("window {}: picture-in-picture requested without user activation", self.id);
            return Err(Error::NotAllowed(
                "requestPictureInPictureWindow() requires user activation".to_string(),
            ));
        }
        if let PermissionDecision::Denied(reason) = self.platform.permission_policy().check(document.origin()) {
            log::warn!("window {}: picture-in-picture denied: {}", self.id, reason);
            return Err(Error::NotAllowed(reason));
        }

        let size = self.initial_size(options);
        let (ticket, replacement) = {
            let mut slot = self.lock_slot();
            let replace = match slot.lifecycle.state() {
                _ if slot.replacing.is_some() => {
                    return Err(Error::InvalidState(
                        "a picture-in-picture window is already opening".to_string(),
                    ))
                }
                PipState::Closed => false,
                PipState::Opening => {
                    return Err(Error::InvalidState(
                        "a picture-in-picture window is already opening".to_string(),
                    ))
                }
                PipState::Closing => {
                    return Err(Error::InvalidState(
                        "the previous picture-in-picture window is still closing".to_string(),
                    ))
                }
                PipState::Open => match self.config.reopen_policy {
                    ReopenPolicy::Reject => {
                        return Err(Error::InvalidState(
                            "a picture-in-picture window is already open".to_string(),
                        ))
                    }
                    ReopenPolicy::Replace => true,
                },
            };

            let grant = self.lock_activation().consume().ok_or_else(|| {
                Error::NotAllowed("user activation was consumed before the request".to_string())
            })?;
            slot.ticket += 1;
            let ticket = slot.ticket;
            if replace {
                // the open window is closed in finish_open, once a surface exists
                slot.replacing = Some(ticket);
                (ticket, Some(grant))
            } else {
                slot.lifecycle.begin_opening(grant)?;
                (ticket, None)
            }
        };

        let compositor = self.platform.compositor();
        let rx = compositor.allocate_surface(SurfaceRequest {
            origin: document.origin().ascii_serialization(),
            size,
            always_on_top: true,
        });
        Ok(PendingOpen {
            guard: OpeningGuard {
                window: self.self_ref.clone(),
                ticket,
                armed: true,
            },
            rx,
            options: options.clone(),
            compositor,
            replacement,
        })
    }

    fn initial_size(&self, options: &PictureInPictureWindowOptions) -> Size {
        let defaults = self.config.default_size;
        let requested = Size::new(
            options.width.filter(|w| *w > 0).unwrap_or(defaults.width),
            options.height.filter(|h| *h > 0).unwrap_or(defaults.height),
        );
        match (options.constrain_aspect_ratio, requested.ratio()) {
            (true, Some(ratio)) => self.bounds.clamp_with_ratio(requested, ratio),
            _ => self.bounds.clamp(requested),
        }
    }

    fn finish_open(
        &self,
        ticket: u64,
        grant: SurfaceGrant,
        options: &PictureInPictureWindowOptions,
        compositor: Arc<dyn Compositor>,
        replacement: Option<ActivationGrant>,
    ) -> Result<PictureInPictureWindow> {
        let abandoned = |compositor: &Arc<dyn Compositor>| {
            compositor.release_surface(grant.id);
            Error::Aborted("picture-in-picture request was abandoned".to_string())
        };
        let document = match Document::blank_for(&self.current_document()) {
            Ok(document) => document,
            Err(e) => {
                compositor.release_surface(grant.id);
                return Err(e);
            }
        };

        let mut slot = match replacement {
            Some(activation) => {
                if !self.take_replacement(ticket) {
                    return Err(abandoned(&compositor));
                }
                self.close_picture_in_picture(None, ExitReason::Replaced);
                let mut slot = self.lock_slot();
                if slot.ticket == ticket && slot.lifecycle.state() == PipState::Closed {
                    if let Err(e) = slot.lifecycle.begin_opening(activation) {
                        log::warn!("window {}: {}", self.id, e);
                    }
                }
                slot
            }
            None => self.lock_slot(),
        };
        if slot.ticket != ticket
            || slot.lifecycle.state() != PipState::Opening
            || self.closed.load(Ordering::Acquire)
        {
            drop(slot);
            return Err(abandoned(&compositor));
        }

        let pip = PictureInPictureWindow::new(
            self.self_ref.clone(),
            document,
            grant,
            self.bounds,
            options.constrain_aspect_ratio,
            self.config.input_policy,
            compositor,
        );
        slot.lifecycle.transition(PipState::Open)?;
        slot.window = Some(pip.clone());
        drop(slot);

        log::info!(
            "window {}: opened picture-in-picture window {} at {}x{}",
            self.id,
            pip.id(),
            grant.size.width,
            grant.size.height
        );
        self.dispatch(&PictureInPictureEvent::enter(pip.clone()));
        Ok(pip)
    }

    /// Claims the pending replacement for `ticket`. False if it was
    /// abandoned or superseded in the meantime.
    fn take_replacement(&self, ticket: u64) -> bool {
        let mut slot = self.lock_slot();
        if slot.replacing != Some(ticket) || slot.ticket != ticket || self.closed.load(Ordering::Acquire) {
            return false;
        }
        slot.replacing = None;
        true
    }

    fn abandon_opening(&self, ticket: u64) {
        let mut slot = self.lock_slot();
        if slot.replacing == Some(ticket) {
            // the window being replaced stays open
            slot.replacing = None;
            return;
        }
        if slot.ticket == ticket && slot.lifecycle.state() == PipState::Opening {
            if let Err(e) = slot.lifecycle.transition(PipState::Closed) {
                log::warn!("window {}: {}", self.id, e);
            }
        }
    }

    /// Tear down the open picture-in-picture window, if any.
    ///
    /// Destroy-after-notify: the exit event is dispatched while the window
    /// and its document are alive, and resources are released only once
    /// every handler has returned. Returns false when there was nothing to
    /// close (including re-entrant calls during `closing`).
    pub(crate) fn close_picture_in_picture(&self, expected: Option<u64>, reason: ExitReason) -> bool {
        let pip = {
            let mut slot = self.lock_slot();
            if slot.lifecycle.state() != PipState::Open {
                return false;
            }
            let Some(pip) = slot.window.clone() else {
                return false;
            };
            if expected.is_some_and(|id| id != pip.id()) {
                return false;
            }
            if slot.lifecycle.transition(PipState::Closing).is_err() {
                return false;
            }
            pip
        };

        log::info!("window {}: closing picture-in-picture window {} ({:?})", self.id, pip.id(), reason);
        pip.mark_closing();
        self.dispatch(&PictureInPictureEvent::exit(pip.clone(), reason));
        pip.destroy();

        let mut slot = self.lock_slot();
        slot.window = None;
        if let Err(e) = slot.lifecycle.transition(PipState::Closed) {
            log::warn!("window {}: {}", self.id, e);
        }
        true
    }

    fn dispatch(&self, event: &PictureInPictureEvent) {
        let handlers = self.lock_listeners().handlers_for(event.event_type());
        log::debug!(
            "window {}: dispatching {} to {} handler(s)",
            self.id,
            event.event_type().as_str(),
            handlers.len()
        );
        for handler in handlers {
            handler(event);
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.close_picture_in_picture(None, ExitReason::OpenerClosed);
        {
            let mut slot = self.lock_slot();
            if slot.replacing.take().is_some() {
                slot.ticket += 1;
            }
            if slot.lifecycle.state() == PipState::Opening {
                slot.ticket += 1;
                if let Err(e) = slot.lifecycle.transition(PipState::Closed) {
                    log::warn!("window {}: {}", self.id, e);
                }
            }
        }
        self.current_document().destroy();
        log::debug!("window {} closed", self.id);
    }
}

impl Drop for WindowInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl DocumentHost for WindowInner {
    fn navigate(&self, _document: &Document, request: NavigationRequest) -> Result<NavigationOutcome> {
        self.close_picture_in_picture(None, ExitReason::OpenerNavigated);

        let next = Document::new(request.url);
        next.attach_host(self.self_ref.clone());
        let previous = std::mem::replace(
            &mut *self.document.lock().unwrap_or_else(PoisonError::into_inner),
            next.clone(),
        );
        previous.destroy();
        log::info!("window {}: navigated to {}", self.id, next.url());
        Ok(NavigationOutcome::Navigated)
    }

    fn open_window(&self, _document: &Document, url: &Url) -> Result<()> {
        self.platform.embedder().open_window(url)
    }

    fn download(&self, _document: &Document, url: &Url) -> Result<()> {
        self.platform.embedder().download(url)
    }

    fn exit_picture_in_picture(&self, _document: &Document) -> Result<()> {
        if !self.close_picture_in_picture(None, ExitReason::Script) {
            log::debug!("window {}: exitPictureInPicture() with nothing to close", self.id);
        }
        Ok(())
    }
}

/// A request that passed the synchronous checks and is waiting on the
/// compositor.
struct PendingOpen {
    guard: OpeningGuard,
    rx: oneshot::Receiver<Result<SurfaceGrant>>,
    options: PictureInPictureWindowOptions,
    compositor: Arc<dyn Compositor>,
    /// Set when the request replaces an open window
    replacement: Option<ActivationGrant>,
}

impl PendingOpen {
    async fn complete(self) -> Result<PictureInPictureWindow> {
        let PendingOpen {
            mut guard,
            rx,
            options,
            compositor,
            replacement,
        } = self;

        let grant = match rx.await {
            Ok(Ok(grant)) => grant,
            Ok(Err(err)) => {
                log::warn!("picture-in-picture surface allocation failed: {}", err);
                return Err(err);
            }
            Err(_) => {
                return Err(Error::Compositor(
                    "compositor dropped the surface request".to_string(),
                ))
            }
        };

        let Some(opener) = guard.window.upgrade() else {
            compositor.release_surface(grant.id);
            return Err(Error::Aborted("opener window went away".to_string()));
        };
        guard.armed = false;
        opener.finish_open(guard.ticket, grant, &options, compositor, replacement)
    }
}

/// Returns the opener to `closed` if a pending open never completes
/// (failure, or the future being dropped).
struct OpeningGuard {
    window: Weak<WindowInner>,
    ticket: u64,
    armed: bool,
}

impl Drop for OpeningGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(window) = self.window.upgrade() {
            window.abandon_opening(self.ticket);
        }
    }
}
