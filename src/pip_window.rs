//! The picture-in-picture window controller
//!
//! Owns the blank document shown in the always-on-top window and enforces
//! the restrictions that apply to it: no navigation (an attempt closes the
//! window), no nested windows, no downloads, UA-controlled size and input.

use crate::dom::{Document, DocumentHost, NavigationOutcome, NavigationRequest};
use crate::event::ExitReason;
use crate::geometry::{validate_aspect_ratio, Size, SizeBounds};
use crate::platform::{Compositor, SurfaceGrant, SurfaceId};
use crate::window::{Window, WindowInner};
use crate::{Error, InputPolicy, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::oneshot;
use url::Url;

static NEXT_PIP_ID: AtomicU64 = AtomicU64::new(1);

/// Kinds of user input the UA may route to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Pointer,
    Keyboard,
    Wheel,
}

pub(crate) struct ControllerInner {
    id: u64,
    opener: Weak<WindowInner>,
    compositor: Arc<dyn Compositor>,
    surface: SurfaceId,
    bounds: SizeBounds,
    input_policy: InputPolicy,
    state: Mutex<ControllerState>,
}

struct ControllerState {
    /// `None` once torn down
    document: Option<Document>,
    size: Size,
    constrain_aspect_ratio: bool,
    aspect_ratio: Option<f64>,
    closing: bool,
}

/// Handle to a live (or torn-down) picture-in-picture window.
#[derive(Clone)]
pub struct PictureInPictureWindow {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for PictureInPictureWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.lock();
        f.debug_struct("PictureInPictureWindow")
            .field("id", &self.inner.id)
            .field("size", &st.size)
            .field("constrain_aspect_ratio", &st.constrain_aspect_ratio)
            .field("closed", &st.document.is_none())
            .finish()
    }
}

impl PictureInPictureWindow {
    pub(crate) fn new(
        opener: Weak<WindowInner>,
        document: Document,
        grant: SurfaceGrant,
        bounds: SizeBounds,
        constrain_aspect_ratio: bool,
        input_policy: InputPolicy,
        compositor: Arc<dyn Compositor>,
    ) -> PictureInPictureWindow {
        let aspect_ratio = if constrain_aspect_ratio { grant.size.ratio() } else { None };
        let inner = Arc::new(ControllerInner {
            id: NEXT_PIP_ID.fetch_add(1, Ordering::Relaxed),
            opener,
            compositor,
            surface: grant.id,
            bounds,
            input_policy,
            state: Mutex::new(ControllerState {
                document: Some(document.clone()),
                size: grant.size,
                constrain_aspect_ratio,
                aspect_ratio,
                closing: false,
            }),
        });
        let host: Weak<ControllerInner> = Arc::downgrade(&inner);
        document.attach_host(host);
        PictureInPictureWindow { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The window's document; `None` after teardown.
    pub fn document(&self) -> Option<Document> {
        self.inner.lock().document.clone()
    }

    pub fn opener(&self) -> Option<Window> {
        self.inner.opener.upgrade().map(Window::from_inner)
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.inner.surface
    }

    pub fn inner_size(&self) -> Size {
        self.inner.lock().size
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().document.is_none()
    }

    /// True from the start of teardown, while exit handlers run.
    pub fn is_closing(&self) -> bool {
        self.inner.lock().closing
    }

    pub fn constrain_aspect_ratio(&self) -> bool {
        self.inner.lock().constrain_aspect_ratio
    }

    /// Turning constraint on without an explicit ratio locks the current
    /// `width / height`.
    pub fn set_constrain_aspect_ratio(&self, constrain: bool) {
        let mut st = self.inner.lock();
        st.constrain_aspect_ratio = constrain;
        if constrain && st.aspect_ratio.is_none() {
            st.aspect_ratio = st.size.ratio();
        }
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        self.inner.lock().aspect_ratio
    }

    /// `pipWindow.setAspectRatio(ratio)`.
    ///
    /// Rejects non-positive or non-finite ratios without touching the
    /// current one. With `constrain_aspect_ratio` on, the window is resized
    /// right away (width kept, height derived) and the future resolves once
    /// the compositor has applied the new geometry.
    pub fn set_aspect_ratio(&self, aspect_ratio: f32) -> impl Future<Output = Result<()>> + Send + 'static {
        let pending = self.begin_aspect_ratio(aspect_ratio);
        let inner = self.inner.clone();
        async move {
            let Some((ratio, rx)) = pending? else {
                return Ok(());
            };
            let applied = rx
                .await
                .map_err(|_| Error::Compositor("compositor dropped the geometry request".to_string()))??;
            let mut st = inner.lock();
            if st.document.is_some() {
                st.aspect_ratio = Some(ratio);
                st.size = applied;
            }
            Ok(())
        }
    }

    /// Validates the ratio and, when constrained, asks the compositor for
    /// the new geometry. The ratio is stored once the compositor confirms.
    fn begin_aspect_ratio(&self, aspect_ratio: f32) -> Result<Option<(f64, oneshot::Receiver<Result<Size>>)>> {
        let ratio = validate_aspect_ratio(aspect_ratio)?;
        let target = {
            let mut st = self.inner.lock();
            if st.document.is_none() {
                return Err(Error::InvalidState("picture-in-picture window is closed".to_string()));
            }
            if !st.constrain_aspect_ratio {
                st.aspect_ratio = Some(ratio);
                return Ok(None);
            }
            self.inner.bounds.clamp_with_ratio(st.size, ratio)
        };
        log::debug!(
            "picture-in-picture window {}: aspect ratio {} -> {}x{}",
            self.inner.id,
            ratio,
            target.width,
            target.height
        );
        Ok(Some((ratio, self.inner.compositor.set_geometry(self.inner.surface, target))))
    }

    /// A resize performed by the user through UA chrome. With the aspect
    /// ratio constrained the width drives and the height follows. The UA
    /// size bounds always apply.
    pub fn resize_by_user(&self, width: u32, height: u32) -> Result<Size> {
        let applied = {
            let mut st = self.inner.lock();
            if st.document.is_none() {
                return Err(Error::InvalidState("picture-in-picture window is closed".to_string()));
            }
            let requested = Size::new(width, height);
            let applied = match (st.constrain_aspect_ratio, st.aspect_ratio) {
                (true, Some(ratio)) => self.inner.bounds.clamp_with_ratio(requested, ratio),
                _ => self.inner.bounds.clamp(requested),
            };
            st.size = applied;
            applied
        };
        // the surface already has this size; only the compositor's record is stale
        drop(self.inner.compositor.set_geometry(self.inner.surface, applied));
        Ok(applied)
    }

    /// Close through UA chrome (the window's close button).
    pub fn close_by_user(&self) {
        self.inner.request_close(ExitReason::UserClosed);
    }

    pub fn accepts_input(&self) -> bool {
        self.inner.input_policy == InputPolicy::Allow
    }

    /// Route a user input event to the window, subject to the UA's input
    /// policy.
    pub fn deliver_input(&self, kind: InputKind) -> Result<()> {
        if self.is_closed() {
            return Err(Error::InvalidState("picture-in-picture window is closed".to_string()));
        }
        if !self.accepts_input() {
            log::warn!("picture-in-picture window {}: {:?} input blocked by UA policy", self.inner.id, kind);
            return Err(Error::NotAllowed(format!("{:?} input is restricted", kind)));
        }
        log::debug!("picture-in-picture window {}: delivered {:?} input", self.inner.id, kind);
        Ok(())
    }

    pub(crate) fn mark_closing(&self) {
        self.inner.lock().closing = true;
    }

    pub(crate) fn destroy(&self) {
        self.inner.destroy();
    }
}

impl ControllerInner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_close(&self, reason: ExitReason) {
        // already being torn down; exit handlers may still be running
        if self.lock().closing {
            return;
        }
        match self.opener.upgrade() {
            Some(opener) => {
                opener.close_picture_in_picture(Some(self.id), reason);
            }
            // Opener is gone without having torn us down.
            None => self.destroy(),
        }
    }

    fn destroy(&self) {
        let document = {
            let mut st = self.lock();
            st.closing = true;
            st.document.take()
        };
        if let Some(document) = document {
            document.destroy();
            self.compositor.release_surface(self.surface);
            log::debug!("picture-in-picture window {} destroyed", self.id);
        }
    }
}

impl DocumentHost for ControllerInner {
    fn navigate(&self, _document: &Document, request: NavigationRequest) -> Result<NavigationOutcome> {
        log::warn!(
            "picture-in-picture window {}: blocked {:?} navigation to {}; closing",
            self.id,
            request.kind,
            request.url
        );
        self.request_close(ExitReason::Navigation);
        Ok(NavigationOutcome::ClosedPictureInPicture)
    }

    fn open_window(&self, _document: &Document, url: &Url) -> Result<()> {
        log::warn!("picture-in-picture window {}: blocked window.open({})", self.id, url);
        Err(Error::NotAllowed(
            "picture-in-picture documents cannot open windows".to_string(),
        ))
    }

    fn download(&self, _document: &Document, url: &Url) -> Result<()> {
        log::warn!("picture-in-picture window {}: blocked download of {}", self.id, url);
        Err(Error::NotAllowed(
            "picture-in-picture documents cannot start downloads".to_string(),
        ))
    }

    fn exit_picture_in_picture(&self, _document: &Document) -> Result<()> {
        self.request_close(ExitReason::Script);
        Ok(())
    }
}
