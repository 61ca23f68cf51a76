//! Platform API surface: compositor, permission policy and embedder hooks
//!
//! These are the engine collaborators a picture-in-picture window depends
//! on. The headless implementations answer immediately and keep in-memory
//! records so tests can observe what the window asked for.

pub mod compositor;
pub mod embedder;
pub mod permission;

pub use compositor::{Compositor, HeadlessCompositor, SurfaceGrant, SurfaceId, SurfaceRequest};
pub use embedder::{Embedder, EmbedderRequest, RecordingEmbedder};
pub use permission::{AllowAll, DenyOrigins, PermissionDecision, PermissionPolicy};

use std::sync::Arc;

/// A small composite trait that gives windows typed access to platform
/// primitives.
pub trait PlatformApi: Send + Sync {
    fn compositor(&self) -> Arc<dyn Compositor>;
    fn permission_policy(&self) -> Arc<dyn PermissionPolicy>;
    fn embedder(&self) -> Arc<dyn Embedder>;
}

/// Headless platform used by the CLI, tests and embedders without a real
/// window system.
pub struct HeadlessPlatform {
    compositor: Arc<HeadlessCompositor>,
    permission: Arc<dyn PermissionPolicy>,
    embedder: Arc<RecordingEmbedder>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        HeadlessPlatform {
            compositor: Arc::new(HeadlessCompositor::new()),
            permission: Arc::new(AllowAll),
            embedder: Arc::new(RecordingEmbedder::new()),
        }
    }

    pub fn with_permission_policy(mut self, policy: Arc<dyn PermissionPolicy>) -> Self {
        self.permission = policy;
        self
    }

    /// Concrete compositor, for inspecting surfaces or injecting failures
    pub fn headless_compositor(&self) -> Arc<HeadlessCompositor> {
        self.compositor.clone()
    }

    pub fn recording_embedder(&self) -> Arc<RecordingEmbedder> {
        self.embedder.clone()
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformApi for HeadlessPlatform {
    fn compositor(&self) -> Arc<dyn Compositor> {
        self.compositor.clone()
    }

    fn permission_policy(&self) -> Arc<dyn PermissionPolicy> {
        self.permission.clone()
    }

    fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }
}
