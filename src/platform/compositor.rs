/// Compositor surface allocation for always-on-top windows

use crate::geometry::Size;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceRequest {
    /// Serialized origin of the requesting page, for UA chrome
    pub origin: String,
    pub size: Size,
    pub always_on_top: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGrant {
    pub id: SurfaceId,
    pub size: Size,
}

/// Window-system side of the feature. Allocation and geometry changes may
/// involve another process, so they answer through a oneshot channel.
pub trait Compositor: Send + Sync {
    fn allocate_surface(&self, request: SurfaceRequest) -> oneshot::Receiver<Result<SurfaceGrant>>;

    /// Resize a surface; answers with the size actually applied.
    fn set_geometry(&self, id: SurfaceId, size: Size) -> oneshot::Receiver<Result<Size>>;

    fn release_surface(&self, id: SurfaceId);

    fn live_surfaces(&self) -> Vec<SurfaceId>;
}

#[derive(Default)]
struct HeadlessState {
    next_id: u64,
    surfaces: BTreeMap<SurfaceId, Size>,
    fail_next: Option<String>,
    fail_geometry: Option<String>,
}

/// In-memory compositor that answers immediately
pub struct HeadlessCompositor {
    state: Mutex<HeadlessState>,
}

impl HeadlessCompositor {
    pub fn new() -> Self {
        HeadlessCompositor {
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// Make the next `allocate_surface` call fail with `reason`.
    pub fn fail_next_allocation(&self, reason: &str) {
        self.lock().fail_next = Some(reason.to_string());
    }

    /// Make the next `set_geometry` call fail with `reason`.
    pub fn fail_next_geometry(&self, reason: &str) {
        self.lock().fail_geometry = Some(reason.to_string());
    }

    pub fn surface_size(&self, id: SurfaceId) -> Option<Size> {
        self.lock().surfaces.get(&id).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HeadlessCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor for HeadlessCompositor {
    fn allocate_surface(&self, request: SurfaceRequest) -> oneshot::Receiver<Result<SurfaceGrant>> {
        let (tx, rx) = oneshot::channel();
        let mut st = self.lock();
        let res = match st.fail_next.take() {
            Some(reason) => Err(Error::Compositor(reason)),
            None => {
                st.next_id += 1;
                let id = SurfaceId(st.next_id);
                st.surfaces.insert(id, request.size);
                log::debug!("allocated surface {:?} {}x{} for {}", id, request.size.width, request.size.height, request.origin);
                Ok(SurfaceGrant { id, size: request.size })
            }
        };
        let _ = tx.send(res);
        rx
    }

    fn set_geometry(&self, id: SurfaceId, size: Size) -> oneshot::Receiver<Result<Size>> {
        let (tx, rx) = oneshot::channel();
        let mut st = self.lock();
        let res = match st.fail_geometry.take() {
            Some(reason) => Err(Error::Compositor(reason)),
            None => match st.surfaces.get_mut(&id) {
                Some(slot) => {
                    *slot = size;
                    Ok(size)
                }
                None => Err(Error::Compositor(format!("unknown surface {:?}", id))),
            },
        };
        drop(st);
        let _ = tx.send(res);
        rx
    }

    fn release_surface(&self, id: SurfaceId) {
        if self.lock().surfaces.remove(&id).is_some() {
            log::debug!("released surface {:?}", id);
        }
    }

    fn live_surfaces(&self) -> Vec<SurfaceId> {
        self.lock().surfaces.keys().copied().collect()
    }
}
