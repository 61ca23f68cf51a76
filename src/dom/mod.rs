//! Minimal DOM used by opener and picture-in-picture documents
//!
//! Nodes are reference-counted handles with short-lived internal locks, so a
//! node can be moved between documents (including from inside an event
//! handler) without holding any guard across script callbacks. Documents do
//! not know what kind of window hosts them; navigation, popups, downloads
//! and `exitPictureInPicture()` are routed through [`DocumentHost`].

pub mod document;
pub mod fragment;
pub mod node;

pub use document::Document;
pub use node::{Node, NodeKind};

use crate::Result;
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationKind {
    /// `location.href = ...` and friends
    Location,
    /// `location.reload()`
    Reload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationRequest {
    pub url: Url,
    pub kind: NavigationKind,
}

/// What a navigation attempt actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// A new document replaced the old one
    Navigated,
    /// The document lives in a picture-in-picture window; the window was
    /// closed instead of navigating
    ClosedPictureInPicture,
}

/// The browsing context that hosts a document.
///
/// Opener windows and picture-in-picture windows implement this with
/// different policies.
pub trait DocumentHost: Send + Sync {
    fn navigate(&self, document: &Document, request: NavigationRequest) -> Result<NavigationOutcome>;

    /// `window.open(url)` issued by script in `document`
    fn open_window(&self, document: &Document, url: &Url) -> Result<()>;

    /// A download (e.g. `<a download>` activation) started by `document`
    fn download(&self, document: &Document, url: &Url) -> Result<()>;

    /// `document.exitPictureInPicture()`
    fn exit_picture_in_picture(&self, document: &Document) -> Result<()>;
}
