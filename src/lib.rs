//! RFox Picture-in-Picture
//!
//! A headless implementation of Document Picture-in-Picture: a page may
//! open an always-on-top window holding a blank document that it fills
//! with script, instead of a mirror of a single video element.
//!
//! # Features
//!
//! - **Lifecycle**: explicit `closed -> opening -> open -> closing` state
//!   machine per opener, gated on user activation
//! - **Destroy-after-notify**: `exitpictureinpicture` handlers always see a
//!   live document, so they can move elements back into the page
//! - **Restrictions**: the picture-in-picture document cannot navigate, open
//!   windows or start downloads; size and input stay under UA control
//! - **Pluggable platform**: compositor, permission policy and embedder are
//!   traits with headless defaults
//!
//! # Example
//!
//! ```
//! use rfpip::{PictureInPictureWindowOptions, Window};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let window = Window::with_defaults("https://example.com/player")?;
//! let player = window.document().create_element("video")?;
//! window.document().body().unwrap().append_child(&player)?;
//!
//! let options = PictureInPictureWindowOptions::with_size(300, 200).with_constrained_aspect_ratio(true);
//! let pip = futures::executor::block_on(
//!     window.with_user_gesture(|w| w.request_picture_in_picture_window(options)),
//! )?;
//!
//! let pip_document = pip.document().unwrap();
//! pip_document.body().unwrap().append_child(&player)?;
//! assert!(!window.document().contains(&player));
//!
//! window.document().exit_picture_in_picture()?;
//! assert!(pip.is_closed());
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod dom;
pub mod error;
pub mod event;
pub mod geometry;
pub mod pip_window;
pub mod platform;
pub mod state;
pub mod window;

pub use dom::{Document, NavigationOutcome, Node};
pub use error::{Error, Result};
pub use event::{EventType, ExitReason, ListenerId, PictureInPictureEvent};
pub use geometry::Size;
pub use pip_window::{InputKind, PictureInPictureWindow};
pub use state::PipState;
pub use window::Window;

use geometry::SizeBounds;
use serde::{Deserialize, Serialize};

/// Whether the UA routes user input to picture-in-picture windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputPolicy {
    Allow,
    Restrict,
}

/// What a second request does while a window is already open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReopenPolicy {
    /// Close the current window (exit reason `Replaced`), then open anew
    Replace,
    /// Fail the new request with `InvalidState`
    Reject,
}

/// UA configuration for picture-in-picture windows
///
/// The defaults are conservative: windows are kept within 80% of a
/// 1920x1080 screen and never smaller than 100x100.
///
/// # Examples
///
/// ```
/// let cfg = rfpip::PipConfig::default();
/// assert_eq!(cfg.reopen_policy, rfpip::ReopenPolicy::Replace);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipConfig {
    /// Size used when the request does not specify one
    pub default_size: Size,
    pub min_size: Size,
    pub max_size: Size,
    pub input_policy: InputPolicy,
    pub reopen_policy: ReopenPolicy,
    /// How long a user gesture counts as transient activation
    pub activation_timeout_ms: u64,
}

impl Default for PipConfig {
    fn default() -> Self {
        Self {
            default_size: Size::new(400, 300),
            min_size: Size::new(100, 100),
            max_size: Size::new(1536, 864),
            input_policy: InputPolicy::Allow,
            reopen_policy: ReopenPolicy::Replace,
            activation_timeout_ms: 5000,
        }
    }
}

impl PipConfig {
    /// Validate the size fields and return them as bounds.
    pub fn size_bounds(&self) -> Result<SizeBounds> {
        let bounds = SizeBounds::new(self.min_size, self.max_size)?;
        if bounds.clamp(self.default_size) != self.default_size {
            return Err(Error::ConfigError(format!(
                "default size {}x{} is outside the allowed bounds",
                self.default_size.width, self.default_size.height
            )));
        }
        Ok(bounds)
    }
}

/// `PictureInPictureWindowOptions`. Width and height are advisory: a
/// missing or zero value means "UA default", and the UA clamps whatever
/// is requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PictureInPictureWindowOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub constrain_aspect_ratio: bool,
}

impl PictureInPictureWindowOptions {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            constrain_aspect_ratio: false,
        }
    }

    pub fn with_constrained_aspect_ratio(mut self, constrain: bool) -> Self {
        self.constrain_aspect_ratio = constrain;
        self
    }
}
