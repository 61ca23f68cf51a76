//! Picture-in-picture lifecycle events dispatched on the opener window

use crate::pip_window::PictureInPictureWindow;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    #[serde(rename = "enterpictureinpicture")]
    EnterPictureInPicture,
    #[serde(rename = "exitpictureinpicture")]
    ExitPictureInPicture,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::EnterPictureInPicture => "enterpictureinpicture",
            EventType::ExitPictureInPicture => "exitpictureinpicture",
        }
    }
}

/// Why a picture-in-picture window is going away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// `document.exitPictureInPicture()`
    Script,
    /// Closed through UA chrome
    UserClosed,
    /// Script in the picture-in-picture document tried to navigate
    Navigation,
    OpenerClosed,
    OpenerNavigated,
    /// A newer request replaced this window
    Replaced,
}

/// Event object handed to `enterpictureinpicture` / `exitpictureinpicture`
/// handlers. During exit dispatch the window and its document are still
/// alive; they are released only after every handler has returned.
#[derive(Debug, Clone)]
pub struct PictureInPictureEvent {
    event_type: EventType,
    window: PictureInPictureWindow,
    reason: Option<ExitReason>,
}

impl PictureInPictureEvent {
    pub(crate) fn enter(window: PictureInPictureWindow) -> Self {
        Self {
            event_type: EventType::EnterPictureInPicture,
            window,
            reason: None,
        }
    }

    pub(crate) fn exit(window: PictureInPictureWindow, reason: ExitReason) -> Self {
        Self {
            event_type: EventType::ExitPictureInPicture,
            window,
            reason: Some(reason),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn picture_in_picture_window(&self) -> &PictureInPictureWindow {
        &self.window
    }

    /// Set for exit events only
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.reason
    }
}

pub type EventHandler = Arc<dyn Fn(&PictureInPictureEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener registry of a window: `addEventListener` entries plus the
/// `on<event>` attribute handler for each type.
#[derive(Default)]
pub(crate) struct EventListeners {
    next_id: u64,
    listeners: Vec<(ListenerId, EventType, EventHandler)>,
    on_enter: Option<EventHandler>,
    on_exit: Option<EventHandler>,
}

impl EventListeners {
    pub(crate) fn add(&mut self, event_type: EventType, handler: EventHandler) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, event_type, handler));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _, _)| *lid != id);
        self.listeners.len() != before
    }

    pub(crate) fn set_attribute_handler(&mut self, event_type: EventType, handler: Option<EventHandler>) {
        match event_type {
            EventType::EnterPictureInPicture => self.on_enter = handler,
            EventType::ExitPictureInPicture => self.on_exit = handler,
        }
    }

    /// Snapshot of handlers to run for `event_type`, in dispatch order.
    /// Listeners added during dispatch do not run for the current event.
    pub(crate) fn handlers_for(&self, event_type: EventType) -> Vec<EventHandler> {
        let mut out: Vec<EventHandler> = self
            .listeners
            .iter()
            .filter(|(_, t, _)| *t == event_type)
            .map(|(_, _, h)| h.clone())
            .collect();
        let attr = match event_type {
            EventType::EnterPictureInPicture => &self.on_enter,
            EventType::ExitPictureInPicture => &self.on_exit,
        };
        if let Some(h) = attr {
            out.push(h.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> EventHandler {
        Arc::new(|_: &PictureInPictureEvent| {})
    }

    #[test]
    fn listeners_are_filtered_by_type_and_removable() {
        let mut l = EventListeners::default();
        let a = l.add(EventType::ExitPictureInPicture, noop());
        l.add(EventType::EnterPictureInPicture, noop());
        assert_eq!(l.handlers_for(EventType::ExitPictureInPicture).len(), 1);
        assert!(l.remove(a));
        assert!(!l.remove(a));
        assert!(l.handlers_for(EventType::ExitPictureInPicture).is_empty());
    }

    #[test]
    fn attribute_handler_replaces_and_runs_last() {
        let mut l = EventListeners::default();
        l.set_attribute_handler(EventType::EnterPictureInPicture, Some(noop()));
        l.set_attribute_handler(EventType::EnterPictureInPicture, Some(noop()));
        l.add(EventType::EnterPictureInPicture, noop());
        assert_eq!(l.handlers_for(EventType::EnterPictureInPicture).len(), 2);
        l.set_attribute_handler(EventType::EnterPictureInPicture, None);
        assert_eq!(l.handlers_for(EventType::EnterPictureInPicture).len(), 1);
    }

    #[test]
    fn event_names_match_idl() {
        assert_eq!(EventType::EnterPictureInPicture.as_str(), "enterpictureinpicture");
        assert_eq!(
            serde_json::to_string(&EventType::ExitPictureInPicture).unwrap(),
            "\"exitpictureinpicture\""
        );
    }
}
