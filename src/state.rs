//! Picture-in-picture lifecycle state machine
//!
//! Each opener window tracks a single lifecycle. Transitions are guarded so
//! that "a second request while one is opening" or "close while already
//! closing" are explicit outcomes rather than incidental flag combinations.

use crate::activation::ActivationGrant;
use crate::{Error, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl PipState {
    pub fn can_transition_to(self, next: PipState) -> bool {
        use PipState::*;
        matches!(
            (self, next),
            (Closed, Opening) | (Opening, Open) | (Opening, Closed) | (Open, Closing) | (Closing, Closed)
        )
    }
}

impl std::fmt::Display for PipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipState::Closed => "closed",
            PipState::Opening => "opening",
            PipState::Open => "open",
            PipState::Closing => "closing",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: PipState,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: PipState::Closed,
        }
    }

    pub(crate) fn state(&self) -> PipState {
        self.state
    }

    /// `closed -> opening`, gated on a consumed user activation.
    pub(crate) fn begin_opening(&mut self, _grant: ActivationGrant) -> Result<()> {
        self.transition(PipState::Opening)
    }

    pub(crate) fn transition(&mut self, next: PipState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "cannot move picture-in-picture from {} to {}",
                self.state, next
            )));
        }
        log::debug!("picture-in-picture state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::UserActivation;
    use std::time::Duration;

    fn grant() -> ActivationGrant {
        let mut a = UserActivation::new(Duration::from_secs(5));
        a.notify();
        a.consume().unwrap()
    }

    #[test]
    fn full_cycle() {
        let mut l = Lifecycle::new();
        l.begin_opening(grant()).unwrap();
        l.transition(PipState::Open).unwrap();
        l.transition(PipState::Closing).unwrap();
        l.transition(PipState::Closed).unwrap();
        assert_eq!(l.state(), PipState::Closed);
    }

    #[test]
    fn opening_twice_is_rejected() {
        let mut l = Lifecycle::new();
        l.begin_opening(grant()).unwrap();
        let err = l.begin_opening(grant()).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(l.state(), PipState::Opening);
    }

    #[test]
    fn open_cannot_skip_closing() {
        let mut l = Lifecycle::new();
        l.begin_opening(grant()).unwrap();
        l.transition(PipState::Open).unwrap();
        assert!(l.transition(PipState::Closed).is_err());
        assert!(!PipState::Closing.can_transition_to(PipState::Open));
    }
}
