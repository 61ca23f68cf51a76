/// Transient user activation tracking
///
/// A window gains transient activation when the embedder reports a user
/// gesture (click, key press). The activation expires after a fixed
/// duration and is consumed by APIs that require it.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct UserActivation {
    last_activation: Option<Instant>,
    duration: Duration,
}

/// Proof that transient activation was held and consumed.
///
/// Only [`UserActivation::consume`] can mint one, which makes the
/// `closed -> opening` transition unreachable without a gesture.
#[derive(Debug)]
pub struct ActivationGrant {
    _private: (),
}

impl UserActivation {
    pub fn new(duration: Duration) -> Self {
        Self {
            last_activation: None,
            duration,
        }
    }

    pub fn notify(&mut self) {
        self.last_activation = Some(Instant::now());
    }

    pub fn is_active(&self) -> bool {
        match self.last_activation {
            Some(at) => at.elapsed() < self.duration,
            None => false,
        }
    }

    /// Consume transient activation if present.
    pub fn consume(&mut self) -> Option<ActivationGrant> {
        if !self.is_active() {
            return None;
        }
        self.last_activation = None;
        Some(ActivationGrant { _private: () })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_activation_without_gesture() {
        let mut a = UserActivation::new(Duration::from_secs(5));
        assert!(!a.is_active());
        assert!(a.consume().is_none());
    }

    #[test]
    fn activation_is_consumed_once() {
        let mut a = UserActivation::new(Duration::from_secs(5));
        a.notify();
        assert!(a.is_active());
        assert!(a.consume().is_some());
        assert!(a.consume().is_none());
    }

    #[test]
    fn zero_duration_never_activates() {
        let mut a = UserActivation::new(Duration::ZERO);
        a.notify();
        assert!(a.consume().is_none());
    }
}
