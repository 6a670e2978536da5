//! Per-request phase state machine.
//!
//! ```text
//! Start → Auth → Router → Service → Database* → Completed → End
//!   any non-terminal phase → Errored → End
//! ```
//!
//! Layers may be skipped (a disabled layer never enters its phase), but no
//! transition ever moves backwards.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::intercept::Layer;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestPhase {
    Start = 0,
    Auth = 1,
    Router = 2,
    Service = 3,
    Database = 4,
    Completed = 5,
    Errored = 6,
    End = 7,
}

impl From<u8> for RequestPhase {
    fn from(val: u8) -> Self {
        match val {
            1 => RequestPhase::Auth,
            2 => RequestPhase::Router,
            3 => RequestPhase::Service,
            4 => RequestPhase::Database,
            5 => RequestPhase::Completed,
            6 => RequestPhase::Errored,
            7 => RequestPhase::End,
            _ => RequestPhase::Start,
        }
    }
}

impl From<Layer> for RequestPhase {
    fn from(layer: Layer) -> Self {
        match layer {
            Layer::Auth => RequestPhase::Auth,
            Layer::Router => RequestPhase::Router,
            Layer::Service => RequestPhase::Service,
            Layer::Database => RequestPhase::Database,
        }
    }
}

impl RequestPhase {
    /// Returns true if `self → next` is a legal transition.
    pub fn can_advance(self, next: RequestPhase) -> bool {
        use RequestPhase::*;

        match (self, next) {
            (End, _) => false,
            (_, End) => true,
            (Errored | Completed, _) => false,
            (_, Errored) => true,
            (Database, Database) => true,
            (from, to) => to > from,
        }
    }

    /// The interceptor layer this phase belongs to, if any.
    pub fn layer(self) -> Option<Layer> {
        match self {
            RequestPhase::Auth => Some(Layer::Auth),
            RequestPhase::Router => Some(Layer::Router),
            RequestPhase::Service => Some(Layer::Service),
            RequestPhase::Database => Some(Layer::Database),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestPhase::Errored | RequestPhase::End)
    }
}

/// Lock-free holder for a request's current phase.
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    phase: AtomicU8,
    /// Last layer entered; survives the move to Errored/Completed.
    last_layer: AtomicU8,
}

const NO_LAYER: u8 = u8::MAX;

impl PhaseTracker {
    pub(crate) fn new() -> Self {
        Self {
            phase: AtomicU8::new(RequestPhase::Start as u8),
            last_layer: AtomicU8::new(NO_LAYER),
        }
    }

    pub(crate) fn get(&self) -> RequestPhase {
        RequestPhase::from(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn advance(&self, next: RequestPhase) -> bool {
        let mut current = self.phase.load(Ordering::Acquire);
        loop {
            if !RequestPhase::from(current).can_advance(next) {
                return false;
            }
            match self.phase.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        if let Some(layer) = next.layer() {
            self.last_layer.store(layer as u8, Ordering::Release);
        }
        true
    }

    pub(crate) fn last_layer(&self) -> Option<Layer> {
        Layer::from_u8(self.last_layer.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path() {
        let tracker = PhaseTracker::new();
        for phase in [
            RequestPhase::Auth,
            RequestPhase::Router,
            RequestPhase::Service,
            RequestPhase::Database,
            RequestPhase::Database,
            RequestPhase::Completed,
            RequestPhase::End,
        ] {
            assert!(tracker.advance(phase), "{:?} should be reachable", phase);
        }
        assert_eq!(tracker.get(), RequestPhase::End);
    }

    #[test]
    fn test_no_backward_transitions() {
        let tracker = PhaseTracker::new();
        assert!(tracker.advance(RequestPhase::Service));
        assert!(!tracker.advance(RequestPhase::Router));
        assert!(!tracker.advance(RequestPhase::Start));
        assert_eq!(tracker.get(), RequestPhase::Service);
    }

    #[test]
    fn test_errored_is_terminal() {
        let tracker = PhaseTracker::new();
        tracker.advance(RequestPhase::Router);
        tracker.advance(RequestPhase::Database);
        assert!(tracker.advance(RequestPhase::Errored));
        assert!(!tracker.advance(RequestPhase::Completed));
        assert!(!tracker.advance(RequestPhase::Database));
        assert!(tracker.advance(RequestPhase::End));
        assert!(!tracker.advance(RequestPhase::Errored));
        assert_eq!(tracker.last_layer(), Some(Layer::Database));
    }

    #[test]
    fn test_skipping_disabled_layers() {
        assert!(RequestPhase::Start.can_advance(RequestPhase::Service));
        assert!(RequestPhase::Router.can_advance(RequestPhase::Completed));
        assert!(!RequestPhase::Completed.can_advance(RequestPhase::Errored));
    }
}
