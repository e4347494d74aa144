//! One-shot audio unlock state machine.
//!
//! Browsers only let audio start after a user gesture. The coordinator keeps
//! gesture listeners attached while [`UnlockState::Locked`], issues a single
//! unlock request, and detaches everything once [`UnlockState::Unlocked`].

/// Progress of the audio unlock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnlockState {
    #[default]
    Locked,
    /// A request is in flight; further gestures are ignored.
    Unlocking,
    Unlocked,
}

#[derive(Debug, Default)]
pub struct UnlockMachine {
    state: UnlockState,
}

impl UnlockMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start already unlocked (no gesture needed).
    pub fn unlocked() -> Self {
        Self {
            state: UnlockState::Unlocked,
        }
    }

    pub fn state(&self) -> UnlockState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == UnlockState::Unlocked
    }

    /// Whether gesture listeners should currently be attached.
    pub fn wants_gestures(&self) -> bool {
        self.state != UnlockState::Unlocked
    }

    /// A qualifying gesture arrived. Returns `true` if an unlock request should be issued.
    pub fn on_gesture(&mut self) -> bool {
        if self.state == UnlockState::Locked {
            self.state = UnlockState::Unlocking;
            true
        } else {
            false
        }
    }

    /// The unlock request could not be issued; allow the next gesture to retry.
    pub fn on_request_dropped(&mut self) {
        if self.state == UnlockState::Unlocking {
            self.state = UnlockState::Locked;
        }
    }

    /// The audio output reported success. Returns `true` on the first transition only.
    pub fn on_unlocked(&mut self) -> bool {
        if self.state == UnlockState::Unlocked {
            return false;
        }
        self.state = UnlockState::Unlocked;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_gesture_requests_unlock() {
        let mut m = UnlockMachine::new();
        assert!(m.on_gesture());
        assert_eq!(m.state(), UnlockState::Unlocking);
        assert!(!m.on_gesture());
        assert!(m.on_unlocked());
        assert!(!m.on_gesture());
        assert!(!m.wants_gestures());
    }

    #[test]
    fn unlock_transition_happens_once() {
        let mut m = UnlockMachine::new();
        m.on_gesture();
        assert!(m.on_unlocked());
        assert!(!m.on_unlocked());
        assert!(m.is_unlocked());
    }

    #[test]
    fn dropped_request_returns_to_locked() {
        let mut m = UnlockMachine::new();
        m.on_gesture();
        m.on_request_dropped();
        assert_eq!(m.state(), UnlockState::Locked);
        assert!(m.on_gesture());
    }

    #[test]
    fn dropped_request_never_relocks_after_unlock() {
        let mut m = UnlockMachine::unlocked();
        m.on_request_dropped();
        assert!(m.is_unlocked());
    }
}
