//! Interaction debounce: gates expensive tile re-planning while the camera
//! is actively being manipulated.

use std::time::{Duration, Instant};

/// How long the camera must sit idle after the last interaction before
/// `DebounceState` reports `Idle` again.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No interaction has happened yet, or the debounce window has elapsed.
    Idle,
    /// An interaction is in progress (pointer down, active drag, wheel/pinch).
    Interacting,
    /// The interaction just ended; waiting out `DEBOUNCE_WINDOW` before
    /// allowing a new tile-fetch plan.
    Debouncing,
}

/// Tracks `Idle -> Interacting -> Debouncing -> Idle` transitions driven by
/// the host's input loop.
#[derive(Debug, Clone)]
pub struct DebounceState {
    phase: Phase,
    last_activity: Option<Instant>,
}

impl DebounceState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            last_activity: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Call when the host observes an interaction (pointer move while down,
    /// wheel, pinch, rotate). Moves straight to `Interacting` regardless of
    /// the prior phase.
    pub fn notify_activity(&mut self, now: Instant) {
        self.phase = Phase::Interacting;
        self.last_activity = Some(now);
    }

    /// Call when the host observes the interaction end (pointer up, wheel
    /// settles). Starts the debounce window.
    pub fn notify_settled(&mut self, now: Instant) {
        if self.phase == Phase::Interacting {
            self.phase = Phase::Debouncing;
            self.last_activity = Some(now);
        }
    }

    /// Advances the state machine against the current time, transitioning
    /// `Debouncing -> Idle` once `DEBOUNCE_WINDOW` has elapsed since the last
    /// recorded activity. Call once per frame.
    pub fn tick(&mut self, now: Instant) {
        if self.phase == Phase::Debouncing {
            if let Some(last) = self.last_activity {
                if now.duration_since(last) >= DEBOUNCE_WINDOW {
                    self.phase = Phase::Idle;
                }
            }
        }
    }

    /// Whether tile re-planning should run this frame: only once the camera
    /// has settled, i.e. not mid-interaction and not still inside the
    /// debounce window.
    pub fn should_replan(&self) -> bool {
        self.phase == Phase::Idle
    }
}

impl Default for DebounceState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle_and_allows_replan() {
        let state = DebounceState::new();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.should_replan());
    }

    #[test]
    fn test_activity_moves_to_interacting_and_blocks_replan() {
        let mut state = DebounceState::new();
        state.notify_activity(Instant::now());
        assert_eq!(state.phase(), Phase::Interacting);
        assert!(!state.should_replan());
    }

    #[test]
    fn test_settle_then_elapsed_window_returns_to_idle() {
        let mut state = DebounceState::new();
        let t0 = Instant::now();
        state.notify_activity(t0);
        state.notify_settled(t0);
        assert_eq!(state.phase(), Phase::Debouncing);
        assert!(!state.should_replan());

        state.tick(t0 + DEBOUNCE_WINDOW + Duration::from_millis(1));
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.should_replan());
    }

    #[test]
    fn test_tick_before_window_elapses_stays_debouncing() {
        let mut state = DebounceState::new();
        let t0 = Instant::now();
        state.notify_activity(t0);
        state.notify_settled(t0);
        state.tick(t0 + Duration::from_millis(100));
        assert_eq!(state.phase(), Phase::Debouncing);
    }

    #[test]
    fn test_new_activity_during_debounce_restarts_interacting() {
        let mut state = DebounceState::new();
        let t0 = Instant::now();
        state.notify_activity(t0);
        state.notify_settled(t0);
        state.notify_activity(t0 + Duration::from_millis(50));
        assert_eq!(state.phase(), Phase::Interacting);
    }
}
