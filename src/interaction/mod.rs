//! Input types and interaction state (C10): pointer/wheel/rotate/pitch
//! events and drag-threshold tracking, carrying no map-specific semantics of
//! their own -- the debounce policy that actually drives tile planning lives
//! in [`debounce`].

pub mod debounce;

use glam::DVec2;

/// Raw input event, as delivered by a host windowing/input layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { position: DVec2, button: PointerButton },
    PointerMove { position: DVec2 },
    PointerUp { position: DVec2, button: PointerButton },
    Wheel { delta: f64 },
    Pinch { scale: f64, center: DVec2 },
    Rotate { angle_degrees: f64, center: DVec2 },
    Pitch { delta_degrees: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Drag threshold in pixels before a pointer-down+move counts as a drag
/// rather than a click.
const DRAG_THRESHOLD_PX: f64 = 5.0;

/// Tracks pointer/drag state across input events.
#[derive(Debug, Clone)]
pub struct InteractionState {
    pub pointer_position: Option<DVec2>,
    pub pointer_down: bool,
    pub pointer_down_position: Option<DVec2>,
    pub is_dragging: bool,
}

impl InteractionState {
    pub fn new() -> Self {
        Self {
            pointer_position: None,
            pointer_down: false,
            pointer_down_position: None,
            is_dragging: false,
        }
    }

    pub fn handle_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown { position, .. } => {
                self.pointer_down = true;
                self.pointer_down_position = Some(position);
                self.pointer_position = Some(position);
            }
            InputEvent::PointerMove { position } => {
                self.pointer_position = Some(position);
                if self.pointer_down {
                    if let Some(down) = self.pointer_down_position {
                        if position.distance(down) > DRAG_THRESHOLD_PX {
                            self.is_dragging = true;
                        }
                    }
                }
            }
            InputEvent::PointerUp { position, .. } => {
                self.pointer_down = false;
                self.is_dragging = false;
                self.pointer_position = Some(position);
                self.pointer_down_position = None;
            }
            _ => {}
        }
    }

    /// The delta since the drag began, or `None` if not currently dragging.
    pub fn drag_delta(&self) -> Option<DVec2> {
        if !self.is_dragging {
            return None;
        }
        match (self.pointer_position, self.pointer_down_position) {
            (Some(current), Some(down)) => Some(current - down),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.pointer_down = false;
        self.is_dragging = false;
        self.pointer_down_position = None;
    }
}

impl Default for InteractionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Click/tap detection -- long-press and multi-touch gesture surfaces are
/// left out since this crate only needs a click/drag distinction to gate
/// re-planning, not a full gesture vocabulary.
pub struct ClickDetector {
    max_click_duration: std::time::Duration,
    max_click_distance: f64,
    start_time: Option<std::time::Instant>,
    start_position: Option<DVec2>,
}

impl ClickDetector {
    pub fn new() -> Self {
        Self {
            max_click_duration: std::time::Duration::from_millis(300),
            max_click_distance: 10.0,
            start_time: None,
            start_position: None,
        }
    }

    pub fn start(&mut self, position: DVec2) {
        self.start_time = Some(std::time::Instant::now());
        self.start_position = Some(position);
    }

    pub fn end(&mut self, position: DVec2) -> bool {
        let result = match (self.start_time, self.start_position) {
            (Some(start_time), Some(start_pos)) => {
                start_time.elapsed() <= self.max_click_duration
                    && position.distance(start_pos) <= self.max_click_distance
            }
            _ => false,
        };
        self.start_time = None;
        self.start_position = None;
        result
    }
}

impl Default for ClickDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_state_tracks_drag() {
        let mut state = InteractionState::new();
        state.handle_event(InputEvent::PointerDown {
            position: DVec2::new(0.0, 0.0),
            button: PointerButton::Primary,
        });
        assert!(!state.is_dragging);

        state.handle_event(InputEvent::PointerMove { position: DVec2::new(20.0, 0.0) });
        assert!(state.is_dragging);
        assert_eq!(state.drag_delta(), Some(DVec2::new(20.0, 0.0)));

        state.handle_event(InputEvent::PointerUp {
            position: DVec2::new(20.0, 0.0),
            button: PointerButton::Primary,
        });
        assert!(!state.is_dragging);
    }

    #[test]
    fn test_small_move_does_not_count_as_drag() {
        let mut state = InteractionState::new();
        state.handle_event(InputEvent::PointerDown {
            position: DVec2::new(0.0, 0.0),
            button: PointerButton::Primary,
        });
        state.handle_event(InputEvent::PointerMove { position: DVec2::new(1.0, 0.0) });
        assert!(!state.is_dragging);
    }

    #[test]
    fn test_click_detector_accepts_short_tight_click() {
        let mut detector = ClickDetector::new();
        detector.start(DVec2::new(0.0, 0.0));
        assert!(detector.end(DVec2::new(2.0, 2.0)));
    }

    #[test]
    fn test_click_detector_rejects_far_movement() {
        let mut detector = ClickDetector::new();
        detector.start(DVec2::new(0.0, 0.0));
        assert!(!detector.end(DVec2::new(100.0, 100.0)));
    }
}
