use std::rc::Rc;

use glam::Vec2;
use vista_gfx::GraphicsBackend;
use vista_kernel::{Component, ComponentError, EngineTime};

use crate::service::{InputService, MouseButton, MouseState};

/// Mouse device component: polls the input service on every update.
pub struct Mouse {
    service: Rc<dyn InputService>,
    focused: bool,
    previous: MouseState,
    current: MouseState,
    // Set when focus returns so the first snapshot does not produce a jump.
    resync: bool,
}

impl Mouse {
    pub fn new(service: Rc<dyn InputService>) -> Self {
        Self {
            service,
            focused: true,
            previous: MouseState::default(),
            current: MouseState::default(),
            resync: true,
        }
    }

    pub fn set_focus(&mut self, focused: bool) {
        if focused && !self.focused {
            self.resync = true;
        }
        self.focused = focused;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Take a new snapshot. Unfocused, the cursor holds still and no button is down.
    pub fn poll(&mut self) {
        let next = if self.focused {
            self.service.mouse()
        } else {
            self.current.released()
        };
        self.previous = std::mem::replace(&mut self.current, next);
        if self.resync && self.focused {
            self.previous.position = self.current.position;
            self.previous.wheel = self.current.wheel;
            self.resync = false;
        }
    }

    pub fn state(&self) -> &MouseState {
        &self.current
    }

    pub fn position(&self) -> Vec2 {
        self.current.position
    }

    /// Cursor movement since the previous poll.
    pub fn delta(&self) -> Vec2 {
        self.current.position - self.previous.position
    }

    /// Wheel notches since the previous poll.
    pub fn wheel_delta(&self) -> f32 {
        self.current.wheel - self.previous.wheel
    }

    pub fn is_down(&self, button: MouseButton) -> bool {
        self.current.is_down(button)
    }

    pub fn was_pressed(&self, button: MouseButton) -> bool {
        self.current.is_down(button) && !self.previous.is_down(button)
    }

    pub fn was_released(&self, button: MouseButton) -> bool {
        !self.current.is_down(button) && self.previous.is_down(button)
    }
}

impl<B: GraphicsBackend> Component<B> for Mouse {
    fn name(&self) -> &'static str {
        "Mouse"
    }

    fn update(&mut self, _time: &EngineTime) -> Result<(), ComponentError> {
        self.poll();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SharedInput;

    fn mouse() -> (SharedInput, Mouse) {
        let input = SharedInput::new();
        let mouse = Mouse::new(Rc::new(input.clone()));
        (input, mouse)
    }

    #[test]
    fn first_poll_has_no_motion() {
        let (input, mut mouse) = mouse();
        input.cursor_moved(Vec2::new(400.0, 300.0));
        input.scroll(3.0);
        mouse.poll();
        assert_eq!(mouse.position(), Vec2::new(400.0, 300.0));
        assert_eq!(mouse.delta(), Vec2::ZERO);
        assert_eq!(mouse.wheel_delta(), 0.0);
    }

    #[test]
    fn delta_and_wheel_between_polls() {
        let (input, mut mouse) = mouse();
        mouse.poll();
        input.cursor_moved(Vec2::new(5.0, -2.0));
        input.scroll(1.0);
        input.button(MouseButton::Right, true);
        mouse.poll();

        assert_eq!(mouse.delta(), Vec2::new(5.0, -2.0));
        assert_eq!(mouse.wheel_delta(), 1.0);
        assert!(mouse.was_pressed(MouseButton::Right));

        mouse.poll();
        assert_eq!(mouse.delta(), Vec2::ZERO);
        assert!(mouse.is_down(MouseButton::Right));
        assert!(!mouse.was_pressed(MouseButton::Right));
    }

    #[test]
    fn unfocused_mouse_is_still_and_released() {
        let (input, mut mouse) = mouse();
        input.button(MouseButton::Left, true);
        mouse.poll();

        mouse.set_focus(false);
        input.cursor_moved(Vec2::new(900.0, 900.0));
        mouse.poll();
        assert!(!mouse.is_down(MouseButton::Left));
        assert!(mouse.was_released(MouseButton::Left));
        assert_eq!(mouse.delta(), Vec2::ZERO);

        mouse.set_focus(true);
        mouse.poll();
        assert_eq!(mouse.position(), Vec2::new(900.0, 900.0));
        assert_eq!(mouse.delta(), Vec2::ZERO);
    }
}
