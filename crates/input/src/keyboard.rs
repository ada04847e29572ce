use std::rc::Rc;

use vista_gfx::GraphicsBackend;
use vista_kernel::{Component, ComponentError, EngineTime};

use crate::service::{InputService, Key, KeyboardState};

/// Keyboard device component: polls the input service on every update.
pub struct Keyboard {
    service: Rc<dyn InputService>,
    focused: bool,
    previous: KeyboardState,
    current: KeyboardState,
}

impl Keyboard {
    pub fn new(service: Rc<dyn InputService>) -> Self {
        Self {
            service,
            focused: true,
            previous: KeyboardState::default(),
            current: KeyboardState::default(),
        }
    }

    pub fn set_focus(&mut self, focused: bool) {
        if self.focused != focused {
            tracing::trace!(focused, "keyboard focus changed");
        }
        self.focused = focused;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Take a new snapshot. Unfocused, the snapshot holds no keys.
    pub fn poll(&mut self) {
        let next = if self.focused {
            self.service.keyboard()
        } else {
            KeyboardState::default()
        };
        self.previous = std::mem::replace(&mut self.current, next);
    }

    pub fn state(&self) -> &KeyboardState {
        &self.current
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.current.is_down(key)
    }

    /// Down now, up at the previous poll.
    pub fn was_pressed(&self, key: Key) -> bool {
        self.current.is_down(key) && !self.previous.is_down(key)
    }

    /// Up now, down at the previous poll.
    pub fn was_released(&self, key: Key) -> bool {
        !self.current.is_down(key) && self.previous.is_down(key)
    }
}

impl<B: GraphicsBackend> Component<B> for Keyboard {
    fn name(&self) -> &'static str {
        "Keyboard"
    }

    fn update(&mut self, _time: &EngineTime) -> Result<(), ComponentError> {
        self.poll();
        Ok(())
    }

    fn unload_content(&mut self) -> Result<(), ComponentError> {
        self.previous = KeyboardState::default();
        self.current = KeyboardState::default();
        Ok(())
    }
}
