use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use glam::Vec2;

/// Keys the viewer understands. Platform layers map their own codes onto these.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Space,
    Enter,
    Escape,
    Tab,
    Shift,
    Control,
    Alt,
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
            Self::Middle => 2,
        }
    }
}

/// Keys held at the moment of a poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardState {
    held: BTreeSet<Key>,
}

impl KeyboardState {
    pub fn with_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            held: keys.into_iter().collect(),
        }
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn press(&mut self, key: Key) {
        self.held.insert(key);
    }

    pub fn release(&mut self, key: Key) {
        self.held.remove(&key);
    }

    pub fn held(&self) -> impl Iterator<Item = Key> + '_ {
        self.held.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// Cursor, buttons and accumulated wheel travel at the moment of a poll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouseState {
    /// Cursor position in window pixels, origin top-left.
    pub position: Vec2,
    /// Total wheel travel in notches since the service started.
    pub wheel: f32,
    buttons: [bool; 3],
}

impl MouseState {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn is_down(&self, button: MouseButton) -> bool {
        self.buttons[button.index()]
    }

    pub fn set_button(&mut self, button: MouseButton, down: bool) {
        self.buttons[button.index()] = down;
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.set_button(button, true);
        self
    }

    /// Same cursor and wheel reading with every button released.
    pub fn released(self) -> Self {
        Self {
            buttons: [false; 3],
            ..self
        }
    }
}

/// Source of raw device state, supplied by the platform layer.
pub trait InputService {
    fn keyboard(&self) -> KeyboardState;
    fn mouse(&self) -> MouseState;
}

/// [`InputService`] fed from window events. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct SharedInput {
    inner: Rc<RefCell<(KeyboardState, MouseState)>>,
}

impl SharedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&self, key: Key) {
        self.inner.borrow_mut().0.press(key);
    }

    pub fn key_up(&self, key: Key) {
        self.inner.borrow_mut().0.release(key);
    }

    pub fn cursor_moved(&self, position: Vec2) {
        self.inner.borrow_mut().1.position = position;
    }

    pub fn button(&self, button: MouseButton, down: bool) {
        self.inner.borrow_mut().1.set_button(button, down);
    }

    pub fn scroll(&self, notches: f32) {
        self.inner.borrow_mut().1.wheel += notches;
    }

    /// Release every key and button, e.g. when the window loses focus.
    pub fn release_all(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.0 = KeyboardState::default();
        inner.1 = inner.1.released();
    }
}

impl InputService for SharedInput {
    fn keyboard(&self) -> KeyboardState {
        self.inner.borrow().0.clone()
    }

    fn mouse(&self) -> MouseState {
        self.inner.borrow().1
    }
}
