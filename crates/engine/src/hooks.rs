use std::rc::Rc;

use vista_common::Transforms;
use vista_gfx::GraphicsBackend;
use vista_input::InputService;
use vista_kernel::{ComponentError, EngineTime};

use crate::state::EngineState;

/// What a concrete viewer plugs into the [`Engine`](crate::Engine).
///
/// The engine always runs its own fan-out for a phase first and calls the
/// matching hook afterwards. Only [`is_active`](Self::is_active) and
/// [`input_service`](Self::input_service) are required.
pub trait ViewerHooks<B: GraphicsBackend> {
    /// Whether the viewer currently has focus. Input devices poll only while active.
    fn is_active(&self) -> bool;

    /// Raw device source handed to the core keyboard and mouse at initialization.
    fn input_service(&self) -> Rc<dyn InputService>;

    /// Register user components into [`EngineState::components_mut`].
    fn initialize(&mut self, _state: &mut EngineState<B>) -> Result<(), ComponentError> {
        Ok(())
    }

    fn load_content(&mut self, _state: &mut EngineState<B>) -> Result<(), ComponentError> {
        Ok(())
    }

    fn unload_content(&mut self, _state: &mut EngineState<B>) -> Result<(), ComponentError> {
        Ok(())
    }

    fn update(
        &mut self,
        _state: &mut EngineState<B>,
        _time: &EngineTime,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    fn draw(
        &mut self,
        _state: &EngineState<B>,
        _time: &EngineTime,
        _transforms: &Transforms,
        _pass: &mut B::Pass,
    ) -> Result<(), ComponentError> {
        Ok(())
    }
}
