use std::cell::RefCell;
use std::rc::Rc;

use vista_common::Transforms;
use vista_gfx::{GraphicsBackend, GraphicsContext, GraphicsError};

use crate::time::EngineTime;

/// Failure reported by a single component.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
}

impl ComponentError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A unit of per-frame behaviour registered into a
/// [`ComponentContainer`](crate::ComponentContainer).
///
/// Lifecycle: registered, loaded once, updated and drawn many times,
/// unloaded once, dropped. Every method defaults to doing nothing, so
/// update-only and draw-only components implement just what they need.
pub trait Component<B: GraphicsBackend> {
    /// Short name used in logs and lifecycle errors.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    fn load_content(&mut self, _graphics: &mut GraphicsContext<B>) -> Result<(), ComponentError> {
        Ok(())
    }

    fn unload_content(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }

    fn update(&mut self, _time: &EngineTime) -> Result<(), ComponentError> {
        Ok(())
    }

    fn draw(
        &mut self,
        _time: &EngineTime,
        _transforms: &Transforms,
        _pass: &mut B::Pass,
    ) -> Result<(), ComponentError> {
        Ok(())
    }
}

/// Shared handles can be registered while the owner keeps reading them.
impl<B, T> Component<B> for Rc<RefCell<T>>
where
    B: GraphicsBackend,
    T: Component<B>,
{
    fn name(&self) -> &'static str {
        self.borrow().name()
    }

    fn load_content(&mut self, graphics: &mut GraphicsContext<B>) -> Result<(), ComponentError> {
        self.borrow_mut().load_content(graphics)
    }

    fn unload_content(&mut self) -> Result<(), ComponentError> {
        self.borrow_mut().unload_content()
    }

    fn update(&mut self, time: &EngineTime) -> Result<(), ComponentError> {
        self.borrow_mut().update(time)
    }

    fn draw(
        &mut self,
        time: &EngineTime,
        transforms: &Transforms,
        pass: &mut B::Pass,
    ) -> Result<(), ComponentError> {
        self.borrow_mut().draw(time, transforms, pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_gfx::HeadlessBackend;

    struct Idle;
    impl Component<HeadlessBackend> for Idle {}

    struct Spinner<T>(T);
    impl<T> Component<HeadlessBackend> for Spinner<T> {}

    #[test]
    fn default_name_is_the_bare_type_name() {
        assert_eq!(Component::<HeadlessBackend>::name(&Idle), "Idle");
        assert_eq!(Component::<HeadlessBackend>::name(&Spinner(1u8)), "Spinner");
    }

    #[test]
    fn shared_handle_delegates_to_inner() {
        let shared = Rc::new(RefCell::new(Idle));
        assert_eq!(Component::<HeadlessBackend>::name(&shared), "Idle");
        let mut handle = Rc::clone(&shared);
        assert!(Component::<HeadlessBackend>::update(&mut handle, &EngineTime::default()).is_ok());
    }

    #[test]
    fn graphics_errors_convert() {
        let err: ComponentError = GraphicsError::TargetsUnavailable.into();
        assert!(matches!(err, ComponentError::Graphics(_)));
        assert_eq!(ComponentError::failed("boom").to_string(), "boom");
    }
}
