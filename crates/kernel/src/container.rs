use std::fmt;

use vista_common::Transforms;
use vista_gfx::{GraphicsBackend, GraphicsContext};

use crate::component::{Component, ComponentError};
use crate::time::EngineTime;

/// Which fan-out a lifecycle error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Load,
    Unload,
    Update,
    Draw,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Unload => "unload",
            Self::Update => "update",
            Self::Draw => "draw",
        })
    }
}

/// First member failure of a container fan-out. Members after `index` were not invoked.
#[derive(Debug, thiserror::Error)]
#[error("{phase} failed in component #{index} ({component}): {source}")]
pub struct LifecycleError {
    pub phase: LifecyclePhase,
    pub index: usize,
    pub component: &'static str,
    #[source]
    pub source: ComponentError,
}

/// Ordered list of components. Registration order is invocation order.
pub struct ComponentContainer<B: GraphicsBackend> {
    components: Vec<Box<dyn Component<B>>>,
}

impl<B: GraphicsBackend> Default for ComponentContainer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GraphicsBackend> fmt::Debug for ComponentContainer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<B: GraphicsBackend> ComponentContainer<B> {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Append a component. Duplicates are not detected.
    pub fn add<C>(&mut self, component: C)
    where
        C: Component<B> + 'static,
    {
        self.components.push(Box::new(component));
    }

    pub fn add_boxed(&mut self, component: Box<dyn Component<B>>) {
        self.components.push(component);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    /// Drop every member. Does not unload them.
    pub fn clear(&mut self) {
        self.components.clear();
    }

    pub fn load_content(&mut self, graphics: &mut GraphicsContext<B>) -> Result<(), LifecycleError> {
        tracing::debug!(count = self.len(), "loading components");
        self.for_each(LifecyclePhase::Load, |c| c.load_content(graphics))
    }

    pub fn unload_content(&mut self) -> Result<(), LifecycleError> {
        tracing::debug!(count = self.len(), "unloading components");
        self.for_each(LifecyclePhase::Unload, |c| c.unload_content())
    }

    pub fn update(&mut self, time: &EngineTime) -> Result<(), LifecycleError> {
        self.for_each(LifecyclePhase::Update, |c| c.update(time))
    }

    pub fn draw(
        &mut self,
        time: &EngineTime,
        transforms: &Transforms,
        pass: &mut B::Pass,
    ) -> Result<(), LifecycleError> {
        self.for_each(LifecyclePhase::Draw, |c| c.draw(time, transforms, pass))
    }

    fn for_each<F>(&mut self, phase: LifecyclePhase, mut f: F) -> Result<(), LifecycleError>
    where
        F: FnMut(&mut (dyn Component<B> + 'static)) -> Result<(), ComponentError>,
    {
        for (index, component) in self.components.iter_mut().enumerate() {
            if let Err(source) = f(component.as_mut()) {
                let name = component.name();
                tracing::warn!("{phase} failed in {name} (#{index}): {source}");
                return Err(LifecycleError {
                    phase,
                    index,
                    component: name,
                    source,
                });
            }
        }
        Ok(())
    }
}
