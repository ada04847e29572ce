use std::cell::RefCell;
use std::rc::Rc;

use vista_assets::ResourceFactories;
use vista_common::Color;
use vista_gfx::{ClearValues, GraphicsBackend, GraphicsContext};
use vista_input::{Keyboard, Mouse};
use vista_kernel::{ComponentContainer, FrameClock, FrameStats, TimeSource};

use crate::camera::ViewerCamera;
use crate::error::EnginePhase;

/// Services created by [`Engine::initialize`](crate::Engine::initialize).
///
/// The devices and the camera are also registered in the core container;
/// these handles let hooks read them between frames.
pub struct CoreServices {
    pub keyboard: Rc<RefCell<Keyboard>>,
    pub mouse: Rc<RefCell<Mouse>>,
    pub camera: Rc<RefCell<ViewerCamera>>,
    pub factories: ResourceFactories,
}

/// All state the engine owns. Field order is drop order: everything that can
/// hold GPU resources goes before the graphics context.
pub struct EngineState<B: GraphicsBackend> {
    pub(crate) components: ComponentContainer<B>,
    pub(crate) core: ComponentContainer<B>,
    pub(crate) services: Option<CoreServices>,
    pub(crate) cube: Option<B::Mesh>,
    pub(crate) clock: FrameClock<Box<dyn TimeSource>>,
    pub(crate) stats: FrameStats,
    pub(crate) clear_color: Color,
    pub(crate) phase: EnginePhase,
    pub(crate) graphics: GraphicsContext<B>,
}

impl<B: GraphicsBackend> EngineState<B> {
    pub(crate) fn new(
        graphics: GraphicsContext<B>,
        clock: FrameClock<Box<dyn TimeSource>>,
        stats: FrameStats,
        clear_color: Color,
    ) -> Self {
        Self {
            components: ComponentContainer::new(),
            core: ComponentContainer::new(),
            services: None,
            cube: None,
            clock,
            stats,
            clear_color,
            phase: EnginePhase::Constructed,
            graphics,
        }
    }

    pub fn graphics(&self) -> &GraphicsContext<B> {
        &self.graphics
    }

    pub fn graphics_mut(&mut self) -> &mut GraphicsContext<B> {
        &mut self.graphics
    }

    /// User components, run after the core ones.
    pub fn components(&self) -> &ComponentContainer<B> {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentContainer<B> {
        &mut self.components
    }

    /// Keyboard, mouse and camera, in that order.
    pub fn core(&self) -> &ComponentContainer<B> {
        &self.core
    }

    pub fn services(&self) -> Option<&CoreServices> {
        self.services.as_ref()
    }

    pub fn services_mut(&mut self) -> Option<&mut CoreServices> {
        self.services.as_mut()
    }

    /// Demo cube uploaded on load.
    pub fn cube(&self) -> Option<&B::Mesh> {
        self.cube.as_ref()
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn frame_count(&self) -> u64 {
        self.clock.frame_count()
    }

    pub fn clear_values(&self) -> ClearValues {
        ClearValues {
            color: self.clear_color,
            depth: 1.0,
            stencil: 0,
        }
    }
}
