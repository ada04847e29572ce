use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;
use vista_assets::ResourceFactories;
use vista_common::Transforms;
use vista_gfx::{GraphicsBackend, GraphicsContext, GraphicsError, MeshData, RenderFrame};
use vista_input::{Keyboard, Mouse};
use vista_kernel::{ComponentError, EngineTime, FrameClock, FrameStats, MonotonicClock, TimeSource};

use crate::camera::ViewerCamera;
use crate::error::{EngineError, EnginePhase};
use crate::hooks::ViewerHooks;
use crate::settings::{CameraSettings, EngineSettings};
use crate::state::{CoreServices, EngineState};

fn hook_failed(hook: &'static str) -> impl FnOnce(ComponentError) -> EngineError {
    move |source| EngineError::Hook { hook, source }
}

/// Orchestrates the viewer lifecycle and the per-frame update/draw cycle.
///
/// `initialize` once, then any number of `load`/`unload` pairs with
/// `engine_loop` called once per frame in between. Every entry point takes
/// `&mut self`, so nothing can mutate the graphics context mid-frame.
pub struct Engine<B: GraphicsBackend, H: ViewerHooks<B>> {
    state: EngineState<B>,
    hooks: H,
    camera: CameraSettings,
}

impl<B: GraphicsBackend, H: ViewerHooks<B>> Engine<B, H> {
    pub fn new(graphics: GraphicsContext<B>, hooks: H, settings: &EngineSettings) -> Self {
        Self::with_time_source(graphics, hooks, settings, MonotonicClock::default())
    }

    /// Build an engine whose frame clock reads `source` instead of the wall clock.
    pub fn with_time_source(
        graphics: GraphicsContext<B>,
        hooks: H,
        settings: &EngineSettings,
        source: impl TimeSource + 'static,
    ) -> Self {
        let clock = FrameClock::with_source(Box::new(source) as Box<dyn TimeSource>);
        Self {
            state: EngineState::new(
                graphics,
                clock,
                FrameStats::new(settings.stats_window),
                settings.clear_color,
            ),
            hooks,
            camera: settings.camera.clone(),
        }
    }

    pub fn state(&self) -> &EngineState<B> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EngineState<B> {
        &mut self.state
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn phase(&self) -> EnginePhase {
        self.state.phase
    }

    fn require(&self, operation: &'static str, allowed: &[EnginePhase]) -> Result<(), EngineError> {
        let phase = self.state.phase;
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(EngineError::InvalidPhase { operation, phase })
        }
    }

    fn fault<T>(&mut self, result: Result<T, EngineError>) -> Result<T, EngineError> {
        if let Err(e) = &result {
            tracing::error!("engine faulted: {e}");
            self.state.phase = EnginePhase::Faulted;
        }
        result
    }

    /// Create the core services, register keyboard, mouse and camera, then
    /// let the hooks register user components.
    ///
    /// If the hook fails everything registered so far is discarded and the
    /// engine is back in `Constructed`, so `initialize` can be called again.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        self.require("initialize", &[EnginePhase::Constructed])?;

        let service = self.hooks.input_service();
        let keyboard = Rc::new(RefCell::new(Keyboard::new(Rc::clone(&service))));
        let mouse = Rc::new(RefCell::new(Mouse::new(service)));
        let aspect = self.state.graphics.viewport_size().aspect_ratio();
        let camera = Rc::new(RefCell::new(ViewerCamera::new(
            Rc::clone(&keyboard),
            Rc::clone(&mouse),
            &self.camera,
            aspect,
        )));

        self.state.core.add(Rc::clone(&keyboard));
        self.state.core.add(Rc::clone(&mouse));
        self.state.core.add(Rc::clone(&camera));
        self.state.services = Some(CoreServices {
            keyboard,
            mouse,
            camera,
            factories: ResourceFactories::new(),
        });
        self.state.phase = EnginePhase::Initialized;

        if let Err(e) = self.hooks.initialize(&mut self.state) {
            let e = hook_failed("initialize")(e);
            tracing::error!("initialization failed, rolling back: {e}");
            self.state.components.clear();
            self.state.core.clear();
            self.state.services = None;
            self.state.phase = EnginePhase::Constructed;
            return Err(e);
        }

        tracing::debug!(
            core = ?self.state.core.names(),
            user = ?self.state.components.names(),
            "engine initialized"
        );
        Ok(())
    }

    /// Load core components, user components, the demo cube and hook content.
    pub fn load(&mut self) -> Result<(), EngineError> {
        self.require(
            "load",
            &[
                EnginePhase::Initialized,
                EnginePhase::Unloaded,
                EnginePhase::Faulted,
                EnginePhase::UnloadFailed,
            ],
        )?;
        if self.state.services.is_none() {
            return Err(EngineError::InvalidPhase {
                operation: "load",
                phase: self.state.phase,
            });
        }

        let result = self.load_all();
        self.fault(result)?;

        self.state.clock.pause();
        self.state.phase = EnginePhase::Loaded;
        tracing::info!("content loaded");
        Ok(())
    }

    fn load_all(&mut self) -> Result<(), EngineError> {
        let state = &mut self.state;
        state.core.load_content(&mut state.graphics)?;
        state.components.load_content(&mut state.graphics)?;
        state.cube = Some(state.graphics.upload_mesh("cube", &MeshData::cube())?);
        self.hooks
            .load_content(&mut self.state)
            .map_err(hook_failed("load_content"))
    }

    /// Tear content down: user components, core components, the cube, every
    /// resource factory (models, materials, effects, textures), then the hook.
    ///
    /// Every step runs even if an earlier one fails; the first error is
    /// returned and the engine is left in `UnloadFailed`.
    pub fn unload(&mut self) -> Result<(), EngineError> {
        self.require(
            "unload",
            &[
                EnginePhase::Loaded,
                EnginePhase::Running,
                EnginePhase::Faulted,
                EnginePhase::UnloadFailed,
            ],
        )?;

        let mut errors: Vec<EngineError> = Vec::new();
        if let Err(e) = self.state.components.unload_content() {
            errors.push(e.into());
        }
        if let Err(e) = self.state.core.unload_content() {
            errors.push(e.into());
        }
        self.release_content();
        if let Err(e) = self.hooks.unload_content(&mut self.state) {
            errors.push(hook_failed("unload_content")(e));
        }

        for e in errors.iter().skip(1) {
            tracing::warn!("further unload failure: {e}");
        }
        match errors.into_iter().next() {
            None => {
                self.state.phase = EnginePhase::Unloaded;
                tracing::info!("content unloaded");
                Ok(())
            }
            Some(first) => {
                tracing::error!("unload failed: {first}");
                self.state.phase = EnginePhase::UnloadFailed;
                Err(first)
            }
        }
    }

    /// Drop the demo cube and empty every resource factory.
    fn release_content(&mut self) {
        self.state.cube = None;
        if let Some(services) = self.state.services.as_mut() {
            let released = services.factories.unload_all();
            tracing::debug!(released, "resource factories emptied");
        }
    }

    /// Advance the frame clock and run one frame with the resulting time.
    ///
    /// Rejected unless content is loaded.
    pub fn engine_loop(&mut self) -> Result<EngineTime, EngineError> {
        self.require("run a frame", &[EnginePhase::Loaded, EnginePhase::Running])?;
        let time = self.state.clock.tick();
        self.state.stats.record(time.delta);
        self.run_frame(time)?;
        Ok(time)
    }

    /// Update then draw then present, all with the same `time`.
    pub fn run_frame(&mut self, time: EngineTime) -> Result<(), EngineError> {
        self.require("run a frame", &[EnginePhase::Loaded, EnginePhase::Running])?;
        self.state.phase = EnginePhase::Running;

        let result = self.update(&time).and_then(|()| self.draw(&time));
        self.fault(result)
    }

    fn update(&mut self, time: &EngineTime) -> Result<(), EngineError> {
        let active = self.hooks.is_active();
        if let Some(services) = &self.state.services {
            services.keyboard.borrow_mut().set_focus(active);
            services.mouse.borrow_mut().set_focus(active);
        }

        self.state.core.update(time)?;
        self.state.components.update(time)?;
        self.hooks
            .update(&mut self.state, time)
            .map_err(hook_failed("update"))
    }

    fn draw(&mut self, time: &EngineTime) -> Result<(), EngineError> {
        let transforms = match &self.state.services {
            Some(services) => {
                let camera = services.camera.borrow();
                Transforms {
                    world: Mat4::IDENTITY,
                    view: camera.view(),
                    projection: camera.projection(),
                }
            }
            None => Transforms::default(),
        };

        let clear = self.state.clear_values();
        let mut frame = match self.state.graphics.begin_frame(&clear) {
            Ok(frame) => frame,
            Err(GraphicsError::SurfaceLost) => {
                tracing::warn!("surface lost, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let state = &mut self.state;
        state.core.draw(time, &transforms, frame.pass())?;
        state.components.draw(time, &transforms, frame.pass())?;
        self.hooks
            .draw(&self.state, time, &transforms, frame.pass())
            .map_err(hook_failed("draw"))?;

        self.state.graphics.present(frame)?;
        tracing::trace!(total = ?time.total, delta = ?time.delta, "frame presented");
        Ok(())
    }

    /// Resize the graphics context and keep the camera aspect in step with
    /// whatever viewport ends up bound, even when the resize fails.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        let result = self.state.graphics.resize(width, height);
        let aspect = self.state.graphics.viewport_size().aspect_ratio();
        if let Some(services) = &self.state.services {
            services.camera.borrow_mut().set_aspect(aspect);
        }
        result.map_err(EngineError::from)
    }
}

impl<B: GraphicsBackend, H: ViewerHooks<B>> Drop for Engine<B, H> {
    fn drop(&mut self) {
        match self.state.phase {
            EnginePhase::Loaded | EnginePhase::Running | EnginePhase::Faulted => {
                if let Err(e) = self.unload() {
                    tracing::error!("unload during shutdown failed: {e}");
                }
            }
            EnginePhase::UnloadFailed => self.release_content(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    use vista_common::{Color, Extent};
    use vista_gfx::headless::{EventLog, GpuEvent, HeadlessPass, ResourceKind};
    use vista_gfx::{ClearValues, GraphicsSettings, HeadlessBackend, HeadlessTarget};
    use vista_input::{InputService, Key, KeyboardState, MouseState, SharedInput};
    use vista_kernel::{Component, LifecyclePhase, ManualClock};

    type Calls = Rc<RefCell<Vec<String>>>;

    fn push(calls: &Calls, entry: impl Into<String>) {
        calls.borrow_mut().push(entry.into());
    }

    /// Input service that logs every poll.
    struct LoggingInput {
        calls: Calls,
        inner: SharedInput,
    }

    impl InputService for LoggingInput {
        fn keyboard(&self) -> KeyboardState {
            push(&self.calls, "poll:keyboard");
            self.inner.keyboard()
        }

        fn mouse(&self) -> MouseState {
            push(&self.calls, "poll:mouse");
            self.inner.mouse()
        }
    }

    struct Probe {
        name: &'static str,
        calls: Calls,
        times: Rc<RefCell<Vec<EngineTime>>>,
        fail_update: bool,
        fail_unload: bool,
    }

    impl Component<HeadlessBackend> for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn load_content(
            &mut self,
            _graphics: &mut GraphicsContext<HeadlessBackend>,
        ) -> Result<(), ComponentError> {
            push(&self.calls, format!("{}:load", self.name));
            Ok(())
        }

        fn unload_content(&mut self) -> Result<(), ComponentError> {
            push(&self.calls, format!("{}:unload", self.name));
            if self.fail_unload {
                return Err(ComponentError::failed("probe refused to unload"));
            }
            Ok(())
        }

        fn update(&mut self, time: &EngineTime) -> Result<(), ComponentError> {
            push(&self.calls, format!("{}:update", self.name));
            self.times.borrow_mut().push(*time);
            if self.fail_update {
                return Err(ComponentError::failed("probe refused to update"));
            }
            Ok(())
        }

        fn draw(
            &mut self,
            time: &EngineTime,
            _transforms: &Transforms,
            pass: &mut HeadlessPass,
        ) -> Result<(), ComponentError> {
            push(&self.calls, format!("{}:draw", self.name));
            self.times.borrow_mut().push(*time);
            pass.record(self.name);
            Ok(())
        }
    }

    /// Wraps a core component and records its update and draw calls.
    struct Recorded<C> {
        inner: C,
        calls: Calls,
        times: Rc<RefCell<Vec<EngineTime>>>,
    }

    impl<C: Component<HeadlessBackend>> Component<HeadlessBackend> for Recorded<C> {
        fn name(&self) -> &'static str {
            self.inner.name()
        }

        fn load_content(
            &mut self,
            graphics: &mut GraphicsContext<HeadlessBackend>,
        ) -> Result<(), ComponentError> {
            self.inner.load_content(graphics)
        }

        fn unload_content(&mut self) -> Result<(), ComponentError> {
            self.inner.unload_content()
        }

        fn update(&mut self, time: &EngineTime) -> Result<(), ComponentError> {
            push(&self.calls, format!("{}:update", self.inner.name()));
            self.times.borrow_mut().push(*time);
            self.inner.update(time)
        }

        fn draw(
            &mut self,
            time: &EngineTime,
            transforms: &Transforms,
            pass: &mut HeadlessPass,
        ) -> Result<(), ComponentError> {
            push(&self.calls, format!("{}:draw", self.inner.name()));
            self.times.borrow_mut().push(*time);
            self.inner.draw(time, transforms, pass)
        }
    }

    struct TestHooks {
        active: Rc<Cell<bool>>,
        input: Rc<LoggingInput>,
        calls: Calls,
        times: Rc<RefCell<Vec<EngineTime>>>,
        failures: Failures,
        resources_seen_on_unload: Rc<Cell<Option<usize>>>,
    }

    impl ViewerHooks<HeadlessBackend> for TestHooks {
        fn is_active(&self) -> bool {
            self.active.get()
        }

        fn input_service(&self) -> Rc<dyn InputService> {
            self.input.clone()
        }

        fn initialize(
            &mut self,
            state: &mut EngineState<HeadlessBackend>,
        ) -> Result<(), ComponentError> {
            for name in ["ComponentA", "ComponentB"] {
                state.components_mut().add(Probe {
                    name,
                    calls: Rc::clone(&self.calls),
                    times: Rc::clone(&self.times),
                    fail_update: self.failures.update == Some(name),
                    fail_unload: self.failures.unload == Some(name),
                });
            }
            push(&self.calls, "hook:initialize");
            if self.failures.initialize {
                return Err(ComponentError::failed("hook refused to initialize"));
            }
            Ok(())
        }

        fn load_content(
            &mut self,
            state: &mut EngineState<HeadlessBackend>,
        ) -> Result<(), ComponentError> {
            let services = state.services_mut().unwrap();
            services.factories.models.insert("cube", ());
            services.factories.textures.insert("grid", ());
            push(&self.calls, "hook:load");
            Ok(())
        }

        fn unload_content(
            &mut self,
            state: &mut EngineState<HeadlessBackend>,
        ) -> Result<(), ComponentError> {
            let total = state.services().unwrap().factories.total();
            self.resources_seen_on_unload.set(Some(total));
            push(&self.calls, "hook:unload");
            Ok(())
        }

        fn update(
            &mut self,
            _state: &mut EngineState<HeadlessBackend>,
            _time: &EngineTime,
        ) -> Result<(), ComponentError> {
            push(&self.calls, "hook:update");
            Ok(())
        }

        fn draw(
            &mut self,
            _state: &EngineState<HeadlessBackend>,
            _time: &EngineTime,
            _transforms: &Transforms,
            pass: &mut HeadlessPass,
        ) -> Result<(), ComponentError> {
            push(&self.calls, "hook:draw");
            pass.record("hook");
            Ok(())
        }
    }

    /// Which parts of the test viewer refuse to cooperate.
    #[derive(Default)]
    struct Failures {
        update: Option<&'static str>,
        unload: Option<&'static str>,
        initialize: bool,
    }

    struct Fixture {
        engine: Engine<HeadlessBackend, TestHooks>,
        log: EventLog,
        clock: ManualClock,
        calls: Calls,
        times: Rc<RefCell<Vec<EngineTime>>>,
        input: SharedInput,
        active: Rc<Cell<bool>>,
        unload_seen: Rc<Cell<Option<usize>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_failures(Failures::default())
        }

        fn with_failures(failures: Failures) -> Self {
            let log = EventLog::default();
            let graphics = GraphicsContext::create(
                HeadlessTarget::new(log.clone()),
                800,
                600,
                &GraphicsSettings::default(),
            )
            .unwrap();
            let calls = Calls::default();
            let times = Rc::new(RefCell::new(Vec::new()));
            let input = SharedInput::new();
            let active = Rc::new(Cell::new(true));
            let unload_seen = Rc::new(Cell::new(None));
            let hooks = TestHooks {
                active: Rc::clone(&active),
                input: Rc::new(LoggingInput {
                    calls: Rc::clone(&calls),
                    inner: input.clone(),
                }),
                calls: Rc::clone(&calls),
                times: Rc::clone(&times),
                failures,
                resources_seen_on_unload: Rc::clone(&unload_seen),
            };
            let clock = ManualClock::new();
            let engine = Engine::with_time_source(
                graphics,
                hooks,
                &EngineSettings::default(),
                clock.clone(),
            );
            Self {
                engine,
                log,
                clock,
                calls,
                times,
                input,
                active,
                unload_seen,
            }
        }

        fn loaded() -> Self {
            let mut fixture = Self::new();
            fixture.engine.initialize().unwrap();
            fixture.engine.load().unwrap();
            fixture.calls.borrow_mut().clear();
            fixture
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn live_resources(&self) -> usize {
            self.engine.state().graphics().backend().live_resources()
        }
    }

    #[test]
    fn engine_loop_before_load_is_rejected() {
        let mut f = Fixture::new();
        assert!(matches!(
            f.engine.engine_loop(),
            Err(EngineError::InvalidPhase {
                phase: EnginePhase::Constructed,
                ..
            })
        ));

        f.engine.initialize().unwrap();
        assert!(matches!(
            f.engine.engine_loop(),
            Err(EngineError::InvalidPhase {
                phase: EnginePhase::Initialized,
                ..
            })
        ));

        assert_eq!(f.engine.state().frame_count(), 0);
        assert_eq!(f.log.count(|e| matches!(e, GpuEvent::FrameBegun { .. })), 0);
        assert_eq!(f.engine.phase(), EnginePhase::Initialized);
    }

    #[test]
    fn initialize_registers_core_then_user_components() {
        let mut f = Fixture::new();
        f.engine.initialize().unwrap();
        let state = f.engine.state();
        assert_eq!(state.core().names(), ["Keyboard", "Mouse", "Camera"]);
        assert_eq!(state.components().names(), ["ComponentA", "ComponentB"]);
        assert!(state.services().is_some());
        assert_eq!(f.calls(), ["hook:initialize"]);

        assert!(matches!(
            f.engine.initialize(),
            Err(EngineError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn load_runs_core_then_user_then_hook() {
        let mut f = Fixture::new();
        f.engine.initialize().unwrap();
        f.calls.borrow_mut().clear();
        f.engine.load().unwrap();

        assert_eq!(f.calls(), ["ComponentA:load", "ComponentB:load", "hook:load"]);
        assert!(f.engine.state().cube().is_some());
        assert_eq!(f.engine.phase(), EnginePhase::Loaded);
    }

    #[test]
    fn frame_updates_then_draws_in_registration_order() {
        let mut f = Fixture::loaded();
        let time = f.engine.engine_loop().unwrap();

        assert_eq!(
            f.calls(),
            [
                "poll:keyboard",
                "poll:mouse",
                "ComponentA:update",
                "ComponentB:update",
                "hook:update",
                "ComponentA:draw",
                "ComponentB:draw",
                "hook:draw",
            ]
        );
        assert!(f.times.borrow().iter().all(|t| *t == time));
        assert_eq!(f.times.borrow().len(), 4);
        assert_eq!(f.engine.phase(), EnginePhase::Running);
    }

    #[test]
    fn frame_clears_draws_and_presents_immediately() {
        let mut f = Fixture::loaded();
        f.log.clear();
        f.engine.engine_loop().unwrap();

        let events = f.log.events();
        let expected_clear = ClearValues {
            color: Color::CORNFLOWER_BLUE,
            depth: 1.0,
            stencil: 0,
        };
        assert_eq!(
            events,
            [
                GpuEvent::FrameBegun {
                    clear: expected_clear
                },
                GpuEvent::Draw("ComponentA".into()),
                GpuEvent::Draw("ComponentB".into()),
                GpuEvent::Draw("hook".into()),
                GpuEvent::Presented { sync_interval: 0 },
            ]
        );
        assert_eq!(f.engine.state().graphics().backend().frames_presented(), 1);
    }

    #[test]
    fn frame_times_follow_the_clock() {
        let mut f = Fixture::loaded();
        let first = f.engine.engine_loop().unwrap();
        assert_eq!(first.delta, Duration::ZERO);

        let mut sum = Duration::ZERO;
        for ms in [16, 17, 33] {
            f.clock.advance(Duration::from_millis(ms));
            let t = f.engine.engine_loop().unwrap();
            assert_eq!(t.delta, Duration::from_millis(ms));
            sum += t.delta;
            assert_eq!(t.total, sum);
        }
        let stats = f.engine.state().stats();
        assert_eq!(stats.count(), 4);
        assert_eq!(stats.max(), Duration::from_millis(33));
    }

    #[test]
    fn load_unload_cycles_leave_nothing_behind() {
        let mut f = Fixture::new();
        f.engine.initialize().unwrap();
        let targets_only = f.live_resources();
        assert_eq!(targets_only, 4);

        for _ in 0..2 {
            f.calls.borrow_mut().clear();
            f.engine.load().unwrap();
            f.engine.engine_loop().unwrap();
            let factories = &f.engine.state().services().unwrap().factories;
            assert_eq!(factories.total(), 2);
            assert_eq!(f.live_resources(), targets_only + 1);

            f.calls.borrow_mut().clear();
            f.engine.unload().unwrap();
            assert_eq!(
                f.calls(),
                ["ComponentA:unload", "ComponentB:unload", "hook:unload"]
            );
            assert_eq!(f.unload_seen.get(), Some(0));
            assert_eq!(f.engine.state().services().unwrap().factories.total(), 0);
            assert!(f.engine.state().cube().is_none());
            assert_eq!(f.live_resources(), targets_only);
            assert_eq!(f.engine.phase(), EnginePhase::Unloaded);
        }

        assert!(matches!(
            f.engine.engine_loop(),
            Err(EngineError::InvalidPhase {
                phase: EnginePhase::Unloaded,
                ..
            })
        ));
    }

    #[test]
    fn resize_updates_viewport_and_camera_aspect() {
        let mut f = Fixture::loaded();
        f.engine.resize(1920, 1080).unwrap();

        let state = f.engine.state();
        assert_eq!(state.graphics().viewport_size(), Extent::new(1920, 1080));
        let aspect = state.services().unwrap().camera.borrow().aspect;
        assert!((aspect - 1920.0 / 1080.0).abs() < 1e-6);

        assert!(f.engine.resize(0, 1080).is_err());
        assert_eq!(
            f.engine.state().graphics().viewport_size(),
            Extent::new(1920, 1080)
        );
        f.engine.engine_loop().unwrap();
    }

    #[test]
    fn failing_component_faults_the_engine() {
        let mut f = Fixture::with_failures(Failures {
            update: Some("ComponentB"),
            ..Failures::default()
        });
        f.engine.initialize().unwrap();
        f.engine.load().unwrap();
        f.calls.borrow_mut().clear();

        let err = f.engine.engine_loop().unwrap_err();
        match err {
            EngineError::Lifecycle(e) => {
                assert_eq!(e.phase, LifecyclePhase::Update);
                assert_eq!(e.component, "ComponentB");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.engine.phase(), EnginePhase::Faulted);
        assert!(!f.calls().iter().any(|c| c.ends_with(":draw")));
        assert_eq!(f.log.count(|e| matches!(e, GpuEvent::Presented { .. })), 0);

        assert!(matches!(
            f.engine.engine_loop(),
            Err(EngineError::InvalidPhase {
                phase: EnginePhase::Faulted,
                ..
            })
        ));
        f.engine.unload().unwrap();
        assert_eq!(f.engine.phase(), EnginePhase::Unloaded);
    }

    #[test]
    fn inactive_viewer_does_not_poll_input() {
        let mut f = Fixture::loaded();
        f.input.key_down(Key::W);
        f.active.set(false);
        f.engine.engine_loop().unwrap();

        assert!(!f.calls().iter().any(|c| c.starts_with("poll:")));
        let keyboard = &f.engine.state().services().unwrap().keyboard;
        assert!(!keyboard.borrow().is_down(Key::W));

        f.active.set(true);
        f.engine.engine_loop().unwrap();
        let keyboard = &f.engine.state().services().unwrap().keyboard;
        assert!(keyboard.borrow().is_down(Key::W));
    }

    #[test]
    fn dropping_a_loaded_engine_unloads_before_releasing_the_device() {
        let f = Fixture::loaded();
        let Fixture {
            engine, log, calls, ..
        } = f;
        drop(engine);

        assert!(calls.borrow().iter().any(|c| c == "hook:unload"));
        let events = log.events();
        let mesh_disposed = events
            .iter()
            .position(|e| {
                matches!(
                    e,
                    GpuEvent::Disposed {
                        kind: ResourceKind::Mesh,
                        ..
                    }
                )
            })
            .unwrap();
        let device_released = events
            .iter()
            .position(|e| *e == GpuEvent::DeviceReleased)
            .unwrap();
        assert!(mesh_disposed < device_released);
    }

    #[test]
    fn core_and_user_components_share_one_frame_order_and_time() {
        let mut f = Fixture::new();
        f.engine.initialize().unwrap();
        {
            let state = f.engine.state_mut();
            let services = state.services().unwrap();
            let keyboard = Rc::clone(&services.keyboard);
            let mouse = Rc::clone(&services.mouse);
            let camera = Rc::clone(&services.camera);
            state.core.clear();
            state.core.add(Recorded {
                inner: keyboard,
                calls: Rc::clone(&f.calls),
                times: Rc::clone(&f.times),
            });
            state.core.add(Recorded {
                inner: mouse,
                calls: Rc::clone(&f.calls),
                times: Rc::clone(&f.times),
            });
            state.core.add(Recorded {
                inner: camera,
                calls: Rc::clone(&f.calls),
                times: Rc::clone(&f.times),
            });
        }
        f.engine.load().unwrap();
        f.calls.borrow_mut().clear();
        f.times.borrow_mut().clear();

        f.clock.advance(Duration::from_millis(16));
        let time = f.engine.engine_loop().unwrap();

        let calls = f.calls();
        let components: Vec<&str> = calls
            .iter()
            .map(String::as_str)
            .filter(|c| !c.starts_with("poll:") && !c.starts_with("hook:"))
            .collect();
        assert_eq!(
            components,
            [
                "Keyboard:update",
                "Mouse:update",
                "Camera:update",
                "ComponentA:update",
                "ComponentB:update",
                "Keyboard:draw",
                "Mouse:draw",
                "Camera:draw",
                "ComponentA:draw",
                "ComponentB:draw",
            ]
        );
        let times = f.times.borrow();
        assert_eq!(times.len(), 10);
        assert!(times.iter().all(|t| *t == time));
    }

    #[test]
    fn resize_survives_a_failed_target_rebuild() {
        let mut f = Fixture::loaded();
        f.engine.engine_loop().unwrap();
        f.engine
            .state_mut()
            .graphics_mut()
            .backend_mut()
            .fail_next_target();

        f.engine.resize(1024, 768).unwrap();
        let graphics = f.engine.state().graphics();
        assert!(graphics.targets().is_some());
        assert_eq!(graphics.viewport_size(), Extent::new(1024, 768));
        assert_eq!(graphics.surface_mode().extent, Extent::new(1024, 768));

        f.engine.engine_loop().unwrap();
        assert_eq!(f.engine.phase(), EnginePhase::Running);
    }

    #[test]
    fn failed_unload_is_not_repeated_on_drop() {
        let mut f = Fixture::with_failures(Failures {
            unload: Some("ComponentA"),
            ..Failures::default()
        });
        f.engine.initialize().unwrap();
        f.engine.load().unwrap();
        f.calls.borrow_mut().clear();

        let err = f.engine.unload().unwrap_err();
        match err {
            EngineError::Lifecycle(e) => {
                assert_eq!(e.phase, LifecyclePhase::Unload);
                assert_eq!(e.component, "ComponentA");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.engine.phase(), EnginePhase::UnloadFailed);
        assert_eq!(f.calls(), ["ComponentA:unload", "hook:unload"]);
        assert!(f.engine.state().cube().is_none());
        assert_eq!(f.engine.state().services().unwrap().factories.total(), 0);

        let Fixture {
            engine, log, calls, ..
        } = f;
        drop(engine);

        let unloads = calls
            .borrow()
            .iter()
            .filter(|c| c.ends_with(":unload"))
            .count();
        assert_eq!(unloads, 2);
        assert!(log.events().contains(&GpuEvent::DeviceReleased));
    }

    #[test]
    fn failed_unload_can_be_followed_by_a_fresh_load() {
        let mut f = Fixture::with_failures(Failures {
            unload: Some("ComponentB"),
            ..Failures::default()
        });
        f.engine.initialize().unwrap();
        f.engine.load().unwrap();
        assert!(f.engine.unload().is_err());
        assert!(matches!(
            f.engine.engine_loop(),
            Err(EngineError::InvalidPhase {
                phase: EnginePhase::UnloadFailed,
                ..
            })
        ));

        f.engine.load().unwrap();
        assert!(f.engine.state().cube().is_some());
        f.engine.engine_loop().unwrap();
    }

    #[test]
    fn failed_initialize_rolls_back_registration() {
        let mut f = Fixture::with_failures(Failures {
            initialize: true,
            ..Failures::default()
        });

        let err = f.engine.initialize().unwrap_err();
        assert!(matches!(
            err,
            EngineError::Hook {
                hook: "initialize",
                ..
            }
        ));
        let state = f.engine.state();
        assert_eq!(state.phase(), EnginePhase::Constructed);
        assert!(state.core().is_empty());
        assert!(state.components().is_empty());
        assert!(state.services().is_none());
        assert!(matches!(
            f.engine.load(),
            Err(EngineError::InvalidPhase {
                phase: EnginePhase::Constructed,
                ..
            })
        ));

        let Fixture { engine, calls, .. } = f;
        drop(engine);
        assert!(!calls.borrow().iter().any(|c| c.ends_with(":unload")));
    }
}
