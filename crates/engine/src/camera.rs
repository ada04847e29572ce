use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use vista_gfx::GraphicsBackend;
use vista_input::{Key, Keyboard, Mouse, MouseButton};
use vista_kernel::{Component, ComponentError, EngineTime};

use crate::settings::CameraSettings;

/// Fly camera driven by the core keyboard and mouse.
///
/// WASD moves in the view plane, Space and Control move vertically, Shift
/// boosts speed. Dragging with the right button held looks around.
pub struct ViewerCamera {
    keyboard: Rc<RefCell<Keyboard>>,
    mouse: Rc<RefCell<Mouse>>,
    pub position: Vec3,
    /// Radians.
    pub yaw: f32,
    /// Radians, clamped to ±89°.
    pub pitch: f32,
    /// Vertical field of view, radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub boost: f32,
    pub sensitivity: f32,
}

impl ViewerCamera {
    pub fn new(
        keyboard: Rc<RefCell<Keyboard>>,
        mouse: Rc<RefCell<Mouse>>,
        settings: &CameraSettings,
        aspect: f32,
    ) -> Self {
        let mut camera = Self {
            keyboard,
            mouse,
            position: settings.position,
            yaw: settings.yaw.to_radians(),
            pitch: 0.0,
            fov: settings.fov.to_radians(),
            aspect,
            near: settings.near,
            far: settings.far,
            speed: settings.speed,
            boost: settings.boost,
            sensitivity: settings.sensitivity,
        };
        camera.set_pitch(settings.pitch.to_radians());
        camera
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    fn set_pitch(&mut self, pitch: f32) {
        let limit = 89.0_f32.to_radians();
        self.pitch = pitch.clamp(-limit, limit);
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.set_pitch(self.pitch - dy * self.sensitivity);
    }

    /// Aspect ratio of the viewport; ignored when not a positive finite number.
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    fn steer(&mut self, dt: f32) {
        let keyboard = self.keyboard.borrow();
        let mut direction = Vec3::ZERO;
        let forward = self.forward();
        let right = self.right();
        if keyboard.is_down(Key::W) {
            direction += forward;
        }
        if keyboard.is_down(Key::S) {
            direction -= forward;
        }
        if keyboard.is_down(Key::D) {
            direction += right;
        }
        if keyboard.is_down(Key::A) {
            direction -= right;
        }
        if keyboard.is_down(Key::Space) {
            direction += Vec3::Y;
        }
        if keyboard.is_down(Key::Control) {
            direction -= Vec3::Y;
        }
        let speed = if keyboard.is_down(Key::Shift) {
            self.speed * self.boost
        } else {
            self.speed
        };
        drop(keyboard);

        self.position += direction.normalize_or_zero() * speed * dt;

        let look = {
            let mouse = self.mouse.borrow();
            mouse.is_down(MouseButton::Right).then(|| mouse.delta())
        };
        if let Some(delta) = look {
            self.rotate(delta.x, delta.y);
        }
    }
}

impl<B: GraphicsBackend> Component<B> for ViewerCamera {
    fn name(&self) -> &'static str {
        "Camera"
    }

    fn update(&mut self, time: &EngineTime) -> Result<(), ComponentError> {
        self.steer(time.delta_secs());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use std::time::Duration;
    use vista_gfx::HeadlessBackend;
    use vista_input::SharedInput;

    struct Rig {
        input: SharedInput,
        keyboard: Rc<RefCell<Keyboard>>,
        mouse: Rc<RefCell<Mouse>>,
        camera: ViewerCamera,
    }

    impl Rig {
        fn new() -> Self {
            let input = SharedInput::new();
            let service: Rc<dyn vista_input::InputService> = Rc::new(input.clone());
            let keyboard = Rc::new(RefCell::new(Keyboard::new(Rc::clone(&service))));
            let mouse = Rc::new(RefCell::new(Mouse::new(service)));
            let camera = ViewerCamera::new(
                Rc::clone(&keyboard),
                Rc::clone(&mouse),
                &CameraSettings::default(),
                16.0 / 9.0,
            );
            Self {
                input,
                keyboard,
                mouse,
                camera,
            }
        }

        fn step(&mut self, secs: f32) {
            self.keyboard.borrow_mut().poll();
            self.mouse.borrow_mut().poll();
            let time = EngineTime::new(Duration::ZERO, Duration::from_secs_f32(secs));
            Component::<HeadlessBackend>::update(&mut self.camera, &time).unwrap();
        }
    }

    #[test]
    fn default_camera_looks_at_origin_area() {
        let rig = Rig::new();
        let vp = rig.camera.view_projection();
        assert!(!vp.col(0).x.is_nan());
        let clip = vp * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1.0 && ndc.y.abs() < 1.0);
        assert!((0.0..1.0).contains(&ndc.z));
    }

    #[test]
    fn w_moves_forward_and_shift_boosts() {
        let mut rig = Rig::new();
        let start = rig.camera.position;
        let forward = rig.camera.forward();

        rig.input.key_down(Key::W);
        rig.step(1.0);
        let walked = rig.camera.position - start;
        assert!((walked - forward * 3.0).length() < 1e-4);

        rig.input.key_down(Key::Shift);
        let before = rig.camera.position;
        rig.step(1.0);
        assert!(((rig.camera.position - before).length() - 9.0).abs() < 1e-4);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut rig = Rig::new();
        let start = rig.camera.position;
        rig.input.key_down(Key::A);
        rig.input.key_down(Key::D);
        rig.step(0.5);
        assert_eq!(rig.camera.position, start);
    }

    #[test]
    fn right_drag_rotates_and_pitch_is_clamped() {
        let mut rig = Rig::new();
        rig.step(0.016);
        let yaw = rig.camera.yaw;

        rig.input.cursor_moved(Vec2::new(100.0, 0.0));
        rig.step(0.016);
        assert_eq!(rig.camera.yaw, yaw, "look requires the right button");

        rig.input.button(MouseButton::Right, true);
        rig.input.cursor_moved(Vec2::new(200.0, 0.0));
        rig.step(0.016);
        assert!((rig.camera.yaw - (yaw + 100.0 * 0.003)).abs() < 1e-5);

        rig.input.cursor_moved(Vec2::new(200.0, -100_000.0));
        rig.step(0.016);
        assert!(rig.camera.pitch <= 89.0_f32.to_radians() + 1e-6);
    }

    #[test]
    fn aspect_ignores_degenerate_values() {
        let mut rig = Rig::new();
        rig.camera.set_aspect(2.0);
        assert_eq!(rig.camera.aspect, 2.0);
        rig.camera.set_aspect(0.0);
        rig.camera.set_aspect(f32::NAN);
        assert_eq!(rig.camera.aspect, 2.0);
    }
}
