use glam::Mat4;
use serde::{Deserialize, Serialize};

/// Width and height of a GPU image or window client area, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (e.g. a minimized window).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height, or 1.0 for an empty extent.
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Rasterizer viewport rectangle with its depth range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering the whole extent, anchored at the origin.
    pub fn covering(extent: Extent) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width as u32, self.height as u32)
    }
}

/// Linear RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const CORNFLOWER_BLUE: Self = Self::rgba(100.0 / 255.0, 149.0 / 255.0, 237.0 / 255.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// The world/view/projection triple handed to every component in a frame.
///
/// Components receive it by shared reference, so no sibling can observe
/// another sibling's changes within the same draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transforms {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Transforms {
    pub fn world_view_projection(&self) -> Mat4 {
        self.projection * self.view * self.world
    }
}

impl Default for Transforms {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn extent_aspect_ratio() {
        assert_eq!(Extent::new(1920, 1080).aspect_ratio(), 1920.0 / 1080.0);
        assert_eq!(Extent::new(0, 600).aspect_ratio(), 1.0);
        assert!(Extent::new(800, 0).is_empty());
    }

    #[test]
    fn viewport_covers_extent() {
        let vp = Viewport::covering(Extent::new(800, 600));
        assert_eq!(vp.x, 0.0);
        assert_eq!(vp.y, 0.0);
        assert_eq!(vp.extent(), Extent::new(800, 600));
        assert_eq!(vp.max_depth, 1.0);
    }

    #[test]
    fn world_view_projection_applies_world_first() {
        let t = Transforms {
            world: Mat4::from_translation(Vec3::X),
            view: Mat4::from_scale(Vec3::splat(2.0)),
            projection: Mat4::IDENTITY,
        };
        let p = t.world_view_projection().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(2.0, 0.0, 0.0));
    }
}
