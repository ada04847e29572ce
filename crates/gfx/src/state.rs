//! Fixed-function render state: rasterizer, blend and depth-stencil.
//!
//! Built once when the graphics context is created and never mutated. The
//! values are backend-neutral; backends translate them into their own
//! pipeline descriptions.

use crate::backend::DepthFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendComponent {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub enabled: bool,
    pub color: BlendComponent,
    pub alpha: BlendComponent,
    pub write_all_channels: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Winding order that marks a triangle as front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizerState {
    pub cull: CullMode,
    pub front_face: FrontFace,
    pub fill: FillMode,
    pub multisample: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    LessEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    pub format: DepthFormat,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareFunction,
    pub stencil_test: bool,
}

/// The complete fixed state shared by every pipeline the viewer builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRenderState {
    pub rasterizer: RasterizerState,
    pub blend: BlendState,
    pub depth_stencil: DepthStencilState,
    pub sample_count: u32,
}

impl FixedRenderState {
    /// Alpha blending on colour, alpha channel zeroed, front faces culled.
    ///
    /// Front faces are clockwise, so counter-clockwise geometry (the usual
    /// outward winding) is what survives culling.
    pub fn viewer(sample_count: u32) -> Self {
        Self {
            rasterizer: RasterizerState {
                cull: CullMode::Front,
                front_face: FrontFace::Clockwise,
                fill: FillMode::Solid,
                multisample: true,
            },
            blend: BlendState {
                enabled: true,
                color: BlendComponent {
                    src: BlendFactor::SrcAlpha,
                    dst: BlendFactor::OneMinusSrcAlpha,
                    op: BlendOp::Add,
                },
                alpha: BlendComponent {
                    src: BlendFactor::Zero,
                    dst: BlendFactor::Zero,
                    op: BlendOp::Add,
                },
                write_all_channels: true,
            },
            depth_stencil: DepthStencilState {
                format: DepthFormat::Depth24Stencil8,
                depth_test: true,
                depth_write: true,
                depth_compare: CompareFunction::Less,
                stencil_test: false,
            },
            sample_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_state_blends_source_alpha() {
        let state = FixedRenderState::viewer(4);
        assert!(state.blend.enabled);
        assert_eq!(state.blend.color.src, BlendFactor::SrcAlpha);
        assert_eq!(state.blend.color.dst, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(state.blend.color.op, BlendOp::Add);
        assert_eq!(state.blend.alpha.src, BlendFactor::Zero);
        assert_eq!(state.blend.alpha.dst, BlendFactor::Zero);
    }

    #[test]
    fn viewer_state_culls_front_faces_with_multisampling() {
        let state = FixedRenderState::viewer(8);
        assert_eq!(state.rasterizer.cull, CullMode::Front);
        assert_eq!(state.rasterizer.fill, FillMode::Solid);
        assert!(state.rasterizer.multisample);
        assert_eq!(state.sample_count, 8);
        assert_eq!(state.depth_stencil.depth_compare, CompareFunction::Less);
        assert!(!state.depth_stencil.stencil_test);
    }
}
