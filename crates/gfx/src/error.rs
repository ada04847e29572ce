/// Errors from graphics device, surface and render-target operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphicsError {
    #[error("graphics device creation failed: {0}")]
    DeviceCreation(String),
    #[error("no compatible hardware adapter found")]
    NoAdapter,
    #[error("multisample count {count} is not supported")]
    UnsupportedSampleCount { count: u32 },
    #[error("invalid target size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("render targets are not bound")]
    TargetsUnavailable,
    #[error("presentation surface lost or outdated")]
    SurfaceLost,
    #[error("surface error: {0}")]
    Surface(String),
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),
}

impl GraphicsError {
    /// Fatal errors mean no usable device exists; the caller must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DeviceCreation(_) | Self::NoAdapter | Self::UnsupportedSampleCount { .. }
        )
    }
}
