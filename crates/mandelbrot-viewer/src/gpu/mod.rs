//! Compute dispatch layer.
//!
//! A compiled kernel is wrapped in a `ComputeKernel`, which knows its execution-group
//! shape and can encode itself against any set of buffers and textures. Per-frame
//! problems (no destination, oversized grid) never surface as errors: the dispatch is
//! skipped and counted in `DispatchMetrics`. Only startup conditions (no adapter, kernel
//! fails to compile) are fatal and reported as `GpuError`.

pub mod context;
pub mod kernel;
pub mod metrics;

pub use self::context::GpuContext;
pub use self::kernel::{
    encode_textures, ComputeKernel, ComputeShader, Dispatch, GridSize, GroupShape, KernelArgs,
    SkipReason, DEFAULT_LANE_WIDTH,
};
pub use self::metrics::DispatchMetrics;

/// Fatal GPU initialisation failures.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("kernel `{name}` unavailable: {reason}")]
    KernelUnavailable { name: String, reason: String },
    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}
