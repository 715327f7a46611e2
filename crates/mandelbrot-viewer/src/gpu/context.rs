use super::{DispatchMetrics, GpuError};
use std::sync::Arc;

/// Adapter, device and queue shared by the compute and presentation paths.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Requests a device able to present to `surface` (or any device when `None`).
    pub async fn new(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
        metrics: Arc<DispatchMetrics>,
    ) -> Result<Self, GpuError> {
        // Choose a high‑performance adapter compatible with the surface.
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!(
            "GPU adapter: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Mandelbrot Device"),
                    required_features: wgpu::Features::empty(),
                    // Use default limits for broad compatibility.
                    required_limits: wgpu::Limits::default(),
                },
                None, // no trace
            )
            .await?;

        // A validation error mid-frame drops that frame instead of aborting the process.
        device.on_uncaptured_error(Box::new(move |err| {
            metrics.record_gpu_error();
            log::error!("Uncaptured GPU error: {err}");
        }));

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Device without a presentation surface, for offscreen rendering and tests.
    pub async fn headless(metrics: Arc<DispatchMetrics>) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        Self::new(&instance, None, metrics).await
    }
}
