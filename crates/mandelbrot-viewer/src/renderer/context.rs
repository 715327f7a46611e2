use crate::gpu::{DispatchMetrics, GpuContext};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use winit::window::Window;

/// Device plus the window surface it presents to.
pub struct GfxContext {
    pub surface: wgpu::Surface<'static>,
    pub gpu: GpuContext,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
}

impl GfxContext {
    /// Creates a new graphics context bound to the given window.
    pub async fn new(
        window: Arc<Window>,
        present_mode: wgpu::PresentMode,
        metrics: Arc<DispatchMetrics>,
    ) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

        // The surface must outlive the window; `Arc` guarantees this.
        let surface = instance.create_surface(window.clone())?;
        let gpu = GpuContext::new(&instance, Some(&surface), metrics).await?;

        // Determine the surface format (prefer sRGB).
        let caps = surface.get_capabilities(&gpu.adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("Surface reports no supported formats."))?;

        let present_mode = if caps.present_modes.contains(&present_mode) {
            present_mode
        } else {
            log::warn!("Present mode {present_mode:?} unsupported; falling back to Fifo");
            wgpu::PresentMode::Fifo
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);

        Ok(Self {
            surface,
            gpu,
            config,
            size,
        })
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.gpu.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.gpu.queue
    }

    /// Reconfigures the swap chain when the window size changes.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.gpu.device, &self.config);
        }
    }

    /// Re-applies the current configuration after the surface was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.gpu.device, &self.config);
    }
}
