//! Windowed rendering: surface, offscreen kernel target, blit, and the egui overlay.

pub mod blit;
pub mod context;
pub mod targets;

use self::{blit::BlitPass, context::GfxContext, targets::FrameTarget};
use crate::config::Config;
use crate::frame::FrameDriver;
use crate::gpu::{Dispatch, DispatchMetrics, SkipReason};
use planemap::{AffineMap, DVec2};
use std::sync::Arc;
use winit::window::Window;

/// Owns all rendering-related state.
pub struct Renderer {
    pub gfx: GfxContext,
    pub target: FrameTarget,
    pub frames: FrameDriver,
    pub blit: BlitPass,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        config: &Config,
        metrics: Arc<DispatchMetrics>,
    ) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window, config.present_mode.into(), metrics.clone()).await?;
        let size = gfx.size;

        let target = FrameTarget::new(gfx.device(), size.width, size.height);
        let frames = FrameDriver::new(
            gfx.device(),
            config.lane_width,
            config.max_iterations,
            metrics,
        )?;
        let blit = BlitPass::new(gfx.device(), gfx.config.format);

        let egui_renderer = egui_wgpu::Renderer::new(gfx.device(), gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            target,
            frames,
            blit,
            egui_renderer,
        })
    }

    /// Current drawable size in device pixels.
    pub fn drawable(&self) -> DVec2 {
        DVec2::new(self.gfx.config.width as f64, self.gfx.config.height as f64)
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.target
                .resize(self.gfx.device(), new_size.width, new_size.height);
        }
    }

    /// Runs the kernel for `map` and blits the result to `swap_view`, in one submission.
    pub fn render(&mut self, swap_view: &wgpu::TextureView, map: AffineMap) -> Dispatch {
        let mut encoder = self
            .gfx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let dispatch = self.frames.encode_frame(
            self.gfx.device(),
            self.gfx.queue(),
            &mut encoder,
            map,
            Some(self.target.texture()),
        );

        // A skipped dispatch still blits, leaving the previous image on screen.
        self.blit
            .draw(self.gfx.device(), &mut encoder, swap_view, &self.target.view);

        self.gfx.queue().submit(std::iter::once(encoder.finish()));
        dispatch
    }

    /// Counts a tick that had no surface image to draw into.
    pub fn skip_frame(&self) -> Dispatch {
        self.frames.skip(SkipReason::NoDrawable)
    }
}
