use crate::{
    config::Config,
    gpu::DispatchMetrics,
    input::{Command, InputController},
    renderer::Renderer,
    ui::{self, HudStats},
    viewport::{SharedViewport, Viewport},
};
use anyhow::Result;
use std::sync::Arc;
use winit::{event::WindowEvent, window::Window};

pub struct App {
    pub renderer: Renderer,
    pub viewport: SharedViewport,
    pub input: InputController,
    pub metrics: Arc<DispatchMetrics>,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    quit_requested: bool,
    redraw_pending: bool,
}

impl App {
    pub async fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let metrics = Arc::new(DispatchMetrics::new()?);
        let renderer = Renderer::new(window.clone(), config, metrics.clone()).await?;
        let drawable = renderer.drawable();

        let scale_factor = window.scale_factor();
        let options = config.viewport_options(scale_factor);
        log::info!(
            "Drawable {}x{} px, content scale {}, rotation {}",
            drawable.x,
            drawable.y,
            options.content_scale,
            if options.rotation { "on" } else { "off" }
        );

        let viewport = SharedViewport::new(Viewport::new(options, drawable));
        let input = InputController::new(scale_factor, drawable);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        Ok(Self {
            renderer,
            viewport,
            input,
            metrics,
            egui_ctx,
            egui_state,
            quit_requested: false,
            redraw_pending: true,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Whether anything changed since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw_pending)
    }

    /// Returns true when the HUD consumed the event.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        if !matches!(event, WindowEvent::RedrawRequested) {
            self.redraw_pending = true;
        }

        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        match self.input.handle_event(event) {
            Some(Command::Gesture(gesture)) => {
                if let Err(err) = self.viewport.handle(&gesture, self.renderer.drawable()) {
                    log::debug!("Ignored {gesture:?}: {err}");
                }
            }
            Some(Command::Quit) => self.quit_requested = true,
            None => {}
        }

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let frame = match self.renderer.gfx.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                self.renderer.skip_frame();
                return Err(err);
            }
        };
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let map = self.viewport.snapshot(self.renderer.drawable());
        self.renderer.render(&swap_view, map);

        let stats = HudStats {
            state: self.viewport.state(),
            decomposition: map.decompose().ok(),
            dispatches: self.metrics.dispatches(),
            skipped: self.metrics.skipped(),
        };

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);
        ui::draw_hud(&self.egui_ctx, &stats);
        let egui_output = self.egui_ctx.end_frame();

        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);

        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gfx.config.width,
                self.renderer.gfx.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let device = &self.renderer.gfx.gpu.device;
        let queue = &self.renderer.gfx.gpu.queue;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("UI Encoder"),
        });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer
                .egui_renderer
                .update_texture(device, queue, *id, delta);
        }

        self.renderer.egui_renderer.update_buffers(
            device,
            queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("HUD Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(())
    }
}
