//! Entry point for the Mandelbrot viewer.

use anyhow::Result;
use clap::Parser;
use mandelbrot_viewer::{app::App, config::Config};
use std::sync::Arc;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::debug!("{config:?}");

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Mandelbrot")
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height))
            .build(&event_loop)?,
    );

    // Initialise the application (async → sync).
    let mut app = pollster::block_on(App::new(window.clone(), &config))?;
    let metrics = app.metrics.clone();

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                if !app.handle_event(&window, &event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::RedrawRequested => match app.render(&window) {
                            Ok(()) => {}
                            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                app.renderer.gfx.reconfigure();
                                window.request_redraw();
                            }
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                log::error!("WGPU out of memory – exiting.");
                                elwt.exit();
                            }
                            Err(e) => log::warn!("Frame dropped: {e:?}"),
                        },
                        _ => {}
                    }
                }
                if app.quit_requested() {
                    elwt.exit();
                }
            }
            Event::AboutToWait => {
                // The image only changes in response to input.
                if app.take_redraw() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    })?;

    log::info!(
        "Exiting after {} dispatches, {} dropped frames",
        metrics.dispatches(),
        metrics.skipped()
    );
    if config.dump_metrics {
        match metrics.render_text() {
            Ok(text) => log::info!("Dispatch metrics:\n{text}"),
            Err(err) => log::warn!("Could not encode metrics: {err}"),
        }
    }

    Ok(())
}
