use crate::gpu::DEFAULT_LANE_WIDTH;
use crate::viewport::ViewportOptions;
use clap::{Parser, ValueEnum};

/// `mandelbrot-viewer` - An interactive, GPU-rendered view of the Mandelbrot set.
///
/// Drag to pan, scroll or pinch to zoom around the cursor, Q/E or a two-finger twist to
/// rotate, and double-click (or H) to return to the full-set view.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Initial window width in logical points.
    #[arg(long, env = "MANDELBROT_WIDTH", default_value_t = 1280)]
    pub width: u32,

    /// Initial window height in logical points.
    #[arg(long, env = "MANDELBROT_HEIGHT", default_value_t = 720)]
    pub height: u32,

    /// Preferred lanes along x in one execution group.
    ///
    /// Clamped to what the device allows; the group takes as many rows as the
    /// remaining invocation budget permits.
    #[arg(long, env = "MANDELBROT_LANE_WIDTH", default_value_t = DEFAULT_LANE_WIDTH)]
    pub lane_width: u32,

    /// Escape-time iteration budget compiled into the kernel.
    #[arg(long, env = "MANDELBROT_MAX_ITERATIONS", default_value_t = 256,
          value_parser = clap::value_parser!(u32).range(1..=65536))]
    pub max_iterations: u32,

    /// Swapchain presentation mode.
    #[arg(long, env = "MANDELBROT_PRESENT_MODE", value_enum, default_value_t = PresentMode::Fifo)]
    pub present_mode: PresentMode,

    /// Device pixels per view point. Defaults to the window's scale factor.
    #[arg(long, env = "MANDELBROT_CONTENT_SCALE")]
    pub content_scale: Option<f64>,

    /// Ignore rotate gestures and keys.
    #[arg(long, env = "MANDELBROT_NO_ROTATION")]
    pub no_rotation: bool,

    /// Print dispatch counters to the log on exit.
    #[arg(long, env = "MANDELBROT_DUMP_METRICS")]
    pub dump_metrics: bool,
}

impl Config {
    pub fn viewport_options(&self, window_scale_factor: f64) -> ViewportOptions {
        ViewportOptions {
            content_scale: self
                .content_scale
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(window_scale_factor),
            rotation: !self.no_rotation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresentMode {
    /// V-sync; always supported.
    Fifo,
    Mailbox,
    Immediate,
    AutoVsync,
    AutoNoVsync,
}

impl From<PresentMode> for wgpu::PresentMode {
    fn from(mode: PresentMode) -> Self {
        match mode {
            PresentMode::Fifo => wgpu::PresentMode::Fifo,
            PresentMode::Mailbox => wgpu::PresentMode::Mailbox,
            PresentMode::Immediate => wgpu::PresentMode::Immediate,
            PresentMode::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentMode::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cfg = Config::try_parse_from(["mandelbrot-viewer"]).unwrap();
        assert_eq!(cfg.lane_width, 32);
        assert_eq!(cfg.max_iterations, 256);
        assert_eq!(cfg.present_mode, PresentMode::Fifo);
        assert!(!cfg.no_rotation);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::try_parse_from([
            "mandelbrot-viewer",
            "--lane-width",
            "64",
            "--present-mode",
            "auto-no-vsync",
            "--content-scale",
            "2",
            "--no-rotation",
        ])
        .unwrap();
        assert_eq!(cfg.lane_width, 64);
        assert_eq!(cfg.present_mode, PresentMode::AutoNoVsync);

        let options = cfg.viewport_options(1.0);
        assert_eq!(options.content_scale, 2.0);
        assert!(!options.rotation);
    }

    #[test]
    fn zero_iterations_rejected() {
        assert!(Config::try_parse_from(["mandelbrot-viewer", "--max-iterations", "0"]).is_err());
    }

    #[test]
    fn content_scale_falls_back_to_window() {
        let cfg = Config::try_parse_from(["mandelbrot-viewer", "--content-scale", "0"]).unwrap();
        assert_eq!(cfg.viewport_options(1.5).content_scale, 1.5);
    }
}
