use super::SkipReason;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// A skip reason is logged on its first occurrence and then once per this many frames.
const SKIP_LOG_EVERY: u64 = 120;

/// Counters for the per-frame dispatch path.
///
/// Dropped frames are never errors, so this is where repeated silent failures become
/// visible to diagnostics.
pub struct DispatchMetrics {
    pub registry: Registry,
    pub dispatches_total: IntCounter,
    pub skipped_total: IntCounterVec,
    pub gpu_errors_total: IntCounter,
}

impl DispatchMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("mandelbrot".into()), None)?;

        let dispatches_total = IntCounter::with_opts(Opts::new(
            "dispatches_total",
            "Kernel dispatches encoded",
        ))?;
        let skipped_total = IntCounterVec::new(
            Opts::new("frames_skipped_total", "Frames skipped without encoding work"),
            &["reason"],
        )?;
        let gpu_errors_total = IntCounter::with_opts(Opts::new(
            "gpu_errors_total",
            "Uncaptured GPU validation or device errors",
        ))?;

        registry.register(Box::new(dispatches_total.clone()))?;
        registry.register(Box::new(skipped_total.clone()))?;
        registry.register(Box::new(gpu_errors_total.clone()))?;

        Ok(Self {
            registry,
            dispatches_total,
            skipped_total,
            gpu_errors_total,
        })
    }

    pub fn record_dispatch(&self) {
        self.dispatches_total.inc();
    }

    pub fn record_skip(&self, reason: SkipReason) {
        let counter = self.skipped_total.with_label_values(&[reason.as_str()]);
        counter.inc();

        let n = counter.get();
        if n == 1 || n % SKIP_LOG_EVERY == 0 {
            log::warn!("Skipped frame ({}); {} so far for this reason", reason.as_str(), n);
        }
    }

    pub fn record_gpu_error(&self) {
        self.gpu_errors_total.inc();
    }

    pub fn dispatches(&self) -> u64 {
        self.dispatches_total.get()
    }

    /// Frames skipped for any reason.
    pub fn skipped(&self) -> u64 {
        SkipReason::ALL
            .iter()
            .map(|r| self.skipped_total.with_label_values(&[r.as_str()]).get())
            .sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> u64 {
        self.skipped_total.with_label_values(&[reason.as_str()]).get()
    }

    /// Prometheus text exposition of every counter.
    pub fn render_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_are_counted_per_reason() {
        let m = DispatchMetrics::new().unwrap();
        m.record_skip(SkipReason::NoDestination);
        m.record_skip(SkipReason::NoDestination);
        m.record_skip(SkipReason::NoDrawable);
        m.record_dispatch();

        assert_eq!(m.skipped_for(SkipReason::NoDestination), 2);
        assert_eq!(m.skipped_for(SkipReason::NoDrawable), 1);
        assert_eq!(m.skipped_for(SkipReason::EmptyGrid), 0);
        assert_eq!(m.skipped(), 3);
        assert_eq!(m.dispatches(), 1);
    }

    #[test]
    fn text_exposition_names_counters() {
        let m = DispatchMetrics::new().unwrap();
        m.record_skip(SkipReason::GridTooLarge);
        m.record_gpu_error();

        let text = m.render_text().unwrap();
        assert!(text.contains("mandelbrot_frames_skipped_total{reason=\"grid_too_large\"} 1"));
        assert!(text.contains("mandelbrot_gpu_errors_total 1"));
    }
}
