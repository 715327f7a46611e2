use crate::viewport::ViewportState;
use planemap::Decomposition;

/// What the overlay shows for one frame.
pub struct HudStats {
    pub state: ViewportState,
    /// `None` when the current map could not be split (never expected for a view map).
    pub decomposition: Option<Decomposition>,
    pub dispatches: u64,
    pub skipped: u64,
}

pub fn draw_hud(ctx: &egui::Context, stats: &HudStats) {
    egui::Window::new("View")
        .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            egui::Grid::new("hud_grid").num_columns(2).show(ui, |ui| {
                let s = &stats.state;
                ui.label("centre");
                ui.monospace(format!("{:+.12} {:+.12}i", s.shift.x, s.shift.y));
                ui.end_row();

                ui.label("scale");
                ui.monospace(format!("{:.3e} /px", s.scale()));
                ui.end_row();

                ui.label("rotation");
                ui.monospace(format!("{:.2}°", s.theta.to_degrees()));
                ui.end_row();

                match &stats.decomposition {
                    Some(d) => {
                        ui.label("p, q");
                        ui.monospace(format!("{:.3e}, {:.3e}", d.p, d.q));
                        ui.end_row();

                        ui.label("α + β");
                        ui.monospace(format!("{:.2}°", d.rotation().to_degrees()));
                        ui.end_row();
                    }
                    None => {
                        ui.label("map");
                        ui.colored_label(egui::Color32::LIGHT_RED, "degenerate");
                        ui.end_row();
                    }
                }

                ui.label("frames");
                ui.monospace(format!("{} drawn, {} dropped", stats.dispatches, stats.skipped));
                ui.end_row();
            });
            ui.small("drag: pan · wheel: zoom · Q/E: rotate · H: home");
        });
}
