//! Settings view - core connection and log options

use crate::app::LogViewerApp;
use eframe::egui;
use proxy_log_core::ViewerConfig;

pub struct SettingsView;

impl SettingsView {
    pub fn show(app: &mut LogViewerApp, ui: &mut egui::Ui) {
        ui.heading("⚙ Settings");
        ui.add_space(10.0);

        egui::ScrollArea::vertical().show(ui, |ui| {
            // Core section
            egui::CollapsingHeader::new("🔌 Core Connection")
                .default_open(true)
                .show(ui, |ui| {
                    egui::Grid::new("core_grid")
                        .num_columns(2)
                        .spacing([10.0, 8.0])
                        .show(ui, |ui| {
                            ui.label("Server:");
                            ui.add(
                                egui::TextEdit::singleline(&mut app.settings_view.server)
                                    .hint_text("127.0.0.1:9097")
                                    .desired_width(260.0),
                            );
                            ui.end_row();

                            ui.label("Secret:");
                            ui.horizontal(|ui| {
                                ui.add(
                                    egui::TextEdit::singleline(&mut app.settings_view.secret)
                                        .password(!app.settings_view.show_secret)
                                        .desired_width(260.0),
                                );
                                ui.checkbox(&mut app.settings_view.show_secret, "Show");
                            });
                            ui.end_row();
                        });

                    ui.add_space(5.0);
                    ui.label(
                        egui::RichText::new(
                            "Server: The external controller address of the proxy core.\n\
                         Secret: The controller secret, if one is set.",
                        )
                        .color(egui::Color32::GRAY)
                        .small(),
                    );
                });

            ui.add_space(10.0);

            // Logs section
            egui::CollapsingHeader::new("📝 Logs")
                .default_open(true)
                .show(ui, |ui| {
                    egui::Grid::new("logs_grid")
                        .num_columns(2)
                        .spacing([10.0, 8.0])
                        .show(ui, |ui| {
                            ui.label("Max Entries:");
                            ui.add(
                                egui::TextEdit::singleline(&mut app.settings_view.max_entries)
                                    .desired_width(80.0),
                            );
                            ui.end_row();
                        });

                    ui.add_space(5.0);
                    ui.label(
                        egui::RichText::new(
                            "Entries kept per level. The oldest entry is dropped when full.\n\
                         Changes apply after restart.",
                        )
                        .color(egui::Color32::GRAY)
                        .small(),
                    );
                });

            ui.add_space(20.0);

            // Error display
            if let Some(ref error) = app.settings_view.error {
                ui.colored_label(egui::Color32::from_rgb(220, 20, 60), error);
                ui.add_space(10.0);
            }

            // Save button
            ui.horizontal(|ui| {
                if ui.button("💾 Save Settings").clicked() {
                    app.settings_view.saved = false;
                    app.save_settings();
                }

                if app.settings_view.saved {
                    ui.colored_label(egui::Color32::from_rgb(34, 139, 34), "✓ Saved");
                }
            });

            ui.add_space(20.0);

            // Info section
            egui::CollapsingHeader::new("ℹ About").show(ui, |ui| {
                ui.label("Proxy Log Viewer");
                ui.label(format!("Version: {}", env!("CARGO_PKG_VERSION")));
                ui.add_space(5.0);
                ui.label(format!(
                    "Settings file: {}",
                    ViewerConfig::default_path().display()
                ));
            });
        });
    }
}
