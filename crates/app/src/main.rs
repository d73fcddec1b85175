use anyhow::{Context, Result};
use eframe::egui;
use shared::settings::{ChatSettings, DataSavingPreference};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod chat_panel;
mod simple_md;
mod state;
mod types;

use types::{AppPaths, JournalApp};

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com.local", "Journal Chat", "JournalChat")
}

fn config_path() -> Option<PathBuf> {
    let proj = project_dirs()?;
    let _ = fs::create_dir_all(proj.config_dir());
    Some(proj.config_dir().join("settings.json"))
}

pub(crate) fn load_settings(path: Option<&Path>) -> ChatSettings {
    let Some(path) = path else {
        return ChatSettings::default();
    };
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "ignoring unreadable settings: {}", e);
            ChatSettings::default()
        }),
        Err(_) => ChatSettings::default(),
    }
}

pub(crate) fn save_settings(path: &Path, settings: &ChatSettings) {
    match serde_json::to_vec_pretty(settings) {
        Ok(bytes) => {
            if let Err(e) = fs::write(path, bytes) {
                tracing::warn!(path = %path.display(), "failed to save settings: {}", e);
            }
        }
        Err(e) => tracing::warn!("failed to encode settings: {}", e),
    }
}

fn app_paths(settings: &ChatSettings, settings_path: Option<PathBuf>) -> Result<AppPaths> {
    let proj = project_dirs();
    let default_in = |dir: Option<&Path>, file: &str| -> Result<PathBuf> {
        dir.map(|d| d.join(file))
            .context("could not determine a home directory for app data")
    };

    let session = match &settings.session_path {
        Some(p) => PathBuf::from(p),
        None => default_in(proj.as_ref().map(|p| p.cache_dir()), "session.json")?,
    };
    let database = match &settings.database_path {
        Some(p) => PathBuf::from(p),
        None => default_in(proj.as_ref().map(|p| p.data_dir()), "chat.db")?,
    };

    Ok(AppPaths {
        settings: settings_path,
        session,
        database,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings_path = config_path();
    let mut settings = load_settings(settings_path.as_deref());
    settings.apply_env_overrides();

    let paths = app_paths(&settings, settings_path)?;
    let app = JournalApp::new(settings, paths)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([720.0, 480.0]),
        vsync: true,
        ..Default::default()
    };
    eframe::run_native(
        "Journal Chat",
        options,
        Box::new(move |_cc| Box::new(app)),
    )
    .map_err(|e| anyhow::anyhow!("failed to start UI: {}", e))
}

impl eframe::App for JournalApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.chat.poll();
        if self.chat.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        self.show_top_bar(ctx);
        self.show_status_bar(ctx);

        let inputs = self.chat_inputs();
        self.chat.sync(ctx, &inputs);
        // The clear signal is a one-frame pulse
        self.clear_requested = false;

        self.chat.show(ctx);
        self.show_editor(ctx);
    }
}

impl JournalApp {
    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.heading("Journal");
                ui.separator();

                match self.signed_in.clone() {
                    Some(user) => {
                        ui.label(format!("👤 {}", user));
                        if ui.button("Sign out").clicked() {
                            self.sign_out();
                        }
                    }
                    None => {
                        if ui.button("Sign in").clicked() {
                            self.sign_in();
                        }
                    }
                }
                ui.separator();

                if ui.button("💾 Save entry").clicked() {
                    self.save_entry();
                }
                if ui.button("📝 New entry").clicked() {
                    self.new_entry();
                }
                if ui.button("Clear chat").clicked() {
                    self.clear_chat();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .button("Reset session")
                        .on_hover_text("Forget cached conversations")
                        .clicked()
                    {
                        self.reset_session();
                    }

                    let mut consent = self.settings.research_consent;
                    if ui.checkbox(&mut consent, "Research consent").changed() {
                        self.set_research_consent(consent);
                    }

                    let mut preference = self.settings.data_saving;
                    egui::ComboBox::from_id_source("data_saving")
                        .selected_text(preference.display_name())
                        .show_ui(ui, |ui| {
                            for option in [DataSavingPreference::Private, DataSavingPreference::Research] {
                                ui.selectable_value(&mut preference, option, option.display_name());
                            }
                        });
                    if preference != self.settings.data_saving {
                        self.set_data_saving(preference);
                    }
                    ui.label("Data saving:");
                });
            });
            ui.add_space(4.0);
        });
    }

    fn show_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let log = self.activity.lock().clone();
                let activity = match log.last_at {
                    Some(at) => format!("Chat activity: {} (last {})", log.count, at.format("%H:%M:%S")),
                    None => "Chat activity: 0".to_string(),
                };
                ui.label(egui::RichText::new(activity).small().weak());

                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(egui::RichText::new(status).small());
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let entry = self.entry_id.as_deref().unwrap_or("unsaved");
                    ui.label(egui::RichText::new(format!("Entry: {}", entry)).small().weak());
                });
            });
        });
    }

    fn show_editor(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut self.journal_text)
                            .hint_text("Write about your day...")
                            .desired_width(f32::INFINITY)
                            .desired_rows(24)
                            .font(egui::TextStyle::Body),
                    );
                });
        });
    }
}
