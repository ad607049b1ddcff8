//! Desktop video downloader: paste a link, pick a resolution and a folder,
//! and fetch the merged video with progress feedback.

// Startup configuration (binary locations, probe endpoint)
mod config;
// Application state and the controller that owns it
mod controller;
// Download orchestration and the backend seam
mod downloader;
// Error taxonomy
mod error;
// Format descriptors and quality selection
mod formats;
// Data models for requests and status
mod model;
// Merge-binary and connectivity checks
mod preflight;
// Progress parsing and percentage translation
mod progress;
// Thumbnail fetching module
mod thumbnail;
// Input validation
mod validate;
// yt-dlp process adapter
mod ytdlp;

use config::Config;
use controller::{Controller, DialogLevel, Effect, Tone};
use preflight::SystemPreflight;
use ytdlp::YtDlp;

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::{Color32, TextureOptions, Visuals};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection, MessageDialog for blocking notices
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};
use std::{sync::Arc, time::Duration};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Program entry point: initializes logging, config and runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::resolve();
    tracing::info!(
        ytdlp = %config.ytdlp.display(),
        ffmpeg = ?config.ffmpeg,
        ffmpeg_dir = ?config.ffmpeg_dir(),
        probe = %config.probe_url,
        "configuration resolved"
    );

    let runtime = RUNTIME.get_or_try_init(Runtime::new)?;
    let handle = runtime.handle().clone();

    let destination = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| ".".to_owned());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([420.0, 520.0]),
        ..Default::default()
    };
    eframe::run_native(
        "YouTube Video Downloader",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            let ctx = cc.egui_ctx.clone();
            let controller = Controller::new(
                handle,
                Arc::new(YtDlp::new(config.ytdlp.clone())),
                Arc::new(SystemPreflight::new(config)),
                Arc::new(move || ctx.request_repaint()),
                destination,
            );
            Box::new(DownloaderApp::new(controller))
        }),
    )?;
    Ok(())
}

/// View layer; reads everything from the controller's state
struct DownloaderApp {
    controller: Controller,
    /// Editable copies of the text fields
    url_input: String,
    folder_input: String,
    thumbnail: Option<egui::TextureHandle>,
}

impl DownloaderApp {
    fn new(controller: Controller) -> Self {
        let folder_input = controller.state().destination.clone();
        Self {
            controller,
            url_input: String::new(),
            folder_input,
            thumbnail: None,
        }
    }

    fn apply(&mut self, ctx: &egui::Context, effect: Effect) {
        match effect {
            Effect::Thumbnail(Some(img)) => {
                let tex = ctx.load_texture("thumbnail", img, TextureOptions::default());
                self.thumbnail = Some(tex);
            }
            Effect::Thumbnail(None) => self.thumbnail = None,
            Effect::Dialog(dialog) => {
                let level = match dialog.level {
                    DialogLevel::Info => MessageLevel::Info,
                    DialogLevel::Error => MessageLevel::Error,
                };
                let _ = MessageDialog::new()
                    .set_level(level)
                    .set_title(&dialog.title)
                    .set_description(&dialog.message)
                    .set_buttons(MessageButtons::Ok)
                    .show();
            }
        }
    }
}

fn tone_color(tone: Tone) -> Color32 {
    match tone {
        Tone::Info => Color32::LIGHT_BLUE,
        Tone::Busy => Color32::from_rgb(255, 165, 0),
        Tone::Ok => Color32::GREEN,
        Tone::Error => Color32::RED,
    }
}

/// GUI update loop: called each frame to drain worker messages and redraw
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        for effect in self.controller.poll() {
            self.apply(ctx, effect);
        }
        // The controller clears the URL after a completed download
        if self.controller.state().url.is_empty() && !self.url_input.is_empty() {
            self.url_input.clear();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("YouTube Video Downloader");
            ui.add_space(6.0);

            ui.label("Enter Video URL:");
            let url_edit = ui.add(
                egui::TextEdit::singleline(&mut self.url_input).desired_width(f32::INFINITY),
            );
            if url_edit.changed() {
                self.controller.url_changed(self.url_input.clone());
            }

            let status = &self.controller.state().status;
            ui.colored_label(tone_color(status.tone), &status.text);

            ui.add_space(6.0);
            ui.label("Select Download Folder:");
            ui.horizontal(|ui| {
                let folder_edit = ui.text_edit_singleline(&mut self.folder_input);
                if folder_edit.changed() {
                    self.controller.set_destination(self.folder_input.clone());
                }
                if ui.button("Browse").clicked() {
                    let picked = FileDialog::new()
                        .set_directory(&self.folder_input)
                        .pick_folder();
                    if let Some(folder) = picked {
                        self.folder_input = folder.display().to_string();
                        self.controller.set_destination(self.folder_input.clone());
                    }
                }
            });

            ui.add_space(6.0);
            ui.label("Select Video Quality:");
            let state = self.controller.state();
            let mut chosen = state.selected_quality.clone();
            let qualities = state.qualities.clone();
            egui::ComboBox::from_id_source("quality")
                .selected_text(&chosen)
                .show_ui(ui, |ui| {
                    for q in &qualities {
                        ui.selectable_value(&mut chosen, q.clone(), q);
                    }
                });
            if chosen != self.controller.state().selected_quality {
                self.controller.select_quality(&chosen);
            }

            if let Some(tex) = &self.thumbnail {
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    ui.image(tex);
                    if let Some(title) = &self.controller.state().title {
                        ui.label(title);
                    }
                });
            }

            ui.add_space(12.0);
            let trigger = egui::Button::new("Download Video")
                .min_size(egui::vec2(ui.available_width(), 28.0));
            if ui.add_enabled(self.controller.can_download(), trigger).clicked() {
                self.controller.start_download();
            }

            ui.add_space(8.0);
            let state = self.controller.state();
            ui.add(egui::ProgressBar::new(state.progress / 100.0));
            ui.label(&state.progress_text);
        });

        // Keep refreshing while workers may post progress
        if self.controller.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
