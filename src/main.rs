//! Main application for the YouTube playlist downloader GUI

// Progress rows keyed by title
mod board;
// External downloader spawning logic (yt-dlp)
mod downloader;
// Crate-wide error type
mod error;
// Job configuration and the pickers' value sets
mod model;
// JobConfig -> yt-dlp arguments
mod options;
// Progress parsing utilities
mod progress;
// Persisted preferences
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use board::{JobOutcome, ProgressBoard, RowStatus, TitleRow};
use downloader::spawn_download;
use error::{AppError, AppResult};
use model::{AudioQuality, DownloadType, FileFormat, JobConfig, Quality};
use progress::{format_bytes, format_speed, ProgressEvent};
use settings::{settings_path, SettingsStore};

// eframe/egui for GUI application framework
use eframe::{egui, App, Frame};
use egui::{Color32, RichText, Visuals};
use log::{error, info, warn};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::{
    runtime::Runtime,
    sync::mpsc::{error::TryRecvError, unbounded_channel, UnboundedReceiver},
};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging, settings and runtime, then launches the GUI
fn main() -> AppResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let store = SettingsStore::load(settings_path());
    info!("settings file: {}", store.path().display());

    let rt = Arc::new(Runtime::new()?);
    RUNTIME
        .set(rt)
        .map_err(|_| AppError::Runtime("runtime already initialized".into()))?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([750.0, 600.0])
            .with_title("YouTube Playlist Downloader"),
        ..Default::default()
    };
    eframe::run_native(
        "YouTube Playlist Downloader",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new(store))
        }),
    )
    .map_err(|e| AppError::Gui(e.to_string()))
}

/// Idle until Download is clicked, Running until the job reports an outcome
enum JobState {
    Idle,
    Running(UnboundedReceiver<ProgressEvent>),
}

/// Application state for the GUI
struct DownloaderApp {
    settings: SettingsStore,
    /// Input field for the video or playlist URL
    url_input: String,
    /// Destination folder for downloads
    download_folder: PathBuf,
    download_type: DownloadType,
    quality: Quality,
    audio_quality: AudioQuality,
    file_format: FileFormat,
    board: ProgressBoard,
    job: JobState,
    /// Last non-job message (e.g. a settings write failure)
    notice: Option<String>,
}

impl DownloaderApp {
    fn new(settings: SettingsStore) -> Self {
        let download_folder = settings.settings().default_path.clone();
        let quality = settings.settings().default_quality();
        let download_type = DownloadType::default();
        Self {
            settings,
            url_input: String::new(),
            download_folder,
            download_type,
            quality,
            audio_quality: AudioQuality::default(),
            file_format: FileFormat::default_for(download_type),
            board: ProgressBoard::default(),
            job: JobState::Idle,
            notice: None,
        }
    }

    fn is_running(&self) -> bool {
        matches!(self.job, JobState::Running(_))
    }

    /// Switches the type and resets the format to the first one the type allows.
    fn set_download_type(&mut self, download_type: DownloadType) {
        self.download_type = download_type;
        if !self.file_format.belongs_to(download_type) {
            self.file_format = FileFormat::default_for(download_type);
        }
    }

    fn set_download_folder(&mut self, folder: PathBuf) {
        self.download_folder = folder.clone();
        if let Err(e) = self.settings.update(|s| s.default_path = folder) {
            error!("failed to save settings: {}", e);
            self.notice = Some(format!("Could not save settings: {e}"));
        }
    }

    /// Snapshot of the form, or `None` when there is no URL.
    fn job_from_form(&self) -> Option<JobConfig> {
        let url = self.url_input.trim();
        if url.is_empty() {
            return None;
        }
        Some(JobConfig {
            url: url.to_string(),
            folder: self.download_folder.clone(),
            quality: self.quality,
            download_type: self.download_type,
            file_format: self.file_format,
            audio_quality: self.audio_quality,
            cookiefile: None,
        })
    }

    fn start_job(&mut self, ctx: &egui::Context) {
        let Some(job) = self.job_from_form() else {
            return;
        };
        let Some(rt) = RUNTIME.get() else {
            error!("tokio runtime is not initialized");
            return;
        };

        self.board.clear();
        self.notice = None;

        let (tx, rx) = unbounded_channel();
        let settings = self.settings.settings().clone();
        let ctx = ctx.clone();
        rt.spawn(async move {
            spawn_download(job, settings, tx).await;
            ctx.request_repaint();
        });
        self.job = JobState::Running(rx);
    }

    /// Drains pending events; goes back to Idle once the job has an outcome.
    fn poll_job(&mut self) {
        let JobState::Running(rx) = &mut self.job else {
            return;
        };
        let mut done = false;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    done |= event.is_terminal();
                    self.board.apply(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("download task ended without reporting an outcome");
                    self.board.fail_if_unfinished("download task stopped unexpectedly");
                    done = true;
                    break;
                }
            }
        }
        if done {
            self.job = JobState::Idle;
        }
    }

    fn form_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let running = self.is_running();

        egui::Grid::new("form")
            .num_columns(2)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.label(RichText::new("YouTube URL:").strong());
                ui.add(
                    egui::TextEdit::singleline(&mut self.url_input)
                        .hint_text("Enter YouTube video or playlist URL...")
                        .desired_width(f32::INFINITY),
                );
                ui.end_row();

                ui.label(RichText::new("Download Folder:").strong());
                ui.horizontal(|ui| {
                    ui.label(self.download_folder.display().to_string());
                    if ui.button("Browse").clicked() {
                        if let Some(folder) = FileDialog::new()
                            .set_directory(&self.download_folder)
                            .pick_folder()
                        {
                            self.set_download_folder(folder);
                        }
                    }
                });
                ui.end_row();

                ui.label(RichText::new("Download Type:").strong());
                let mut download_type = self.download_type;
                egui::ComboBox::from_id_source("download_type")
                    .selected_text(download_type.label())
                    .show_ui(ui, |ui| {
                        for t in DownloadType::ALL {
                            ui.selectable_value(&mut download_type, t, t.label());
                        }
                    });
                if download_type != self.download_type {
                    self.set_download_type(download_type);
                }
                ui.end_row();

                match self.download_type {
                    DownloadType::Combined => {
                        ui.label("Video Quality:");
                        egui::ComboBox::from_id_source("video_quality")
                            .selected_text(self.quality.label())
                            .show_ui(ui, |ui| {
                                for q in Quality::ALL {
                                    ui.selectable_value(&mut self.quality, q, q.label());
                                }
                            });
                    }
                    DownloadType::AudioOnly => {
                        ui.label("Audio Quality:");
                        egui::ComboBox::from_id_source("audio_quality")
                            .selected_text(self.audio_quality.label())
                            .show_ui(ui, |ui| {
                                for q in AudioQuality::ALL {
                                    ui.selectable_value(&mut self.audio_quality, q, q.label());
                                }
                            });
                    }
                }
                ui.end_row();

                ui.label("File Format:");
                egui::ComboBox::from_id_source("file_format")
                    .selected_text(self.file_format.label())
                    .show_ui(ui, |ui| {
                        for f in FileFormat::for_type(self.download_type) {
                            ui.selectable_value(&mut self.file_format, *f, f.label());
                        }
                    });
                ui.end_row();
            });

        ui.add_space(8.0);
        ui.vertical_centered(|ui| {
            let button = egui::Button::new(RichText::new("Download").size(14.0))
                .fill(Color32::from_rgb(0x00, 0x7a, 0xcc));
            if ui.add_enabled(!running, button).clicked() {
                self.start_job(ctx);
            }
        });

        if running {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Downloading...");
            });
        } else if let Some(outcome) = self.board.outcome() {
            match outcome {
                JobOutcome::Completed => {
                    ui.colored_label(Color32::LIGHT_GREEN, "✅ All downloads completed successfully!");
                }
                JobOutcome::Failed(msg) => {
                    ui.colored_label(Color32::LIGHT_RED, format!("❌ Error: {msg}"));
                }
            }
        }
        if let Some(notice) = &self.notice {
            ui.colored_label(Color32::YELLOW, notice);
        }
    }

    fn rows_ui(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                for row in self.board.rows() {
                    row_ui(ui, row);
                }
            });
    }
}

fn row_ui(ui: &mut egui::Ui, row: &TitleRow) {
    ui.group(|ui| {
        ui.set_width(ui.available_width());
        ui.label(RichText::new(&row.title).strong());
        let bar = egui::ProgressBar::new(row.percent / 100.0).show_percentage();
        ui.add(match row.status {
            RowStatus::Downloading => bar.fill(Color32::from_rgb(0x00, 0xbf, 0xff)),
            RowStatus::Finished => bar.fill(Color32::from_rgb(0x2e, 0x8b, 0x57)),
        });
        let size = row.total_size.map_or_else(|| "?".to_string(), format_bytes);
        let detail = match row.status {
            RowStatus::Downloading => format!(
                "⬇️ {} of {} at {} · ETA {}",
                format_bytes(row.downloaded),
                size,
                format_speed(row.speed),
                row.eta
            ),
            RowStatus::Finished => format!("✅ Finished · {size}"),
        };
        ui.label(detail);
    });
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.poll_job();

        egui::TopBottomPanel::top("form_panel").show(ctx, |ui| {
            ui.add_space(6.0);
            self.form_ui(ui, ctx);
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.rows_ui(ui);
        });

        // Progress arrives on a channel, so keep polling while a job runs
        if self.is_running() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Transfer;
    use tokio::sync::mpsc::unbounded_channel;

    fn app() -> (DownloaderApp, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json"));
        (DownloaderApp::new(store), dir)
    }

    #[test]
    fn form_starts_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"default_path": "/videos", "default_quality": "1440p"}"#).unwrap();
        let app = DownloaderApp::new(SettingsStore::load(&path));
        assert_eq!(app.download_folder, PathBuf::from("/videos"));
        assert_eq!(app.quality, Quality::P1440);
        assert_eq!(app.file_format, FileFormat::Mp4);
        assert!(!app.is_running());
    }

    #[test]
    fn switching_type_resets_format() {
        let (mut app, _dir) = app();
        app.file_format = FileFormat::Webm;
        app.set_download_type(DownloadType::AudioOnly);
        assert_eq!(app.file_format, FileFormat::Mp3);
        app.file_format = FileFormat::M4a;
        app.set_download_type(DownloadType::Combined);
        assert_eq!(app.file_format, FileFormat::Mp4);
    }

    #[test]
    fn empty_url_builds_no_job() {
        let (mut app, _dir) = app();
        app.url_input = "   ".into();
        assert_eq!(app.job_from_form(), None);
    }

    #[test]
    fn form_snapshot_becomes_job() {
        let (mut app, _dir) = app();
        app.url_input = " https://youtube.com/watch?v=X ".into();
        app.quality = Quality::P1080;
        let job = app.job_from_form().unwrap();
        assert_eq!(job.url, "https://youtube.com/watch?v=X");
        assert_eq!(job.download_type, DownloadType::Combined);
        assert_eq!(job.file_format, FileFormat::Mp4);

        let args = crate::options::YtDlpOptions::from_job(&job, app.settings.settings()).to_args();
        assert!(args.contains(&"bestvideo[height<=1080]+bestaudio/best[height<=1080]".to_owned()));
        let merge = args.iter().position(|a| a == "--merge-output-format").unwrap();
        assert_eq!(args[merge + 1], "mp4");
    }

    #[test]
    fn picking_folder_persists_it() {
        let (mut app, dir) = app();
        app.set_download_folder(PathBuf::from("/new/place"));
        let reloaded = SettingsStore::load(dir.path().join("settings.json"));
        assert_eq!(reloaded.settings().default_path, PathBuf::from("/new/place"));
        assert_eq!(app.notice, None);
    }

    #[test]
    fn poll_routes_events_until_outcome() {
        let (mut app, _dir) = app();
        let (tx, rx) = unbounded_channel();
        app.job = JobState::Running(rx);

        tx.send(ProgressEvent::Downloading(Transfer {
            title: "Song".into(),
            percent: 40.0,
            speed: 0.0,
            total_size: None,
            downloaded: 40,
        }))
        .unwrap();
        app.poll_job();
        assert!(app.is_running());
        assert_eq!(app.board.rows()[0].eta, "00:00:00");

        tx.send(ProgressEvent::Completed).unwrap();
        app.poll_job();
        assert!(!app.is_running());
        assert_eq!(app.board.outcome(), Some(&JobOutcome::Completed));
    }

    #[test]
    fn dropped_sender_returns_to_idle_with_error() {
        let (mut app, _dir) = app();
        let (tx, rx) = unbounded_channel::<ProgressEvent>();
        app.job = JobState::Running(rx);
        drop(tx);
        app.poll_job();
        assert!(!app.is_running());
        assert!(matches!(app.board.outcome(), Some(JobOutcome::Failed(_))));
    }
}
