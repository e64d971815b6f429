use std::{
    path::PathBuf,
    sync::{Arc, mpsc},
    time::Duration,
};

use crate::{
    client::Backend,
    config::{AppConfig, ServerConfig},
    files,
    loading::UiState,
    page::NoticeLevel,
    sliders::{ControlId, SliderSync},
    viewer::Viewer,
    workflow::{Event, Workflow},
};

const CONTROL_GROUPS: [(&str, &[ControlId]); 5] = [
    ("Denoise", &[ControlId::SigmaSpace, ControlId::SigmaColor]),
    (
        "White balance",
        &[ControlId::RGain, ControlId::GGain, ControlId::BGain],
    ),
    (
        "Contrast (CLAHE)",
        &[ControlId::ClipLimit, ControlId::TileGridSize],
    ),
    ("Saturation", &[ControlId::Saturation]),
    (
        "Sharpen",
        &[ControlId::SharpenRadius, ControlId::SharpenAmount],
    ),
];

const BUSY_REPAINT: Duration = Duration::from_millis(250);

enum DownloadEvent {
    Saved(PathBuf),
    Failed(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Action {
    PickFile,
    StartOver,
    Automatic,
    Manual,
    ResetControls,
    Download,
    DismissNotice,
}

pub struct EnhanceApp {
    workflow: Workflow,
    original_view: Viewer,
    enhanced_view: Viewer,
    backend: Arc<dyn Backend>,
    server: ServerConfig,
    download_rx: Option<mpsc::Receiver<DownloadEvent>>,
    config: AppConfig,
}

impl EnhanceApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        backend: Arc<dyn Backend>,
    ) -> Self {
        let server = config.server();
        let repaint_ctx = cc.egui_ctx.clone();
        let workflow = Workflow::threaded(Arc::clone(&backend), config.request_timeout(), move || {
            repaint_ctx.request_repaint()
        });
        Self {
            workflow,
            original_view: Viewer::new("original_image", Arc::clone(&backend), server.clone()),
            enhanced_view: Viewer::new("enhanced_image", Arc::clone(&backend), server.clone()),
            backend,
            server,
            download_rx: None,
            config,
        }
    }

    fn pick_and_upload(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("Images", files::supported_extensions());
        if let Some(dir) = self.config.last_open_dir.as_ref() {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.pick_file() else {
            return;
        };
        self.config.last_open_dir = path.parent().map(|p| p.to_path_buf());
        if !files::is_supported_image(&path) {
            self.workflow
                .state_mut()
                .page
                .show_error(format!("{} is not a supported image type.", path.display()));
            return;
        }

        let file = match files::read_upload(&path) {
            Ok(file) => file,
            Err(err) => {
                self.workflow
                    .state_mut()
                    .page
                    .show_error(format!("Could not read {}: {}", path.display(), err));
                return;
            }
        };
        if let Err(err) = self.workflow.start_upload(file) {
            tracing::debug!(%err, "upload not started");
        }
    }

    fn download_dir(&self) -> PathBuf {
        self.config
            .download_dir
            .as_ref()
            .map(|d| files::expand_home_prefix(&d.to_string_lossy()))
            .unwrap_or_else(files::default_download_dir)
    }

    fn start_download_job(&mut self, ctx: &egui::Context) {
        let link = &self.workflow.state().page.download;
        if !link.visible || link.file_name.is_empty() {
            return;
        }
        let file_name = link.file_name.clone();
        let url = self.server.download_url(&file_name);
        let output_dir = self.download_dir();
        let backend = Arc::clone(&self.backend);
        let (tx, rx) = mpsc::channel();
        let ctx2 = ctx.clone();
        tracing::info!(%url, "download started");
        std::thread::spawn(move || {
            let event = backend
                .fetch(&url)
                .map_err(anyhow::Error::from)
                .and_then(|bytes| files::save_download(&output_dir, &file_name, &bytes));
            let _ = tx.send(match event {
                Ok(path) => DownloadEvent::Saved(path),
                Err(err) => DownloadEvent::Failed(err.to_string()),
            });
            ctx2.request_repaint();
        });
        self.download_rx = Some(rx);
    }

    fn poll_download_events(&mut self) {
        let Some(rx) = self.download_rx.take() else {
            return;
        };
        let page = &mut self.workflow.state_mut().page;
        match rx.try_recv() {
            Ok(DownloadEvent::Saved(path)) => {
                tracing::info!(path = %path.display(), "download saved");
                page.show_info(format!("Saved to {}", path.display()));
            }
            Ok(DownloadEvent::Failed(err)) => {
                tracing::warn!(%err, "download failed");
                page.show_error(format!("Download failed: {}", err));
            }
            Err(mpsc::TryRecvError::Empty) => self.download_rx = Some(rx),
            Err(mpsc::TryRecvError::Disconnected) => page.show_error("Download failed."),
        }
    }

    fn apply(&mut self, action: Action, ctx: &egui::Context) {
        match action {
            Action::PickFile => self.pick_and_upload(),
            Action::StartOver => self.workflow.reset(),
            Action::Automatic => {
                if let Err(err) = self.workflow.start_automatic() {
                    tracing::debug!(%err, "automatic enhancement not started");
                }
            }
            Action::Manual => {
                if let Err(err) = self.workflow.start_manual() {
                    tracing::debug!(%err, "manual enhancement not started");
                }
            }
            Action::ResetControls => {
                self.workflow.state_mut().sliders.reset_all();
                tracing::info!("manual controls reset to defaults");
            }
            Action::Download => self.start_download_job(ctx),
            Action::DismissNotice => self.workflow.state_mut().page.dismiss_notice(),
        }
    }
}

fn log_event(event: &Event) {
    match event {
        Event::Uploaded(outcome) => {
            tracing::info!(filename = %outcome.active_filename, "upload finished")
        }
        Event::UploadFailed(err) => tracing::warn!(%err, "upload finished with error"),
        Event::Enhanced(result) => {
            tracing::info!(reference = %result.image_reference, "enhancement finished")
        }
        Event::EnhanceFailed(err) => tracing::warn!(%err, "enhancement finished with error"),
    }
}

fn show_slider(ui: &mut egui::Ui, sliders: &mut SliderSync, control: ControlId, enabled: bool) {
    let spec = control.spec();
    let mut value = sliders.value(control).parse::<f64>().unwrap_or(spec.min);
    let row_id = sliders.label_id(control).unwrap_or(control.as_str());
    ui.push_id(row_id, |ui| {
        ui.horizontal(|ui| {
            ui.label(control.title());
            let resp = ui.add_enabled(
                enabled,
                egui::Slider::new(&mut value, spec.min..=spec.max)
                    .step_by(spec.step)
                    .show_value(false)
                    .clamping(egui::SliderClamping::Always),
            );
            if resp.changed() {
                sliders.input(control, &spec.format(value));
            }
            ui.monospace(sliders.label(control).unwrap_or_default());
        });
    });
}

impl eframe::App for EnhanceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Track window size for saving on exit
        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.config.window_width = Some(rect.width());
            self.config.window_height = Some(rect.height());
        }

        // Apply finished requests before drawing anything
        for event in self.workflow.poll() {
            log_event(&event);
        }
        self.poll_download_events();
        self.original_view
            .sync(self.workflow.state().page.original.source(), ctx);
        self.enhanced_view
            .sync(self.workflow.state().page.enhanced.source(), ctx);

        let ui_state = self.workflow.ui_state();
        if self.workflow.state().loading.indicator_visible() {
            ctx.request_repaint_after(BUSY_REPAINT);
        }
        let mut action: Option<Action> = None;

        egui::TopBottomPanel::top("main_menu").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(ui_state != UiState::Uploading, egui::Button::new("Upload image..."))
                    .clicked()
                {
                    action = Some(Action::PickFile);
                }
                ui.label(egui::RichText::new(&self.workflow.state().page.file_label).weak());
                ui.separator();
                if ui.button("Start over").clicked() {
                    action = Some(Action::StartOver);
                }
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match ui_state {
                    UiState::Idle => {}
                    UiState::Uploading => {
                        ui.spinner();
                        ui.label("Uploading...");
                    }
                    UiState::Enhancing => {
                        ui.spinner();
                        ui.label("Processing...");
                    }
                }
                if let Some(notice) = &self.workflow.state().page.notice {
                    let text = match notice.level {
                        NoticeLevel::Error => egui::RichText::new(format!("Error: {}", notice.text))
                            .color(ui.visuals().error_fg_color),
                        NoticeLevel::Info => egui::RichText::new(&notice.text),
                    };
                    ui.label(text);
                    if ui.small_button("✕").clicked() {
                        action = Some(Action::DismissNotice);
                    }
                }
                if self.download_rx.is_some() {
                    ui.separator();
                    ui.spinner();
                    ui.label("Downloading...");
                }
            });
        });

        egui::SidePanel::left("controls_panel")
            .min_width(300.0)
            .show(ctx, |ui| {
                let busy = ui_state != UiState::Idle;
                let enabled = self.workflow.state().page.controls_enabled;

                ui.heading("Enhance");
                ui.separator();
                if ui
                    .add_enabled(enabled && !busy, egui::Button::new("Auto enhance"))
                    .clicked()
                {
                    action = Some(Action::Automatic);
                }
                ui.add_space(8.0);
                if !enabled {
                    ui.label(egui::RichText::new("Upload an image to start").weak());
                    return;
                }

                egui::ScrollArea::vertical()
                    .id_salt("controls_scroll")
                    .show(ui, |ui| {
                        let sliders = &mut self.workflow.state_mut().sliders;
                        for (title, controls) in CONTROL_GROUPS {
                            ui.label(egui::RichText::new(title).strong());
                            for &control in controls {
                                show_slider(ui, sliders, control, !busy);
                            }
                            ui.add_space(6.0);
                        }
                        ui.horizontal(|ui| {
                            if ui
                                .add_enabled(!busy, egui::Button::new("Apply manual changes"))
                                .clicked()
                            {
                                action = Some(Action::Manual);
                            }
                            if ui
                                .add_enabled(!busy, egui::Button::new("Reset controls"))
                                .clicked()
                            {
                                action = Some(Action::ResetControls);
                            }
                        });
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let state = self.workflow.state();
            let overlay = state.loading.result_dimmed().then_some("Processing...");
            ui.columns(2, |cols| {
                self.original_view.show(&mut cols[0], "Original", None);
                self.enhanced_view.show(&mut cols[1], "Enhanced", overlay);
                if state.page.download.visible {
                    cols[1].add_space(6.0);
                    let label = format!("Download {}", state.page.download.file_name);
                    if cols[1]
                        .add_enabled(self.download_rx.is_none(), egui::Button::new(label))
                        .clicked()
                    {
                        action = Some(Action::Download);
                    }
                }
            });
        });

        if let Some(action) = action {
            self.apply(action, ctx);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.config.save();
    }
}
