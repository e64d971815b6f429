use std::sync::{Arc, mpsc};

use image::DynamicImage;

use crate::{client::Backend, config::ServerConfig, page::ImageSource};

/// Downscale fetched images to this longest-edge size for display.
const PREVIEW_MAX: u32 = 1920;
const LOADING_CAPTION: &str = "Loading...";

enum BgResult {
    Loaded {
        source: String,
        rgba: Vec<u8>,
        width: usize,
        height: usize,
    },
    LoadFailed {
        source: String,
        reason: String,
    },
}

/// Shows one image slot, fetching and decoding remote sources off-thread.
pub struct Viewer {
    id: &'static str,
    backend: Arc<dyn Backend>,
    server: ServerConfig,
    current_source: Option<String>,
    texture: Option<egui::TextureHandle>,
    loading: bool,
    failed: Option<String>,
    tx: mpsc::SyncSender<BgResult>,
    rx: mpsc::Receiver<BgResult>,
}

impl Viewer {
    pub fn new(id: &'static str, backend: Arc<dyn Backend>, server: ServerConfig) -> Self {
        let (tx, rx) = mpsc::sync_channel(4);
        Self {
            id,
            backend,
            server,
            current_source: None,
            texture: None,
            loading: false,
            failed: None,
            tx,
            rx,
        }
    }

    /// Starts loading when the slot's source changed since the last frame.
    pub fn sync(&mut self, source: &ImageSource, ctx: &egui::Context) {
        self.drain(ctx);
        if source.is_placeholder() {
            if self.current_source.take().is_some() {
                self.texture = None;
                self.loading = false;
                self.failed = None;
            }
            return;
        }
        let src = source.as_str();
        if self.current_source.as_deref() == Some(src) {
            return;
        }
        self.current_source = Some(src.to_string());
        self.loading = true;
        self.failed = None;

        let source = src.to_string();
        let url = self.server.resolve_image_url(src);
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let ctx2 = ctx.clone();
        tracing::debug!(viewer = self.id, %url, "loading image");
        std::thread::spawn(move || {
            let result = backend
                .fetch(&url)
                .map_err(anyhow::Error::from)
                .and_then(|bytes| decode_preview(&bytes));
            let msg = match result {
                Ok(img) => {
                    let rgba = img.to_rgba8();
                    let width = rgba.width() as usize;
                    let height = rgba.height() as usize;
                    BgResult::Loaded {
                        source,
                        rgba: rgba.into_raw(),
                        width,
                        height,
                    }
                }
                Err(err) => BgResult::LoadFailed {
                    source,
                    reason: err.to_string(),
                },
            };
            let _ = tx.send(msg);
            ctx2.request_repaint();
        });
    }

    fn drain(&mut self, ctx: &egui::Context) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                BgResult::Loaded {
                    source,
                    rgba,
                    width,
                    height,
                } => {
                    if self.current_source.as_ref() == Some(&source) {
                        let img = egui::ColorImage::from_rgba_unmultiplied([width, height], &rgba);
                        self.texture =
                            Some(ctx.load_texture(self.id, img, egui::TextureOptions::LINEAR));
                        self.loading = false;
                    }
                }
                BgResult::LoadFailed { source, reason } => {
                    if self.current_source.as_ref() == Some(&source) {
                        tracing::warn!(viewer = self.id, %source, %reason, "image load failed");
                        self.loading = false;
                        self.texture = None;
                        self.failed = Some(reason);
                    }
                }
            }
        }
    }

    /// `overlay` dims the image and shows a spinner with the given caption.
    pub fn show(&self, ui: &mut egui::Ui, caption: &str, overlay: Option<&str>) {
        let avail_w = ui.available_width();
        let img_max_h = (ui.ctx().screen_rect().height() * 0.6).max(180.0);

        ui.label(egui::RichText::new(caption).strong());
        if self.current_source.is_none() {
            ui.allocate_ui(egui::vec2(avail_w, img_max_h * 0.5), |ui| {
                ui.centered_and_justified(|ui| {
                    ui.label(egui::RichText::new(overlay.unwrap_or(caption)).weak());
                });
            });
            return;
        }
        if self.loading && self.texture.is_none() {
            ui.allocate_ui(egui::vec2(avail_w, img_max_h * 0.5), |ui| {
                ui.centered_and_justified(|ui| {
                    ui.spinner();
                });
            });
            return;
        }
        let Some(ref tex) = self.texture else {
            ui.label(format!(
                "⚠ Could not load image: {}",
                self.failed.as_deref().unwrap_or("unknown error")
            ));
            return;
        };

        let overlay = frame_overlay(self.loading, overlay);
        let tex_size = tex.size_vec2();
        let scale = (avail_w / tex_size.x).min(img_max_h / tex_size.y);
        let display = tex_size * scale;
        let (img_rect, _) = ui.allocate_exact_size(display, egui::Sense::hover());
        ui.painter().image(
            tex.id(),
            img_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
        if let Some(text) = overlay {
            ui.painter()
                .rect_filled(img_rect, 0.0, egui::Color32::from_black_alpha(120));
            let spinner_rect = egui::Rect::from_center_size(
                img_rect.center() - egui::vec2(0.0, 24.0),
                egui::vec2(24.0, 24.0),
            );
            ui.put(spinner_rect, egui::Spinner::new().color(egui::Color32::WHITE));
            ui.painter().text(
                img_rect.center(),
                egui::Align2::CENTER_CENTER,
                text,
                egui::FontId::proportional(16.0),
                egui::Color32::WHITE,
            );
        }
    }
}

/// A texture still on screen while its replacement loads is covered, so the
/// old image never passes for the new one.
fn frame_overlay(loading: bool, requested: Option<&str>) -> Option<&str> {
    requested.or(loading.then_some(LOADING_CAPTION))
}

/// Decodes fetched bytes, shrinking large images for the preview.
pub fn decode_preview(bytes: &[u8]) -> anyhow::Result<DynamicImage> {
    let img = image::load_from_memory(bytes)?;
    Ok(if img.width() > PREVIEW_MAX || img.height() > PREVIEW_MAX {
        img.thumbnail(PREVIEW_MAX, PREVIEW_MAX)
    } else {
        img
    })
}
