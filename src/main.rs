mod app;
mod client;
mod config;
mod enhance;
mod error;
mod files;
mod loading;
mod page;
mod params;
mod presenter;
mod sliders;
mod state;
#[cfg(test)]
mod testing;
mod upload;
mod viewer;
mod workflow;

use std::sync::Arc;

use app::EnhanceApp;
use client::{Backend, HttpBackend};
use config::AppConfig;

const DEFAULT_WIDTH: f32 = 1280.0;
const DEFAULT_HEIGHT: f32 = 820.0;

fn window_size(config: &AppConfig) -> [f32; 2] {
    let valid = |v: Option<f32>| v.filter(|v| v.is_finite() && *v >= 200.0);
    [
        valid(config.window_width).unwrap_or(DEFAULT_WIDTH),
        valid(config.window_height).unwrap_or(DEFAULT_HEIGHT),
    ]
}

fn main() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load();
    let server = config.server();
    tracing::info!(server = %server.base_url, "using enhancement server");

    let backend: Arc<dyn Backend> = match HttpBackend::new(server, config.request_timeout()) {
        Ok(backend) => Arc::new(backend),
        Err(err) => {
            eprintln!("enhance-desk: could not create HTTP client: {err:#}");
            std::process::exit(2);
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Image Enhancer")
            .with_app_id("enhance-desk")
            .with_inner_size(window_size(&config)),
        ..Default::default()
    };

    eframe::run_native(
        "enhance-desk",
        native_options,
        Box::new(|cc| Ok(Box::new(EnhanceApp::new(cc, config, backend)))),
    )
}
