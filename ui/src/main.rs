//! Proxy Log Viewer - GUI Application
//!
//! Shows the live log stream of a locally running proxy core, with
//! per-level history and search highlighting.

mod app;
mod views;

use app::LogViewerApp;
use eframe::egui;

fn main() -> eframe::Result<()> {
    // Set up logging
    env_logger::init();

    // Socket tasks run here; the UI stays on the main thread
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("log-feed")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    let handle = runtime.handle().clone();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([700.0, 400.0])
            .with_title("Proxy Log Viewer"),
        ..Default::default()
    };

    eframe::run_native(
        "Proxy Log Viewer",
        options,
        Box::new(move |cc| Ok(Box::new(LogViewerApp::new(cc, handle)))),
    )
}
