mod api;
mod app;
mod chat;
mod event;
mod onboarding;
mod policies;
mod store;
mod theme;

use api::ApiClient;
use app::HrvaApp;
use eframe::egui;
use std::sync::mpsc;
use store::prefs::FilePrefs;
use store::AppStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let gateway = ApiClient::from_env()?;
    tracing::info!(base_url = gateway.base_url(), "starting HR VA");

    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("hrva-runtime")
        .build()?;

    let store = AppStore::new(Box::new(FilePrefs::new()));
    let app = HrvaApp::new(rx, tx, gateway, runtime.handle().clone(), store);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([1024.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "HR VA",
        native_options,
        Box::new(move |_creation_context| Ok(Box::new(app))),
    )?;

    Ok(())
}
