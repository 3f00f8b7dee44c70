use std::sync::{Arc, Mutex};

pub mod api;
pub mod config;
pub mod flashcards;
pub mod html_sanitizer;
pub mod session;

use anyhow::Context;

use config::AppConfig;
use flashcards::FlashcardStorage;

/// Open the configured database, seeding sample cards into an empty one
pub fn open_storage(config: &AppConfig) -> anyhow::Result<Arc<Mutex<FlashcardStorage>>> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }

    let storage = FlashcardStorage::open(&config.db_path)
        .with_context(|| format!("Failed to open database {:?}", config.db_path))?;
    if config.seed_sample_data {
        storage
            .seed_if_empty()
            .context("Failed to seed sample cards")?;
    }

    Ok(Arc::new(Mutex::new(storage)))
}

/// Serve the API until ctrl-c
pub async fn serve(
    config: &AppConfig,
    storage: Arc<Mutex<FlashcardStorage>>,
) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;

    let mut server = api::start_server(addr, storage, config.public_dir.as_deref())
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    println!("Flashcards API running on {}", server.base_url());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    server.stop();
    Ok(())
}

#[cfg(not(feature = "desktop"))]
pub fn run() {
    env_logger::init();

    let result = AppConfig::load(None)
        .and_then(AppConfig::with_env)
        .map_err(anyhow::Error::from)
        .and_then(|config| {
            let storage = open_storage(&config)?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(serve(&config, storage))
        });

    if let Err(e) = result {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::{Manager, WebviewUrl, WebviewWindowBuilder};

    tauri::Builder::default()
        .setup(|app| {
            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }

            let config = AppConfig::load(None)?.with_env()?;
            let storage = open_storage(&config)?;
            let addr = config.bind_addr()?;
            let public_dir = config.public_dir.clone();

            // The window loads the front end from the embedded API server
            let server = tauri::async_runtime::block_on(async move {
                api::start_server(addr, storage, public_dir.as_deref()).await
            })?;
            let url = server.base_url().parse()?;
            log::info!("Desktop shell using API at {}", server.base_url());

            WebviewWindowBuilder::new(app, "main", WebviewUrl::External(url))
                .title("Flashcards Anywhere")
                .inner_size(900.0, 700.0)
                .build()?;

            app.manage(Mutex::new(server));
            Ok(())
        })
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::Destroyed = event {
                if let Some(server) = window.try_state::<Mutex<api::ApiServer>>() {
                    if let Ok(mut server) = server.lock() {
                        server.stop();
                    }
                }
            }
        })
        .run(tauri::generate_context!())
        .unwrap_or_else(|e| {
            log::error!("Error while running tauri application: {}", e);
            std::process::exit(1);
        });
}
