// Grow - Plant Photo Journal
// Module declarations

pub mod capture;
pub mod config;
pub mod images;
pub mod rotation;
pub mod state;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Mutex;
    use tauri::{Emitter, Manager};

    use crate::capture::CameraState;
    use crate::config::AppConfig;
    use crate::rotation::Rotations;
    use crate::state::{PlantBook, PlantId, SqliteKvStore, StoreError};
    use commands::{AppState, RotationTick, StoreWriteFailed};

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }

            let data_dir = state::storage::get_app_data_dir()?;
            let config = AppConfig::load(&data_dir).map_err(|e| {
                log::error!("Failed to load config: {}", e);
                e
            })?;

            let db = state::init_db(&config.store_name).map_err(|e| {
                log::error!("Failed to initialize store: {}", e);
                e
            })?;

            let write_events = app.handle().clone();
            let on_write_error = move |e: &StoreError| {
                let payload = StoreWriteFailed {
                    message: e.to_string(),
                };
                if let Err(emit_error) = write_events.emit("store-write-failed", payload) {
                    log::error!("Failed to report store write error: {}", emit_error);
                }
            };

            let tick_events = app.handle().clone();
            let on_tick = move |plant_id: PlantId, tick: u64| {
                if let Err(e) = tick_events.emit("rotation-tick", RotationTick { plant_id, tick }) {
                    log::debug!("Failed to emit rotation tick for {}: {}", plant_id, e);
                }
            };

            // Both spawn tasks, so they start inside the runtime
            let period = config.rotation_interval();
            let (book, rotations) = tauri::async_runtime::block_on(async move {
                let book = PlantBook::open(SqliteKvStore::new(db), on_write_error).await;
                let mut rotations = Rotations::new(period, on_tick);
                rotations.sync(&book.plants().ids(), book.selected());
                (book, rotations)
            });

            app.manage(AppState {
                book: Mutex::new(book),
                camera: CameraState::new(),
                rotations: Mutex::new(rotations),
                config,
            });

            log::info!("Grow initialized successfully");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::list_plants,
            commands::get_selected,
            commands::create_plant,
            commands::delete_plant,
            commands::toggle_selection,
            commands::last_picture,
            commands::current_picture,
            commands::start_camera,
            commands::stop_camera,
            commands::push_camera_frame,
            commands::take_picture,
            commands::upload_pictures,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let tauri::RunEvent::Exit = event {
                // Let the last queued save land before the process goes away
                let state = app.state::<AppState>();
                state.camera.stop();
                let book = state.book.lock().unwrap_or_else(|e| e.into_inner());
                tauri::async_runtime::block_on(book.record_store().flush());
            }
        });
}
