// Tauri IPC Commands
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tauri::{AppHandle, Manager, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};

use crate::capture::{self, CameraState, Facing, VideoConstraints};
use crate::config::AppConfig;
use crate::images::{self, read_uploads};
use crate::rotation::{self, Rotations};
use crate::state::{Collection, ConfirmPrompt, Picture, Plant, PlantBook, PlantId, SqliteKvStore};

#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

type CommandResult<T> = Result<T, CommandError>;

/// Everything the commands share, managed by Tauri
pub struct AppState {
    pub book: Mutex<PlantBook<SqliteKvStore>>,
    pub camera: CameraState,
    pub rotations: Mutex<Rotations>,
    pub config: AppConfig,
}

impl AppState {
    fn book(&self) -> MutexGuard<'_, PlantBook<SqliteKvStore>> {
        self.book.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rotations(&self) -> MutexGuard<'_, Rotations> {
        self.rotations.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every plant card is on screen; the selected one shows the camera instead
    fn resync_rotations(&self) {
        let (ids, selected) = {
            let book = self.book();
            (book.plants().ids(), book.selected())
        };
        self.rotations().sync(&ids, selected);
    }
}

/// Payload of the `rotation-tick` event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationTick {
    pub plant_id: PlantId,
    pub tick: u64,
}

/// Payload of the `store-write-failed` event
#[derive(Debug, Clone, Serialize)]
pub struct StoreWriteFailed {
    pub message: String,
}

/// OK/Cancel dialog in front of destructive actions
struct DialogPrompt<'a> {
    app: &'a AppHandle,
}

impl ConfirmPrompt for DialogPrompt<'_> {
    fn confirm(&self, message: &str) -> bool {
        self.app
            .dialog()
            .message(message)
            .title("Grow")
            .kind(MessageDialogKind::Warning)
            .buttons(MessageDialogButtons::OkCancel)
            .blocking_show()
    }
}

// ==================== PLANT COMMANDS ====================

#[tauri::command]
pub fn list_plants(state: State<'_, AppState>) -> CommandResult<Collection> {
    Ok(state.book().plants().clone())
}

#[tauri::command]
pub fn get_selected(state: State<'_, AppState>) -> CommandResult<Option<PlantId>> {
    Ok(state.book().selected())
}

#[tauri::command]
pub async fn create_plant(state: State<'_, AppState>, name: String) -> CommandResult<Plant> {
    let plant = state.book().create(&name)?;
    state.resync_rotations();
    Ok(plant)
}

/// Delete a plant after an OK/Cancel dialog. Returns false when cancelled.
#[tauri::command]
pub async fn delete_plant(app: AppHandle, id: PlantId) -> CommandResult<bool> {
    // The dialog blocks, keep it off the async workers and outside the lock
    let deleted = tauri::async_runtime::spawn_blocking(move || {
        let state = app.state::<AppState>();
        let deleted = PlantBook::delete_shared(&state.book, id, &DialogPrompt { app: &app });
        if matches!(deleted, Ok(true)) {
            state.resync_rotations();
        }
        deleted
    })
    .await??;

    Ok(deleted)
}

#[tauri::command]
pub async fn toggle_selection(
    state: State<'_, AppState>,
    id: PlantId,
) -> CommandResult<Option<PlantId>> {
    let selected = state.book().toggle_selection(id)?;
    state.resync_rotations();
    Ok(selected)
}

#[tauri::command]
pub fn last_picture(state: State<'_, AppState>, id: PlantId) -> CommandResult<Option<Picture>> {
    Ok(state.book().last_picture(id).cloned())
}

/// Picture the rotation currently shows for a plant
#[tauri::command]
pub fn current_picture(state: State<'_, AppState>, id: PlantId) -> CommandResult<Option<Picture>> {
    let tick = state.rotations().tick(id).unwrap_or(0);
    let book = state.book();
    let picture = book
        .plants()
        .find(id)
        .and_then(|plant| rotation::current_picture(&plant.pictures, tick))
        .cloned();
    Ok(picture)
}

// ==================== CAMERA COMMANDS ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCameraInput {
    pub is_mobile: bool,
    pub host: String,
}

/// Open the camera and tell the viewport which stream to request
#[tauri::command]
pub fn start_camera(
    state: State<'_, AppState>,
    input: StartCameraInput,
) -> CommandResult<VideoConstraints> {
    let constraints = VideoConstraints {
        facing: Facing::preferred(input.is_mobile, &input.host),
        ..state.config.camera
    };
    state.camera.start(constraints);
    Ok(constraints)
}

#[tauri::command]
pub fn stop_camera(state: State<'_, AppState>) -> CommandResult<()> {
    state.camera.stop();
    Ok(())
}

/// Latest viewport frame as a data URI, the way the webview screenshots it
#[tauri::command]
pub fn push_camera_frame(state: State<'_, AppState>, frame: String) -> CommandResult<()> {
    let bytes = images::decode_data_uri(&frame)?;
    state.camera.push_frame(bytes)?;
    Ok(())
}

/// Snap the selected plant. Returns `None` when there is nothing to capture.
#[tauri::command]
pub async fn take_picture(state: State<'_, AppState>) -> CommandResult<Option<Picture>> {
    let selected = state.book().selected();
    let Some(plant_id) = selected else {
        return Ok(None);
    };

    let camera = state.camera.active();
    let picture = capture::snapshot(camera.as_deref(), &state.config.pipeline)
        .await
        .map_err(|e| {
            log::warn!("Failed to process capture: {}", e);
            e
        })?;

    // The plant may have been deleted while the frame was processed
    if let Some(ref picture) = picture {
        state.book().append_picture(plant_id, picture.clone())?;
    }
    Ok(picture)
}

// ==================== UPLOAD COMMANDS ====================

#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    pub path: String,
    pub error: Option<String>,
}

/// Add picked image files to a plant, reporting each file separately
#[tauri::command]
pub async fn upload_pictures(
    state: State<'_, AppState>,
    plant_id: PlantId,
    paths: Vec<String>,
) -> CommandResult<Vec<UploadOutcome>> {
    if !state.book().plants().contains(plant_id) {
        return Err(CommandError {
            message: format!("Plant not found: {}", plant_id),
        });
    }

    let uploads = read_uploads(&paths, &state.config.pipeline).await;

    let mut book = state.book();
    let outcomes = uploads
        .into_iter()
        .map(|upload| {
            let error = match upload.result {
                Ok(picture) => book
                    .append_picture(plant_id, picture)
                    .err()
                    .map(|e| e.to_string()),
                Err(e) => Some(e.to_string()),
            };
            UploadOutcome {
                path: upload.path.to_string_lossy().to_string(),
                error,
            }
        })
        .collect();

    Ok(outcomes)
}
