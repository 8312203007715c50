use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::IntoResponse,
};
use tokio::fs;

use crate::{
    assets::{
        has_extension, Glasses, ModelFile, OutfitImage, IMAGE_EXTENSIONS, MODEL_EXTENSIONS,
        TRY_ON_MODES,
    },
    config::settings::Settings,
    error::AppError,
    response::ApiResponse,
};

const GLASSES_COUNT: u32 = 7;

/// Scheme and host the client used, for building asset URLs.
fn base_url(headers: &HeaderMap, settings: &Settings) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("localhost:{}", settings.port));
    format!("http://{}", host)
}

fn io_error(err: std::io::Error) -> AppError {
    tracing::error!("Asset directory read failed: {}", err);
    AppError::InternalServerError
}

async fn is_dir(path: &FsPath) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

/// Outfit images for one try-on mode
/// GET /outfits/:try_on_mode
pub async fn list_outfits(
    State(settings): State<Settings>,
    headers: HeaderMap,
    Path(try_on_mode): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !TRY_ON_MODES.contains(&try_on_mode.as_str()) {
        return Err(AppError::BadRequest("Invalid tryOnMode".to_string()));
    }

    let dir = FsPath::new(&settings.outfits_dir).join(&try_on_mode);
    if !is_dir(&dir).await {
        return Err(AppError::NotFound(format!(
            "Directory for '{}' not found",
            try_on_mode
        )));
    }

    let base = base_url(&headers, &settings);
    let mut images = Vec::new();
    let mut entries = fs::read_dir(&dir).await.map_err(io_error)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        if is_file && has_extension(&name, &IMAGE_EXTENSIONS) {
            images.push(OutfitImage {
                url: format!("{}/outfits/{}/{}", base, try_on_mode, name),
                name,
            });
        }
    }
    images.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(ApiResponse::success(images))
}

/// Every model file under the models directory, sorted by path
/// GET /models
pub async fn list_models(
    State(settings): State<Settings>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let root = PathBuf::from(&settings.models_dir);
    let base = base_url(&headers, &settings);
    let mut models = Vec::new();

    if !is_dir(&root).await {
        return Ok(ApiResponse::success(models));
    }

    let mut pending: Vec<(PathBuf, String)> = vec![(root, String::new())];
    while let Some((dir, prefix)) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            let file_type = entry.file_type().await.map_err(io_error)?;
            if file_type.is_dir() {
                pending.push((entry.path(), relative));
            } else if file_type.is_file() && has_extension(&name, &MODEL_EXTENSIONS) {
                models.push(ModelFile {
                    url: format!("{}/models/{}", base, relative),
                    path: relative,
                    name,
                });
            }
        }
    }
    models.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(ApiResponse::success(models))
}

/// GET /glasses
pub async fn list_glasses(
    State(settings): State<Settings>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let base = base_url(&headers, &settings);
    let glasses: Vec<Glasses> = (1..=GLASSES_COUNT)
        .map(|id| Glasses::catalog_entry(id, &base))
        .collect();

    ApiResponse::success(glasses)
}
