//! Photo evidence pipeline.
//!
//! A photo goes through recompression, base64 encoding and upload to the image
//! host, and only then is its URL appended to the task. Files are handled one
//! at a time; a failure stops at that file and the task keeps what it had.

mod host;

pub use host::*;

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ColorType;

use crate::config::Config;
use crate::db::TaskStore;
use crate::errors::AppError;
use crate::models::{Identity, PhotoKind, Task, UpdateTaskRequest};
use crate::tasks::{load_task_for, UPDATE_ALERT};

pub const MAX_COMPLIANCE_PHOTOS: usize = 5;
pub const PHOTO_LIMIT_MESSAGE: &str = "Limite de 5 photos atteinte";
pub const UPLOAD_ALERT: &str = "Erreur lors de l'envoi de la photo";

const START_QUALITY: u8 = 80;
const MIN_QUALITY: u8 = 40;
const QUALITY_STEP: u8 = 10;

/// Bounds applied when recompressing a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    /// Longest side, in pixels
    pub max_dimension: u32,
    pub max_bytes: usize,
}

impl Default for Compression {
    fn default() -> Self {
        Self {
            max_dimension: 1600,
            max_bytes: 1024 * 1024,
        }
    }
}

impl From<&Config> for Compression {
    fn from(config: &Config) -> Self {
        Self {
            max_dimension: config.photo_max_dimension,
            max_bytes: config.photo_max_bytes,
        }
    }
}

/// Decode, downscale and re-encode as JPEG, lowering the quality until the
/// result fits `max_bytes` or the quality floor is reached.
pub fn compress(bytes: &[u8], settings: Compression) -> Result<Vec<u8>, AppError> {
    let decoded = image::load_from_memory(bytes)?;
    let longest = decoded.width().max(decoded.height());
    let resized = if longest > settings.max_dimension {
        decoded.resize(
            settings.max_dimension,
            settings.max_dimension,
            FilterType::Lanczos3,
        )
    } else {
        decoded
    };
    let rgb = resized.to_rgb8();

    let mut quality = START_QUALITY;
    loop {
        let mut encoded = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut encoded, quality).encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ColorType::Rgb8,
        )?;
        let encoded = encoded.into_inner();

        if encoded.len() <= settings.max_bytes || quality <= MIN_QUALITY {
            if encoded.len() > settings.max_bytes {
                tracing::warn!(
                    bytes = encoded.len(),
                    limit = settings.max_bytes,
                    "Photo still above size bound at lowest quality"
                );
            }
            tracing::debug!(
                width = rgb.width(),
                height = rgb.height(),
                quality,
                bytes = encoded.len(),
                "Photo recompressed"
            );
            return Ok(encoded);
        }
        quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
    }
}

/// Recompress off the async runtime and encode for the upload form.
pub async fn encode_for_upload(bytes: Vec<u8>, settings: Compression) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || compress(&bytes, settings).map(|jpeg| B64.encode(jpeg)))
        .await
        .map_err(|e| AppError::Internal(format!("Compression interrompue: {}", e)))?
}

/// Run one photo through the whole pipeline and return its hosted URL.
pub async fn upload_photo(
    host: &dyn ImageHost,
    bytes: Vec<u8>,
    settings: Compression,
) -> Result<String, AppError> {
    if bytes.is_empty() {
        return Err(AppError::Validation("Fichier photo vide".to_string()));
    }
    let encoded = encode_for_upload(bytes, settings).await?;
    host.upload(encoded).await
}

/// Upload photos staged before their task exists. Any failure aborts the batch.
pub async fn upload_staged(
    host: &dyn ImageHost,
    files: Vec<Vec<u8>>,
    settings: Compression,
) -> Result<Vec<String>, AppError> {
    let mut urls = Vec::with_capacity(files.len());
    for (index, bytes) in files.into_iter().enumerate() {
        let url = upload_photo(host, bytes, settings).await.map_err(|e| {
            tracing::error!(photo = index + 1, "{}: {}", UPLOAD_ALERT, e);
            e
        })?;
        urls.push(url);
    }
    Ok(urls)
}

fn ensure_allowed(identity: &Identity, kind: PhotoKind) -> Result<(), AppError> {
    if identity.can_manage_photos(kind) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Seuls l'administrateur et le VM gèrent les photos guide".to_string(),
        ))
    }
}

fn has_room(kind: PhotoKind, count: usize) -> bool {
    kind != PhotoKind::Compliance || count < MAX_COMPLIANCE_PHOTOS
}

/// Upload `files` in order and append each URL to the task's `kind` list.
///
/// Each file is written to the task as soon as it is hosted, so files before a
/// failure stay attached. The compliance limit is checked before any upload.
pub async fn attach_photos(
    store: &dyn TaskStore,
    host: &dyn ImageHost,
    identity: &Identity,
    task_id: &str,
    kind: PhotoKind,
    files: Vec<Vec<u8>>,
    settings: Compression,
) -> Result<Task, AppError> {
    ensure_allowed(identity, kind)?;
    if files.is_empty() {
        return Err(AppError::Validation("Aucune photo reçue".to_string()));
    }

    let task = load_task_for(store, identity, task_id).await?;
    let mut urls = task.photos(kind).to_vec();

    for bytes in files {
        if !has_room(kind, urls.len()) {
            tracing::info!(task_id, count = urls.len(), "Compliance photo limit reached");
            return Err(AppError::PhotoLimit(PHOTO_LIMIT_MESSAGE.to_string()));
        }

        let url = upload_photo(host, bytes, settings).await?;
        urls.push(url);
        store
            .update(task_id, &UpdateTaskRequest::photos(kind, urls.clone()))
            .await
            .map_err(|e| e.for_action(UPDATE_ALERT))?;
        tracing::info!(task_id, ?kind, count = urls.len(), "Photo attached");
    }

    load_task_for(store, identity, task_id).await
}

/// Remove one URL from the task's `kind` list. The hosted file is left alone.
pub async fn detach_photo(
    store: &dyn TaskStore,
    identity: &Identity,
    task_id: &str,
    kind: PhotoKind,
    url: &str,
) -> Result<Task, AppError> {
    ensure_allowed(identity, kind)?;
    let task = load_task_for(store, identity, task_id).await?;

    let mut urls = task.photos(kind).to_vec();
    let Some(position) = urls.iter().position(|u| u == url) else {
        return Err(AppError::NotFound("Photo introuvable sur cette tâche".to_string()));
    };
    urls.remove(position);

    store
        .update(task_id, &UpdateTaskRequest::photos(kind, urls))
        .await
        .map_err(|e| e.for_action(UPDATE_ALERT))?;
    tracing::info!(task_id, ?kind, "Photo detached");

    load_task_for(store, identity, task_id).await
}
