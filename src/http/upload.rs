//! Multipart upload intake for `POST /process`

use std::path::PathBuf;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::error::ServerError;
use crate::storage::{sanitize_file_name, ScratchDir, Storage};

pub const MAIN_FIELD: &str = "mainAudio";
pub const BACKGROUND_FIELD: &str = "backgroundAudios";
pub const METADATA_FIELD: &str = "backgroundAudioMetadata";

const MISSING_FILES: &str =
    "Please upload one main audio file and at least one background audio file.";

/// One file written to the request's scratch directory
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub path: PathBuf,
}

/// Everything a mix request uploaded. Files live as long as `scratch`.
#[derive(Debug)]
pub struct MixUpload {
    pub scratch: ScratchDir,
    pub main: UploadedFile,
    pub backgrounds: Vec<UploadedFile>,
    pub metadata: Option<String>,
}

/// Drain the multipart stream into a fresh scratch directory.
pub async fn read_mix_upload(
    mut multipart: Multipart,
    storage: &Storage,
    max_backgrounds: usize,
) -> Result<MixUpload, ServerError> {
    let scratch = storage.scratch_dir().await?;
    let mut main = None;
    let mut backgrounds = Vec::new();
    let mut metadata = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            MAIN_FIELD => {
                if main.is_some() {
                    return Err(ServerError::BadUpload(
                        "Only one main audio file may be uploaded.".into(),
                    ));
                }
                main = Some(save_field(field, &scratch, "main").await?);
            }
            BACKGROUND_FIELD => {
                if backgrounds.len() >= max_backgrounds {
                    return Err(ServerError::BadUpload(format!(
                        "At most {} background audio files may be uploaded.",
                        max_backgrounds
                    )));
                }
                let prefix = format!("bg{}", backgrounds.len());
                backgrounds.push(save_field(field, &scratch, &prefix).await?);
            }
            METADATA_FIELD => {
                metadata = Some(field.text().await.map_err(multipart_error)?);
            }
            other => {
                tracing::debug!(field = other, "ignoring unexpected form field");
            }
        }
    }

    let main = match main {
        Some(main) if !backgrounds.is_empty() => main,
        _ => return Err(ServerError::BadUpload(MISSING_FILES.into())),
    };

    tracing::debug!(
        dir = ?scratch.path(),
        main = %main.original_name,
        backgrounds = backgrounds.len(),
        has_metadata = metadata.is_some(),
        "upload received"
    );

    Ok(MixUpload {
        scratch,
        main,
        backgrounds,
        metadata,
    })
}

async fn save_field(
    mut field: Field<'_>,
    scratch: &ScratchDir,
    prefix: &str,
) -> Result<UploadedFile, ServerError> {
    let original_name = field.file_name().unwrap_or("upload").to_string();
    let path = scratch
        .path()
        .join(format!("{}-{}", prefix, sanitize_file_name(&original_name)));

    let mut file = tokio::fs::File::create(&path).await?;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(UploadedFile {
        original_name,
        path,
    })
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge
    } else {
        ServerError::BadUpload(e.body_text())
    }
}
