use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use tokio_util::io::ReaderStream;
use tracing::instrument;
use uuid::Uuid;

use crate::document::{DocumentError, DocumentType, OwnerType, ValidationError};
use crate::error::{AppError, ErrorBody};
use crate::models::document::DocumentResponse;
use crate::state::AppState;
use crate::utils::filename::content_disposition_value;

/// Multipart framing allowance on top of the configured maximum file size.
const MULTIPART_OVERHEAD: usize = 1024;

pub fn document_body_limit(max_upload_size: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_upload_size + MULTIPART_OVERHEAD)
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Documents",
    operation_id = "uploadDocument",
    summary = "Upload a document",
    description = "Stores the `file` field and creates the document record. Required text fields: \
        `owner_type` (employee or dependent), `owner_id` (UUID) and `type` \
        (BI, Contrato, Diploma, Foto or Outro). If the record cannot be written the stored \
        file is removed again.",
    request_body(content_type = "multipart/form-data", description = "owner_type, owner_id, type and file"),
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 500, description = "Database failure (METADATA_ERROR)", body = ErrorBody),
        (status = 502, description = "Storage failure (STORAGE_ERROR)", body = ErrorBody),
        (status = 504, description = "Deadline exceeded (TIMEOUT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_size = state.documents.policy().max_size();

    let mut owner_type: Option<String> = None;
    let mut owner_id: Option<String> = None;
    let mut document_type: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("owner_type") => owner_type = Some(read_text(field).await?),
            Some("owner_id") => owner_id = Some(read_text(field).await?),
            Some("type") => document_type = Some(read_text(field).await?),
            Some("file") => file = Some(read_file(field, max_size).await?),
            _ => {} // Ignore unknown fields.
        }
    }

    let owner_type: OwnerType = required(owner_type, "owner_type")?
        .parse()
        .map_err(DocumentError::from)?;
    let raw_owner_id = required(owner_id, "owner_id")?;
    let owner_id = Uuid::parse_str(raw_owner_id.trim())
        .map_err(|_| DocumentError::from(ValidationError::OwnerId(raw_owner_id.clone())))?;
    let document_type: DocumentType = required(document_type, "type")?
        .parse()
        .map_err(DocumentError::from)?;
    let (file_name, content) = required(file, "file")?;

    let record = state
        .documents
        .upload(owner_type, owner_id, document_type, &file_name, &content)
        .await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(record))))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Documents",
    operation_id = "getDocument",
    summary = "Get document metadata",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    responses(
        (status = 200, description = "Document found", body = DocumentResponse),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let id = parse_document_id(&id)?;
    let record = state.documents.find(id).await?;
    Ok(Json(DocumentResponse::from(record)))
}

#[utoipa::path(
    get,
    path = "/{id}/download",
    tag = "Documents",
    operation_id = "downloadDocument",
    summary = "Download document content",
    description = "Streams the stored file as an attachment.",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    responses(
        (status = 200, description = "File content"),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Document or its file not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Storage failure (STORAGE_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_document_id(&id)?;
    let (record, reader) = state.documents.open(id).await?;

    let content_type = mime_guess::from_path(&record.file_name).first_or_octet_stream();
    let body = Body::from_stream(ReaderStream::new(reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&record.file_name),
        )
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

#[utoipa::path(
    put,
    path = "/{id}/file",
    tag = "Documents",
    operation_id = "replaceDocumentFile",
    summary = "Replace a document's file",
    description = "Uploads the `file` field under a new key, repoints the record and removes the \
        previous file. On failure the record and the previous file are left as they were.",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    request_body(content_type = "multipart/form-data", description = "file"),
    responses(
        (status = 200, description = "Document updated", body = DocumentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 500, description = "Database failure (METADATA_ERROR)", body = ErrorBody),
        (status = 502, description = "Storage failure (STORAGE_ERROR)", body = ErrorBody),
        (status = 504, description = "Deadline exceeded (TIMEOUT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn replace_document_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DocumentResponse>, AppError> {
    let id = parse_document_id(&id)?;
    let max_size = state.documents.policy().max_size();

    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            file = Some(read_file(field, max_size).await?);
        }
    }
    let (file_name, content) = required(file, "file")?;

    let record = state.documents.replace(id, &file_name, &content).await?;
    Ok(Json(DocumentResponse::from(record)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Documents",
    operation_id = "deleteDocument",
    summary = "Delete a document",
    description = "Removes the stored file and the record together. If the record cannot be \
        removed the file is restored.",
    params(("id" = String, Path, description = "Document ID (UUID)")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Database failure (METADATA_ERROR)", body = ErrorBody),
        (status = 502, description = "Storage failure (STORAGE_ERROR)", body = ErrorBody),
        (status = 504, description = "Deadline exceeded (TIMEOUT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_document_id(&id)?;
    state.documents.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_document_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid document ID".into()))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("Missing '{field}' field")))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("Request body too large: {err}"))
    } else {
        AppError::Validation(format!("Multipart error: {err}"))
    }
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(multipart_error)
}

/// Buffer a file field, rejecting it as soon as it grows past `max_size`.
async fn read_file(mut field: Field<'_>, max_size: usize) -> Result<(String, Vec<u8>), AppError> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;

    let mut content = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if content.len() + chunk.len() > max_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds maximum size of {max_size} bytes"
            )));
        }
        content.extend_from_slice(&chunk);
    }

    Ok((file_name, content))
}
