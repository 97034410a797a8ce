use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::geometry::{FitMode, Orientation, PageSize};
use crate::orchestrator::Orchestrator;
use crate::pdf::RgbColor;
use crate::strategies::{
    CollageOptions, ConversionRequest, ConversionResult, ConvertOptions, DocumentClass, Payload,
    StrategyKind,
};

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub config: Config,
    pub started: Instant,
}

/// Everything a multipart form can carry: uploaded files plus the option
/// fields shared by all conversion endpoints.
struct ParsedUpload {
    files: Vec<(String, Bytes)>,
    options: ConvertOptions,
    collage: CollageOptions,
}

async fn parse_multipart(mut multipart: Multipart, config: &Config) -> Result<ParsedUpload> {
    let mut files: Vec<(String, Bytes)> = Vec::new();
    let mut options = ConvertOptions {
        enable_fallback: config.enable_fallback,
        ..Default::default()
    };
    let mut collage = CollageOptions::default();
    let mut explicit_stem = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ConvertError::Validation(format!("cannot parse multipart data: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" | "files" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(|e| {
                    ConvertError::Validation(format!("cannot read file data: {e}"))
                })?;
                info!("received {} ({} bytes)", file_name, data.len());
                files.push((file_name, data));
            }
            "fileName" => {
                options.file_name_stem = text(field).await?;
                explicit_stem = true;
            }
            "strategy" | "method" => {
                options.strategy = Some(StrategyKind::parse(&text(field).await?)?);
            }
            "enableFallback" => {
                let v = text(field).await?;
                options.enable_fallback = v != "false" && v != "0";
            }
            "pageSize" => options.page_size = PageSize::parse(&text(field).await?),
            "orientation" => options.orientation = Orientation::parse(&text(field).await?),
            "fit" => options.fit = FitMode::parse(&text(field).await?),
            "margin" => options.margin_pt = number(&name, &text(field).await?)?,
            "quality" => {
                options.quality_pct = number(&name, &text(field).await?)? as u8;
            }
            "columns" => collage.columns = number(&name, &text(field).await?)? as u32,
            "rows" => collage.rows = number(&name, &text(field).await?)? as u32,
            "spacing" => collage.spacing_pt = number(&name, &text(field).await?)?,
            "backgroundColor" => collage.background = RgbColor::from_hex(&text(field).await?),
            _ => {} // Ignore unknown fields.
        }
    }

    if !explicit_stem {
        if let Some((first, _)) = files.first() {
            let stem = first.rsplit_once('.').map(|(s, _)| s).unwrap_or(first);
            if !stem.is_empty() {
                options.file_name_stem = stem.to_string();
            }
        }
    }

    Ok(ParsedUpload {
        files,
        options,
        collage,
    })
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| ConvertError::Validation(format!("cannot read form field: {e}")))
}

fn number(name: &str, value: &str) -> Result<f32> {
    let n: f32 = value
        .trim()
        .parse()
        .map_err(|_| ConvertError::Validation(format!("field '{name}' is not a number")))?;
    Ok(n)
}

fn detect_class(file_name: &str) -> Result<DocumentClass> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xls" | "ods" => Ok(DocumentClass::Spreadsheet),
        "docx" | "doc" | "odt" => Ok(DocumentClass::WordDoc),
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" | "tif" | "webp" => Ok(DocumentClass::Image),
        _ => {
            let guessed = mime_guess::from_path(file_name).first_or_octet_stream();
            if guessed.type_() == mime::IMAGE {
                Ok(DocumentClass::Image)
            } else {
                Err(ConvertError::Validation(format!(
                    "unsupported file type: {file_name}"
                )))
            }
        }
    }
}

fn into_response(result: ConversionResult) -> Response {
    match result.outcome {
        Ok(conversion) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, conversion.mime_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", conversion.file_name),
                ),
                (
                    header::HeaderName::from_static("x-conversion-strategy"),
                    result.strategy_used.to_string(),
                ),
            ],
            conversion.bytes,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn convert_class(
    state: &AppState,
    multipart: Multipart,
    class: Option<DocumentClass>,
) -> Result<Response> {
    let upload = parse_multipart(multipart, &state.config).await?;
    if upload.files.is_empty() {
        return Err(ConvertError::Validation("no file provided".into()));
    }

    let class = match class {
        Some(class) => class,
        None => detect_class(&upload.files[0].0)?,
    };

    let mut files = upload.files;
    let payload = match class {
        DocumentClass::Image => Payload::Images(files.into_iter().map(|(_, data)| data).collect()),
        _ => Payload::Single(files.swap_remove(0).1),
    };

    let request = ConversionRequest {
        class,
        payload,
        options: upload.options,
    };
    Ok(into_response(state.orchestrator.convert_document(request).await))
}

pub async fn convert_file_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    convert_class(&state, multipart, None).await
}

pub async fn convert_excel_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    convert_class(&state, multipart, Some(DocumentClass::Spreadsheet)).await
}

pub async fn convert_word_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    convert_class(&state, multipart, Some(DocumentClass::WordDoc)).await
}

pub async fn convert_image_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    convert_class(&state, multipart, Some(DocumentClass::Image)).await
}

pub async fn collage_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    let upload = parse_multipart(multipart, &state.config).await?;
    if upload.files.is_empty() {
        return Err(ConvertError::Validation("no images provided".into()));
    }

    let mut options = upload.options;
    options.collage = Some(upload.collage);
    let images = upload.files.into_iter().map(|(_, data)| data).collect();

    Ok(into_response(
        state.orchestrator.create_collage(images, options).await,
    ))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "pdfpress",
        "uptime_secs": state.started.elapsed().as_secs(),
        "services": {
            "external_api": if state.config.external_api.is_some() {
                "configured"
            } else {
                "not-configured"
            },
        },
        "config": {
            "fallback_enabled": state.config.enable_fallback,
        },
    }))
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "stats": {
            "uptime_secs": state.started.elapsed().as_secs(),
            "conversions": state.orchestrator.stats().snapshot(),
        },
    }))
}

pub async fn info_handler() -> impl IntoResponse {
    Json(json!({
        "service": "pdfpress",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "convert": {
                "path": "/api/convert/file",
                "method": "POST",
                "description": "Convert a spreadsheet, word document, or image to PDF. \
                    The document class is detected from the file extension.",
                "content_type": "multipart/form-data",
                "fields": {
                    "file": "The file to convert (required)",
                    "fileName": "Output file name stem (optional)",
                    "strategy": "render-engine | external-api | layout-engine (optional)",
                    "enableFallback": "Boolean - retry with the alternate strategy on failure (optional)",
                    "pageSize": "A4 | A3 | Letter | Legal | Tabloid (optional)",
                    "orientation": "portrait | landscape (optional)",
                    "margin": "Page margin in points (optional)",
                    "fit": "contain | cover | fill (optional, images)",
                    "quality": "JPEG quality 1-100 (optional, images)"
                }
            },
            "excel": { "path": "/api/convert/excel-to-pdf", "method": "POST" },
            "word": { "path": "/api/convert/word-to-pdf", "method": "POST" },
            "images": { "path": "/api/convert/image-to-pdf", "method": "POST" },
            "collage": {
                "path": "/api/convert/images-collage",
                "method": "POST",
                "fields": {
                    "files": "Images to place (repeatable)",
                    "columns": "Grid columns (default 2)",
                    "rows": "Grid rows (default 2)",
                    "spacing": "Cell spacing in points (default 10)",
                    "backgroundColor": "#RRGGBB page background (default white)"
                }
            },
            "health": { "path": "/health", "method": "GET" },
            "stats": { "path": "/api/stats", "method": "GET" }
        }
    }))
}
