mod external_api;
mod layout_engine;
mod render_engine;

pub use external_api::ExternalApiStrategy;
pub use layout_engine::LayoutEngineStrategy;
pub use render_engine::RenderEngineStrategy;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{ConvertError, Result};
use crate::geometry::{FitMode, Orientation, PageSize};
use crate::pdf::RgbColor;

/// What kind of document a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentClass {
    Spreadsheet,
    WordDoc,
    Image,
}

/// One concrete conversion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    RenderEngine,
    ExternalApi,
    LayoutEngine,
}

impl StrategyKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "render-engine" | "render" | "browser" => Ok(StrategyKind::RenderEngine),
            "external-api" | "api" => Ok(StrategyKind::ExternalApi),
            "layout-engine" | "layout" => Ok(StrategyKind::LayoutEngine),
            other => Err(ConvertError::Validation(format!(
                "unknown strategy '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::RenderEngine => "render-engine",
            StrategyKind::ExternalApi => "external-api",
            StrategyKind::LayoutEngine => "layout-engine",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collage grid options; presence turns an image request into a collage.
#[derive(Debug, Clone, Copy)]
pub struct CollageOptions {
    pub columns: u32,
    pub rows: u32,
    pub spacing_pt: f32,
    pub background: RgbColor,
}

impl Default for CollageOptions {
    fn default() -> Self {
        Self {
            columns: 2,
            rows: 2,
            spacing_pt: 10.0,
            background: crate::pdf::WHITE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub file_name_stem: String,
    pub strategy: Option<StrategyKind>,
    pub enable_fallback: bool,
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub margin_pt: f32,
    pub fit: FitMode,
    pub quality_pct: u8,
    pub collage: Option<CollageOptions>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            file_name_stem: "document".into(),
            strategy: None,
            enable_fallback: true,
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            margin_pt: 20.0,
            fit: FitMode::Contain,
            quality_pct: 90,
            collage: None,
        }
    }
}

impl ConvertOptions {
    pub fn validate(&self) -> Result<()> {
        if self.margin_pt < 0.0 {
            return Err(ConvertError::Validation(format!(
                "margin must be non-negative, got {}",
                self.margin_pt
            )));
        }
        if !(1..=100).contains(&self.quality_pct) {
            return Err(ConvertError::Validation(format!(
                "quality must be 1-100, got {}",
                self.quality_pct
            )));
        }
        if let Some(c) = &self.collage {
            if c.columns < 1 || c.rows < 1 {
                return Err(ConvertError::Validation(
                    "collage columns and rows must be at least 1".into(),
                ));
            }
            if c.spacing_pt < 0.0 {
                return Err(ConvertError::Validation(
                    "collage spacing must be non-negative".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Request payload: word/spreadsheet classes carry one buffer, the image
/// class carries an ordered sequence.
#[derive(Debug, Clone)]
pub enum Payload {
    Single(Bytes),
    Images(Vec<Bytes>),
}

impl Payload {
    pub fn single(&self) -> Result<&Bytes> {
        match self {
            Payload::Single(b) => Ok(b),
            Payload::Images(_) => Err(ConvertError::Validation(
                "expected a single document buffer".into(),
            )),
        }
    }

    pub fn images(&self) -> Vec<Bytes> {
        match self {
            Payload::Single(b) => vec![b.clone()],
            Payload::Images(v) => v.clone(),
        }
    }
}

/// Immutable conversion request; owned by the call that created it.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub class: DocumentClass,
    pub payload: Payload,
    pub options: ConvertOptions,
}

/// Successful conversion output.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub page_count: usize,
}

/// Final per-request outcome: whichever attempt produced it, and either the
/// document or the error that ended the request.
#[derive(Debug)]
pub struct ConversionResult {
    pub strategy_used: StrategyKind,
    pub outcome: Result<Conversion>,
}

/// A conversion backend. Implementations must not leak subordinate processes
/// or temp files on any exit path.
#[async_trait]
pub trait ConvertStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn supports(&self, class: DocumentClass) -> bool;

    async fn convert(&self, request: &ConversionRequest) -> Result<Conversion>;
}

/// ASCII-safe file name stem, capped at 50 chars.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::new();
    let mut last_underscore = false;
    for ch in name.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '-' {
            last_underscore = false;
            ch
        } else if last_underscore {
            continue;
        } else {
            last_underscore = true;
            '_'
        };
        out.push(mapped);
        if out.len() >= 50 {
            break;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parsing_is_strict() {
        assert_eq!(
            StrategyKind::parse("render-engine").unwrap(),
            StrategyKind::RenderEngine
        );
        assert_eq!(
            StrategyKind::parse("API").unwrap(),
            StrategyKind::ExternalApi
        );
        assert!(StrategyKind::parse("fastest").is_err());
    }

    #[test]
    fn option_bounds_are_validated() {
        let mut opts = ConvertOptions::default();
        assert!(opts.validate().is_ok());

        opts.quality_pct = 0;
        assert!(opts.validate().is_err());
        opts.quality_pct = 101;
        assert!(opts.validate().is_err());
        opts.quality_pct = 90;

        opts.margin_pt = -1.0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("informe final (v2).xlsx"), "informe_final_v2_xlsx");
        assert_eq!(sanitize_file_name("///"), "document");
        assert!(sanitize_file_name(&"x".repeat(200)).len() <= 50);
    }
}
