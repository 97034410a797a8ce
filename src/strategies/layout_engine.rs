use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, warn};

use super::{
    sanitize_file_name, Conversion, ConversionRequest, ConvertOptions, ConvertStrategy,
    DocumentClass, StrategyKind,
};
use crate::error::{ConvertError, Result};
use crate::geometry::page_dimensions;
use crate::layout::{layout_collage, layout_sequence, CollageGrid};
use crate::pdf::{build_image_pdf, prepare_image, ImagePage, PreparedImage};

/// Builds PDF pages directly from layout math, without any subordinate
/// process. Handles the image class only.
pub struct LayoutEngineStrategy;

impl LayoutEngineStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Decode every buffer, skipping the ones that fail. The request only
    /// fails when nothing decodes.
    fn decode_all(images: &[Bytes]) -> Result<Vec<PreparedImage>> {
        let mut prepared = Vec::with_capacity(images.len());
        let mut last_error = None;
        for (i, data) in images.iter().enumerate() {
            match prepare_image(data) {
                Ok(p) => prepared.push(p),
                Err(e) => {
                    warn!("skipping image {} of {}: {}", i + 1, images.len(), e);
                    last_error = Some(e);
                }
            }
        }
        if prepared.is_empty() {
            return Err(match last_error {
                Some(e) if images.len() == 1 => e,
                _ => ConvertError::PartialItemFailure(format!(
                    "none of the {} image(s) could be decoded",
                    images.len()
                )),
            });
        }
        Ok(prepared)
    }

    fn build_sequence(images: Vec<Bytes>, options: ConvertOptions) -> Result<Conversion> {
        let prepared = Self::decode_all(&images)?;
        let geometry = page_dimensions(options.page_size, options.orientation);

        let dims: Vec<(f32, f32)> = prepared.iter().map(|p| (p.width, p.height)).collect();
        let boxes = layout_sequence(&dims, geometry, options.margin_pt, options.fit)?;

        let pages: Vec<ImagePage> = boxes
            .into_iter()
            .enumerate()
            .map(|(i, rect)| ImagePage {
                geometry,
                background: None,
                placements: vec![(i, rect)],
            })
            .collect();

        let stem = sanitize_file_name(&options.file_name_stem);
        let bytes = build_image_pdf(&stem, &prepared, &pages);
        let page_count = pages.len();
        info!("placed {page_count} of {} image(s)", images.len());

        Ok(Conversion {
            bytes,
            file_name: format!("{stem}.pdf"),
            mime_type: mime::APPLICATION_PDF.to_string(),
            page_count,
        })
    }

    fn build_collage(images: Vec<Bytes>, options: ConvertOptions) -> Result<Conversion> {
        let collage = options.collage.unwrap_or_default();
        let geometry = page_dimensions(options.page_size, options.orientation);

        // Grid validation happens before any image is touched.
        let grid = CollageGrid::new(
            collage.columns,
            collage.rows,
            collage.spacing_pt,
            geometry,
            options.margin_pt,
        )?;

        let prepared = Self::decode_all(&images)?;
        let dims: Vec<(f32, f32)> = prepared.iter().map(|p| (p.width, p.height)).collect();
        let placements = layout_collage(&dims, grid, geometry, options.margin_pt)?;

        let mut pages: Vec<ImagePage> = (0..grid.page_count(prepared.len()))
            .map(|_| ImagePage {
                geometry,
                background: Some(collage.background),
                placements: Vec::new(),
            })
            .collect();
        for p in placements {
            pages[p.page_index].placements.push((p.image_index, p.rect));
        }

        let stem = sanitize_file_name(&options.file_name_stem);
        let bytes = build_image_pdf(&stem, &prepared, &pages);
        let page_count = pages.len();

        Ok(Conversion {
            bytes,
            file_name: format!("{stem}.pdf"),
            mime_type: mime::APPLICATION_PDF.to_string(),
            page_count,
        })
    }
}

impl Default for LayoutEngineStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConvertStrategy for LayoutEngineStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LayoutEngine
    }

    fn supports(&self, class: DocumentClass) -> bool {
        class == DocumentClass::Image
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<Conversion> {
        if request.class != DocumentClass::Image {
            return Err(ConvertError::Validation(
                "layout engine only handles images".into(),
            ));
        }
        let images = request.payload.images();
        if images.is_empty() {
            return Err(ConvertError::Validation("no images provided".into()));
        }
        let options = request.options.clone();

        // Decoding and PDF assembly are CPU-bound.
        tokio::task::spawn_blocking(move || {
            if options.collage.is_some() {
                Self::build_collage(images, options)
            } else {
                Self::build_sequence(images, options)
            }
        })
        .await
        .map_err(|e| ConvertError::StrategyExecution(format!("layout task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FitMode, Orientation, PageSize};
    use crate::pdf::page_count;
    use crate::strategies::{CollageOptions, Payload};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Bytes {
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        Bytes::from(buf.into_inner())
    }

    fn image_request(payload: Payload, options: ConvertOptions) -> ConversionRequest {
        ConversionRequest {
            class: DocumentClass::Image,
            payload,
            options,
        }
    }

    #[tokio::test]
    async fn one_page_per_image() {
        let strategy = LayoutEngineStrategy::new();
        let request = image_request(
            Payload::Images(vec![png(40, 20), png(20, 40), png(10, 10)]),
            ConvertOptions::default(),
        );
        let conversion = strategy.convert(&request).await.unwrap();
        assert_eq!(conversion.page_count, 3);
        assert_eq!(page_count(&conversion.bytes), 3);
        assert_eq!(conversion.mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn undecodable_images_are_skipped_not_fatal() {
        let strategy = LayoutEngineStrategy::new();
        let request = image_request(
            Payload::Images(vec![png(8, 8), Bytes::from_static(b"garbage")]),
            ConvertOptions::default(),
        );
        let conversion = strategy.convert(&request).await.unwrap();
        assert_eq!(conversion.page_count, 1);
    }

    #[tokio::test]
    async fn all_images_failing_is_fatal() {
        let strategy = LayoutEngineStrategy::new();
        let request = image_request(
            Payload::Images(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]),
            ConvertOptions::default(),
        );
        let err = strategy.convert(&request).await.unwrap_err();
        assert_eq!(err.kind(), "PartialItemFailure");
    }

    #[tokio::test]
    async fn collage_of_five_in_two_by_two_spans_two_pages() {
        let strategy = LayoutEngineStrategy::new();
        let options = ConvertOptions {
            collage: Some(CollageOptions::default()),
            ..Default::default()
        };
        let request = image_request(Payload::Images(vec![png(16, 16); 5]), options);
        let conversion = strategy.convert(&request).await.unwrap();
        assert_eq!(conversion.page_count, 2);
        assert_eq!(page_count(&conversion.bytes), 2);
    }

    #[tokio::test]
    async fn impossible_collage_grid_fails_before_decoding() {
        let strategy = LayoutEngineStrategy::new();
        let options = ConvertOptions {
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            margin_pt: 50.0,
            fit: FitMode::Contain,
            collage: Some(CollageOptions {
                columns: 12,
                rows: 2,
                spacing_pt: 50.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        // Garbage payload proves decoding never starts: the geometry error
        // must win over any decode error.
        let request = image_request(Payload::Images(vec![Bytes::from_static(b"junk")]), options);
        let err = strategy.convert(&request).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidGeometry");
    }

    #[tokio::test]
    async fn wrong_class_is_rejected() {
        let strategy = LayoutEngineStrategy::new();
        let request = ConversionRequest {
            class: DocumentClass::WordDoc,
            payload: Payload::Single(Bytes::from_static(b"doc")),
            options: ConvertOptions::default(),
        };
        let err = strategy.convert(&request).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }
}
