//! PDF page construction for the layout-engine strategy, plus the raster
//! preparation shared with the external-API strategy.

use std::io::Cursor;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use printpdf::{
    Color, LinePoint, Op, PaintMode, PdfDocument, PdfPage, PdfSaveOptions, Point, Polygon,
    PolygonRing, Pt, RawImage, RawImageData, RawImageFormat, Rgb, WindingOrder, XObjectTransform,
};

use crate::error::{ConvertError, Result};
use crate::geometry::{LayoutBox, PageGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const WHITE: RgbColor = RgbColor {
    r: 255,
    g: 255,
    b: 255,
};

impl RgbColor {
    /// "#RRGGBB" (leading '#' optional). Anything else comes back white,
    /// matching the lenient option parsing elsewhere.
    pub fn from_hex(hex: &str) -> Self {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return WHITE;
        }
        let parse = |r: std::ops::Range<usize>| u8::from_str_radix(&hex[r], 16);
        match (parse(0..2), parse(2..4), parse(4..6)) {
            (Ok(r), Ok(g), Ok(b)) => RgbColor { r, g, b },
            _ => WHITE,
        }
    }
}

/// A decoded raster with its EXIF rotation already applied, so the reported
/// dimensions are the ones layout math must use.
#[derive(Debug)]
pub struct PreparedImage {
    pub image: DynamicImage,
    pub width: f32,
    pub height: f32,
}

pub fn prepare_image(data: &[u8]) -> Result<PreparedImage> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ConvertError::PartialItemFailure(format!("unrecognized image data: {e}")))?;

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| ConvertError::PartialItemFailure(format!("cannot decode image: {e}")))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder)
        .map_err(|e| ConvertError::PartialItemFailure(format!("cannot decode image: {e}")))?;
    image.apply_orientation(orientation);

    let width = image.width() as f32;
    let height = image.height() as f32;
    Ok(PreparedImage {
        image,
        width,
        height,
    })
}

/// Re-encode for upload to the external API, which takes JPEG.
pub fn encode_jpeg(prepared: &PreparedImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    DynamicImage::ImageRgb8(prepared.image.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| ConvertError::PartialItemFailure(format!("jpeg encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// One output page: geometry, optional background fill, and the images to
/// draw (index into the prepared-image slice plus target box).
pub struct ImagePage {
    pub geometry: PageGeometry,
    pub background: Option<RgbColor>,
    pub placements: Vec<(usize, LayoutBox)>,
}

/// Assemble the final document. Each prepared image is embedded once even if
/// referenced from several placements.
pub fn build_image_pdf(title: &str, images: &[PreparedImage], pages: &[ImagePage]) -> Vec<u8> {
    let mut doc = PdfDocument::new(title);

    let image_ids: Vec<_> = images
        .iter()
        .map(|prepared| {
            let rgb = prepared.image.to_rgb8();
            let raw = RawImage {
                width: rgb.width() as usize,
                height: rgb.height() as usize,
                data_format: RawImageFormat::RGB8,
                pixels: RawImageData::U8(rgb.into_raw()),
                tag: Vec::new(),
            };
            doc.add_image(&raw)
        })
        .collect();

    for page in pages {
        let mut ops = Vec::new();

        if let Some(bg) = page.background {
            ops.push(Op::SetFillColor {
                col: Color::Rgb(Rgb {
                    r: bg.r as f32 / 255.0,
                    g: bg.g as f32 / 255.0,
                    b: bg.b as f32 / 255.0,
                    icc_profile: None,
                }),
            });
            ops.push(full_page_rect(page.geometry));
        }

        for &(image_index, rect) in &page.placements {
            let prepared = &images[image_index];
            ops.push(Op::UseXobject {
                id: image_ids[image_index].clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(rect.x)),
                    translate_y: Some(Pt(rect.y)),
                    rotate: None,
                    // At 72 dpi one pixel is one point, so the scale factors
                    // map pixel size directly onto the layout box.
                    scale_x: Some(rect.width / prepared.width),
                    scale_y: Some(rect.height / prepared.height),
                    dpi: Some(72.0),
                },
            });
        }

        doc.pages.push(PdfPage::new(
            Pt(page.geometry.width_pt).into(),
            Pt(page.geometry.height_pt).into(),
            ops,
        ));
    }

    let mut warnings = Vec::new();
    doc.save(&PdfSaveOptions::default(), &mut warnings)
}

fn full_page_rect(geometry: PageGeometry) -> Op {
    let corners = [
        (0.0, 0.0),
        (geometry.width_pt, 0.0),
        (geometry.width_pt, geometry.height_pt),
        (0.0, geometry.height_pt),
    ];
    Op::DrawPolygon {
        polygon: Polygon {
            rings: vec![PolygonRing {
                points: corners
                    .iter()
                    .map(|&(x, y)| LinePoint {
                        p: Point { x: Pt(x), y: Pt(y) },
                        bezier: false,
                    })
                    .collect(),
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        },
    }
}

/// Page count of a finished PDF, for backends that hand us opaque bytes.
pub fn page_count(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes)
        .map(|doc| doc.get_pages().len().max(1))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{page_dimensions, Orientation as PageOrientation, PageSize};

    fn prepared(width: u32, height: u32) -> PreparedImage {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([200, 10, 10]),
        ));
        PreparedImage {
            width: img.width() as f32,
            height: img.height() as f32,
            image: img,
        }
    }

    #[test]
    fn hex_colors_parse_and_fall_back_to_white() {
        assert_eq!(
            RgbColor::from_hex("#336699"),
            RgbColor {
                r: 0x33,
                g: 0x66,
                b: 0x99
            }
        );
        assert_eq!(RgbColor::from_hex("336699"), RgbColor::from_hex("#336699"));
        assert_eq!(RgbColor::from_hex("nope"), WHITE);
    }

    #[test]
    fn builds_a_parseable_pdf_with_expected_page_count() {
        let geometry = page_dimensions(PageSize::A4, PageOrientation::Portrait);
        let images = vec![prepared(4, 4), prepared(8, 2)];
        let pages: Vec<ImagePage> = (0..2)
            .map(|i| ImagePage {
                geometry,
                background: Some(WHITE),
                placements: vec![(
                    i,
                    LayoutBox {
                        x: 20.0,
                        y: 20.0,
                        width: 100.0,
                        height: 100.0,
                    },
                )],
            })
            .collect();

        let bytes = build_image_pdf("test", &images, &pages);
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(page_count(&bytes), 2);
    }

    #[test]
    fn prepare_image_reports_pixel_dimensions() {
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image::RgbImage::new(6, 3))
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        let prepared = prepare_image(png.get_ref()).unwrap();
        assert_eq!(prepared.width, 6.0);
        assert_eq!(prepared.height, 3.0);
    }

    #[test]
    fn garbage_bytes_are_a_partial_item_failure() {
        let err = prepare_image(b"not an image").unwrap_err();
        assert_eq!(err.kind(), "PartialItemFailure");
    }
}
