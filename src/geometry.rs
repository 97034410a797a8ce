use crate::error::{ConvertError, Result};

/// Standard page sizes. Unknown inputs fall back to A4 rather than failing,
/// so page size parsing is lenient by contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageSize {
    A4,
    A3,
    Letter,
    Legal,
    Tabloid,
}

impl PageSize {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "a3" => PageSize::A3,
            "letter" => PageSize::Letter,
            "legal" => PageSize::Legal,
            "tabloid" => PageSize::Tabloid,
            _ => PageSize::A4,
        }
    }

    /// Portrait dimensions in points.
    fn base_dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Tabloid => (792.0, 1224.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("landscape") {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Scaling policy used to place a source image inside a bounding region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    #[default]
    Contain,
    Cover,
    Fill,
}

impl FitMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "cover" => FitMode::Cover,
            "fill" => FitMode::Fill,
            _ => FitMode::Contain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Page dimensions in points for a size/orientation pair. Landscape is the
/// 90-degree swap of the portrait pair.
pub fn page_dimensions(size: PageSize, orientation: Orientation) -> PageGeometry {
    let (w, h) = size.base_dimensions();
    match orientation {
        Orientation::Portrait => PageGeometry {
            width_pt: w,
            height_pt: h,
        },
        Orientation::Landscape => PageGeometry {
            width_pt: h,
            height_pt: w,
        },
    }
}

/// A placed rectangle in page coordinates (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scale a source rectangle into a bound according to the fit mode and
/// center it. The bound must be strictly positive on both axes.
pub fn fit_box(
    src_width: f32,
    src_height: f32,
    max_width: f32,
    max_height: f32,
    fit: FitMode,
) -> Result<LayoutBox> {
    if max_width <= 0.0 || max_height <= 0.0 {
        return Err(ConvertError::InvalidGeometry(format!(
            "bounding region is {max_width:.2}x{max_height:.2}pt"
        )));
    }
    if src_width <= 0.0 || src_height <= 0.0 {
        return Err(ConvertError::InvalidGeometry(format!(
            "source dimensions are {src_width:.2}x{src_height:.2}"
        )));
    }

    let aspect = src_width / src_height;
    let bound_aspect = max_width / max_height;

    let (width, height) = match fit {
        FitMode::Contain => {
            if aspect > bound_aspect {
                (max_width, max_width / aspect)
            } else {
                (max_height * aspect, max_height)
            }
        }
        FitMode::Cover => {
            if aspect > bound_aspect {
                (max_height * aspect, max_height)
            } else {
                (max_width, max_width / aspect)
            }
        }
        FitMode::Fill => (max_width, max_height),
    };

    Ok(LayoutBox {
        x: (max_width - width) / 2.0,
        y: (max_height - height) / 2.0,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: &[PageSize] = &[
        PageSize::A4,
        PageSize::A3,
        PageSize::Letter,
        PageSize::Legal,
        PageSize::Tabloid,
    ];

    #[test]
    fn landscape_swaps_portrait_for_every_size() {
        for &size in SIZES {
            let portrait = page_dimensions(size, Orientation::Portrait);
            let landscape = page_dimensions(size, Orientation::Landscape);
            assert_eq!(portrait.width_pt, landscape.height_pt);
            assert_eq!(portrait.height_pt, landscape.width_pt);
        }
    }

    #[test]
    fn unknown_page_size_falls_back_to_a4() {
        assert_eq!(PageSize::parse("B5"), PageSize::A4);
        assert_eq!(PageSize::parse(""), PageSize::A4);
        assert_eq!(PageSize::parse("tabloid"), PageSize::Tabloid);
    }

    #[test]
    fn contain_never_exceeds_bound_and_keeps_aspect() {
        let cases = [
            (400.0, 300.0, 200.0, 200.0),
            (300.0, 400.0, 200.0, 100.0),
            (1000.0, 10.0, 500.0, 500.0),
            (10.0, 1000.0, 120.0, 90.0),
        ];
        for (sw, sh, mw, mh) in cases {
            let b = fit_box(sw, sh, mw, mh, FitMode::Contain).unwrap();
            assert!(b.width <= mw + 1e-3);
            assert!(b.height <= mh + 1e-3);
            let src_aspect = sw / sh;
            let out_aspect = b.width / b.height;
            assert!((src_aspect - out_aspect).abs() < 1e-3);
        }
    }

    #[test]
    fn cover_meets_or_exceeds_bound() {
        let b = fit_box(400.0, 300.0, 200.0, 200.0, FitMode::Cover).unwrap();
        assert!(b.width >= 200.0 - 1e-3);
        assert!(b.height >= 200.0 - 1e-3);
        // Overflow is centered, so one offset goes negative.
        assert!(b.x < 0.0);
    }

    #[test]
    fn fill_returns_exact_bound() {
        let b = fit_box(123.0, 457.0, 200.0, 100.0, FitMode::Fill).unwrap();
        assert_eq!(b.width, 200.0);
        assert_eq!(b.height, 100.0);
        assert_eq!(b.x, 0.0);
        assert_eq!(b.y, 0.0);
    }

    #[test]
    fn contained_box_is_centered() {
        let b = fit_box(100.0, 100.0, 200.0, 100.0, FitMode::Contain).unwrap();
        assert_eq!(b.width, 100.0);
        assert_eq!(b.height, 100.0);
        assert_eq!(b.x, 50.0);
        assert_eq!(b.y, 0.0);
    }

    #[test]
    fn zero_area_bound_is_rejected() {
        assert!(fit_box(100.0, 100.0, 0.0, 50.0, FitMode::Contain).is_err());
        assert!(fit_box(100.0, 100.0, 50.0, -1.0, FitMode::Fill).is_err());
    }
}
