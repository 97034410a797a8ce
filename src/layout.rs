//! Placement math for raster images on PDF pages: one image per page, and
//! N-by-M collage grids. All coordinates are points with the origin at the
//! bottom-left of the page.

use crate::error::{ConvertError, Result};
use crate::geometry::{fit_box, FitMode, LayoutBox, PageGeometry};

/// Place one image on its own page. The printable area is the page minus the
/// margin on every side; the fitted box is offset back into page coordinates.
pub fn layout_single_page(
    img_width: f32,
    img_height: f32,
    page: PageGeometry,
    margin_pt: f32,
    fit: FitMode,
) -> Result<LayoutBox> {
    let max_width = page.width_pt - 2.0 * margin_pt;
    let max_height = page.height_pt - 2.0 * margin_pt;
    let fitted = fit_box(img_width, img_height, max_width, max_height, fit)?;
    Ok(LayoutBox {
        x: fitted.x + margin_pt,
        y: fitted.y + margin_pt,
        ..fitted
    })
}

/// One page per image, each laid out independently.
pub fn layout_sequence(
    dims: &[(f32, f32)],
    page: PageGeometry,
    margin_pt: f32,
    fit: FitMode,
) -> Result<Vec<LayoutBox>> {
    dims.iter()
        .map(|&(w, h)| layout_single_page(w, h, page, margin_pt, fit))
        .collect()
}

/// Collage grid geometry, validated before any image is decoded.
#[derive(Debug, Clone, Copy)]
pub struct CollageGrid {
    pub columns: u32,
    pub rows: u32,
    pub spacing_pt: f32,
    pub cell_width: f32,
    pub cell_height: f32,
}

impl CollageGrid {
    pub fn new(
        columns: u32,
        rows: u32,
        spacing_pt: f32,
        page: PageGeometry,
        margin_pt: f32,
    ) -> Result<Self> {
        if columns < 1 || rows < 1 {
            return Err(ConvertError::Validation(format!(
                "collage grid must be at least 1x1, got {columns}x{rows}"
            )));
        }

        let cell_width =
            (page.width_pt - 2.0 * margin_pt - spacing_pt * (columns - 1) as f32) / columns as f32;
        let cell_height =
            (page.height_pt - 2.0 * margin_pt - spacing_pt * (rows - 1) as f32) / rows as f32;

        if cell_width <= 0.0 || cell_height <= 0.0 {
            return Err(ConvertError::InvalidGeometry(format!(
                "{columns}x{rows} grid with {spacing_pt}pt spacing and {margin_pt}pt margin \
                 leaves a {cell_width:.2}x{cell_height:.2}pt cell"
            )));
        }

        Ok(Self {
            columns,
            rows,
            spacing_pt,
            cell_width,
            cell_height,
        })
    }

    pub fn images_per_page(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    pub fn page_count(&self, image_count: usize) -> usize {
        image_count.div_ceil(self.images_per_page())
    }

    /// Bottom-left origin of a grid cell. Cells fill row-major with row 0 at
    /// the top of the page.
    fn cell_origin(&self, local_index: usize, page: PageGeometry, margin_pt: f32) -> (f32, f32) {
        let row = (local_index / self.columns as usize) as f32;
        let col = (local_index % self.columns as usize) as f32;
        let x = margin_pt + col * (self.cell_width + self.spacing_pt);
        let y = page.height_pt
            - margin_pt
            - (row + 1.0) * self.cell_height
            - row * self.spacing_pt;
        (x, y)
    }
}

/// A fitted image box on a specific output page.
#[derive(Debug, Clone, Copy)]
pub struct CollagePlacement {
    pub page_index: usize,
    pub image_index: usize,
    pub rect: LayoutBox,
}

/// Place each image into its grid cell (Contain fit) across as many pages as
/// the grid needs.
pub fn layout_collage(
    dims: &[(f32, f32)],
    grid: CollageGrid,
    page: PageGeometry,
    margin_pt: f32,
) -> Result<Vec<CollagePlacement>> {
    let per_page = grid.images_per_page();
    let mut placements = Vec::with_capacity(dims.len());

    for (image_index, &(w, h)) in dims.iter().enumerate() {
        let page_index = image_index / per_page;
        let local_index = image_index % per_page;
        let (cell_x, cell_y) = grid.cell_origin(local_index, page, margin_pt);
        let fitted = fit_box(w, h, grid.cell_width, grid.cell_height, FitMode::Contain)?;
        placements.push(CollagePlacement {
            page_index,
            image_index,
            rect: LayoutBox {
                x: cell_x + fitted.x,
                y: cell_y + fitted.y,
                ..fitted
            },
        });
    }

    Ok(placements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{page_dimensions, Orientation, PageSize};

    fn a4() -> PageGeometry {
        page_dimensions(PageSize::A4, Orientation::Portrait)
    }

    #[test]
    fn single_page_respects_margin() {
        let b = layout_single_page(1000.0, 1000.0, a4(), 20.0, FitMode::Contain).unwrap();
        assert!(b.x >= 20.0);
        assert!(b.y >= 20.0);
        assert!(b.x + b.width <= a4().width_pt - 20.0 + 1e-3);
        assert!(b.y + b.height <= a4().height_pt - 20.0 + 1e-3);
    }

    #[test]
    fn sequence_gives_one_box_per_image() {
        let boxes =
            layout_sequence(&[(100.0, 50.0), (50.0, 100.0)], a4(), 20.0, FitMode::Contain).unwrap();
        assert_eq!(boxes.len(), 2);
    }

    #[test]
    fn five_images_in_two_by_two_grid_take_two_pages() {
        let grid = CollageGrid::new(2, 2, 10.0, a4(), 20.0).unwrap();
        assert_eq!(grid.images_per_page(), 4);
        assert_eq!(grid.page_count(5), 2);

        let dims = vec![(100.0, 100.0); 5];
        let placements = layout_collage(&dims, grid, a4(), 20.0).unwrap();
        assert_eq!(placements.len(), 5);
        assert!(placements[..4].iter().all(|p| p.page_index == 0));

        // Fifth image lands on page 2 in the top-left cell.
        let fifth = placements[4];
        assert_eq!(fifth.page_index, 1);
        let first = placements[0];
        assert!((fifth.rect.x - first.rect.x).abs() < 1e-3);
        assert!((fifth.rect.y - first.rect.y).abs() < 1e-3);
    }

    #[test]
    fn row_zero_is_topmost() {
        let grid = CollageGrid::new(2, 2, 10.0, a4(), 20.0).unwrap();
        let dims = vec![(grid.cell_width, grid.cell_height); 4];
        let placements = layout_collage(&dims, grid, a4(), 20.0).unwrap();
        // Images 0,1 sit in row 0, images 2,3 in row 1 below it.
        assert!(placements[0].rect.y > placements[2].rect.y);
        assert!((placements[0].rect.y - placements[1].rect.y).abs() < 1e-3);
        // Columns advance rightward.
        assert!(placements[1].rect.x > placements[0].rect.x);
    }

    #[test]
    fn oversized_grid_fails_before_any_image_work() {
        // 12 columns of 50pt spacing inside 50pt margins cannot fit on A4.
        let err = CollageGrid::new(12, 2, 50.0, a4(), 50.0).unwrap_err();
        assert_eq!(err.kind(), "InvalidGeometry");
    }

    #[test]
    fn zero_grid_is_a_validation_error() {
        let err = CollageGrid::new(0, 2, 0.0, a4(), 0.0).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }
}
