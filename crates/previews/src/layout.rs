//! Placement of a preview image inside its target region.
//!
//! Pure geometry: given the region available to a preview (or the whole
//! display for the background) and the image's pixel size, produce the
//! rectangles the image should be drawn into.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

/// Upper bound on the cells a single tiled image may produce.
pub const MAX_TILES: usize = 4096;

/// Axis-aligned rectangle in logical pixels, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin.
    pub const fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Layout policy controlling how an image is scaled into its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Fill the region, ignoring the image's aspect ratio.
    Stretch,
    /// Largest aspect-preserving rectangle, centred in the region.
    #[default]
    Fit,
    /// Fit-sized cells repeated from the region origin.
    Tile,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [DisplayMode::Stretch, DisplayMode::Fit, DisplayMode::Tile];

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Stretch => "stretch",
            DisplayMode::Fit => "fit",
            DisplayMode::Tile => "tile",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        DisplayMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| format!("unknown display mode '{value}'; expected stretch, fit, or tile"))
    }
}

/// Size of the largest rectangle with the image's aspect ratio that fits
/// inside `region_width` x `region_height`.
pub fn fit_size(region_width: f32, region_height: f32, image_width: u32, image_height: u32) -> (f32, f32) {
    let ratio = image_width as f32 / image_height as f32;
    if region_width / region_height > ratio {
        (region_height * ratio, region_height)
    } else {
        (region_width, region_width / ratio)
    }
}

/// Rectangles an image of `image_size` occupies inside `region` for `mode`.
///
/// Returns nothing for an empty region or a zero-sized image. Tile mode may
/// overdraw past the right/bottom edge by up to one cell; a grid denser than
/// [`MAX_TILES`] is drawn with proportionally larger cells.
pub fn image_rects(mode: DisplayMode, region: Rect, image_size: (u32, u32)) -> Vec<Rect> {
    let (image_width, image_height) = image_size;
    if region.is_empty() || image_width == 0 || image_height == 0 {
        return Vec::new();
    }

    match mode {
        DisplayMode::Stretch => vec![region],
        DisplayMode::Fit => {
            let (width, height) = fit_size(region.width, region.height, image_width, image_height);
            vec![Rect::new(
                region.x + (region.width - width) / 2.0,
                region.y + (region.height - height) / 2.0,
                width,
                height,
            )]
        }
        DisplayMode::Tile => {
            let (mut cell_width, mut cell_height) =
                fit_size(region.width, region.height, image_width, image_height);
            let (mut columns, mut rows) = tile_grid(region, cell_width, cell_height);
            if columns.saturating_mul(rows) > MAX_TILES {
                warn!(columns, rows, "tile grid too dense; enlarging cells");
                let scale = (columns as f64 * rows as f64 / MAX_TILES as f64).sqrt() as f32;
                cell_width *= scale;
                cell_height *= scale;
                (columns, rows) = tile_grid(region, cell_width, cell_height);
                while columns.saturating_mul(rows) > MAX_TILES {
                    cell_width *= 1.25;
                    cell_height *= 1.25;
                    (columns, rows) = tile_grid(region, cell_width, cell_height);
                }
            }
            let mut rects = Vec::with_capacity(columns * rows);
            for column in 0..columns {
                for row in 0..rows {
                    rects.push(Rect::new(
                        region.x + column as f32 * cell_width,
                        region.y + row as f32 * cell_height,
                        cell_width,
                        cell_height,
                    ));
                }
            }
            rects
        }
    }
}

/// Columns and rows of `cell_width` x `cell_height` cells covering `region`.
fn tile_grid(region: Rect, cell_width: f32, cell_height: f32) -> (usize, usize) {
    (
        (region.width / cell_width).ceil() as usize,
        (region.height / cell_height).ceil() as usize,
    )
}
