use std::path::Path;

use image::{ImageReader, RgbaImage};

use super::{Codec, CodecOptions, Loaded};
use crate::error::Result;
use crate::geometry::Grid;
use crate::geotable::{self, Domain, GeoTable};
use crate::table::{AttributeTable, Column, Value};

pub const COLOR_COLUMN: &str = "color";

/// Raster images (PNG, JPEG, TIFF) through the `image` crate.
///
/// Pixel `(x, y)` becomes grid cell `x + y * width`, with a single `color`
/// attribute holding its RGBA value.
pub struct ImageCodec;

pub fn grid_table(img: &RgbaImage) -> Result<GeoTable> {
    let (width, height) = img.dimensions();
    let colors = img.pixels().map(|p| Value::Rgba(p.0)).collect();
    let grid = Grid::unit(width as usize, height as usize);
    geotable::from_grid_or_mesh(
        Domain::Grid(grid),
        AttributeTable::new(vec![Column::new(COLOR_COLUMN, colors)]),
    )
}

impl Codec for ImageCodec {
    fn name(&self) -> &'static str {
        "image"
    }

    fn read(&self, path: &Path, _layer: usize, _options: &CodecOptions) -> Result<Loaded> {
        let img = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?
            .to_rgba8();
        tracing::debug!(width = img.width(), height = img.height(), "decoded image");
        Ok(Loaded::Table(grid_table(&img)?))
    }
}
