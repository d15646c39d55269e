//! Column-band descrambling ("reduction") of gallery images
//!
//! Scrambled images are cut into N horizontal bands whose order has been reversed.
//! When the height is not a multiple of N, the encoder lets the *last* source band
//! absorb the remainder rows; after reversal those rows end up in the *first* output
//! band. The asymmetry is part of the external encoding and is reproduced exactly.
//!
//! ```text
//! height 13, N = 4 (band height 3, remainder 1)
//!
//! source               output
//! band 0 [0,  3)       band 0 [0,  4)  <- source band 3
//! band 1 [3,  6)  -->  band 1 [4,  7)  <- source band 2
//! band 2 [6,  9)       band 2 [7, 10)  <- source band 1
//! band 3 [9, 13)       band 3 [10,13)  <- source band 0
//! ```

use std::io::Cursor;

use image::{DynamicImage, GenericImage, ImageBuffer, ImageFormat, Pixel};

use crate::error::{Error, Result};
use crate::types::ContentId;

/// Largest supported band count
pub const MAX_COLUMNS: u32 = 20;

/// Band count used before hashed column counts were introduced
const LEGACY_COLUMNS: u32 = 10;

const HASHED_COLUMNS: [u32; 10] = [2, 4, 6, 8, 10, 12, 14, 16, 18, 20];

/// Number of bands a page was scrambled with
///
/// Content ids below `threshold` always use 10 bands. From the threshold on, the
/// count is picked from `[2, 4, .., 20]` by the ASCII code of the last hex digit of
/// `md5(content_id ++ page_id)`, modulo 10.
pub fn column_count(content_id: &ContentId, page_id: &str, threshold: u64) -> u32 {
    if !content_id.at_least(threshold) {
        return LEGACY_COLUMNS;
    }

    let digest = md5::compute(format!("{}{}", content_id.as_str(), page_id));
    let hex = format!("{digest:x}");
    let last = hex.bytes().last().unwrap_or(b'0');
    HASHED_COLUMNS[usize::from(last % 10)]
}

/// One band move: `height` rows starting at `src_y` go to `dst_y`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Band {
    /// First row in the scrambled image
    pub src_y: u32,
    /// First row in the restored image
    pub dst_y: u32,
    /// Rows in this band
    pub height: u32,
}

/// Row moves that restore an image of `height` rows scrambled with `columns` bands
///
/// Output band `j` receives source band `columns - 1 - j`. Fails if `columns` is
/// zero or above [`MAX_COLUMNS`]. With more bands than rows every row lands in the
/// first band, which leaves the image as it was.
pub fn band_plan(height: u32, columns: u32) -> Result<Vec<Band>> {
    if columns == 0 || columns > MAX_COLUMNS {
        return Err(Error::InvalidColumns { columns, height });
    }

    let column_height = height / columns;
    let remainder = height % columns;

    let plan = (0..columns)
        .map(|j| {
            let source = columns - 1 - j;
            if j == 0 {
                // last source band carries the remainder, and lands on top
                Band {
                    src_y: source * column_height,
                    dst_y: 0,
                    height: column_height + remainder,
                }
            } else {
                Band {
                    src_y: source * column_height,
                    dst_y: j * column_height + remainder,
                    height: column_height,
                }
            }
        })
        .collect();
    Ok(plan)
}

/// Restore one typed image buffer
pub fn descramble_buffer<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    columns: u32,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
{
    let (width, height) = image.dimensions();
    let plan = band_plan(height, columns)?;

    let mut restored = ImageBuffer::new(width, height);
    for band in plan.into_iter().filter(|b| b.height > 0) {
        let strip = image::imageops::crop_imm(image, 0, band.src_y, width, band.height).to_image();
        restored.copy_from(&strip, 0, band.dst_y)?;
    }
    Ok(restored)
}

/// Restore a decoded image, keeping its pixel layout
pub fn descramble(image: &DynamicImage, columns: u32) -> Result<DynamicImage> {
    let restored = match image {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(descramble_buffer(buf, columns)?),
        DynamicImage::ImageLumaA8(buf) => {
            DynamicImage::ImageLumaA8(descramble_buffer(buf, columns)?)
        }
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(descramble_buffer(buf, columns)?),
        DynamicImage::ImageRgba8(buf) => DynamicImage::ImageRgba8(descramble_buffer(buf, columns)?),
        DynamicImage::ImageLuma16(buf) => {
            DynamicImage::ImageLuma16(descramble_buffer(buf, columns)?)
        }
        DynamicImage::ImageLumaA16(buf) => {
            DynamicImage::ImageLumaA16(descramble_buffer(buf, columns)?)
        }
        DynamicImage::ImageRgb16(buf) => DynamicImage::ImageRgb16(descramble_buffer(buf, columns)?),
        DynamicImage::ImageRgba16(buf) => {
            DynamicImage::ImageRgba16(descramble_buffer(buf, columns)?)
        }
        DynamicImage::ImageRgb32F(buf) => {
            DynamicImage::ImageRgb32F(descramble_buffer(buf, columns)?)
        }
        DynamicImage::ImageRgba32F(buf) => {
            DynamicImage::ImageRgba32F(descramble_buffer(buf, columns)?)
        }
        other => DynamicImage::ImageRgba8(descramble_buffer(&other.to_rgba8(), columns)?),
    };
    Ok(restored)
}

/// Decode fetched bytes, checking they hold a supported image
pub fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat)> {
    let format = image::guess_format(bytes)?;
    let decoded = image::load_from_memory_with_format(bytes, format)?;
    Ok((decoded, format))
}

/// Descramble an image and encode it back in `format`
pub fn descramble_to_bytes(
    image: &DynamicImage,
    format: ImageFormat,
    columns: u32,
) -> Result<Vec<u8>> {
    let restored = descramble(image, columns)?;
    let mut encoded = Vec::new();
    restored.write_to(&mut Cursor::new(&mut encoded), format)?;
    Ok(encoded)
}
