use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::domain::entities::DecodedImage;

/// Resampling filter for downscaling.
const SCALE_FILTER: FilterType = FilterType::Triangle;

/// Fit-within scaling and rounded-corner masking.
///
/// Every operation is deterministic: identical inputs produce
/// byte-identical output, so results can be cached by their parameters.
pub struct ImagePipeline;

impl ImagePipeline {
    /// Produces the final renderable image for a bounding box and radius.
    ///
    /// A box dimension `<= 0` leaves that axis unconstrained; an image that
    /// already fits is never upscaled.
    #[must_use]
    pub fn process(
        image: &DecodedImage,
        box_width: i32,
        box_height: i32,
        corner_radius: u32,
    ) -> DecodedImage {
        let (width, height) =
            Self::fit_within(image.width(), image.height(), box_width, box_height);

        let mut pixels = if (width, height) == (image.width(), image.height()) {
            image.pixels().clone()
        } else {
            imageops::resize(image.pixels(), width, height, SCALE_FILTER)
        };

        Self::round_corners(&mut pixels, corner_radius);
        DecodedImage::new(pixels)
    }

    /// Computes the size of `width`x`height` scaled to fit the box,
    /// preserving aspect ratio.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn fit_within(width: u32, height: u32, box_width: i32, box_height: i32) -> (u32, u32) {
        let max_width = u32::try_from(box_width).ok().filter(|w| *w > 0);
        let max_height = u32::try_from(box_height).ok().filter(|h| *h > 0);

        if width == 0 || height == 0 || (max_width.is_none() && max_height.is_none()) {
            return (width, height);
        }

        let scale_x = max_width.map_or(1.0, |m| f64::from(m) / f64::from(width));
        let scale_y = max_height.map_or(1.0, |m| f64::from(m) / f64::from(height));
        let scale = scale_x.min(scale_y);
        if scale >= 1.0 {
            return (width, height);
        }

        let scaled_width = ((f64::from(width) * scale).round() as u32)
            .clamp(1, max_width.unwrap_or(u32::MAX));
        let scaled_height = ((f64::from(height) * scale).round() as u32)
            .clamp(1, max_height.unwrap_or(u32::MAX));
        (scaled_width, scaled_height)
    }

    /// Fades alpha to zero outside a rounded rectangle.
    ///
    /// The radius is clamped to half of the shorter side. Edge pixels get
    /// partial coverage measured from their centres.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn round_corners(pixels: &mut RgbaImage, corner_radius: u32) {
        let (width, height) = pixels.dimensions();
        let radius = corner_radius.min(width / 2).min(height / 2);
        if radius == 0 {
            return;
        }

        let r = f64::from(radius);
        let corners = [
            (0..radius, 0..radius, r, r),
            (width - radius..width, 0..radius, f64::from(width) - r, r),
            (0..radius, height - radius..height, r, f64::from(height) - r),
            (
                width - radius..width,
                height - radius..height,
                f64::from(width) - r,
                f64::from(height) - r,
            ),
        ];

        for (xs, ys, cx, cy) in corners {
            for y in ys {
                for x in xs.clone() {
                    let dx = f64::from(x) + 0.5 - cx;
                    let dy = f64::from(y) + 0.5 - cy;
                    let coverage = (r - dx.hypot(dy) + 0.5).clamp(0.0, 1.0);
                    if coverage < 1.0 {
                        let pixel = pixels.get_pixel_mut(x, y);
                        pixel[3] = (f64::from(pixel[3]) * coverage).round() as u8;
                    }
                }
            }
        }
    }
}
