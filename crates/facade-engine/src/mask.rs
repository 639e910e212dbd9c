//! Freehand mask capture over the displayed base image.
//!
//! Strokes accumulate on an owned RGBA coverage surface at partial
//! opacity. At submit time the surface is binarized: any pixel with
//! alpha > 0 becomes opaque white (editable), every other pixel opaque
//! black (protected). A surface nobody drew on yields no mask at all.

use facade_contracts::asset::ImageAsset;
use facade_contracts::errors::{FacadeError, Result};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

pub const DEFAULT_BRUSH_RADIUS: f32 = 20.0;
pub const MIN_BRUSH_RADIUS: f32 = 1.0;
pub const MAX_BRUSH_RADIUS: f32 = 200.0;

/// Stroke paint as shown to the user: translucent red.
pub const STROKE_PAINT: Rgba<u8> = Rgba([255, 48, 48, 128]);

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// On-screen rectangle the surface is displayed in, in client pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub struct MaskCapture {
    surface: RgbaImage,
    brush_radius: f32,
    enabled: bool,
    cursor: Option<Point>,
}

impl MaskCapture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: RgbaImage::new(width.max(1), height.max(1)),
            brush_radius: DEFAULT_BRUSH_RADIUS,
            enabled: false,
            cursor: None,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// The translucent overlay as currently painted.
    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Strokes are only accepted while enabled (guided-edit mode).
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cursor = None;
        }
    }

    pub fn brush_radius(&self) -> f32 {
        self.brush_radius
    }

    pub fn set_brush_radius(&mut self, radius: f32) {
        if radius.is_finite() {
            self.brush_radius = radius.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS);
        }
    }

    pub fn begin_stroke(&mut self, point: Point) {
        if !self.enabled {
            return;
        }
        self.cursor = Some(point);
    }

    pub fn extend_stroke(&mut self, point: Point) {
        if !self.enabled {
            return;
        }
        let Some(from) = self.cursor else {
            return;
        };
        self.paint_segment(from, point);
        self.cursor = Some(point);
    }

    pub fn end_stroke(&mut self) {
        self.cursor = None;
    }

    /// Convenience for replaying a whole polyline.
    pub fn draw_stroke(&mut self, points: &[Point]) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.begin_stroke(*first);
        if rest.is_empty() {
            self.extend_stroke(*first);
        }
        for point in rest {
            self.extend_stroke(*point);
        }
        self.end_stroke();
    }

    pub fn clear(&mut self) {
        for pixel in self.surface.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        self.cursor = None;
    }

    /// Reinitializes the surface for new display geometry. Prior coverage
    /// is dropped; the mask is tied to on-screen geometry.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface = RgbaImage::new(width.max(1), height.max(1));
        self.cursor = None;
    }

    /// Maps a pointer position in client space onto the surface.
    pub fn map_pointer(&self, client: Point, rect: DisplayRect) -> Point {
        let (width, height) = self.dimensions();
        let scale_x = if rect.width > 0.0 {
            width as f32 / rect.width
        } else {
            1.0
        };
        let scale_y = if rect.height > 0.0 {
            height as f32 / rect.height
        } else {
            1.0
        };
        Point::new(
            (client.x - rect.left) * scale_x,
            (client.y - rect.top) * scale_y,
        )
    }

    pub fn covered_pixels(&self) -> usize {
        self.surface.pixels().filter(|pixel| pixel[3] > 0).count()
    }

    pub fn has_coverage(&self) -> bool {
        self.surface.pixels().any(|pixel| pixel[3] > 0)
    }

    pub fn derive_binary_mask(&self) -> Option<BinaryMask> {
        if !self.has_coverage() {
            return None;
        }
        let (width, height) = self.dimensions();
        let pixels = RgbaImage::from_fn(width, height, |x, y| {
            if self.surface.get_pixel(x, y)[3] > 0 {
                WHITE
            } else {
                BLACK
            }
        });
        Some(BinaryMask { pixels })
    }

    // Round caps and joins fall out of painting each segment as a capsule.
    fn paint_segment(&mut self, from: Point, to: Point) {
        let (width, height) = self.dimensions();
        let radius = self.brush_radius;
        let min_x = (from.x.min(to.x) - radius).floor().max(0.0);
        let min_y = (from.y.min(to.y) - radius).floor().max(0.0);
        let max_x = (from.x.max(to.x) + radius).ceil().min(width as f32 - 1.0);
        let max_y = (from.y.max(to.y) + radius).ceil().min(height as f32 - 1.0);
        if max_x < min_x || max_y < min_y {
            return;
        }

        let radius_sq = radius * radius;
        for y in (min_y as u32)..=(max_y as u32) {
            for x in (min_x as u32)..=(max_x as u32) {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                if distance_sq_to_segment(center, from, to) <= radius_sq {
                    let pixel = self.surface.get_pixel_mut(x, y);
                    *pixel = source_over(*pixel, STROKE_PAINT);
                }
            }
        }
    }
}

fn distance_sq_to_segment(point: Point, a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq <= f32::EPSILON {
        0.0
    } else {
        (((point.x - a.x) * dx + (point.y - a.y) * dy) / length_sq).clamp(0.0, 1.0)
    };
    let px = a.x + t * dx - point.x;
    let py = a.y + t * dy - point.y;
    px * px + py * py
}

fn source_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let src_a = f32::from(src[3]) / 255.0;
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |idx: usize| -> u8 {
        let value = (f32::from(src[idx]) * src_a + f32::from(dst[idx]) * dst_a * (1.0 - src_a))
            / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(1.0, 255.0) as u8,
    ])
}

/// Read-only black/white region selector. White = editable.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    pixels: RgbaImage,
}

impl BinaryMask {
    /// Rebuilds a mask from a stored PNG, thresholding on luminance.
    pub fn from_asset(asset: &ImageAsset) -> Result<Self> {
        let decoded = asset.decode_rgba()?;
        let (width, height) = decoded.dimensions();
        let pixels = RgbaImage::from_fn(width, height, |x, y| {
            let pixel = decoded.get_pixel(x, y);
            let luma =
                (u32::from(pixel[0]) * 299 + u32::from(pixel[1]) * 587 + u32::from(pixel[2]) * 114)
                    / 1000;
            if pixel[3] > 0 && luma >= 128 {
                WHITE
            } else {
                BLACK
            }
        });
        Ok(Self { pixels })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn is_editable(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel(x, y) == &WHITE
    }

    pub fn editable_pixels(&self) -> usize {
        self.pixels.pixels().filter(|pixel| **pixel == WHITE).count()
    }

    pub fn is_fully_editable(&self) -> bool {
        self.pixels.pixels().all(|pixel| *pixel == WHITE)
    }

    /// Nearest-neighbour rescale; the result stays strictly binary.
    pub fn scaled_to(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self {
            pixels: imageops::resize(&self.pixels, width.max(1), height.max(1), FilterType::Nearest),
        }
    }

    pub fn to_asset(&self) -> Result<ImageAsset> {
        ImageAsset::from_rgba("mask.png", &self.pixels)
    }

    /// Inverse-alpha form: editable pixels fully transparent, protected
    /// pixels opaque black. This is how in-painting endpoints that read
    /// the mask alpha channel expect the region.
    pub fn to_alpha_mask(&self) -> RgbaImage {
        let (width, height) = self.dimensions();
        RgbaImage::from_fn(width, height, |x, y| {
            if self.is_editable(x, y) {
                Rgba([0, 0, 0, 0])
            } else {
                BLACK
            }
        })
    }
}

/// Scales `mask` to the base image's native size so both travel at the
/// same resolution.
pub fn mask_for_base(mask: &BinaryMask, base: &ImageAsset) -> Result<BinaryMask> {
    let (width, height) = base
        .dimensions()
        .map_err(|err| FacadeError::input(format!("base image is not decodable: {err}")))?;
    Ok(mask.scaled_to(width, height))
}
