//! Frame type representing one decoded raster with its position in the stream.

use std::time::Duration;

use image::RgbImage;

/// A single decoded frame.
///
/// Frames are immutable once decoded. The sequence index is assigned by the
/// frame source in capture order and is what landmark recordings and blink
/// events refer back to.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Interleaved pixel data, `channels` bytes per pixel.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Bytes per pixel (1 for luma, 3 for RGB).
    channels: u8,
    /// Monotonic sequence number, 0 for the first frame.
    sequence: u64,
    /// Offset from the first frame, taken from container frame delays.
    presented_at: Duration,
}

impl Frame {
    /// Creates an RGB frame.
    pub fn rgb(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            channels: 3,
            sequence,
            presented_at: Duration::ZERO,
        }
    }

    /// Creates a single-channel (luma) frame.
    pub fn luma(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            channels: 1,
            sequence,
            presented_at: Duration::ZERO,
        }
    }

    /// Wraps a decoded RGB image.
    pub fn from_rgb_image(image: RgbImage, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::rgb(image.into_raw(), width, height, sequence)
    }

    /// Sets the presentation offset.
    #[must_use]
    pub fn presented_at(mut self, offset: Duration) -> Self {
        self.presented_at = offset;
        self
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the number of interleaved channels.
    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the presentation offset from the first frame.
    #[inline]
    pub fn offset(&self) -> Duration {
        self.presented_at
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions and channels.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count() * usize::from(self.channels)
    }

    /// True when `other` can be compared pixel for pixel with this frame.
    pub fn same_geometry(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.channels == other.channels
    }

    /// Copies the frame into an `image` buffer, for extractors built on the
    /// `image` crate. Returns `None` for non-RGB frames.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.channels != 3 {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("sequence", &self.sequence)
            .field("presented_at", &self.presented_at)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let pixels = vec![0u8; 640 * 480 * 3];
        let frame = Frame::rgb(pixels, 640, 480, 1);

        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.sequence(), 1);
        assert_eq!(frame.offset(), Duration::ZERO);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let pixels = vec![0u8; 640 * 480]; // luma-sized buffer for an RGB frame
        let frame = Frame::rgb(pixels, 640, 480, 1);

        assert!(!frame.is_valid());
    }

    #[test]
    fn test_geometry_comparison() {
        let a = Frame::rgb(vec![0; 12], 2, 2, 0);
        let b = Frame::rgb(vec![9; 12], 2, 2, 1);
        let c = Frame::luma(vec![0; 4], 2, 2, 2);

        assert!(a.same_geometry(&b));
        assert!(!a.same_geometry(&c));
    }

    #[test]
    fn test_rgb_image_round_trip_keeps_sequence() {
        let img = RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        let frame = Frame::from_rgb_image(img, 7).presented_at(Duration::from_millis(40));

        assert_eq!(frame.sequence(), 7);
        assert_eq!(frame.offset(), Duration::from_millis(40));
        assert_eq!(&frame.pixels()[..3], &[10, 20, 30]);
        assert!(frame.to_rgb_image().is_some());
        assert!(Frame::luma(vec![0; 4], 2, 2, 0).to_rgb_image().is_none());
    }
}
