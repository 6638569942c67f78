//! Lazy frame decoding from an uploaded media blob.
//!
//! A [`FrameSource`] is a forward-only iterator over the frames of one
//! upload. Still images produce exactly one frame. Videos produce every
//! frame of the container in capture order, decoded one at a time so a
//! long clip is never held in memory all at once.

use std::io::Cursor;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, ImageFormat};
use thiserror::Error;

use super::{Frame, MediaKind};

/// Errors that can occur while turning bytes into frames.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The bytes are not valid media of the declared kind.
    #[error("cannot decode {kind} media: {reason}")]
    Decode {
        /// Declared kind.
        kind: MediaKind,
        /// Decoder message.
        reason: String,
    },
    /// The container held no frames.
    #[error("media contained no decodable frames")]
    Empty,
}

impl MediaError {
    fn decode(kind: MediaKind, reason: impl std::fmt::Display) -> Self {
        MediaError::Decode {
            kind,
            reason: reason.to_string(),
        }
    }
}

enum Inner {
    Still(Option<Frame>),
    Animated {
        frames: Frames<'static>,
        elapsed: Duration,
    },
}

/// Forward-only sequence of decoded frames.
///
/// The sequence is not restartable: decoding the same upload again
/// requires a fresh source over the same bytes.
pub struct FrameSource {
    kind: MediaKind,
    inner: Inner,
    yielded: u64,
    finished: bool,
}

impl FrameSource {
    /// Opens `bytes` as the declared `kind`.
    ///
    /// Container headers are parsed eagerly so unparseable uploads fail
    /// here; individual video frames are decoded lazily during iteration.
    pub fn decode(bytes: &[u8], kind: MediaKind) -> Result<Self, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::decode(kind, "no bytes supplied"));
        }

        let inner = match kind {
            MediaKind::Still => Inner::Still(Some(decode_still(bytes, kind)?)),
            MediaKind::Video => open_video(bytes)?,
        };

        tracing::debug!(kind = %kind, bytes = bytes.len(), "media opened");

        Ok(Self {
            kind,
            inner,
            yielded: 0,
            finished: false,
        })
    }

    /// Returns the declared kind this source was opened as.
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Number of frames produced so far.
    pub fn frames_yielded(&self) -> u64 {
        self.yielded
    }

    fn next_frame(&mut self) -> Option<Result<Frame, MediaError>> {
        match &mut self.inner {
            Inner::Still(frame) => frame.take().map(Ok),
            Inner::Animated { frames, elapsed } => {
                let decoded = match frames.next()? {
                    Ok(frame) => frame,
                    Err(e) => return Some(Err(MediaError::decode(MediaKind::Video, e))),
                };

                let offset = *elapsed;
                let (numer, denom) = decoded.delay().numer_denom_ms();
                if denom > 0 {
                    *elapsed += Duration::from_secs_f64(f64::from(numer) / f64::from(denom) / 1000.0);
                }

                let rgb = DynamicImage::ImageRgba8(decoded.into_buffer()).to_rgb8();
                Some(Ok(Frame::from_rgb_image(rgb, self.yielded).presented_at(offset)))
            }
        }
    }
}

impl Iterator for FrameSource {
    type Item = Result<Frame, MediaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_frame() {
            Some(Ok(frame)) => {
                self.yielded += 1;
                tracing::trace!(sequence = frame.sequence(), "frame decoded");
                Some(Ok(frame))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            None => {
                self.finished = true;
                if self.yielded == 0 {
                    Some(Err(MediaError::Empty))
                } else {
                    None
                }
            }
        }
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("kind", &self.kind)
            .field("yielded", &self.yielded)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// BLAKE3 hex digest of an upload, used to trace repeated submissions.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn decode_still(bytes: &[u8], kind: MediaKind) -> Result<Frame, MediaError> {
    let image = image::load_from_memory(bytes).map_err(|e| MediaError::decode(kind, e))?;
    Ok(Frame::from_rgb_image(image.to_rgb8(), 0))
}

/// Opens an animated container, or falls back to a one-frame video for
/// raster formats that carry no animation.
fn open_video(bytes: &[u8]) -> Result<Inner, MediaError> {
    let kind = MediaKind::Video;
    let format = image::guess_format(bytes)
        .map_err(|_| MediaError::decode(kind, "unrecognized container"))?;
    let cursor = Cursor::new(bytes.to_vec());

    let frames = match format {
        ImageFormat::Gif => GifDecoder::new(cursor)
            .map_err(|e| MediaError::decode(kind, e))?
            .into_frames(),
        ImageFormat::Png => {
            let decoder = PngDecoder::new(cursor).map_err(|e| MediaError::decode(kind, e))?;
            if !decoder.is_apng().map_err(|e| MediaError::decode(kind, e))? {
                return Ok(Inner::Still(Some(decode_still(bytes, kind)?)));
            }
            decoder
                .apng()
                .map_err(|e| MediaError::decode(kind, e))?
                .into_frames()
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(cursor).map_err(|e| MediaError::decode(kind, e))?;
            if !decoder.has_animation() {
                return Ok(Inner::Still(Some(decode_still(bytes, kind)?)));
            }
            decoder.into_frames()
        }
        _ => return Ok(Inner::Still(Some(decode_still(bytes, kind)?))),
    };

    Ok(Inner::Animated {
        frames,
        elapsed: Duration::ZERO,
    })
}
