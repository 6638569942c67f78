//! Declared media kinds.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the caller says the uploaded bytes are.
///
/// The declaration decides how the bytes are decoded: a still image always
/// yields exactly one frame, a video yields every frame in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A single still image (`image/*`).
    Still,
    /// A video or animated container.
    Video,
}

/// Extensions treated as video when no content type is declared.
const VIDEO_EXTENSIONS: &[&str] = &[
    "gif", "apng", "webp", "mp4", "m4v", "mov", "webm", "mkv", "avi",
];

impl MediaKind {
    /// Maps a MIME-like content type to a kind.
    ///
    /// Anything under `image/` is a still; everything else, including an
    /// empty or unknown type, is decoded as video.
    pub fn from_content_type(content_type: &str) -> Self {
        let normalized = content_type.trim().to_ascii_lowercase();
        if normalized.starts_with("image/") {
            MediaKind::Still
        } else {
            MediaKind::Video
        }
    }

    /// Guesses a kind from a file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let is_video = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()));

        if is_video {
            MediaKind::Video
        } else {
            MediaKind::Still
        }
    }

    /// Returns the lowercase name used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Still => "still",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = std::convert::Infallible;

    /// Accepts `still`, `image`, `video`, or any content type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "still" | "image" => MediaKind::Still,
            "video" => MediaKind::Video,
            other => MediaKind::from_content_type(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_content_types_are_still() {
        assert_eq!(MediaKind::from_content_type("image/jpeg"), MediaKind::Still);
        assert_eq!(MediaKind::from_content_type("IMAGE/PNG"), MediaKind::Still);
        assert_eq!(MediaKind::from_content_type("image/gif"), MediaKind::Still);
    }

    #[test]
    fn test_everything_else_is_video() {
        assert_eq!(MediaKind::from_content_type("video/mp4"), MediaKind::Video);
        assert_eq!(
            MediaKind::from_content_type("application/octet-stream"),
            MediaKind::Video
        );
        assert_eq!(MediaKind::from_content_type(""), MediaKind::Video);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(MediaKind::from_path("clip.GIF"), MediaKind::Video);
        assert_eq!(MediaKind::from_path("clip.webm"), MediaKind::Video);
        assert_eq!(MediaKind::from_path("face.jpg"), MediaKind::Still);
        assert_eq!(MediaKind::from_path("noext"), MediaKind::Still);
    }

    #[test]
    fn test_parse() {
        assert_eq!("still".parse::<MediaKind>().unwrap(), MediaKind::Still);
        assert_eq!("video".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert_eq!("image/webp".parse::<MediaKind>().unwrap(), MediaKind::Still);
        assert_eq!("video/quicktime".parse::<MediaKind>().unwrap(), MediaKind::Video);
    }
}
