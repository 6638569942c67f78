//! Media input and frame handling.
//!
//! This module turns an uploaded blob plus its declared kind into an
//! ordered, finite sequence of frames. Nothing downstream ever sees the
//! container format; the trackers only deal with [`Frame`] values.

mod frame;
mod kind;
mod source;

pub use frame::Frame;
pub use kind::MediaKind;
pub use source::{fingerprint, FrameSource, MediaError};
