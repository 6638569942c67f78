//! Per-frame signal trackers.
//!
//! Both trackers carry state from one frame to the next and must see the
//! frames of a request in capture order.

mod eye_state;
mod motion;

pub use eye_state::{
    eye_aspect_ratio, BlinkEvent, EarSample, EyeSelection, EyeStateTracker, EAR_EPSILON,
};
pub use motion::{frame_difference, MotionSample, MotionScorer};
