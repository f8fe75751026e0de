//! Priority scheduling of chained audio clips.
//!
//! Events are rendered as ordered clip lists ([`ClipSequencePlayer`]) and handed to a
//! [`PriorityPlayQueue`] that keeps at most one sequence audible, lets stronger events
//! cut off queued ones and collapses backlog to the freshest event. The
//! [`scheduler`] module runs the queue on its own thread behind a channel API.

pub mod clip;
pub mod notify;
pub mod play_queue;
pub mod resource;
pub mod scheduler;
pub mod sequence;

#[cfg(test)]
mod testing;

pub use clip::{ClipReference, make_clip_locator, resolve_clips};
pub use play_queue::{DEFAULT_PRIORITY, PriorityPlayQueue, QueueEntry};
pub use sequence::{ClipSequencePlayer, PlaybackContext, SequenceState};
