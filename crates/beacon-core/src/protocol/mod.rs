//! Plain-text wire formats for the three cluster channels.
//!
//! Everything here is pure: the I/O loops hand payload strings in and get
//! typed values out (and the reverse).

mod channel;
mod control;
mod presence;

pub use channel::{chatter_line, Channel};
pub use control::ControlCommand;
pub use presence::{PresenceEntry, PresenceSnapshot};
