//! Typed publish/subscribe on plain topics.
//!
//! Messages travel as bare codec frames (no envelope), so a subscriber can
//! tell from the frame's type name whether a payload is what it expects.

mod publisher;
mod subscriber;

pub use publisher::Publisher;
pub use subscriber::Subscriber;
