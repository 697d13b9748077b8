//! Types shared between the card server and its clients: the framed wire
//! protocol and the card model.

pub mod cards;
pub mod protocol;

pub use cards::{join_codes, Card, CardParseError, Suit};
pub use protocol::{
    encode, read_frame, read_frame_with_budget, write_frame, Frame, FrameError, MessageType,
    MAGIC, MAX_GARBAGE_BYTES, MAX_PAYLOAD_LEN,
};
