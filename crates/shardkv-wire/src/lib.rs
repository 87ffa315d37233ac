//! Length-prefixed framing shared by every shardkv peer.
//!
//! A message on the wire is a 4-byte little-endian length prefix followed by
//! exactly that many payload bytes. Both a blocking (`std::io`) and a
//! cooperative (`tokio::io`) variant are provided over the identical wire
//! format, mirroring the two protocol implementations the rest of this
//! system's predecessor kept side by side.

pub mod frame;

pub use frame::{read_frame, read_frame_async, write_frame, write_frame_async, FrameError};

/// Default bounded read-buffer size used when draining a declared frame length.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Hard ceiling on an accepted frame's declared length. Frames larger than
/// this are rejected before any payload bytes are read, so a peer cannot
/// force an unbounded allocation just by lying about the length prefix.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;
