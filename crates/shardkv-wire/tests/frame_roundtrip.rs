use std::io::Cursor;

use quickcheck_macros::quickcheck;
use shardkv_wire::{read_frame, write_frame, DEFAULT_MAX_FRAME_LEN};

#[quickcheck]
fn frame_round_trips_any_byte_string(payload: Vec<u8>) -> bool {
    let mut buf = Vec::new();
    write_frame(&mut buf, &payload).unwrap();
    let mut cursor = Cursor::new(buf);
    read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).unwrap() == payload
}
