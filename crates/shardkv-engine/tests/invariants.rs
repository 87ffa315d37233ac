use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use serde_json::json;
use shardkv_engine::ShardEngine;
use shardkv_store::Key;

#[derive(Clone, Debug)]
struct Op {
    key: u8,
    hash: f64,
    write: bool,
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        Op {
            key: u8::arbitrary(g) % 8,
            hash: (u16::arbitrary(g) % 1000) as f64 / 1000.0,
            write: bool::arbitrary(g),
        }
    }
}

/// Invariant 1: any sequence of write/pop ending with equal counts of each
/// live key leaves `size == 0` and every histogram bucket at `0`.
#[quickcheck]
fn balanced_write_pop_sequence_returns_to_empty(ops: Vec<Op>) -> bool {
    let mut engine = ShardEngine::new(0.0, 1.0, u64::MAX, 5);
    engine.create_index("t").unwrap();

    for op in &ops {
        let key = Key::Int(op.key as i64);
        if op.write {
            let _ = engine.write("t", key, op.hash, json!(op.key));
        } else {
            let _ = engine.pop("t", &Key::Int(op.key as i64));
        }
    }
    // Drain whatever remains so every key ends up popped exactly once.
    for k in 0..8u8 {
        let _ = engine.pop("t", &Key::Int(k as i64));
    }

    engine.size() == 0 && engine.get_stat().distribution.values().all(|&n| n == 0)
}

/// Invariant 2: write(k, v); read(k) == v. A second write with the same key
/// is a no-op and the original value is preserved.
#[quickcheck]
fn write_read_and_duplicate_write(key: u8, hash_milli: u16) -> bool {
    let hash = (hash_milli % 1000) as f64 / 1000.0;
    let mut engine = ShardEngine::new(0.0, 1.0, u64::MAX, 5);
    engine.create_index("t").unwrap();

    let k = Key::Int(key as i64);
    engine.write("t", k.clone(), hash, json!("v1")).unwrap();
    let first = engine.read("t", &k).unwrap().unwrap();

    let second_write = engine.write("t", k.clone(), hash, json!("v2")).unwrap();
    let after = engine.read("t", &k).unwrap().unwrap();

    first.payload == json!("v1") && second_write == 0 && after.payload == json!("v1")
}

/// Invariant 3: write(k, v); pop(k) == v; read(k) is null afterwards.
#[quickcheck]
fn write_then_pop_then_missing(key: u8, hash_milli: u16) -> bool {
    let hash = (hash_milli % 1000) as f64 / 1000.0;
    let mut engine = ShardEngine::new(0.0, 1.0, u64::MAX, 5);
    engine.create_index("t").unwrap();

    let k = Key::Int(key as i64);
    engine.write("t", k.clone(), hash, json!("v")).unwrap();
    let popped = engine.pop("t", &k).unwrap().unwrap();
    let missing = engine.read("t", &k).unwrap();

    popped.payload == json!("v") && missing.is_none()
}
