//! A per-index in-memory key/value store, with an optional whole-file
//! snapshot for persistence across restarts.

pub mod key;
pub mod store;

pub use key::Key;
pub use store::{Record, Store, StoreError};
