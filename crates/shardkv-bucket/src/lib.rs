//! Consistent-hash bucketing and the in-process `Master` that the bootstrap
//! service uses to answer topology queries and fan administrative
//! operations out to every shard.

pub mod hashing;
pub mod master;
pub mod partition;

pub use hashing::{BucketHasher, Md5Hasher};
pub use master::{BucketMapError, Master};
pub use partition::partition_point_for;
