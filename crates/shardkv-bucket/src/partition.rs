/// Given an ordered list of bucket starts (all `< 1.0`, `bucket_starts[0] ==
/// 0.0`), finds the index of the bucket owning `hash`.
///
/// Equivalent to the source's `bisect.bisect_left(bins, hash_) - 1`:
/// `bisect_left` is the count of bucket starts strictly less than `hash`
/// (`bucket_starts.partition_point(|s| s < hash)`), then one is subtracted.
/// Saturating the subtraction at zero both avoids underflow and happens to
/// give the right answer for `hash == bucket_starts[0] == 0.0` (count-less-than
/// is `0`, so the saturated result is `0`) without
/// relying on Python's negative-index wraparound, which this deliberately
/// does not reproduce. Note this formula assigns a hash that lands exactly
/// on a non-zero boundary to the *preceding* bucket rather than the one
/// starting there — that is the literal, tested behavior (see invariant 4),
/// not a half-open-interval calculation re-derived from first principles.
pub fn partition_point_for(bucket_starts: &[f64], hash: f64) -> usize {
    let bisect_left = bucket_starts.partition_point(|&start| start < hash);
    bisect_left.saturating_sub(1)
}
