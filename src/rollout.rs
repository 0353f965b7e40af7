//! Rollout filter
//!
//! Decides whether a consumer applies a change given the gray-target list
//! carried in its metadata record.

/// Returns true if `consumer_id` should apply a change targeted at `gray_targets`.
///
/// An empty list means general availability. Otherwise membership is an exact
/// string match: no wildcards, no prefixes.
pub fn should_apply<S: AsRef<str>>(consumer_id: &str, gray_targets: &[S]) -> bool {
    gray_targets.is_empty() || gray_targets.iter().any(|t| t.as_ref() == consumer_id)
}
