//! Version numbering.
//!
//! Versions are positive integers. Automatic allocation takes the highest
//! existing version plus one; backends claim the candidate with a conditional
//! create and come back here for a fresh candidate if another writer got there first.

/// How many candidates a save tries before giving up with `VersionConflict`
pub const MAX_ALLOCATION_ATTEMPTS: usize = 8;

/// The version a new save should claim.
///
/// `None` once the highest stored version is `i64::MAX`: nothing can follow it.
pub fn next_version(existing: &[i64]) -> Option<i64> {
    match latest_version(existing) {
        None => Some(1),
        Some(latest) => latest.checked_add(1),
    }
}

/// The highest stored version, if any
pub fn latest_version(existing: &[i64]) -> Option<i64> {
    existing.iter().copied().max()
}

/// Parse a stored entry name (file name or trailing key segment) as a version.
///
/// Anything that is not a positive integer is not a version and yields `None`.
pub fn parse_version(segment: &str) -> Option<i64> {
    segment.parse::<i64>().ok().filter(|v| *v > 0)
}

/// Sort ascending and drop duplicates
pub fn normalize(mut versions: Vec<i64>) -> Vec<i64> {
    versions.sort_unstable();
    versions.dedup();
    versions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_version() {
        assert_eq!(next_version(&[]), Some(1));
        assert_eq!(next_version(&[1, 2, 3]), Some(4));
        // Gaps left by deletes are not reused
        assert_eq!(next_version(&[1, 5]), Some(6));
        assert_eq!(next_version(&[5, 1]), Some(6));
    }

    #[test]
    fn test_next_version_at_ceiling() {
        assert_eq!(next_version(&[i64::MAX - 1]), Some(i64::MAX));
        assert_eq!(next_version(&[1, i64::MAX]), None);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("12"), Some(12));
        assert_eq!(parse_version("0"), None);
        assert_eq!(parse_version("-3"), None);
        assert_eq!(parse_version("1.meta"), None);
        assert_eq!(parse_version("notes"), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(vec![3, 1, 2, 3]), vec![1, 2, 3]);
        assert!(normalize(Vec::new()).is_empty());
    }
}
