//! Conflict resolution.
//!
//! Last-write-wins at whole-record granularity: the side with the later
//! `updatedAt` fully replaces the other. There is no field-level merge; this
//! is documented behavior for single-owner configuration records, not a
//! defect.

use crate::record::parse_timestamp;

/// Decide whether the remote copy of a record is authoritative.
///
/// Both arguments are raw `updatedAt` strings as found in each store. A
/// missing or unparsable value on either side returns `false`: a malformed
/// remote value must never clobber a good local one, and local wins by
/// default. Ties favor local (no-op).
#[must_use]
pub fn is_remote_newer(remote_updated_at: Option<&str>, local_updated_at: Option<&str>) -> bool {
    let (Some(remote), Some(local)) = (remote_updated_at, local_updated_at) else {
        return false;
    };
    match (parse_timestamp(remote), parse_timestamp(local)) {
        (Some(remote), Some(local)) => remote > local,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn remote_newer_wins() {
        assert!(is_remote_newer(
            Some("2024-03-01T00:00:00Z"),
            Some("2024-01-01T00:00:00Z"),
        ));
    }

    #[test]
    fn local_newer_holds() {
        assert!(!is_remote_newer(
            Some("2024-01-01T00:00:00Z"),
            Some("2024-03-01T00:00:00Z"),
        ));
    }

    #[test]
    fn tie_favors_local() {
        assert!(!is_remote_newer(
            Some("2024-01-01T00:00:00Z"),
            Some("2024-01-01T00:00:00Z"),
        ));
    }

    #[test]
    fn missing_either_side_favors_local() {
        assert!(!is_remote_newer(None, Some("2024-01-01T00:00:00Z")));
        assert!(!is_remote_newer(Some("2024-01-01T00:00:00Z"), None));
        assert!(!is_remote_newer(None, None));
    }

    #[test]
    fn malformed_remote_never_clobbers_local() {
        assert!(!is_remote_newer(
            Some("yesterday-ish"),
            Some("2024-01-01T00:00:00Z"),
        ));
        assert!(!is_remote_newer(Some("2024-01-01T00:00:00Z"), Some("")));
    }

    #[test]
    fn offset_notation_compares_by_instant() {
        // Same instant in different offsets is a tie, not a remote win.
        assert!(!is_remote_newer(
            Some("2024-01-01T02:00:00+02:00"),
            Some("2024-01-01T00:00:00Z"),
        ));
    }

    proptest! {
        #[test]
        fn equal_timestamps_always_favor_local(secs in 0i64..4_000_000_000) {
            let ts = chrono::DateTime::from_timestamp(secs, 0).unwrap().to_rfc3339();
            prop_assert!(!is_remote_newer(Some(&ts), Some(&ts)));
        }

        #[test]
        fn strictly_later_remote_always_wins(secs in 0i64..4_000_000_000, ahead in 1i64..1_000_000) {
            let local = chrono::DateTime::from_timestamp(secs, 0).unwrap().to_rfc3339();
            let remote = chrono::DateTime::from_timestamp(secs + ahead, 0).unwrap().to_rfc3339();
            prop_assert!(is_remote_newer(Some(&remote), Some(&local)));
            prop_assert!(!is_remote_newer(Some(&local), Some(&remote)));
        }

        #[test]
        fn garbage_input_never_panics_and_favors_local(remote in "\\PC*", local in "\\PC*") {
            // Whatever the strings are, a malformed side can only produce false.
            let verdict = is_remote_newer(Some(&remote), Some(&local));
            if parse_timestamp(&remote).is_none() || parse_timestamp(&local).is_none() {
                prop_assert!(!verdict);
            }
        }
    }
}
