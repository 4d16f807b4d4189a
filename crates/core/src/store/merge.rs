use std::collections::HashSet;

use crate::granule::{UnitKey, UnitStatus, WorkUnit};

/// Merges freshly discovered units into an existing set without downgrading status.
///
/// Existing units keep their status and job id, whatever the incoming copy
/// says. Incoming units with no existing counterpart are appended as
/// `Unknown` (or `Unsubmitted` if they already were). Units only present in
/// `existing` are kept. Applying the same `incoming` twice is a no-op.
pub fn merge_preserving_status(existing: &[WorkUnit], incoming: &[WorkUnit]) -> Vec<WorkUnit> {
    let mut merged = existing.to_vec();
    let mut seen: HashSet<UnitKey> = merged.iter().map(WorkUnit::key).collect();

    for unit in incoming {
        if !seen.insert(unit.key()) {
            continue;
        }
        let mut unit = unit.clone();
        if unit.status() != UnitStatus::Unsubmitted {
            unit.set_status(UnitStatus::Unknown);
            unit.set_job_id(None);
        }
        merged.push(unit);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::granule::Granule;
    use chrono::{TimeZone, Utc};

    fn unit(id: &str, status: UnitStatus) -> WorkUnit {
        WorkUnit::from(
            Granule::new(
                format!("S1A_IW_SLC__1SSH_X_{}", id),
                Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            )
            .with_status(status),
        )
    }

    #[test]
    fn test_existing_status_wins() {
        let mut submitted = unit("AAAA", UnitStatus::Submitted);
        submitted.set_job_id(Some("job-a".to_string()));
        let existing = vec![submitted];
        let incoming = vec![unit("AAAA", UnitStatus::Unknown)];

        let merged = merge_preserving_status(&existing, &incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status(), UnitStatus::Submitted);
        assert_eq!(merged[0].job_id(), Some("job-a"));
    }

    #[test]
    fn test_new_units_appended_as_unknown() {
        let existing = vec![unit("AAAA", UnitStatus::Localized)];
        let incoming = vec![
            unit("BBBB", UnitStatus::Unknown),
            unit("CCCC", UnitStatus::Failed),
            unit("DDDD", UnitStatus::Unsubmitted),
        ];

        let merged = merge_preserving_status(&existing, &incoming);
        let statuses: Vec<_> = merged.iter().map(|u| u.status()).collect();
        assert_eq!(
            statuses,
            vec![
                UnitStatus::Localized,
                UnitStatus::Unknown,
                UnitStatus::Unknown,
                UnitStatus::Unsubmitted
            ]
        );
    }

    #[test]
    fn test_units_missing_from_incoming_are_kept() {
        let existing = vec![unit("AAAA", UnitStatus::Submitted)];
        let merged = merge_preserving_status(&existing, &[]);
        assert_eq!(merged, existing);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = vec![
            unit("AAAA", UnitStatus::Submitted),
            unit("BBBB", UnitStatus::Localized),
        ];
        let incoming = vec![
            unit("BBBB", UnitStatus::Unknown),
            unit("CCCC", UnitStatus::Unknown),
            unit("CCCC", UnitStatus::Unknown),
        ];

        let once = merge_preserving_status(&existing, &incoming);
        let twice = merge_preserving_status(&once, &incoming);
        assert_eq!(once.len(), 3);
        assert_eq!(once, twice);
        let once_status: Vec<_> = once.iter().map(|u| u.status()).collect();
        let twice_status: Vec<_> = twice.iter().map(|u| u.status()).collect();
        assert_eq!(once_status, twice_status);
    }

    #[test]
    fn test_same_id_different_name_deduplicated() {
        let existing = vec![unit("AAAA", UnitStatus::Unknown)];
        let renamed = WorkUnit::from(Granule::new(
            "S1B_IW_SLC__1SSH_OTHER_AAAA",
            Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap(),
        ));
        let merged = merge_preserving_status(&existing, &[renamed]);
        assert_eq!(merged.len(), 1);
    }
}
