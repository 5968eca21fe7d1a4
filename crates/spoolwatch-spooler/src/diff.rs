// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The job diff engine.
//
// Pure comparison of two queue snapshots keyed by job identifier.  The
// watcher never trusts individual notification signals: a wake triggers a
// full re-enumeration and a diff against the retained snapshot, so a burst
// of coalesced notifications still produces one event per actual change.

use std::collections::HashMap;

use tracing::debug;

use spoolwatch_core::types::{JobEventKind, JobId, PrintJob};

/// The full set of jobs for one printer captured at one point in time.
///
/// Preserves native enumeration order.  Owned exclusively by the watcher
/// task for that printer; replaced wholesale after each diff cycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    jobs: Vec<PrintJob>,
    index: HashMap<JobId, usize>,
}

impl Snapshot {
    pub fn from_jobs(jobs: impl IntoIterator<Item = PrintJob>) -> Self {
        let mut ordered = Vec::new();
        let mut index = HashMap::new();
        for job in jobs {
            // Job ids are unique within one enumeration; if the native
            // layer ever violates that, keep the first occurrence.
            if index.contains_key(&job.id) {
                debug!(id = %job.id, "duplicate job id in enumeration, ignoring");
                continue;
            }
            index.insert(job.id, ordered.len());
            ordered.push(job);
        }
        Self {
            jobs: ordered,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: JobId) -> Option<&PrintJob> {
        self.index.get(&id).map(|&i| &self.jobs[i])
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.index.contains_key(&id)
    }

    /// Jobs in native enumeration order.
    pub fn iter(&self) -> std::slice::Iter<'_, PrintJob> {
        self.jobs.iter()
    }
}

/// One detected change, carrying the job snapshot the event describes.
#[derive(Debug, Clone, PartialEq)]
pub struct JobChange {
    pub job: PrintJob,
    pub kind: JobEventKind,
}

/// Compare two snapshots of the same queue.
///
/// Event order within the cycle is fixed: every `Added` (in current
/// enumeration order), then every `Deleted` (in previous enumeration
/// order), then `Set`/`Written` for jobs present in both.  A job whose
/// observable fields and write counter are both unchanged emits nothing.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<JobChange> {
    let mut changes = Vec::new();

    for job in current.iter() {
        if !previous.contains(job.id) {
            changes.push(JobChange {
                job: job.clone(),
                kind: JobEventKind::Added,
            });
        }
    }

    for job in previous.iter() {
        if !current.contains(job.id) {
            changes.push(JobChange {
                job: job.clone(),
                kind: JobEventKind::Deleted,
            });
        }
    }

    for job in current.iter() {
        let Some(before) = previous.get(job.id) else {
            continue;
        };
        if !before.observably_equal(job) {
            changes.push(JobChange {
                job: job.clone(),
                kind: JobEventKind::Set,
            });
        }
        // The write counter is independent of the other fields: more bytes
        // reaching the device is its own event class.
        if job.bytes_printed > before.bytes_printed {
            changes.push(JobChange {
                job: job.clone(),
                kind: JobEventKind::Written,
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use spoolwatch_core::types::JobStatus;

    fn job(id: u32) -> PrintJob {
        PrintJob {
            id: JobId(id),
            printer_name: "Front Desk".into(),
            user_name: "casey".into(),
            document_name: format!("doc-{id}.pdf"),
            status: JobStatus::SPOOLING,
            position: id,
            pages_printed: 0,
            total_pages: 4,
            size_bytes: 1024,
            bytes_printed: 0,
            submitted_at: Utc::now(),
        }
    }

    fn snapshot(ids: &[u32]) -> Snapshot {
        Snapshot::from_jobs(ids.iter().map(|&id| job(id)))
    }

    #[test]
    fn added_and_deleted_by_key() {
        let previous = snapshot(&[1, 2, 3]);
        let current = snapshot(&[2, 3, 4]);

        let changes = diff(&previous, &current);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, JobEventKind::Added);
        assert_eq!(changes[0].job.id, JobId(4));
        assert_eq!(changes[1].kind, JobEventKind::Deleted);
        assert_eq!(changes[1].job.id, JobId(1));
    }

    #[test]
    fn unchanged_jobs_emit_nothing() {
        let previous = snapshot(&[1, 2]);
        let current = snapshot(&[1, 2]);
        assert!(diff(&previous, &current).is_empty());
    }

    #[test]
    fn field_change_emits_set() {
        let previous = snapshot(&[1]);
        let mut changed = job(1);
        changed.status = JobStatus::PAUSED;
        let current = Snapshot::from_jobs([changed]);

        let changes = diff(&previous, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, JobEventKind::Set);
    }

    #[test]
    fn write_counter_growth_emits_written_alongside_set() {
        let previous = snapshot(&[1]);
        let mut written = job(1);
        written.pages_printed = 2;
        written.bytes_printed = 512;
        let current = Snapshot::from_jobs([written]);

        let changes = diff(&previous, &current);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, JobEventKind::Set);
        assert_eq!(changes[1].kind, JobEventKind::Written);
    }

    #[test]
    fn write_counter_alone_emits_only_written() {
        let previous = snapshot(&[1]);
        let mut written = job(1);
        written.bytes_printed = 512;
        let current = Snapshot::from_jobs([written]);

        let changes = diff(&previous, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, JobEventKind::Written);
    }

    #[test]
    fn cycle_order_is_added_deleted_then_set() {
        let previous = snapshot(&[1, 2]);
        let mut kept = job(2);
        kept.position = 1;
        let current = Snapshot::from_jobs([kept, job(5), job(6)]);

        let kinds: Vec<JobEventKind> = diff(&previous, &current)
            .into_iter()
            .map(|c| c.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                JobEventKind::Added,
                JobEventKind::Added,
                JobEventKind::Deleted,
                JobEventKind::Set,
            ]
        );
    }

    #[test]
    fn added_events_follow_current_enumeration_order() {
        let previous = snapshot(&[]);
        let current = snapshot(&[9, 3, 7]);

        let ids: Vec<JobId> = diff(&previous, &current)
            .into_iter()
            .map(|c| c.job.id)
            .collect();
        assert_eq!(ids, vec![JobId(9), JobId(3), JobId(7)]);
    }

    #[test]
    fn coalesced_burst_reconciles_against_stale_snapshot() {
        // Two additions happened between wakes; diffing the stale snapshot
        // against the latest state still yields both events.
        let stale = snapshot(&[1]);
        let latest = snapshot(&[1, 2, 3]);

        let changes = diff(&stale, &latest);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == JobEventKind::Added));
    }

    #[test]
    fn snapshot_lookup_and_order() {
        let snap = snapshot(&[4, 2, 8]);
        assert_eq!(snap.len(), 3);
        assert!(snap.contains(JobId(2)));
        assert!(snap.get(JobId(5)).is_none());
        let order: Vec<u32> = snap.iter().map(|j| j.id.0).collect();
        assert_eq!(order, vec![4, 2, 8]);
    }
}
