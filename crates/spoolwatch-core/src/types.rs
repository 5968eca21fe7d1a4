// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Spoolwatch spooler observer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a print job, unique within one printer's queue at a point
/// in time.  The spooler recycles identifiers, so a later fetch of the
/// "same" id may describe a different document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u32);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Spooler job status bitmask.
///
/// The raw mask round-trips through native records unchanged; the named
/// predicates cover the flags observers commonly branch on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStatus(pub u32);

impl JobStatus {
    pub const PAUSED: JobStatus = JobStatus(0x0001);
    pub const ERROR: JobStatus = JobStatus(0x0002);
    pub const DELETING: JobStatus = JobStatus(0x0004);
    pub const SPOOLING: JobStatus = JobStatus(0x0008);
    pub const PRINTING: JobStatus = JobStatus(0x0010);
    pub const OFFLINE: JobStatus = JobStatus(0x0020);
    pub const PAPER_OUT: JobStatus = JobStatus(0x0040);
    pub const PRINTED: JobStatus = JobStatus(0x0080);
    pub const DELETED: JobStatus = JobStatus(0x0100);
    pub const BLOCKED: JobStatus = JobStatus(0x0200);
    pub const USER_INTERVENTION: JobStatus = JobStatus(0x0400);
    pub const RESTARTING: JobStatus = JobStatus(0x0800);

    /// Whether every flag in `other` is set in `self`.
    pub fn contains(self, other: JobStatus) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_paused(self) -> bool {
        self.contains(Self::PAUSED)
    }

    pub fn is_printing(self) -> bool {
        self.contains(Self::PRINTING)
    }

    pub fn is_spooling(self) -> bool {
        self.contains(Self::SPOOLING)
    }

    pub fn is_deleting(self) -> bool {
        self.contains(Self::DELETING)
    }

    pub fn has_error(self) -> bool {
        self.contains(Self::ERROR)
    }

    pub fn needs_user(self) -> bool {
        self.contains(Self::USER_INTERVENTION) || self.contains(Self::PAPER_OUT)
    }
}

/// A queued print job, captured at one point in time.
///
/// Immutable once fetched; a subsequent enumeration of the same queue
/// yields fresh values rather than mutating an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    /// Name of the queue this job belongs to.
    pub printer_name: String,
    /// Account that submitted the job.
    pub user_name: String,
    pub document_name: String,
    pub status: JobStatus,
    /// One-based position in the queue.
    pub position: u32,
    pub pages_printed: u32,
    pub total_pages: u32,
    /// Spooled size of the document.
    pub size_bytes: u64,
    /// Bytes of document data written to the device so far.  This counter
    /// only grows for a given job and drives `Written` change events.
    pub bytes_printed: u64,
    pub submitted_at: DateTime<Utc>,
}

impl PrintJob {
    /// Whether the fields an observer can see (other than the write
    /// counter) match between two fetches of the same job id.
    pub fn observably_equal(&self, other: &PrintJob) -> bool {
        self.status == other.status
            && self.position == other.position
            && self.pages_printed == other.pages_printed
            && self.total_pages == other.total_pages
            && self.size_bytes == other.size_bytes
    }
}

/// Origin of a form definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    /// Defined by the user on this server.
    UserDefined,
    /// Shipped with the spooler.
    BuiltIn,
    /// Supplied by a printer driver.
    PrinterDefined,
}

impl FormKind {
    /// Raw spooler flag value for this kind.
    pub fn as_raw(self) -> u32 {
        match self {
            Self::UserDefined => 0,
            Self::BuiltIn => 1,
            Self::PrinterDefined => 2,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::UserDefined),
            1 => Some(Self::BuiltIn),
            2 => Some(Self::PrinterDefined),
            _ => None,
        }
    }
}

/// Printable region of a form, in thousandths of a millimetre, measured
/// from the sheet's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageableArea {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// A paper-size/margin definition installed on a printer.
///
/// Width and height are in thousandths of a millimetre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub imageable_area: ImageableArea,
    pub kind: FormKind,
}

/// A print monitor installed on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintMonitor {
    pub name: String,
    /// Environment the monitor was built for (e.g. "Windows x64").
    pub environment: String,
    pub dll_name: String,
}

/// A print domain visible to the server's print provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintDomain {
    pub name: String,
    pub description: String,
}

/// A print provider registered with the spooler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintProvidor {
    pub name: String,
    pub description: String,
    pub comment: String,
}

/// A spool-file data type a print processor accepts (e.g. "RAW", "EMF").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataType {
    pub name: String,
}

/// A printer known to the spooler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterInfo {
    pub name: String,
    /// Server hosting the queue; empty for the local machine.
    pub server_name: String,
    pub driver_name: String,
    pub port_name: String,
    pub comment: String,
    pub location: String,
    /// Raw printer status mask as reported by the spooler.
    pub status: u32,
    pub jobs_queued: u32,
}

/// Access rights requested when opening a printer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessRights(pub u32);

impl AccessRights {
    /// Enumerate jobs and receive change notifications.
    pub const USE: AccessRights = AccessRights(0x0008);
    /// Full control: job and form mutation in addition to `USE`.
    pub const ADMINISTER: AccessRights = AccessRights(0x0004 | 0x0008);

    /// Whether every right in `other` is granted by `self`.
    pub fn contains(self, other: AccessRights) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for AccessRights {
    fn default() -> Self {
        Self::USE
    }
}

/// Control command applied to a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobCommand {
    Pause,
    Resume,
    /// Print the document again from the beginning.
    Restart,
    Cancel,
}

/// Kind of change observed for a job between two queue snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobEventKind {
    /// The job appeared in the queue.
    Added,
    /// The job left the queue.
    Deleted,
    /// An observable field of the job changed.
    Set,
    /// More document bytes reached the device.
    Written,
}

/// A change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Queue the change was observed on.
    pub printer: String,
    /// Snapshot of the job at the observing diff cycle.  For `Deleted`
    /// events this is the last state the job was seen in.
    pub job: PrintJob,
    pub kind: JobEventKind,
    /// When the diff cycle that produced this event ran.
    pub at: DateTime<Utc>,
}

/// Terminal failure of one printer's watch loop, reported once through the
/// watcher's error channel.
#[derive(Debug)]
pub struct WatchFailure {
    pub printer: String,
    pub error: crate::error::SpoolError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_predicates_follow_mask() {
        let status = JobStatus(JobStatus::PAUSED.0 | JobStatus::ERROR.0);
        assert!(status.is_paused());
        assert!(status.has_error());
        assert!(!status.is_printing());
        assert!(status.contains(JobStatus::PAUSED));
        assert!(!status.contains(JobStatus::PRINTING));
    }

    #[test]
    fn needs_user_covers_paper_out() {
        assert!(JobStatus::PAPER_OUT.needs_user());
        assert!(JobStatus::USER_INTERVENTION.needs_user());
        assert!(!JobStatus::PRINTING.needs_user());
    }

    #[test]
    fn administer_rights_include_use() {
        assert!(AccessRights::ADMINISTER.contains(AccessRights::USE));
        assert!(!AccessRights::USE.contains(AccessRights::ADMINISTER));
    }

    #[test]
    fn form_kind_raw_round_trip() {
        for kind in [
            FormKind::UserDefined,
            FormKind::BuiltIn,
            FormKind::PrinterDefined,
        ] {
            assert_eq!(FormKind::from_raw(kind.as_raw()), Some(kind));
        }
        assert_eq!(FormKind::from_raw(99), None);
    }

    #[test]
    fn observably_equal_ignores_write_counter() {
        let job = sample_job();
        let mut written = job.clone();
        written.bytes_printed += 4096;
        assert!(job.observably_equal(&written));

        let mut moved = job.clone();
        moved.position = 7;
        assert!(!job.observably_equal(&moved));
    }

    fn sample_job() -> PrintJob {
        PrintJob {
            id: JobId(1),
            printer_name: "Front Desk".into(),
            user_name: "pat".into(),
            document_name: "report.pdf".into(),
            status: JobStatus::SPOOLING,
            position: 1,
            pages_printed: 0,
            total_pages: 12,
            size_bytes: 48_000,
            bytes_printed: 0,
            submitted_at: Utc::now(),
        }
    }
}
