// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The native spooler boundary.
//
// Everything the engine needs from the operating system's print spooler is
// expressed through the `NativeSpooler` trait: a buffered query call backing
// every listing, handle open/close, change-notification registration and the
// blocking wait on it, and the narrow form/job mutation entry points.  The
// calls are blocking, matching the OS APIs they model; async callers run the
// long-blocking wait on a dedicated blocking task.
//
// This crate ships one implementation, the in-memory [`crate::stub`]
// spooler.  A real winspool or CUPS backend implements the same trait.

use spoolwatch_core::error::Result;
use spoolwatch_core::types::{AccessRights, JobCommand, JobId};

/// OS error codes the engine branches on.  Values follow the conventional
/// Win32 numbering the spooler reports.
pub mod os_error {
    /// The caller lacks rights for the attempted operation.
    pub const ACCESS_DENIED: u32 = 5;
    /// The printer handle is no longer valid (e.g. the printer was deleted).
    pub const INVALID_HANDLE: u32 = 6;
    /// A call argument did not name an existing object.
    pub const INVALID_PARAMETER: u32 = 87;
    /// The supplied buffer is smaller than the data to return.
    pub const INSUFFICIENT_BUFFER: u32 = 122;
    /// The named form does not exist on the printer.
    pub const INVALID_FORM_NAME: u32 = 1902;
}

/// Token for an open printer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrinterToken(pub u64);

/// Token for a registered change-notification object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifyToken(pub u64);

/// What a buffered query should enumerate, and its scope.
///
/// Server-wide listings carry no scope; job and form listings are scoped to
/// an open printer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Printers,
    Jobs(PrinterToken),
    Forms(PrinterToken),
    Monitors,
    Domains,
    Providors,
    DataTypes,
}

impl Selector {
    /// Name of the native operation backing this selector, used to tag
    /// `NativeCallFailure` errors.
    pub fn operation(self) -> &'static str {
        match self {
            Self::Printers => "EnumPrinters",
            Self::Jobs(_) => "EnumJobs",
            Self::Forms(_) => "EnumForms",
            Self::Monitors => "EnumMonitors",
            Self::Domains => "EnumDomains",
            Self::Providors => "EnumProvidors",
            Self::DataTypes => "EnumDataTypes",
        }
    }
}

/// Outcome of one `query` invocation.
///
/// `bytes_needed` is filled in whether or not the call succeeded, so a probe
/// with an empty buffer learns the required size from a failed call.
#[derive(Debug, Clone, Copy)]
pub struct QueryReply {
    pub ok: bool,
    /// OS error code when `ok` is false; 0 otherwise.
    pub os_error: u32,
    pub bytes_needed: u32,
    pub items_returned: u32,
}

impl QueryReply {
    pub fn success(bytes_needed: u32, items_returned: u32) -> Self {
        Self {
            ok: true,
            os_error: 0,
            bytes_needed,
            items_returned,
        }
    }

    pub fn failure(os_error: u32, bytes_needed: u32) -> Self {
        Self {
            ok: false,
            os_error,
            bytes_needed,
            items_returned: 0,
        }
    }
}

/// Change classes a notification registration subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct ChangeFilter(pub u32);

impl ChangeFilter {
    /// Job-level changes: add, delete, field set, document data written.
    pub const JOBS: ChangeFilter = ChangeFilter(0x0000_FF00);
}

/// Result of a completed wait on a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeWake {
    /// Something changed in the watched queue.  Several underlying changes
    /// may coalesce into a single wake.
    Changed,
    /// `cancel_wait` was invoked for this notification.
    Cancelled,
}

/// The opaque native print-spooler collaborator.
///
/// Implementations must be safe to call from multiple threads; the watcher
/// holds one instance behind an `Arc` and calls `wait_for_change` from
/// blocking tasks while accessors run elsewhere.
pub trait NativeSpooler: Send + Sync {
    /// Enumerate into `buf`.  With an empty buffer this reports the byte
    /// count required via `bytes_needed` on a failed reply.
    fn query(&self, selector: Selector, buf: &mut [u8]) -> QueryReply;

    /// Open a handle to the named printer, validating `rights`.
    fn open(&self, printer: &str, rights: AccessRights) -> Result<PrinterToken>;

    /// Release a printer handle.  Idempotent.
    fn close(&self, token: PrinterToken);

    /// Register a change-notification object scoped to an open handle.
    fn register_change_notification(
        &self,
        token: PrinterToken,
        filter: ChangeFilter,
    ) -> Result<NotifyToken>;

    /// Block until the watched queue changes, the wait is cancelled, or the
    /// underlying handle dies (reported as a `NativeCallFailure`).
    fn wait_for_change(&self, notify: NotifyToken) -> Result<ChangeWake>;

    /// Wake a blocked `wait_for_change` with `ChangeWake::Cancelled`.  The
    /// cancellation is sticky: later waits on the same notification also
    /// return `Cancelled`.
    fn cancel_wait(&self, notify: NotifyToken);

    /// Release a change-notification object.  Idempotent.
    fn close_change_notification(&self, notify: NotifyToken);

    /// Commit a form mutation.  `record` is the encoded form record.
    fn set_form(&self, token: PrinterToken, form_name: &str, record: &[u8]) -> Result<()>;

    /// Apply a control command to a queued job.
    fn set_job(&self, token: PrinterToken, job: JobId, command: JobCommand) -> Result<()>;

    /// Move a queued job to another printer's queue.
    fn transfer_job(&self, token: PrinterToken, job: JobId, target: &str) -> Result<()>;
}
