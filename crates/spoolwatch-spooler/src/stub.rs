// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory native spooler.
//
// A complete `NativeSpooler` implementation backed by plain data structures:
// printers with per-printer grantable rights, job queues, forms, and the
// server-wide entity tables.  Mutating helpers fire registered change
// notifications so blocked waits wake, which makes the stub a faithful
// harness for the watcher as well as the listing accessors.  Failure
// injection covers the partial-failure and handle-death paths the real
// spooler can produce.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::debug;

use spoolwatch_core::error::{Result, SpoolError};
use spoolwatch_core::types::{
    AccessRights, DataType, FormInfo, JobCommand, JobId, JobStatus, PrintDomain, PrintJob,
    PrintMonitor, PrintProvidor, PrinterInfo,
};

use crate::native::{
    os_error, ChangeFilter, ChangeWake, NativeSpooler, NotifyToken, PrinterToken, QueryReply,
    Selector,
};
use crate::records::SpoolRecord;

struct StubPrinter {
    info: PrinterInfo,
    /// The widest rights `open` will grant for this printer.
    grantable: AccessRights,
    jobs: Vec<PrintJob>,
    forms: Vec<FormInfo>,
    fail_next_set_form: Option<u32>,
}

struct StubHandle {
    printer: String,
    rights: AccessRights,
    poisoned: bool,
}

struct StubNotification {
    handle: u64,
    printer: String,
    pending: bool,
    cancelled: bool,
    dead: bool,
}

#[derive(Default)]
struct StubState {
    // BTreeMap keeps printer enumeration order deterministic between calls.
    printers: BTreeMap<String, StubPrinter>,
    monitors: Vec<PrintMonitor>,
    domains: Vec<PrintDomain>,
    providors: Vec<PrintProvidor>,
    data_types: Vec<DataType>,
    handles: HashMap<u64, StubHandle>,
    notifications: HashMap<u64, StubNotification>,
    next_token: u64,
    fail_next_query: Option<u32>,
    fail_next_sized_query: Option<u32>,
}

/// In-memory print spooler for tests and hermetic embedding.
pub struct StubSpooler {
    state: Mutex<StubState>,
    wake: Condvar,
}

impl Default for StubSpooler {
    fn default() -> Self {
        Self::new()
    }
}

impl StubSpooler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState::default()),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().expect("stub state lock poisoned")
    }

    // -- configuration ------------------------------------------------------

    /// Install a printer with plausible defaults and the given grantable
    /// rights ceiling.
    pub fn register_printer(&self, name: &str, grantable: AccessRights) {
        let info = PrinterInfo {
            name: name.to_owned(),
            server_name: String::new(),
            driver_name: "Generic / Text Only".into(),
            port_name: "LPT1:".into(),
            comment: String::new(),
            location: String::new(),
            status: 0,
            jobs_queued: 0,
        };
        self.register_printer_info(info, grantable);
    }

    pub fn register_printer_info(&self, info: PrinterInfo, grantable: AccessRights) {
        let mut state = self.lock();
        state.printers.insert(
            info.name.clone(),
            StubPrinter {
                info,
                grantable,
                jobs: Vec::new(),
                forms: Vec::new(),
                fail_next_set_form: None,
            },
        );
    }

    pub fn add_form(&self, printer: &str, form: FormInfo) {
        let mut state = self.lock();
        if let Some(p) = state.printers.get_mut(printer) {
            p.forms.push(form);
        }
    }

    pub fn add_monitor(&self, monitor: PrintMonitor) {
        self.lock().monitors.push(monitor);
    }

    pub fn add_domain(&self, domain: PrintDomain) {
        self.lock().domains.push(domain);
    }

    pub fn add_providor(&self, providor: PrintProvidor) {
        self.lock().providors.push(providor);
    }

    pub fn add_data_type(&self, data_type: DataType) {
        self.lock().data_types.push(data_type);
    }

    // -- queue mutation (fires change notifications) ------------------------

    pub fn add_job(&self, printer: &str, job: PrintJob) {
        let mut state = self.lock();
        if let Some(p) = state.printers.get_mut(printer) {
            p.jobs.push(job);
            p.info.jobs_queued = p.jobs.len() as u32;
        }
        mark_changed(&mut state, printer);
        self.wake.notify_all();
    }

    pub fn remove_job(&self, printer: &str, id: JobId) {
        let mut state = self.lock();
        if let Some(p) = state.printers.get_mut(printer) {
            p.jobs.retain(|j| j.id != id);
            p.info.jobs_queued = p.jobs.len() as u32;
        }
        mark_changed(&mut state, printer);
        self.wake.notify_all();
    }

    /// Mutate one queued job in place.
    pub fn update_job(&self, printer: &str, id: JobId, mutate: impl FnOnce(&mut PrintJob)) {
        let mut state = self.lock();
        if let Some(job) = state
            .printers
            .get_mut(printer)
            .and_then(|p| p.jobs.iter_mut().find(|j| j.id == id))
        {
            mutate(job);
        }
        mark_changed(&mut state, printer);
        self.wake.notify_all();
    }

    /// Advance a job's write counter, as the device draining spool data does.
    pub fn append_job_data(&self, printer: &str, id: JobId, bytes: u64) {
        self.update_job(printer, id, |job| job.bytes_printed += bytes);
    }

    /// Read back one queued job.
    pub fn job(&self, printer: &str, id: JobId) -> Option<PrintJob> {
        let state = self.lock();
        state
            .printers
            .get(printer)
            .and_then(|p| p.jobs.iter().find(|j| j.id == id).cloned())
    }

    /// Read back one installed form.
    pub fn form(&self, printer: &str, name: &str) -> Option<FormInfo> {
        let state = self.lock();
        state.printers.get(printer).and_then(|p| {
            p.forms
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(name))
                .cloned()
        })
    }

    // -- failure injection --------------------------------------------------

    /// Fail the next `query` call (whatever its phase) with this OS error.
    pub fn fail_next_query(&self, code: u32) {
        self.lock().fail_next_query = Some(code);
    }

    /// Fail the next `query` call that arrives with a sized buffer (the
    /// second phase of the protocol), as if the set grew between calls.
    pub fn fail_next_sized_query(&self, code: u32) {
        self.lock().fail_next_sized_query = Some(code);
    }

    pub fn fail_next_set_form(&self, printer: &str, code: u32) {
        let mut state = self.lock();
        if let Some(p) = state.printers.get_mut(printer) {
            p.fail_next_set_form = Some(code);
        }
    }

    /// Invalidate every open handle and notification for a printer, as if
    /// the printer was deleted out from under its observers.
    pub fn poison_printer(&self, printer: &str) {
        let mut state = self.lock();
        for handle in state.handles.values_mut() {
            if handle.printer == printer {
                handle.poisoned = true;
            }
        }
        for reg in state.notifications.values_mut() {
            if reg.printer == printer {
                reg.dead = true;
            }
        }
        self.wake.notify_all();
    }
}

/// Flag every live notification watching `printer`.
fn mark_changed(state: &mut StubState, printer: &str) {
    for reg in state.notifications.values_mut() {
        if reg.printer == printer && !reg.dead {
            reg.pending = true;
        }
    }
}

fn encode_all<T: SpoolRecord>(items: &[T]) -> Vec<u8> {
    let mut buf = vec![0u8; items.len() * T::WIRE_SIZE];
    for (i, item) in items.iter().enumerate() {
        item.encode(&mut buf[i * T::WIRE_SIZE..(i + 1) * T::WIRE_SIZE]);
    }
    buf
}

impl NativeSpooler for StubSpooler {
    fn query(&self, selector: Selector, buf: &mut [u8]) -> QueryReply {
        let mut state = self.lock();

        if let Some(code) = state.fail_next_query.take() {
            return QueryReply::failure(code, 0);
        }
        if !buf.is_empty() {
            if let Some(code) = state.fail_next_sized_query.take() {
                return QueryReply::failure(code, 0);
            }
        }

        let (encoded, count) = match selector {
            Selector::Printers => {
                let infos: Vec<PrinterInfo> =
                    state.printers.values().map(|p| p.info.clone()).collect();
                (encode_all(&infos), infos.len())
            }
            Selector::Jobs(token) => match resolve_handle(&state, token) {
                Ok(printer) => {
                    let jobs = &state.printers[&printer].jobs;
                    (encode_all(jobs), jobs.len())
                }
                Err(code) => return QueryReply::failure(code, 0),
            },
            Selector::Forms(token) => match resolve_handle(&state, token) {
                Ok(printer) => {
                    let forms = &state.printers[&printer].forms;
                    (encode_all(forms), forms.len())
                }
                Err(code) => return QueryReply::failure(code, 0),
            },
            Selector::Monitors => (encode_all(&state.monitors), state.monitors.len()),
            Selector::Domains => (encode_all(&state.domains), state.domains.len()),
            Selector::Providors => (encode_all(&state.providors), state.providors.len()),
            Selector::DataTypes => (encode_all(&state.data_types), state.data_types.len()),
        };

        let needed = encoded.len() as u32;
        if encoded.is_empty() {
            return QueryReply::success(0, 0);
        }
        if buf.len() < encoded.len() {
            return QueryReply::failure(os_error::INSUFFICIENT_BUFFER, needed);
        }
        buf[..encoded.len()].copy_from_slice(&encoded);
        QueryReply::success(needed, count as u32)
    }

    fn open(&self, printer: &str, rights: AccessRights) -> Result<PrinterToken> {
        let mut state = self.lock();
        let Some(entry) = state.printers.get(printer) else {
            return Err(SpoolError::ArgumentInvalid(format!(
                "unknown printer `{printer}`"
            )));
        };
        if !entry.grantable.contains(rights) {
            return Err(SpoolError::InsufficientAccessRights {
                printer: printer.to_owned(),
            });
        }
        state.next_token += 1;
        let token = state.next_token;
        state.handles.insert(
            token,
            StubHandle {
                printer: printer.to_owned(),
                rights,
                poisoned: false,
            },
        );
        debug!(printer, token, "stub printer opened");
        Ok(PrinterToken(token))
    }

    fn close(&self, token: PrinterToken) {
        let mut state = self.lock();
        if state.handles.remove(&token.0).is_some() {
            // Notifications left registered on a closed handle die with it.
            for reg in state.notifications.values_mut() {
                if reg.handle == token.0 {
                    reg.dead = true;
                }
            }
            self.wake.notify_all();
        }
    }

    fn register_change_notification(
        &self,
        token: PrinterToken,
        _filter: ChangeFilter,
    ) -> Result<NotifyToken> {
        let mut state = self.lock();
        let printer = match resolve_handle(&state, token) {
            Ok(printer) => printer,
            Err(code) => {
                return Err(SpoolError::NativeCallFailure {
                    operation: "RegisterChangeNotification",
                    os_error: code,
                })
            }
        };
        state.next_token += 1;
        let notify = state.next_token;
        state.notifications.insert(
            notify,
            StubNotification {
                handle: token.0,
                printer,
                pending: false,
                cancelled: false,
                dead: false,
            },
        );
        Ok(NotifyToken(notify))
    }

    fn wait_for_change(&self, notify: NotifyToken) -> Result<ChangeWake> {
        let mut state = self.lock();
        loop {
            let Some(reg) = state.notifications.get_mut(&notify.0) else {
                return Err(SpoolError::NativeCallFailure {
                    operation: "WaitForChange",
                    os_error: os_error::INVALID_HANDLE,
                });
            };
            if reg.cancelled {
                return Ok(ChangeWake::Cancelled);
            }
            if reg.dead {
                return Err(SpoolError::NativeCallFailure {
                    operation: "WaitForChange",
                    os_error: os_error::INVALID_HANDLE,
                });
            }
            if reg.pending {
                reg.pending = false;
                return Ok(ChangeWake::Changed);
            }
            state = self.wake.wait(state).expect("stub state lock poisoned");
        }
    }

    fn cancel_wait(&self, notify: NotifyToken) {
        let mut state = self.lock();
        if let Some(reg) = state.notifications.get_mut(&notify.0) {
            reg.cancelled = true;
        }
        self.wake.notify_all();
    }

    fn close_change_notification(&self, notify: NotifyToken) {
        self.lock().notifications.remove(&notify.0);
        self.wake.notify_all();
    }

    fn set_form(&self, token: PrinterToken, form_name: &str, record: &[u8]) -> Result<()> {
        let mut state = self.lock();
        let printer = match resolve_handle(&state, token) {
            Ok(printer) => printer,
            Err(code) => {
                return Err(SpoolError::NativeCallFailure {
                    operation: "SetForm",
                    os_error: code,
                })
            }
        };
        let rights = state.handles[&token.0].rights;
        if !rights.contains(AccessRights::ADMINISTER) {
            return Err(SpoolError::NativeCallFailure {
                operation: "SetForm",
                os_error: os_error::ACCESS_DENIED,
            });
        }
        let entry = state.printers.get_mut(&printer).expect("printer vanished");
        if let Some(code) = entry.fail_next_set_form.take() {
            return Err(SpoolError::NativeCallFailure {
                operation: "SetForm",
                os_error: code,
            });
        }
        let updated = FormInfo::decode(record)?;
        let Some(slot) = entry
            .forms
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(form_name))
        else {
            return Err(SpoolError::NativeCallFailure {
                operation: "SetForm",
                os_error: os_error::INVALID_FORM_NAME,
            });
        };
        *slot = updated;
        Ok(())
    }

    fn set_job(&self, token: PrinterToken, job: JobId, command: JobCommand) -> Result<()> {
        let mut state = self.lock();
        let printer = match resolve_handle(&state, token) {
            Ok(printer) => printer,
            Err(code) => {
                return Err(SpoolError::NativeCallFailure {
                    operation: "SetJob",
                    os_error: code,
                })
            }
        };
        let rights = state.handles[&token.0].rights;
        if !rights.contains(AccessRights::ADMINISTER) {
            return Err(SpoolError::NativeCallFailure {
                operation: "SetJob",
                os_error: os_error::ACCESS_DENIED,
            });
        }
        let entry = state.printers.get_mut(&printer).expect("printer vanished");
        let Some(index) = entry.jobs.iter().position(|j| j.id == job) else {
            return Err(SpoolError::NativeCallFailure {
                operation: "SetJob",
                os_error: os_error::INVALID_PARAMETER,
            });
        };
        match command {
            JobCommand::Pause => entry.jobs[index].status.0 |= JobStatus::PAUSED.0,
            JobCommand::Resume => entry.jobs[index].status.0 &= !JobStatus::PAUSED.0,
            JobCommand::Restart => {
                let slot = &mut entry.jobs[index];
                slot.pages_printed = 0;
                slot.bytes_printed = 0;
                slot.status.0 |= JobStatus::RESTARTING.0;
            }
            JobCommand::Cancel => {
                entry.jobs.remove(index);
                entry.info.jobs_queued = entry.jobs.len() as u32;
            }
        }
        mark_changed(&mut state, &printer);
        self.wake.notify_all();
        Ok(())
    }

    fn transfer_job(&self, token: PrinterToken, job: JobId, target: &str) -> Result<()> {
        let mut state = self.lock();
        let source = match resolve_handle(&state, token) {
            Ok(printer) => printer,
            Err(_) => {
                return Err(SpoolError::JobTransferFailure {
                    job,
                    target: target.to_owned(),
                    reason: "source printer handle is no longer valid".into(),
                })
            }
        };
        if !state.printers.contains_key(target) {
            return Err(SpoolError::JobTransferFailure {
                job,
                target: target.to_owned(),
                reason: "target queue does not exist".into(),
            });
        }

        let moved = {
            let entry = state.printers.get_mut(&source).expect("printer vanished");
            let Some(index) = entry.jobs.iter().position(|j| j.id == job) else {
                return Err(SpoolError::JobTransferFailure {
                    job,
                    target: target.to_owned(),
                    reason: "job not present in source queue".into(),
                });
            };
            let moved = entry.jobs.remove(index);
            entry.info.jobs_queued = entry.jobs.len() as u32;
            moved
        };

        {
            let entry = state.printers.get_mut(target).expect("target vanished");
            let mut moved = moved;
            moved.printer_name = target.to_owned();
            moved.position = entry.jobs.len() as u32 + 1;
            entry.jobs.push(moved);
            entry.info.jobs_queued = entry.jobs.len() as u32;
        }

        mark_changed(&mut state, &source);
        mark_changed(&mut state, target);
        self.wake.notify_all();
        Ok(())
    }
}

/// Handle token → printer name, or the OS error a dead handle reports.
fn resolve_handle(state: &StubState, token: PrinterToken) -> std::result::Result<String, u32> {
    match state.handles.get(&token.0) {
        Some(handle) if !handle.poisoned => Ok(handle.printer.clone()),
        _ => Err(os_error::INVALID_HANDLE),
    }
}
