// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synchronous accessors over the spooler.
//
// `SpoolServer` answers point-in-time questions: which printers, monitors,
// domains, providors and data types exist, and (through an open `Printer`
// handle) which jobs and forms a queue holds.  Collections are rebuilt
// wholesale on every call and never cached.  `Form` carries the narrow
// write-through mutation path for paper definitions.

use std::sync::Arc;

use tracing::{debug, instrument};

use spoolwatch_core::error::{Result, SpoolError};
use spoolwatch_core::types::{
    AccessRights, DataType, FormInfo, ImageableArea, JobCommand, JobId, PrintDomain, PrintJob,
    PrintMonitor, PrintProvidor, PrinterInfo,
};

use crate::collection::Listing;
use crate::native::{NativeSpooler, PrinterToken, Selector};
use crate::protocol::enumerate;
use crate::records::SpoolRecord;

/// Entry point for spooler queries.
///
/// Cheap to clone; all clones share the same native collaborator.
#[derive(Clone)]
pub struct SpoolServer {
    native: Arc<dyn NativeSpooler>,
}

impl SpoolServer {
    pub fn new(native: Arc<dyn NativeSpooler>) -> Self {
        Self { native }
    }

    /// Printers known to the spooler.
    pub fn printers(&self) -> Result<Listing<PrinterInfo>> {
        enumerate(self.native.as_ref(), Selector::Printers)
    }

    /// Print monitors installed on the server.
    pub fn monitors(&self) -> Result<Listing<PrintMonitor>> {
        enumerate(self.native.as_ref(), Selector::Monitors)
    }

    /// Print domains visible to the server.
    pub fn domains(&self) -> Result<Listing<PrintDomain>> {
        enumerate(self.native.as_ref(), Selector::Domains)
    }

    /// Print providors registered with the spooler.
    pub fn providors(&self) -> Result<Listing<PrintProvidor>> {
        enumerate(self.native.as_ref(), Selector::Providors)
    }

    /// Spool-file data types the server's print processors accept.
    pub fn data_types(&self) -> Result<Listing<DataType>> {
        enumerate(self.native.as_ref(), Selector::DataTypes)
    }

    /// Open a handle to the named printer, validating the requested rights
    /// up front.
    #[instrument(skip(self))]
    pub fn open_printer(&self, name: &str, rights: AccessRights) -> Result<Printer> {
        let token = self.native.open(name, rights)?;
        debug!(printer = name, "printer handle opened");
        Ok(Printer {
            native: Arc::clone(&self.native),
            token,
            name: name.to_owned(),
        })
    }

    /// Convenience: the jobs currently queued on a printer, via a transient
    /// handle.
    pub fn jobs(&self, printer: &str) -> Result<Listing<PrintJob>> {
        self.open_printer(printer, AccessRights::USE)?.jobs()
    }

    /// Convenience: the forms installed on a printer, via a transient
    /// handle.
    pub fn forms(&self, printer: &str) -> Result<Listing<FormInfo>> {
        self.open_printer(printer, AccessRights::USE)?.forms()
    }
}

/// An open printer handle.  The native handle is released on drop.
pub struct Printer {
    native: Arc<dyn NativeSpooler>,
    token: PrinterToken,
    name: String,
}

impl Printer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn token(&self) -> PrinterToken {
        self.token
    }

    /// The queue's jobs at this instant, in native enumeration order.
    pub fn jobs(&self) -> Result<Listing<PrintJob>> {
        enumerate(self.native.as_ref(), Selector::Jobs(self.token))
    }

    /// The printer's installed forms.
    pub fn forms(&self) -> Result<Listing<FormInfo>> {
        enumerate(self.native.as_ref(), Selector::Forms(self.token))
    }

    /// Look up one form by name and bind it to this handle for mutation.
    pub fn form(&self, name: &str) -> Result<Form<'_>> {
        let listing = self.forms()?;
        let info = listing
            .find_by_name(name)
            .cloned()
            .ok_or_else(|| SpoolError::ArgumentInvalid(format!("no form named `{name}`")))?;
        Ok(Form {
            printer: self,
            info,
        })
    }

    #[instrument(skip(self), fields(printer = %self.name))]
    pub fn pause_job(&self, id: JobId) -> Result<()> {
        self.native.set_job(self.token, id, JobCommand::Pause)
    }

    #[instrument(skip(self), fields(printer = %self.name))]
    pub fn resume_job(&self, id: JobId) -> Result<()> {
        self.native.set_job(self.token, id, JobCommand::Resume)
    }

    #[instrument(skip(self), fields(printer = %self.name))]
    pub fn restart_job(&self, id: JobId) -> Result<()> {
        self.native.set_job(self.token, id, JobCommand::Restart)
    }

    #[instrument(skip(self), fields(printer = %self.name))]
    pub fn cancel_job(&self, id: JobId) -> Result<()> {
        self.native.set_job(self.token, id, JobCommand::Cancel)
    }

    /// Move a queued job to another printer's queue.
    #[instrument(skip(self), fields(printer = %self.name))]
    pub fn transfer_job(&self, id: JobId, target: &str) -> Result<()> {
        self.native.transfer_job(self.token, id, target)
    }
}

impl Drop for Printer {
    fn drop(&mut self) {
        self.native.close(self.token);
        debug!(printer = %self.name, "printer handle closed");
    }
}

impl std::fmt::Debug for Printer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Printer")
            .field("name", &self.name)
            .field("token", &self.token)
            .finish()
    }
}

/// A form bound to an open printer handle.
///
/// The setters write through: the in-memory field is updated first, then the
/// change is committed to the spooler in the same call.  There is no dirty
/// state to flush later.  On a failed commit the error propagates and the
/// in-memory field keeps the attempted value, so it can read ahead of the
/// spooler until a fresh `Printer::form` lookup.
pub struct Form<'a> {
    printer: &'a Printer,
    info: FormInfo,
}

impl std::fmt::Debug for Form<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form").field("info", &self.info).finish()
    }
}

impl Form<'_> {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Width in thousandths of a millimetre.
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Height in thousandths of a millimetre.
    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn imageable_area(&self) -> ImageableArea {
        self.info.imageable_area
    }

    pub fn info(&self) -> &FormInfo {
        &self.info
    }

    #[instrument(skip(self), fields(printer = %self.printer.name, form = %self.info.name))]
    pub fn set_width(&mut self, width: u32) -> Result<()> {
        self.info.width = width;
        self.commit()
    }

    #[instrument(skip(self), fields(printer = %self.printer.name, form = %self.info.name))]
    pub fn set_height(&mut self, height: u32) -> Result<()> {
        self.info.height = height;
        self.commit()
    }

    #[instrument(skip(self), fields(printer = %self.printer.name, form = %self.info.name))]
    pub fn set_imageable_area(&mut self, area: ImageableArea) -> Result<()> {
        self.info.imageable_area = area;
        self.commit()
    }

    fn commit(&self) -> Result<()> {
        let mut record = vec![0u8; FormInfo::WIRE_SIZE];
        self.info.encode(&mut record);
        self.printer
            .native
            .set_form(self.printer.token(), &self.info.name, &record)?;
        debug!(form = %self.info.name, "form committed to spooler");
        Ok(())
    }
}
