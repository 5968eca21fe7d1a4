// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed-size binary records for the native boundary.
//
// Every entity crosses the `query` buffer as a fixed-size record: integers
// little-endian, strings in fixed-width zero-padded UTF-8 fields, timestamps
// as Unix milliseconds.  `decode` never panics on malformed input; length
// and encoding violations surface as `ArgumentInvalid`.

use chrono::DateTime;

use spoolwatch_core::error::{Result, SpoolError};
use spoolwatch_core::types::{
    DataType, FormInfo, FormKind, ImageableArea, JobId, JobStatus, PrintDomain, PrintJob,
    PrintMonitor, PrintProvidor, PrinterInfo,
};

/// Width of a printer/form/monitor name field.
pub const NAME_WIDTH: usize = 64;

/// Width of a document name, description, or comment field.
pub const TEXT_WIDTH: usize = 128;

/// Width of an environment or port name field.
pub const SHORT_WIDTH: usize = 32;

/// A record type that can cross the native query buffer.
pub trait SpoolRecord: Sized {
    /// Exact encoded size of one record.
    const WIRE_SIZE: usize;

    fn decode(buf: &[u8]) -> Result<Self>;

    /// Encode into `buf`, which must be exactly `WIRE_SIZE` bytes.
    fn encode(&self, buf: &mut [u8]);
}

// ---------------------------------------------------------------------------
// Cursor helpers
// ---------------------------------------------------------------------------

struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(SpoolError::ArgumentInvalid(format!(
                "truncated record: wanted {} bytes at offset {}, have {}",
                len,
                self.pos,
                self.buf.len()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    fn i64(&mut self) -> Result<i64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(raw))
    }

    /// Read a fixed-width zero-padded UTF-8 string field.
    fn str(&mut self, width: usize) -> Result<String> {
        let field = self.take(width)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(width);
        std::str::from_utf8(&field[..end])
            .map(str::to_owned)
            .map_err(|e| SpoolError::ArgumentInvalid(format!("string field is not UTF-8: {e}")))
    }
}

struct RecordWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> RecordWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u32(&mut self, value: u32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&value.to_le_bytes());
        self.pos += 4;
    }

    fn u64(&mut self, value: u64) {
        self.buf[self.pos..self.pos + 8].copy_from_slice(&value.to_le_bytes());
        self.pos += 8;
    }

    fn i64(&mut self, value: i64) {
        self.buf[self.pos..self.pos + 8].copy_from_slice(&value.to_le_bytes());
        self.pos += 8;
    }

    /// Write a string into a fixed-width field, zero-padded, truncated on a
    /// character boundary if it does not fit.
    fn str(&mut self, width: usize, value: &str) {
        let mut len = value.len().min(width);
        while !value.is_char_boundary(len) {
            len -= 1;
        }
        let field = &mut self.buf[self.pos..self.pos + width];
        field.fill(0);
        field[..len].copy_from_slice(&value.as_bytes()[..len]);
        self.pos += width;
    }
}

fn timestamp_from_millis(millis: i64) -> Result<chrono::DateTime<chrono::Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        SpoolError::ArgumentInvalid(format!("timestamp {millis} out of representable range"))
    })
}

// ---------------------------------------------------------------------------
// Record layouts
// ---------------------------------------------------------------------------

impl SpoolRecord for PrintJob {
    // id + position + status + pages_printed + total_pages, two u64
    // counters, the timestamp, then printer/user/document name fields.
    const WIRE_SIZE: usize = 5 * 4 + 2 * 8 + 8 + NAME_WIDTH + NAME_WIDTH + TEXT_WIDTH;

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = RecordReader::new(buf);
        let id = JobId(r.u32()?);
        let position = r.u32()?;
        let status = JobStatus(r.u32()?);
        let pages_printed = r.u32()?;
        let total_pages = r.u32()?;
        let size_bytes = r.u64()?;
        let bytes_printed = r.u64()?;
        let submitted_at = timestamp_from_millis(r.i64()?)?;
        let printer_name = r.str(NAME_WIDTH)?;
        let user_name = r.str(NAME_WIDTH)?;
        let document_name = r.str(TEXT_WIDTH)?;
        Ok(Self {
            id,
            printer_name,
            user_name,
            document_name,
            status,
            position,
            pages_printed,
            total_pages,
            size_bytes,
            bytes_printed,
            submitted_at,
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = RecordWriter::new(buf);
        w.u32(self.id.0);
        w.u32(self.position);
        w.u32(self.status.0);
        w.u32(self.pages_printed);
        w.u32(self.total_pages);
        w.u64(self.size_bytes);
        w.u64(self.bytes_printed);
        w.i64(self.submitted_at.timestamp_millis());
        w.str(NAME_WIDTH, &self.printer_name);
        w.str(NAME_WIDTH, &self.user_name);
        w.str(TEXT_WIDTH, &self.document_name);
    }
}

impl SpoolRecord for FormInfo {
    const WIRE_SIZE: usize = NAME_WIDTH + 7 * 4;

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = RecordReader::new(buf);
        let name = r.str(NAME_WIDTH)?;
        let width = r.u32()?;
        let height = r.u32()?;
        let imageable_area = ImageableArea {
            left: r.u32()?,
            top: r.u32()?,
            right: r.u32()?,
            bottom: r.u32()?,
        };
        let raw_kind = r.u32()?;
        let kind = FormKind::from_raw(raw_kind).ok_or_else(|| {
            SpoolError::ArgumentInvalid(format!("unknown form kind flag {raw_kind}"))
        })?;
        Ok(Self {
            name,
            width,
            height,
            imageable_area,
            kind,
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = RecordWriter::new(buf);
        w.str(NAME_WIDTH, &self.name);
        w.u32(self.width);
        w.u32(self.height);
        w.u32(self.imageable_area.left);
        w.u32(self.imageable_area.top);
        w.u32(self.imageable_area.right);
        w.u32(self.imageable_area.bottom);
        w.u32(self.kind.as_raw());
    }
}

impl SpoolRecord for PrintMonitor {
    const WIRE_SIZE: usize = NAME_WIDTH + SHORT_WIDTH + NAME_WIDTH;

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = RecordReader::new(buf);
        Ok(Self {
            name: r.str(NAME_WIDTH)?,
            environment: r.str(SHORT_WIDTH)?,
            dll_name: r.str(NAME_WIDTH)?,
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = RecordWriter::new(buf);
        w.str(NAME_WIDTH, &self.name);
        w.str(SHORT_WIDTH, &self.environment);
        w.str(NAME_WIDTH, &self.dll_name);
    }
}

impl SpoolRecord for PrintDomain {
    const WIRE_SIZE: usize = NAME_WIDTH + TEXT_WIDTH;

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = RecordReader::new(buf);
        Ok(Self {
            name: r.str(NAME_WIDTH)?,
            description: r.str(TEXT_WIDTH)?,
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = RecordWriter::new(buf);
        w.str(NAME_WIDTH, &self.name);
        w.str(TEXT_WIDTH, &self.description);
    }
}

impl SpoolRecord for PrintProvidor {
    const WIRE_SIZE: usize = NAME_WIDTH + TEXT_WIDTH + TEXT_WIDTH;

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = RecordReader::new(buf);
        Ok(Self {
            name: r.str(NAME_WIDTH)?,
            description: r.str(TEXT_WIDTH)?,
            comment: r.str(TEXT_WIDTH)?,
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = RecordWriter::new(buf);
        w.str(NAME_WIDTH, &self.name);
        w.str(TEXT_WIDTH, &self.description);
        w.str(TEXT_WIDTH, &self.comment);
    }
}

impl SpoolRecord for DataType {
    const WIRE_SIZE: usize = NAME_WIDTH;

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = RecordReader::new(buf);
        Ok(Self {
            name: r.str(NAME_WIDTH)?,
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = RecordWriter::new(buf);
        w.str(NAME_WIDTH, &self.name);
    }
}

impl SpoolRecord for PrinterInfo {
    const WIRE_SIZE: usize =
        NAME_WIDTH + NAME_WIDTH + NAME_WIDTH + SHORT_WIDTH + TEXT_WIDTH + TEXT_WIDTH + 2 * 4;

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = RecordReader::new(buf);
        Ok(Self {
            name: r.str(NAME_WIDTH)?,
            server_name: r.str(NAME_WIDTH)?,
            driver_name: r.str(NAME_WIDTH)?,
            port_name: r.str(SHORT_WIDTH)?,
            comment: r.str(TEXT_WIDTH)?,
            location: r.str(TEXT_WIDTH)?,
            status: r.u32()?,
            jobs_queued: r.u32()?,
        })
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut w = RecordWriter::new(buf);
        w.str(NAME_WIDTH, &self.name);
        w.str(NAME_WIDTH, &self.server_name);
        w.str(NAME_WIDTH, &self.driver_name);
        w.str(SHORT_WIDTH, &self.port_name);
        w.str(TEXT_WIDTH, &self.comment);
        w.str(TEXT_WIDTH, &self.location);
        w.u32(self.status);
        w.u32(self.jobs_queued);
    }
}
