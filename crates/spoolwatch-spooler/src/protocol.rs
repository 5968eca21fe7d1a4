// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The buffered enumeration protocol.
//
// Every listing in the engine goes through the same two-phase native query:
// probe with an empty buffer to learn the byte count, allocate exactly that
// much, query again, and decode the returned records in order.  The buffer
// is a plain `Vec`, so it is released on every exit path.  A second call
// that still fails (the entity set grew between the calls, the handle died)
// propagates as a typed error; there is no silent truncation and no
// retry-with-larger-buffer.

use tracing::debug;

use spoolwatch_core::error::{Result, SpoolError};

use crate::collection::Listing;
use crate::native::{NativeSpooler, Selector};
use crate::records::SpoolRecord;

/// Enumerate all entities matched by `selector` into a typed listing.
pub fn enumerate<T: SpoolRecord>(
    native: &dyn NativeSpooler,
    selector: Selector,
) -> Result<Listing<T>> {
    let operation = selector.operation();

    let probe = native.query(selector, &mut []);
    if probe.bytes_needed == 0 {
        if probe.ok {
            // Nothing to enumerate: success with an empty collection.
            return Ok(Listing::empty());
        }
        return Err(SpoolError::NativeCallFailure {
            operation,
            os_error: probe.os_error,
        });
    }

    let mut buf = vec![0u8; probe.bytes_needed as usize];
    let reply = native.query(selector, &mut buf);
    if !reply.ok {
        return Err(SpoolError::NativeCallFailure {
            operation,
            os_error: reply.os_error,
        });
    }

    let count = reply.items_returned as usize;
    if count * T::WIRE_SIZE > buf.len() {
        return Err(SpoolError::ArgumentInvalid(format!(
            "{operation} returned {count} records but only {} bytes",
            buf.len()
        )));
    }

    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        let record = &buf[i * T::WIRE_SIZE..(i + 1) * T::WIRE_SIZE];
        items.push(T::decode(record)?);
    }

    debug!(operation, count, bytes = buf.len(), "enumeration complete");
    Ok(Listing::new(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{os_error, QueryReply};
    use crate::stub::StubSpooler;
    use spoolwatch_core::types::{DataType, PrintMonitor};

    #[test]
    fn empty_set_is_success_not_error() {
        let stub = StubSpooler::new();
        let listing: Listing<PrintMonitor> =
            enumerate(&stub, Selector::Monitors).expect("enumerate");
        assert!(listing.is_empty());
    }

    #[test]
    fn items_match_native_records() {
        let stub = StubSpooler::new();
        stub.add_data_type(DataType { name: "RAW".into() });
        stub.add_data_type(DataType { name: "EMF".into() });

        let listing: Listing<DataType> =
            enumerate(&stub, Selector::DataTypes).expect("enumerate");
        assert_eq!(listing.len(), 2);
        assert_eq!(listing.get(0).map(|d| d.name.as_str()), Some("RAW"));
        assert_eq!(listing.get(1).map(|d| d.name.as_str()), Some("EMF"));
    }

    #[test]
    fn second_call_failure_propagates_without_retry() {
        let stub = StubSpooler::new();
        stub.add_data_type(DataType { name: "RAW".into() });
        // Probe succeeds; the sized call then fails as if the set grew.
        stub.fail_next_sized_query(os_error::INSUFFICIENT_BUFFER);

        let err = enumerate::<DataType>(&stub, Selector::DataTypes).unwrap_err();
        match err {
            SpoolError::NativeCallFailure {
                operation,
                os_error: code,
            } => {
                assert_eq!(operation, "EnumDataTypes");
                assert_eq!(code, os_error::INSUFFICIENT_BUFFER);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn probe_failure_propagates() {
        let stub = StubSpooler::new();
        stub.fail_next_query(os_error::ACCESS_DENIED);
        let err = enumerate::<DataType>(&stub, Selector::DataTypes).unwrap_err();
        assert!(matches!(
            err,
            SpoolError::NativeCallFailure {
                os_error: os_error::ACCESS_DENIED,
                ..
            }
        ));
    }

    #[test]
    fn consecutive_listings_are_element_wise_equal() {
        let stub = StubSpooler::new();
        stub.add_data_type(DataType { name: "RAW".into() });
        stub.add_data_type(DataType { name: "EMF".into() });

        let first: Listing<DataType> =
            enumerate(&stub, Selector::DataTypes).expect("first");
        let second: Listing<DataType> =
            enumerate(&stub, Selector::DataTypes).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn query_reply_constructors() {
        let ok = QueryReply::success(128, 2);
        assert!(ok.ok);
        assert_eq!(ok.items_returned, 2);

        let err = QueryReply::failure(os_error::INVALID_HANDLE, 0);
        assert!(!err.ok);
        assert_eq!(err.os_error, os_error::INVALID_HANDLE);
    }
}
