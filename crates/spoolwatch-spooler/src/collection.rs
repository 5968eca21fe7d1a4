// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Point-in-time entity listings.
//
// A `Listing` is a snapshot collection in native enumeration order.  It
// deliberately exposes no mutation surface: listings are rebuilt wholesale
// by the next accessor call, never patched.

use serde::Serialize;

use spoolwatch_core::types::{
    DataType, FormInfo, PrintDomain, PrintJob, PrintMonitor, PrintProvidor, PrinterInfo,
};

/// Entities addressable by a display name.
pub trait NamedEntity {
    fn entity_name(&self) -> &str;
}

impl NamedEntity for PrinterInfo {
    fn entity_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntity for FormInfo {
    fn entity_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntity for PrintMonitor {
    fn entity_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntity for PrintDomain {
    fn entity_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntity for PrintProvidor {
    fn entity_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntity for DataType {
    fn entity_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntity for PrintJob {
    fn entity_name(&self) -> &str {
        &self.document_name
    }
}

/// An immutable collection of spooler entities in enumeration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    items: Vec<T>,
}

impl<T> Listing<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub(crate) fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: NamedEntity> Listing<T> {
    /// Find the first entity whose name matches, ignoring ASCII case as the
    /// spooler does.
    pub fn find_by_name(&self, name: &str) -> Option<&T> {
        self.items
            .iter()
            .find(|item| item.entity_name().eq_ignore_ascii_case(name))
    }
}

impl<T> IntoIterator for Listing<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Listing<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
