// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Open-addressed hash table, keyed by interned-string identity.
//!
//! Used for both the VM's global-variable bindings and the string
//! interner. Linear probing with tombstone-aware deletion: a deleted
//! bucket is marked rather than cleared, so later probe chains that
//! passed through it at insertion time still terminate correctly.


use crate::object::ObjString;
use crate::value::Value;
use std::rc::Rc;
use tracing::{debug, warn};

/// Load factor above which the table grows, per the spec (0.75).
const MAX_LOAD_FACTOR: f64 = 0.75;
/// Capacity the table jumps to on its first growth.
const INITIAL_CAPACITY: usize = 8;

/// A single bucket.
///
/// - Empty: `key.is_none() && value.is_nil()`
/// - Live: `key.is_some()`
/// - Tombstone: `key.is_none() && value == Value::Bool(true)`
#[derive(Clone)]
struct Entry {
    key: Option<Rc<ObjString>>,
    value: Value,
}

impl Entry {
    const fn empty() -> Self {
        Self {
            key: None,
            value: Value::Nil,
        }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }
}

/// Open-addressed table mapping interned strings to values.
pub struct Table {
    /// Live entries plus tombstones. `count / entries.len() <= 0.75`.
    count: usize,
    entries: Vec<Entry>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// Create an empty table. No allocation happens until the first
    /// insertion forces a grow to [`INITIAL_CAPACITY`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            entries: Vec::new(),
        }
    }

    /// Number of live entries plus tombstones.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Current bucket capacity (0 before the first grow).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Look up `key` by reference identity.
    #[must_use]
    pub fn get(&self, key: &Rc<ObjString>) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let index = Self::find_entry(&self.entries, key);
        self.entries[index].key.as_ref()?;
        Some(self.entries[index].value.clone())
    }

    /// Insert or overwrite `key -> value`. Returns `true` iff `key` was not
    /// already present (whether the destination bucket was Empty or a
    /// reused tombstone). `count` only increments on the Empty case —
    /// a tombstone already counted towards it.
    pub fn set(&mut self, key: Rc<ObjString>, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD_FACTOR {
            let new_capacity = if self.capacity() == 0 {
                INITIAL_CAPACITY
            } else {
                self.capacity() * 2
            };
            self.adjust_capacity(new_capacity);
        }

        let index = Self::find_entry(&self.entries, &key);
        let entry = &mut self.entries[index];
        let is_new_key = entry.key.is_none();

        if is_new_key && !entry.is_tombstone() {
            self.count += 1;
        }

        entry.key = Some(key);
        entry.value = value;
        is_new_key
    }

    /// Mark `key`'s bucket as a tombstone. Returns `true` iff the key was
    /// present. `count` is intentionally left unchanged: a tombstone still
    /// costs probe-chain length until the next resize clears it.
    pub fn delete(&mut self, key: &Rc<ObjString>) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = Self::find_entry(&self.entries, key);
        if self.entries[index].key.is_none() {
            return false;
        }
        self.entries[index] = Entry {
            key: None,
            value: Value::Bool(true),
        };
        true
    }

    /// Copy every live entry from `self` into `to`. Tombstones are not
    /// copied.
    pub fn add_all(&self, to: &mut Self) {
        for entry in &self.entries {
            if let Some(key) = &entry.key {
                to.set(Rc::clone(key), entry.value.clone());
            }
        }
    }

    /// Find an interned string by content, used by the interner before a
    /// canonical `Rc<ObjString>` exists to key a reference-identity probe
    /// with.
    #[must_use]
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<Rc<ObjString>> {
        if self.entries.is_empty() {
            return None;
        }
        let capacity = self.capacity();
        let mut index = (hash as usize) % capacity;
        loop {
            let entry = &self.entries[index];
            match &entry.key {
                None if !entry.is_tombstone() => return None,
                Some(key) if key.hash == hash && key.chars.as_ref() == chars => {
                    return Some(Rc::clone(key));
                }
                _ => {}
            }
            index = (index + 1) % capacity;
        }
    }

    /// Probe for `key`'s bucket: either the bucket already holding it, or
    /// the first Empty/tombstone bucket on its probe chain (so callers can
    /// both look up and prepare to insert with one scan). Tombstones are
    /// remembered so a non-found probe returns the earliest reusable slot.
    fn find_entry(entries: &[Entry], key: &Rc<ObjString>) -> usize {
        let capacity = entries.len();
        let mut index = (key.hash as usize) % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &entries[index];
            match &entry.key {
                Some(k) if Rc::ptr_eq(k, key) => return index,
                None if entry.is_tombstone() => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                None => return tombstone.unwrap_or(index),
                Some(_) => {}
            }
            index = (index + 1) % capacity;
        }
    }

    /// Grow (or initialize) the table to `new_capacity`, rehashing every
    /// live entry. Tombstones are dropped; probe chains never survive a
    /// resize because the modulus changes.
    fn adjust_capacity(&mut self, new_capacity: usize) {
        let old_capacity = self.capacity();
        let tombstones = self.entries.iter().filter(|e| e.is_tombstone()).count();
        let live = self.count.saturating_sub(tombstones);
        if tombstones > live {
            warn!(
                old_capacity,
                count = self.count,
                tombstones,
                "resizing table with more tombstones than live entries"
            );
        }

        let mut new_entries = vec![Entry::empty(); new_capacity];
        let mut new_count = 0;
        for entry in self.entries.drain(..) {
            if let Some(key) = entry.key {
                let index = Self::find_entry(&new_entries, &key);
                new_entries[index] = Entry {
                    key: Some(key),
                    value: entry.value,
                };
                new_count += 1;
            }
        }

        debug!(old_capacity, new_capacity, count = new_count, "table resized");
        self.entries = new_entries;
        self.count = new_count;
    }
}
