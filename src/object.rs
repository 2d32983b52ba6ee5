// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Heap-allocated object types.
//!
//! Today there is exactly one: interned strings. The VM owns every live
//! object through an object registry (see [`crate::vm::Vm::objects`]);
//! this module only describes the object's shape and how it hashes.


use crate::table::Table;
use crate::value::Value;
use std::rc::Rc;

/// FNV-1a seed, as specified.
const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
/// FNV-1a prime, as specified.
const FNV_PRIME: u32 = 16_777_619;

/// Hash a byte sequence with 32-bit FNV-1a.
///
/// Wrapping arithmetic throughout, matching the source's `uint32_t`
/// overflow-is-defined behavior.
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A heap-allocated, interned string.
///
/// Two `ObjString`s with equal `chars` are never both live in the same VM:
/// the interner (`Vm::strings`) guarantees exactly one canonical instance
/// per distinct byte sequence, so reference identity (`Rc::ptr_eq`) is
/// content identity.
#[derive(Debug)]
pub struct ObjString {
    /// The string's bytes. Not NUL-terminated; Rust strings don't need it.
    pub chars: Box<str>,
    /// Precomputed FNV-1a hash of `chars.as_bytes()`.
    pub hash: u32,
}

impl ObjString {
    /// Build a string object and precompute its hash.
    #[must_use]
    pub fn new(chars: Box<str>) -> Self {
        let hash = fnv1a(chars.as_bytes());
        Self { chars, hash }
    }

    /// Byte length (not codepoint count), matching the spec's `length`
    /// field.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Whether the string has zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

impl PartialEq for ObjString {
    /// Content equality, independent of interning. Used by `find_string`
    /// before a canonical instance exists.
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.chars == other.chars
    }
}

impl Eq for ObjString {}

/// Intern a borrowed string, copying it into a fresh heap buffer only on a
/// miss.
///
/// Mirrors the source's `copyString`: the caller doesn't own `chars`, so a
/// cache hit costs nothing beyond the hash and probe.
pub fn copy_string(strings: &mut Table, objects: &mut Vec<Rc<ObjString>>, chars: &str) -> Rc<ObjString> {
    let hash = fnv1a(chars.as_bytes());
    if let Some(existing) = strings.find_string(chars, hash) {
        return existing;
    }
    intern_new(strings, objects, chars.into())
}

/// Intern an owned string buffer, taking ownership on a miss.
///
/// Mirrors the source's `takeString`: on a cache hit the caller's buffer
/// is simply dropped (no `free` call needed, Rust does it for us) and the
/// canonical reference is returned instead.
pub fn take_string(strings: &mut Table, objects: &mut Vec<Rc<ObjString>>, chars: Box<str>) -> Rc<ObjString> {
    let hash = fnv1a(chars.as_bytes());
    if let Some(existing) = strings.find_string(&chars, hash) {
        return existing;
    }
    intern_new(strings, objects, chars)
}

fn intern_new(strings: &mut Table, objects: &mut Vec<Rc<ObjString>>, chars: Box<str>) -> Rc<ObjString> {
    let obj = Rc::new(ObjString::new(chars));
    objects.push(Rc::clone(&obj));
    strings.set(Rc::clone(&obj), Value::nil());
    obj
}
