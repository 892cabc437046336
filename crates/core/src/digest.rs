// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressed identity of parameter values
//!
//! The digest is a SHA-1 over a canonical byte stream. It is stable across
//! runs, insensitive to the insertion of default-equal entries, and
//! insensitive to ignorable values (paths, defaults, explicit ignores).

use crate::scalar::Scalar;
use crate::value::Value;
use sha1::{Digest as _, Sha1};

/// SHA-1 digest length in bytes.
pub const DIGEST_LENGTH: usize = 20;

const TAG_MAP: u8 = 0;
const TAG_ARRAY: u8 = 1;
const TAG_SCALAR: u8 = 2;

/// Compute the canonical digest of a value.
pub fn digest(value: &Value) -> [u8; DIGEST_LENGTH] {
    let mut hasher = Sha1::new();
    update(&mut hasher, value);
    hasher.finalize().into()
}

/// The unique identifier: lowercase hex of the digest.
pub fn unique_identifier(value: &Value) -> String {
    hex::encode(digest(value))
}

fn write_bytes(hasher: &mut Sha1, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn update(hasher: &mut Sha1, value: &Value) {
    match value {
        Value::Scalar(scalar) => {
            hasher.update([TAG_SCALAR, scalar.scalar.kind().digest_byte()]);
            match &scalar.scalar {
                Scalar::Unset | Scalar::None => {}
                Scalar::Integer(i) => hasher.update(i.to_le_bytes()),
                Scalar::Real(r) => hasher.update(r.to_bits().to_le_bytes()),
                Scalar::Boolean(b) => hasher.update([u8::from(*b)]),
                Scalar::String(s) => write_bytes(hasher, s.as_bytes()),
                Scalar::Path(p) => write_bytes(hasher, p.to_string().as_bytes()),
            }
        }
        Value::Array(array) => {
            hasher.update([TAG_ARRAY]);
            hasher.update((array.items.len() as u64).to_le_bytes());
            for item in &array.items {
                hasher.update(digest(item));
            }
        }
        Value::Map(map) => {
            hasher.update([TAG_MAP]);
            write_bytes(hasher, map.type_name.as_str().as_bytes());
            match &map.task {
                Some(task) => write_bytes(hasher, task.as_str().as_bytes()),
                None => hasher.update([0u8]),
            }
            // Entries digest through their own sub-digest, in insertion
            // order; ignorable children contribute nothing at all.
            for (key, child) in &map.entries {
                if child.can_ignore() {
                    continue;
                }
                write_bytes(hasher, key.as_bytes());
                hasher.update(digest(child));
            }
        }
    }
}

#[cfg(test)]
#[path = "digest_tests.rs"]
mod tests;
