// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! xpm-core: data model for the Experimaestro workflow engine.
//!
//! Typed parameter values (scalars, maps, arrays), the type/argument schema
//! they conform to, and the content-addressed digest that identifies a
//! concrete parameter assignment.

pub mod digest;
pub mod error;
pub mod path;
pub mod scalar;
pub mod typename;
pub mod types;
pub mod value;

pub use digest::{digest, unique_identifier, DIGEST_LENGTH};
pub use error::ValueError;
pub use path::HostPath;
pub use scalar::{Scalar, ScalarKind};
pub use typename::Typename;
pub use types::{Argument, Generator, Type, TypeKind};
pub use value::{ArrayValue, Flag, Flags, JobToken, MapValue, ScalarValue, Value};

/// Reserved map key carrying the value's type.
pub const KEY_TYPE: &str = "$type";
/// Reserved map key carrying the task that produced the value.
pub const KEY_TASK: &str = "$task";
/// Reserved map key wrapping a simple value inside a typed node.
pub const KEY_VALUE: &str = "$value";
/// Reserved map key carrying metadata about the producing job.
pub const KEY_JOB: &str = "$job";
