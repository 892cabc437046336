//! Behavioral specifications for the workflow engine.
//!
//! These tests are black-box: they drive the public API against real
//! processes under temporary directories and verify the on-disk protocol.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/digest.rs"]
mod digest;
#[path = "specs/restart.rs"]
mod restart;
#[path = "specs/scheduling.rs"]
mod scheduling;
#[path = "specs/types.rs"]
mod types;
#[path = "specs/validation.rs"]
mod validation;
