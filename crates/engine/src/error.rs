// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use thiserror::Error;

/// Errors that can occur while submitting and running jobs
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Value(#[from] xpm_core::ValueError),
    #[error(transparent)]
    Registry(#[from] xpm_registry::RegistryError),
    #[error(transparent)]
    Connector(#[from] xpm_connectors::ConnectorError),
    #[error("assertion error: {0}")]
    Assertion(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
