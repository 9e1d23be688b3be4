//! Remote transactional API abstraction
//!
//! The ERP exposes its programs as request/response transactions: a program id,
//! a transaction id, a flat record of short field codes, and an optional record
//! limit. This module models only that shape; the transport lives with the host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Flat key/value record as exchanged with the remote system
pub type RemoteRecord = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub program: String,
    pub transaction: String,
    pub record: RemoteRecord,
    pub max_records: Option<u32>,
}

impl RemoteRequest {
    pub fn new(program: &str, transaction: &str) -> Self {
        Self {
            program: program.to_string(),
            transaction: transaction.to_string(),
            record: RemoteRecord::new(),
            max_records: None,
        }
    }

    /// Add a field; blank values are left out like the host client does
    pub fn field(mut self, code: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.record.insert(code.to_string(), value);
        }
        self
    }

    pub fn optional_field(self, code: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.field(code, value),
            None => self,
        }
    }

    pub fn max_records(mut self, max: u32) -> Self {
        self.max_records = Some(max);
        self
    }

    /// `PROGRAM/Transaction`, used in logs and error messages
    pub fn operation(&self) -> String {
        format!("{}/{}", self.program, self.transaction)
    }

    /// Read transactions never change remote state
    pub fn is_read(&self) -> bool {
        self.transaction.starts_with("Get") || self.transaction.starts_with("Lst")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub records: Vec<RemoteRecord>,
}

impl RemoteResponse {
    pub fn single(record: RemoteRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn first(&self) -> Option<&RemoteRecord> {
        self.records.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteErrorKind {
    /// The addressed record does not exist
    NotFound,
    /// The remote program refused the request
    Rejected,
    /// The request never got a program answer
    Transport,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub operation: String,
    pub code: Option<String>,
    pub message: String,
    pub field: Option<String>,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            code: None,
            message: message.into(),
            field: None,
        }
    }

    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, operation, message)
    }

    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Rejected, operation, message)
    }

    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Transport, operation, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

/// Request/response interface to the ERP's transaction programs
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError>;
}
