use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::types::{DiagnosticCategory, TransactionHandle, TransactionStatus};
use crate::host::{OperatorError, ScreenField};

/// Remote entity a lookup step reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupEntity {
    PurchaseOrderLine,
    PurchaseOrderHeader,
    Item,
    Warehouse,
    RemainingQuantity,
    DropShipCustomer,
    SerialRegistration,
    LotRegistration,
}

impl fmt::Display for LookupEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LookupEntity::PurchaseOrderLine => "purchase order line",
            LookupEntity::PurchaseOrderHeader => "purchase order header",
            LookupEntity::Item => "item",
            LookupEntity::Warehouse => "warehouse",
            LookupEntity::RemainingQuantity => "remaining quantity",
            LookupEntity::DropShipCustomer => "drop-ship customer",
            LookupEntity::SerialRegistration => "serial number registration",
            LookupEntity::LotRegistration => "lot registration",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentifierKind {
    Serial,
    Lot,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Serial => f.write_str("serial number"),
            IdentifierKind::Lot => f.write_str("lot number"),
        }
    }
}

/// Submission call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStage {
    Header,
    Pack,
    Line,
    Process,
    Status,
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionStage::Header => "header creation",
            SubmissionStage::Pack => "pack creation",
            SubmissionStage::Line => "line attachment",
            SubmissionStage::Process => "processing request",
            SubmissionStage::Status => "status read",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationRule {
    Empty,
    TooLong { max: usize, actual: usize },
    InvalidCharacters,
    /// Same identifier entered more than once; positions of every occurrence
    Duplicate,
    WrongCount { expected: usize, actual: usize },
    MissingExpiration,
}

/// One problem with operator-entered identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// 1-based positions in the entered batch
    pub positions: Vec<usize>,
    pub identifier: String,
    pub rule: ViolationRule,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positions = self
            .positions
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match &self.rule {
            ViolationRule::Empty => write!(f, "entry {positions} is empty"),
            ViolationRule::TooLong { max, actual } => write!(
                f,
                "entry {positions} '{}' has {actual} characters (max {max})",
                self.identifier
            ),
            ViolationRule::InvalidCharacters => write!(
                f,
                "entry {positions} '{}' may only contain letters, digits and '-'",
                self.identifier
            ),
            ViolationRule::Duplicate => write!(
                f,
                "'{}' is entered more than once (entries {positions})",
                self.identifier
            ),
            ViolationRule::WrongCount { expected, actual } => {
                write!(f, "{actual} identifiers entered, {expected} required")
            }
            ViolationRule::MissingExpiration => {
                write!(f, "an expiration date is required for '{}'", self.identifier)
            }
        }
    }
}

fn join_fields(fields: &[ScreenField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Mandatory fields are missing: {}", join_fields(.missing_fields))]
    Validation { missing_fields: Vec<ScreenField> },

    #[error("{field} '{value}' is not a valid quantity")]
    InvalidQuantity { field: ScreenField, value: String },

    #[error("Could not read {entity}: {remote_message}")]
    Lookup {
        entity: LookupEntity,
        remote_message: String,
    },

    #[error("Receipt cancelled by the operator")]
    UserCancelled,

    #[error("{requested} serial numbers requested, at most {limit} can be received at once")]
    LimitExceeded { requested: Decimal, limit: u32 },

    #[error("Invalid identifiers: {}", join_violations(.violations))]
    InputValidation { violations: Vec<Violation> },

    #[error("The {kind} {identifier} is already registered for item {item_number}")]
    DuplicateIdentifier {
        kind: IdentifierKind,
        identifier: String,
        item_number: String,
    },

    #[error("Could not create the equipment record for serial number {serial}: {remote_message}")]
    Creation {
        serial: String,
        remote_message: String,
    },

    #[error("Receipt submission failed during {stage}: {remote_message}")]
    Submission {
        stage: SubmissionStage,
        remote_message: String,
    },

    #[error("Receipt transaction {transaction} ended with status {status}; {}", .category.remediation())]
    Processing {
        transaction: TransactionHandle,
        status: TransactionStatus,
        category: DiagnosticCategory,
    },

    #[error(transparent)]
    Operator(#[from] OperatorError),
}

impl WorkflowError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WorkflowError::UserCancelled)
    }
}
