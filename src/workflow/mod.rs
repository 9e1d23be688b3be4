// Receipt Workflow Module
//
// Orchestrates one purchase-order receipt: validation, lookups, warnings,
// control-method branching, submission, status verification and rollback of
// provisional equipment records.

pub mod compensation;
pub mod errors;
pub mod orchestrator;
pub mod polling;
pub mod types;
pub mod validation;
pub mod warnings;

#[cfg(test)]
pub mod mocks;


pub use compensation::{compensate, CompensationReport, ProvisionalTracker};
pub use errors::{IdentifierKind, LookupEntity, SubmissionStage, Violation, ViolationRule, WorkflowError};
pub use orchestrator::{ReceiptWorkflow, RunReport, RECEIPT_PACK};
pub use polling::{PollError, TerminalStatus};
pub use types::{
    ControlMethod, DiagnosticCategory, Identifier, ProvisionalRecord, ReceiptContext, ReceiptLine,
    ReceiptOutcome, StatusClass, StatusClassifier, TransactionHandle, TransactionStatus,
};
pub use validation::{validate_identifiers, MAX_IDENTIFIER_LEN};
pub use warnings::{derive_warnings, ReceiptWarning};
