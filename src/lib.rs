// PO Receipt Library - Purchase-Order Receipt Workflow Orchestration
// This exposes the core components for testing and integration

pub mod config;
pub mod host;
pub mod remote;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use config::{PollingConfig, ReceiptConfig, WorkflowConfig};
pub use host::{
    ConsoleNotifier, FileHostContext, HostContext, Notifier, OperatorPrompt, ScriptedOperator,
    TerminalOperator,
};
pub use remote::{ErpGateway, RemoteApi, SandboxFixture, SandboxRemote};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    validate_identifiers, CompensationReport, ControlMethod, ReceiptContext, ReceiptOutcome,
    ReceiptWorkflow, RunReport, WorkflowError,
};
