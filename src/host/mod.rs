//! Host collaborators
//!
//! The host application owns the screen, the operator dialogs and the message
//! bar. The workflow only sees these narrow traits, injected at construction.

pub mod context;
pub mod notify;
pub mod operator;

pub use context::{FileHostContext, HostContext, ScreenField, SessionInfo};
pub use notify::{ConsoleNotifier, NotificationLevel, Notifier};
pub use operator::{
    ConfirmKind, ConfirmPrompt, LotEntry, LotPrompt, OperatorError, OperatorPrompt,
    PromptOutcome, ScriptedAnswers, ScriptedOperator, SerialPrompt, ShownPrompt,
    TerminalOperator,
};

#[cfg(any(test, feature = "testing"))]
pub use context::MockHostContext;
#[cfg(any(test, feature = "testing"))]
pub use notify::MockNotifier;
#[cfg(any(test, feature = "testing"))]
pub use operator::MockOperatorPrompt;
