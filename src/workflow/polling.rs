use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::debug;

use super::types::{
    DiagnosticCategory, StatusClass, StatusClassifier, TransactionHandle, TransactionStatus,
};
use crate::config::PollingConfig;
use crate::remote::{ErpGateway, GatewayError};

#[derive(Debug)]
pub enum PollError {
    /// The status read itself failed
    Remote(GatewayError),
    /// Attempts ran out while the transaction was still pending
    StillPending(TransactionStatus),
}

/// A status outside the pending set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    Succeeded(TransactionStatus),
    Failed(TransactionStatus, DiagnosticCategory),
}

impl TerminalStatus {
    pub fn status(&self) -> &TransactionStatus {
        match self {
            TerminalStatus::Succeeded(status) | TerminalStatus::Failed(status, _) => status,
        }
    }
}

enum Attempt {
    Pending(TransactionStatus),
    Failed(GatewayError),
}

/// Delays between status reads after the first one: doubling from twice the
/// initial delay, capped at the configured maximum.
fn backoff(config: &PollingConfig) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor(config.initial_delay_ms)
        .max_delay(config.max_delay())
        .take(config.max_attempts.saturating_sub(1) as usize)
}

/// Read the transaction status until it leaves the pending set.
///
/// Waits the initial delay before the first read. Returns the first non-pending
/// status, whether it is success or failure.
pub async fn await_terminal_status(
    gateway: &ErpGateway,
    handle: &TransactionHandle,
    classifier: &StatusClassifier,
    config: &PollingConfig,
) -> Result<TerminalStatus, PollError> {
    if config.initial_delay_ms > 0 {
        tokio::time::sleep(config.initial_delay()).await;
    }

    let read_status = move || async move {
        let head = gateway
            .transaction_status(handle.as_str())
            .await
            .map_err(Attempt::Failed)?;
        let status = TransactionStatus::new(head.status);
        match classifier.classify(&status) {
            StatusClass::Pending => {
                debug!(transaction = %handle, %status, "Transaction still pending");
                Err(Attempt::Pending(status))
            }
            StatusClass::Success => Ok(TerminalStatus::Succeeded(status)),
            StatusClass::Failed(category) => Ok(TerminalStatus::Failed(status, category)),
        }
    };

    RetryIf::spawn(backoff(config), read_status, |attempt: &Attempt| {
        matches!(attempt, Attempt::Pending(_))
    })
    .await
    .map_err(|attempt| match attempt {
        Attempt::Pending(status) => PollError::StillPending(status),
        Attempt::Failed(err) => PollError::Remote(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiptConfig;
    use crate::remote::{InjectedFailure, SandboxFixture, SandboxRemote, SessionStamp, ReceiptHeaderRequest};
    use std::sync::Arc;

    fn polling(max_attempts: u32) -> PollingConfig {
        PollingConfig {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts,
        }
    }

    async fn processed_transaction(fixture: SandboxFixture) -> (Arc<SandboxRemote>, ErpGateway, TransactionHandle) {
        let remote = Arc::new(SandboxRemote::new(fixture));
        let gateway = ErpGateway::new(remote.clone());
        let stamp = SessionStamp {
            company: "100".to_string(),
            division: "AAA".to_string(),
            user: "OPER".to_string(),
        };
        let header = ReceiptHeaderRequest {
            purchase_order: "4000123".to_string(),
            supplier: "SUP01".to_string(),
            warehouse: "W01".to_string(),
            facility: "F01".to_string(),
            currency: "EUR".to_string(),
            transaction_subtype: "PR".to_string(),
        };
        let number = gateway.create_receipt_header(&stamp, &header).await.unwrap();
        gateway.process(&number).await.unwrap();
        (remote, gateway, TransactionHandle::new(number))
    }

    fn classifier() -> StatusClassifier {
        StatusClassifier::new(ReceiptConfig::default().workflow.status_codes)
    }

    #[tokio::test]
    async fn polls_through_pending_reads() {
        let fixture = SandboxFixture {
            pending_reads: 2,
            ..SandboxFixture::default()
        };
        let (remote, gateway, handle) = processed_transaction(fixture).await;

        let status = await_terminal_status(&gateway, &handle, &classifier(), &polling(5))
            .await
            .unwrap();

        assert_eq!(status, TerminalStatus::Succeeded(TransactionStatus::new("90")));
        assert_eq!(remote.calls_to("MHS850MI", "GetHead"), 3);
    }

    #[tokio::test]
    async fn failure_status_is_terminal() {
        let fixture = SandboxFixture {
            final_status: Some("25".to_string()),
            ..SandboxFixture::default()
        };
        let (remote, gateway, handle) = processed_transaction(fixture).await;

        let status = await_terminal_status(&gateway, &handle, &classifier(), &polling(5))
            .await
            .unwrap();

        assert_eq!(
            status,
            TerminalStatus::Failed(TransactionStatus::new("25"), DiagnosticCategory::PackageOrLine)
        );
        assert_eq!(status.status().code(), "25");
        assert_eq!(remote.calls_to("MHS850MI", "GetHead"), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let fixture = SandboxFixture {
            pending_reads: 10,
            ..SandboxFixture::default()
        };
        let (remote, gateway, handle) = processed_transaction(fixture).await;

        let result = await_terminal_status(&gateway, &handle, &classifier(), &polling(3)).await;

        assert!(matches!(result, Err(PollError::StillPending(ref s)) if s.code() == "10"));
        assert_eq!(remote.calls_to("MHS850MI", "GetHead"), 3);
    }

    #[tokio::test]
    async fn read_errors_are_not_retried() {
        let (remote, gateway, handle) = processed_transaction(SandboxFixture::default()).await;
        remote.inject_failure(InjectedFailure::new("MHS850MI", "GetHead", "connection reset"));

        let result = await_terminal_status(&gateway, &handle, &classifier(), &polling(5)).await;

        assert!(matches!(result, Err(PollError::Remote(_))));
        assert_eq!(remote.calls_to("MHS850MI", "GetHead"), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = PollingConfig {
            initial_delay_ms: 500,
            max_delay_ms: 3_000,
            max_attempts: 5,
        };
        let delays: Vec<u64> = backoff(&config).map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 3_000, 3_000]);
    }
}
