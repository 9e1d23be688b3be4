// Test doubles and sandbox scenarios for the workflow - no side effects

use std::sync::{Arc, Mutex};

use super::orchestrator::ReceiptWorkflow;
use crate::config::ReceiptConfig;
use crate::host::{FileHostContext, NotificationLevel, Notifier, ScreenField, ScriptedAnswers, ScriptedOperator, SessionInfo};
use crate::remote::records::fields::*;
use crate::remote::{RemoteRecord, SandboxFixture, SandboxRemote};

pub const PO: &str = "4000123";
pub const LINE: &str = "10";
pub const ITEM: &str = "PUMP-100";
pub const WAREHOUSE_ID: &str = "W01";
pub const FACILITY_ID: &str = "F01";

/// Notifier that records everything it is asked to show
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<(NotificationLevel, String)>>,
    pub refreshes: Mutex<u32>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_notifications(&self) -> Vec<(NotificationLevel, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn get_refreshes(&self) -> u32 {
        *self.refreshes.lock().unwrap()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }

    fn refresh_screen(&self) {
        *self.refreshes.lock().unwrap() += 1;
    }
}

fn row(pairs: &[(&str, &str)]) -> RemoteRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Sandbox data for one purchase order line of `ITEM`
pub fn fixture(control_method: &str, remaining: &str) -> SandboxFixture {
    let mut fixture = SandboxFixture::default();
    let tables = &mut fixture.tables;
    tables.insert(
        "PPS200MI/GetLine".to_string(),
        vec![row(&[
            (PURCHASE_ORDER, PO),
            (LINE_NUMBER, LINE),
            (LINE_SUFFIX, "0"),
            (ITEM_NUMBER, ITEM),
            (WAREHOUSE, WAREHOUSE_ID),
            (FACILITY, FACILITY_ID),
            (ORDERED_QUANTITY, "10"),
            (UNIT_PRICE, "12.50"),
        ])],
    );
    tables.insert(
        "PPS200MI/GetHead".to_string(),
        vec![row(&[(PURCHASE_ORDER, PO), (SUPPLIER, "SUP01"), (CURRENCY, "EUR")])],
    );
    tables.insert(
        "MMS200MI/GetItmBasic".to_string(),
        vec![row(&[
            (ITEM_NUMBER, ITEM),
            (ITEM_DESCRIPTION, "Centrifugal pump"),
            (CONTROL_METHOD, control_method),
            (EXPIRATION_REQUIRED, "0"),
        ])],
    );
    tables.insert(
        "MMS005MI/GetWarehouse".to_string(),
        vec![row(&[(WAREHOUSE, WAREHOUSE_ID), (WAREHOUSE_NAME, "Main warehouse")])],
    );
    tables.insert(
        "PPS330MI/GetRemQty".to_string(),
        vec![row(&[
            (PURCHASE_ORDER, PO),
            (LINE_NUMBER, LINE),
            (LINE_SUFFIX, "0"),
            (REMAINING_QUANTITY, remaining),
        ])],
    );
    fixture
}

/// Set a field on the first record of a fixture table
pub fn set_field(fixture: &mut SandboxFixture, table: &str, field: &str, value: &str) {
    if let Some(first) = fixture.tables.get_mut(table).and_then(|rows| rows.first_mut()) {
        first.insert(field.to_string(), value.to_string());
    }
}

pub fn add_row(fixture: &mut SandboxFixture, table: &str, pairs: &[(&str, &str)]) {
    fixture.tables.entry(table.to_string()).or_default().push(row(pairs));
}

pub fn host(quantity: &str) -> FileHostContext {
    FileHostContext {
        session: SessionInfo {
            company: "100".to_string(),
            division: "AAA".to_string(),
            user: "OPER".to_string(),
        },
        ..FileHostContext::default()
    }
    .with_field(ScreenField::PurchaseOrder, PO)
    .with_field(ScreenField::Supplier, "SUP01")
    .with_field(ScreenField::Warehouse, WAREHOUSE_ID)
    .with_field(ScreenField::LineNumber, LINE)
    .with_field(ScreenField::LineSuffix, "0")
    .with_field(ScreenField::ReceiptQuantity, quantity)
    .with_field(ScreenField::ItemNumber, ITEM)
}

/// Configuration without waits
pub fn quick_config() -> ReceiptConfig {
    let mut config = ReceiptConfig::default();
    config.workflow.pack_settle_delay_ms = 0;
    config.polling.initial_delay_ms = 0;
    config.polling.max_delay_ms = 0;
    config
}

pub fn serials(values: &[&str]) -> ScriptedAnswers {
    ScriptedAnswers {
        serials: Some(values.iter().map(|v| v.to_string()).collect()),
        ..ScriptedAnswers::default()
    }
}

/// A workflow wired to a sandbox, a scripted operator and a recording notifier
pub struct Harness {
    pub remote: Arc<SandboxRemote>,
    pub operator: Arc<ScriptedOperator>,
    pub notifier: Arc<RecordingNotifier>,
    pub host: Arc<FileHostContext>,
    pub workflow: ReceiptWorkflow,
}

impl Harness {
    pub fn new(fixture: SandboxFixture, host: FileHostContext, answers: ScriptedAnswers) -> Self {
        Self::with_operator(fixture, host, ScriptedOperator::new(answers), quick_config())
    }

    pub fn with_operator(
        fixture: SandboxFixture,
        host: FileHostContext,
        operator: ScriptedOperator,
        config: ReceiptConfig,
    ) -> Self {
        let remote = Arc::new(SandboxRemote::new(fixture));
        let operator = Arc::new(operator);
        let notifier = Arc::new(RecordingNotifier::new());
        let host = Arc::new(host);
        let workflow = ReceiptWorkflow::new(
            remote.clone(),
            host.clone(),
            operator.clone(),
            notifier.clone(),
            &config,
        );
        Self {
            remote,
            operator,
            notifier,
            host,
            workflow,
        }
    }
}
