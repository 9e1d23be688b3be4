//! In-process remote for offline runs
//!
//! `SandboxRemote` answers the receipt workflow's programs from a JSON fixture.
//! Read transactions match fixture records on the request's fields, the
//! equipment and receipt programs keep state, and failures can be injected per
//! program/transaction and field values. Every call is recorded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::api::{RemoteApi, RemoteError, RemoteRecord, RemoteRequest, RemoteResponse};
use super::gateway::programs;
use super::records::fields::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxFixture {
    /// Read tables keyed by `PROGRAM/Transaction`
    pub tables: BTreeMap<String, Vec<RemoteRecord>>,
    /// Status the receipt engine reports once a transaction is processed
    pub final_status: Option<String>,
    /// Number of status reads answered with the pending status before the final one
    pub pending_reads: u32,
    pub failures: Vec<InjectedFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectedFailure {
    pub program: String,
    pub transaction: String,
    /// Field values the request must carry for the failure to trigger
    #[serde(default)]
    pub when: RemoteRecord,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl InjectedFailure {
    pub fn new(program: &str, transaction: &str, message: &str) -> Self {
        Self {
            program: program.to_string(),
            transaction: transaction.to_string(),
            when: RemoteRecord::new(),
            message: message.to_string(),
            code: None,
        }
    }

    pub fn when(mut self, field: &str, value: &str) -> Self {
        self.when.insert(field.to_string(), value.to_string());
        self
    }

    fn matches(&self, request: &RemoteRequest) -> bool {
        self.program == request.program
            && self.transaction == request.transaction
            && self
                .when
                .iter()
                .all(|(k, v)| request.record.get(k) == Some(v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxTransaction {
    pub header: RemoteRecord,
    pub packs: Vec<String>,
    pub lines: Vec<RemoteRecord>,
    pub status: String,
    status_reads: u32,
}

const PENDING_STATUS: &str = "10";
const REGISTERED_STATUS: &str = "05";
const DEFAULT_FINAL_STATUS: &str = "90";
const FIRST_MESSAGE_NUMBER: u64 = 1000;

#[derive(Debug, Default)]
struct SandboxState {
    fixture: SandboxFixture,
    calls: Vec<RemoteRequest>,
    transactions: BTreeMap<String, SandboxTransaction>,
    next_message_number: u64,
}

#[derive(Debug)]
pub struct SandboxRemote {
    state: Mutex<SandboxState>,
}

impl SandboxRemote {
    pub fn new(fixture: SandboxFixture) -> Self {
        Self {
            state: Mutex::new(SandboxState {
                fixture,
                next_message_number: FIRST_MESSAGE_NUMBER,
                ..SandboxState::default()
            }),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let fixture: SandboxFixture = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            tables = fixture.tables.len(),
            "Loaded sandbox fixture"
        );
        Ok(Self::new(fixture))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SandboxState> {
        // A panic while holding the lock only happens in a failing test
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every request received, in order
    pub fn calls(&self) -> Vec<RemoteRequest> {
        self.lock().calls.clone()
    }

    /// Requests that would change remote state
    pub fn write_calls(&self) -> Vec<RemoteRequest> {
        self.lock()
            .calls
            .iter()
            .filter(|req| !req.is_read())
            .cloned()
            .collect()
    }

    pub fn calls_to(&self, program: &str, transaction: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|req| req.program == program && req.transaction == transaction)
            .count()
    }

    /// Equipment records currently registered, as (item, serial)
    pub fn equipment(&self) -> Vec<(String, String)> {
        let state = self.lock();
        state
            .fixture
            .tables
            .get(&equipment_table())
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        (
                            row.get(ITEM_NUMBER).cloned().unwrap_or_default(),
                            row.get(SERIAL_NUMBER).cloned().unwrap_or_default(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn transactions(&self) -> Vec<SandboxTransaction> {
        self.lock().transactions.values().cloned().collect()
    }

    pub fn inject_failure(&self, failure: InjectedFailure) {
        self.lock().fixture.failures.push(failure);
    }
}

fn table_key(program: &str, transaction: &str) -> String {
    format!("{program}/{transaction}")
}

fn equipment_table() -> String {
    table_key(programs::EQUIPMENT, "Get")
}

fn record_matches(row: &RemoteRecord, request: &RemoteRecord) -> bool {
    request
        .iter()
        .all(|(k, v)| row.get(k).map_or(true, |value| value == v))
}

impl SandboxState {
    fn handle(&mut self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let operation = request.operation();

        if let Some(failure) = self.fixture.failures.iter().find(|f| f.matches(request)) {
            let mut err = RemoteError::rejected(&operation, &failure.message);
            if let Some(code) = &failure.code {
                err = err.with_code(code);
            }
            return Err(err);
        }

        match (request.program.as_str(), request.transaction.as_str()) {
            (programs::EQUIPMENT, "Add") => self.add_equipment(request),
            (programs::EQUIPMENT, "Del") => self.delete_equipment(request),
            (programs::RECEIPT, "AddHead") => Ok(self.add_head(request)),
            (programs::RECEIPT, "AddPack") => self.add_pack(request),
            (programs::RECEIPT, "AddLine") => self.add_line(request),
            (programs::RECEIPT, "Process") => self.process(request),
            (programs::RECEIPT, "GetHead") => self.read_status(request),
            _ => self.read_table(request),
        }
    }

    fn read_table(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let operation = request.operation();
        let rows = self
            .fixture
            .tables
            .get(&table_key(&request.program, &request.transaction))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let limit = request.max_records.map_or(usize::MAX, |max| max as usize);
        let records: Vec<RemoteRecord> = rows
            .iter()
            .filter(|row| record_matches(row, &request.record))
            .take(limit)
            .cloned()
            .collect();

        if records.is_empty() && request.transaction.starts_with("Get") {
            return Err(RemoteError::not_found(operation, "Record does not exist"));
        }
        Ok(RemoteResponse { records })
    }

    fn add_equipment(&mut self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let key = equipment_key(request);
        let table = self.fixture.tables.entry(equipment_table()).or_default();
        if table.iter().any(|row| record_matches(row, &key)) {
            return Err(RemoteError::rejected(request.operation(), "Serial number already exists")
                .with_field(SERIAL_NUMBER));
        }
        table.push(request.record.clone());
        Ok(RemoteResponse::empty())
    }

    fn delete_equipment(&mut self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let key = equipment_key(request);
        let table = self.fixture.tables.entry(equipment_table()).or_default();
        let before = table.len();
        table.retain(|row| !record_matches(row, &key));
        if table.len() == before {
            return Err(RemoteError::not_found(request.operation(), "Record does not exist"));
        }
        Ok(RemoteResponse::empty())
    }

    fn add_head(&mut self, request: &RemoteRequest) -> RemoteResponse {
        let number = self.next_message_number.to_string();
        self.next_message_number += 1;
        self.transactions.insert(
            number.clone(),
            SandboxTransaction {
                header: request.record.clone(),
                packs: Vec::new(),
                lines: Vec::new(),
                status: REGISTERED_STATUS.to_string(),
                status_reads: 0,
            },
        );
        let mut record = RemoteRecord::new();
        record.insert(MESSAGE_NUMBER.to_string(), number);
        RemoteResponse::single(record)
    }

    fn transaction_mut(
        &mut self,
        request: &RemoteRequest,
    ) -> Result<&mut SandboxTransaction, RemoteError> {
        let operation = request.operation();
        let number = request
            .record
            .get(MESSAGE_NUMBER)
            .ok_or_else(|| RemoteError::rejected(&operation, "Message number is mandatory").with_field(MESSAGE_NUMBER))?;
        self.transactions
            .get_mut(number)
            .ok_or_else(|| RemoteError::not_found(&operation, format!("Message {number} does not exist")))
    }

    fn add_pack(&mut self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let pack = request.record.get(PACK_NUMBER).cloned().unwrap_or_default();
        self.transaction_mut(request)?.packs.push(pack);
        Ok(RemoteResponse::empty())
    }

    fn add_line(&mut self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let operation = request.operation();
        let pack = request.record.get(PACK_NUMBER).cloned().unwrap_or_default();
        let transaction = self.transaction_mut(request)?;
        if !transaction.packs.contains(&pack) {
            return Err(RemoteError::rejected(operation, format!("Package {pack} does not exist"))
                .with_field(PACK_NUMBER));
        }
        transaction.lines.push(request.record.clone());
        Ok(RemoteResponse::empty())
    }

    fn process(&mut self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let final_status = self
            .fixture
            .final_status
            .clone()
            .unwrap_or_else(|| DEFAULT_FINAL_STATUS.to_string());
        self.transaction_mut(request)?.status = final_status;
        Ok(RemoteResponse::empty())
    }

    fn read_status(&mut self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let pending_reads = self.fixture.pending_reads;
        let transaction = self.transaction_mut(request)?;
        transaction.status_reads += 1;
        let status = if transaction.status_reads <= pending_reads {
            PENDING_STATUS.to_string()
        } else {
            transaction.status.clone()
        };

        let mut record = RemoteRecord::new();
        if let Some(number) = request.record.get(MESSAGE_NUMBER) {
            record.insert(MESSAGE_NUMBER.to_string(), number.clone());
        }
        record.insert(STATUS.to_string(), status);
        Ok(RemoteResponse::single(record))
    }
}

fn equipment_key(request: &RemoteRequest) -> RemoteRecord {
    request
        .record
        .iter()
        .filter(|(k, _)| k.as_str() == ITEM_NUMBER || k.as_str() == SERIAL_NUMBER)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[async_trait]
impl RemoteApi for SandboxRemote {
    async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let mut state = self.lock();
        state.calls.push(request.clone());
        let result = state.handle(&request);
        debug!(operation = %request.operation(), ok = result.is_ok(), "Sandbox answered");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> SandboxFixture {
        let mut fixture = SandboxFixture::default();
        let mut item = RemoteRecord::new();
        item.insert("ITNO".to_string(), "PUMP".to_string());
        item.insert("INDI".to_string(), "2".to_string());
        fixture
            .tables
            .insert("MMS200MI/GetItmBasic".to_string(), vec![item]);
        fixture
    }

    #[tokio::test]
    async fn reads_match_on_request_fields() {
        let sandbox = SandboxRemote::new(fixture());
        let hit = sandbox
            .call(RemoteRequest::new("MMS200MI", "GetItmBasic").field("ITNO", "PUMP"))
            .await
            .unwrap();
        assert_eq!(hit.records.len(), 1);

        let miss = sandbox
            .call(RemoteRequest::new("MMS200MI", "GetItmBasic").field("ITNO", "VALVE"))
            .await
            .unwrap_err();
        assert!(miss.is_not_found());
        assert_eq!(sandbox.calls().len(), 2);
        assert!(sandbox.write_calls().is_empty());
    }

    #[tokio::test]
    async fn equipment_add_and_delete_round_trip() {
        let sandbox = SandboxRemote::new(SandboxFixture::default());
        let add = RemoteRequest::new("MMS240MI", "Add")
            .field("ITNO", "PUMP")
            .field("SERN", "SN-1")
            .field("FACI", "A01");
        sandbox.call(add.clone()).await.unwrap();
        assert_eq!(sandbox.equipment(), vec![("PUMP".to_string(), "SN-1".to_string())]);

        let duplicate = sandbox.call(add).await.unwrap_err();
        assert_eq!(duplicate.field.as_deref(), Some("SERN"));

        let del = RemoteRequest::new("MMS240MI", "Del")
            .field("ITNO", "PUMP")
            .field("SERN", "SN-1");
        sandbox.call(del.clone()).await.unwrap();
        assert!(sandbox.equipment().is_empty());
        assert!(sandbox.call(del).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn status_stays_pending_for_configured_reads() {
        let mut fixture = SandboxFixture::default();
        fixture.pending_reads = 1;
        fixture.final_status = Some("25".to_string());
        let sandbox = SandboxRemote::new(fixture);

        let head = sandbox.call(RemoteRequest::new("MHS850MI", "AddHead")).await.unwrap();
        let msgn = head.records[0]["MSGN"].clone();
        sandbox
            .call(RemoteRequest::new("MHS850MI", "Process").field("MSGN", msgn.as_str()))
            .await
            .unwrap();

        let read = || RemoteRequest::new("MHS850MI", "GetHead").field("MSGN", msgn.as_str());
        let first = sandbox.call(read()).await.unwrap();
        let second = sandbox.call(read()).await.unwrap();
        assert_eq!(first.records[0]["STAT"], "10");
        assert_eq!(second.records[0]["STAT"], "25");
    }

    #[tokio::test]
    async fn injected_failure_matches_field_values() {
        let sandbox = SandboxRemote::new(SandboxFixture::default());
        sandbox.inject_failure(InjectedFailure::new("MMS240MI", "Add", "Locked").when("SERN", "SN-2"));

        let ok = RemoteRequest::new("MMS240MI", "Add").field("ITNO", "P").field("SERN", "SN-1");
        let bad = RemoteRequest::new("MMS240MI", "Add").field("ITNO", "P").field("SERN", "SN-2");
        assert!(sandbox.call(ok).await.is_ok());
        let err = sandbox.call(bad).await.unwrap_err();
        assert_eq!(err.message, "Locked");
    }

    #[test]
    fn fixture_parses_from_json() {
        let json = r#"{
            "tables": { "PPS200MI/GetHead": [ { "PUNO": "4000123", "SUNO": "S1", "CUCD": "EUR" } ] },
            "final_status": "90",
            "failures": [ { "program": "MHS850MI", "transaction": "AddLine", "message": "Lot blocked" } ]
        }"#;
        let fixture: SandboxFixture = serde_json::from_str(json).unwrap();
        assert_eq!(fixture.tables["PPS200MI/GetHead"].len(), 1);
        assert_eq!(fixture.failures[0].message, "Lot blocked");
        assert_eq!(fixture.pending_reads, 0);
    }
}
