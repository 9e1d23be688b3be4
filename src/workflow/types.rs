// Core types for the receipt workflow

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::StatusCodeConfig;
use crate::host::{HostContext, ScreenField};
use crate::remote::EquipmentRecord;

/// Inventory-control method from the item master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMethod {
    None,
    Manual,
    Serial,
    Lot,
}

impl ControlMethod {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" | "" => Some(ControlMethod::None),
            "1" => Some(ControlMethod::Manual),
            "2" => Some(ControlMethod::Serial),
            "3" => Some(ControlMethod::Lot),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ControlMethod::None => "0",
            ControlMethod::Manual => "1",
            ControlMethod::Serial => "2",
            ControlMethod::Lot => "3",
        }
    }
}

/// Operator- and lookup-derived values for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptContext {
    pub purchase_order: Option<String>,
    pub supplier: Option<String>,
    pub warehouse: Option<String>,
    pub line_number: Option<String>,
    pub line_suffix: Option<String>,
    pub requested_quantity: Option<String>,
    pub item_number: Option<String>,
    pub complete_line: bool,

    pub control_method: Option<ControlMethod>,
    pub expiration_required: bool,
    pub remaining_quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub currency: Option<String>,
    pub facility: Option<String>,
    pub drop_ship_customer: Option<String>,
    pub warehouse_external_code: Option<String>,
}

impl ReceiptContext {
    /// Capture the operator fields currently shown by the host screen
    pub fn capture(host: &dyn HostContext) -> Self {
        let read = |field: ScreenField| {
            host.field(field)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            purchase_order: read(ScreenField::PurchaseOrder),
            supplier: read(ScreenField::Supplier),
            warehouse: read(ScreenField::Warehouse),
            line_number: read(ScreenField::LineNumber),
            line_suffix: read(ScreenField::LineSuffix),
            requested_quantity: read(ScreenField::ReceiptQuantity),
            item_number: read(ScreenField::ItemNumber),
            complete_line: read(ScreenField::CompleteLine)
                .map(|flag| matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "x" | "y"))
                .unwrap_or(false),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    Serial(String),
    Lot(String),
}

impl Identifier {
    pub fn value(&self) -> &str {
        match self {
            Identifier::Serial(value) | Identifier::Lot(value) => value,
        }
    }
}

/// One unit of work submitted under the receipt pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    pub identifier: Option<Identifier>,
    pub quantity: Decimal,
    pub expiration: Option<NaiveDate>,
}

/// Equipment record created before the receipt is confirmed
pub type ProvisionalRecord = EquipmentRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHandle(String);

impl TransactionHandle {
    pub fn new(message_number: impl Into<String>) -> Self {
        Self(message_number.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionStatus(String);

impl TransactionStatus {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the operator should look to fix a failed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCategory {
    Header,
    PackageOrLine,
    Other,
}

impl DiagnosticCategory {
    pub fn remediation(&self) -> &'static str {
        match self {
            DiagnosticCategory::Header => {
                "check the receipt header (supplier, warehouse, currency) in the transaction log"
            }
            DiagnosticCategory::PackageOrLine => {
                "check the package and its lines (quantities, serial or lot numbers) in the transaction log"
            }
            DiagnosticCategory::Other => "check the transaction log for details",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Pending,
    Failed(DiagnosticCategory),
}

/// Maps remote status codes onto success, pending, or a failure category
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    codes: StatusCodeConfig,
}

impl StatusClassifier {
    pub fn new(codes: StatusCodeConfig) -> Self {
        Self { codes }
    }

    pub fn classify(&self, status: &TransactionStatus) -> StatusClass {
        let code = status.code();
        if code == self.codes.success {
            StatusClass::Success
        } else if self.codes.pending.iter().any(|c| c == code) {
            StatusClass::Pending
        } else if self.codes.header_errors.iter().any(|c| c == code) {
            StatusClass::Failed(DiagnosticCategory::Header)
        } else if self.codes.package_errors.iter().any(|c| c == code) {
            StatusClass::Failed(DiagnosticCategory::PackageOrLine)
        } else {
            StatusClass::Failed(DiagnosticCategory::Other)
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptOutcome {
    pub transaction: TransactionHandle,
    pub status: TransactionStatus,
    pub lines: Vec<ReceiptLine>,
    pub context: ReceiptContext,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiptConfig;
    use crate::host::FileHostContext;

    #[test]
    fn control_method_codes() {
        assert_eq!(ControlMethod::from_code("2"), Some(ControlMethod::Serial));
        assert_eq!(ControlMethod::from_code(""), Some(ControlMethod::None));
        assert_eq!(ControlMethod::from_code("7"), None);
        assert_eq!(ControlMethod::Lot.code(), "3");
    }

    #[test]
    fn capture_trims_and_drops_blank_fields() {
        let host = FileHostContext::default()
            .with_field(ScreenField::PurchaseOrder, " 4000123 ")
            .with_field(ScreenField::Supplier, "   ")
            .with_field(ScreenField::CompleteLine, "1");

        let context = ReceiptContext::capture(&host);
        assert_eq!(context.purchase_order.as_deref(), Some("4000123"));
        assert_eq!(context.supplier, None);
        assert!(context.complete_line);
        assert_eq!(context.control_method, None);
    }

    #[test]
    fn classifier_uses_configured_codes() {
        let classifier = StatusClassifier::new(ReceiptConfig::default().workflow.status_codes);
        let class = |code: &str| classifier.classify(&TransactionStatus::new(code));

        assert_eq!(class("90"), StatusClass::Success);
        assert_eq!(class("10"), StatusClass::Pending);
        assert_eq!(class("15"), StatusClass::Failed(DiagnosticCategory::Header));
        assert_eq!(class("35"), StatusClass::Failed(DiagnosticCategory::PackageOrLine));
        assert_eq!(class("99"), StatusClass::Failed(DiagnosticCategory::Other));
    }
}
