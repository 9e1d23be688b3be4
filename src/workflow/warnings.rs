// Pre-submission warnings the operator must acknowledge

use rust_decimal::Decimal;

use crate::host::{ConfirmKind, ConfirmPrompt};
use crate::remote::records::WarehouseRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptWarning {
    /// Warehouse is managed by an external system
    ExternalWarehouse {
        warehouse: String,
        external_code: String,
    },
    OverReceipt {
        requested: Decimal,
        remaining: Decimal,
        excess: Decimal,
    },
}

impl ReceiptWarning {
    pub fn title(&self) -> &'static str {
        match self {
            ReceiptWarning::ExternalWarehouse { .. } => "Externally managed warehouse",
            ReceiptWarning::OverReceipt { .. } => "Over-receipt",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ReceiptWarning::ExternalWarehouse {
                warehouse,
                external_code,
            } => format!(
                "Warehouse {warehouse} is managed by an external system ({external_code}). Receive here anyway?"
            ),
            ReceiptWarning::OverReceipt {
                requested,
                remaining,
                excess,
            } => format!(
                "Receiving {requested} exceeds the remaining quantity {remaining} by {excess}. Continue?"
            ),
        }
    }

    pub fn to_prompt(&self) -> ConfirmPrompt {
        ConfirmPrompt {
            kind: ConfirmKind::Warning,
            title: self.title().to_string(),
            message: self.message(),
        }
    }
}

/// Warnings for one receipt, in the order they are shown.
///
/// Quantities are normalized so the operator sees `2`, not `2.000`.
pub fn derive_warnings(
    warehouse: &WarehouseRecord,
    transaction_subtype: &str,
    requested: Decimal,
    remaining: Decimal,
) -> Vec<ReceiptWarning> {
    let mut warnings = Vec::new();

    if let Some(code) = warehouse
        .external_code
        .as_deref()
        .filter(|code| !code.is_empty() && *code != transaction_subtype)
    {
        warnings.push(ReceiptWarning::ExternalWarehouse {
            warehouse: warehouse.warehouse.clone(),
            external_code: code.to_string(),
        });
    }

    if requested > remaining {
        warnings.push(ReceiptWarning::OverReceipt {
            requested: requested.normalize(),
            remaining: remaining.normalize(),
            excess: (requested - remaining).normalize(),
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warehouse(external_code: Option<&str>) -> WarehouseRecord {
        WarehouseRecord {
            warehouse: "W01".to_string(),
            name: None,
            external_code: external_code.map(str::to_string),
        }
    }

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn no_warnings_for_a_plain_receipt() {
        assert!(derive_warnings(&warehouse(None), "PR", dec("3"), dec("3")).is_empty());
        assert!(derive_warnings(&warehouse(Some("PR")), "PR", dec("1"), dec("3")).is_empty());
    }

    #[test]
    fn over_receipt_reports_normalized_excess() {
        let warnings = derive_warnings(&warehouse(None), "PR", dec("5"), dec("3.000"));
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            ReceiptWarning::OverReceipt { excess, .. } => assert_eq!(excess.to_string(), "2"),
            other => panic!("unexpected warning {other:?}"),
        }
        assert_eq!(
            warnings[0].message(),
            "Receiving 5 exceeds the remaining quantity 3 by 2. Continue?"
        );
    }

    #[test]
    fn external_warehouse_comes_before_over_receipt() {
        let warnings = derive_warnings(&warehouse(Some("WMS")), "PR", dec("5"), dec("3"));
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], ReceiptWarning::ExternalWarehouse { .. }));
        assert!(matches!(warnings[1], ReceiptWarning::OverReceipt { .. }));
        assert_eq!(warnings[0].to_prompt().kind, ConfirmKind::Warning);
    }
}
