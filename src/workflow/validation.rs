//! Pure validation of operator input
//!
//! Nothing here talks to the remote system or the operator. Identifier checks
//! collect every violation in the batch instead of stopping at the first.

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use super::errors::{Violation, ViolationRule};
use super::types::ReceiptContext;
use crate::host::ScreenField;

pub const MAX_IDENTIFIER_LEN: usize = 20;

static IDENTIFIER_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9-]+$").expect("identifier pattern is valid")
});

/// Check a batch of serial or lot identifiers.
///
/// Format violations are reported per entry. A value entered more than once is
/// reported once, listing every position it appears at, so the first and last
/// occurrence are treated the same.
pub fn validate_identifiers(identifiers: &[String]) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut occurrences: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

    for (index, identifier) in identifiers.iter().enumerate() {
        let position = index + 1;

        if identifier.is_empty() {
            violations.push(Violation {
                positions: vec![position],
                identifier: identifier.clone(),
                rule: ViolationRule::Empty,
            });
            continue;
        }

        let length = identifier.chars().count();
        if length > MAX_IDENTIFIER_LEN {
            violations.push(Violation {
                positions: vec![position],
                identifier: identifier.clone(),
                rule: ViolationRule::TooLong {
                    max: MAX_IDENTIFIER_LEN,
                    actual: length,
                },
            });
        }

        if !IDENTIFIER_CHARS.is_match(identifier) {
            violations.push(Violation {
                positions: vec![position],
                identifier: identifier.clone(),
                rule: ViolationRule::InvalidCharacters,
            });
        }

        occurrences.entry(identifier.as_str()).or_default().push(position);
    }

    let mut duplicates: Vec<Violation> = occurrences
        .into_iter()
        .filter(|(_, positions)| positions.len() > 1)
        .map(|(identifier, positions)| Violation {
            positions,
            identifier: identifier.to_string(),
            rule: ViolationRule::Duplicate,
        })
        .collect();
    duplicates.sort_by_key(|v| v.positions[0]);
    violations.extend(duplicates);

    violations
}

/// Screen fields that must be filled before anything is sent remotely
pub const MANDATORY_FIELDS: [ScreenField; 6] = [
    ScreenField::PurchaseOrder,
    ScreenField::Supplier,
    ScreenField::Warehouse,
    ScreenField::LineNumber,
    ScreenField::ReceiptQuantity,
    ScreenField::ItemNumber,
];

pub fn missing_fields(context: &ReceiptContext) -> Vec<ScreenField> {
    MANDATORY_FIELDS
        .iter()
        .copied()
        .filter(|field| {
            let value = match field {
                ScreenField::PurchaseOrder => &context.purchase_order,
                ScreenField::Supplier => &context.supplier,
                ScreenField::Warehouse => &context.warehouse,
                ScreenField::LineNumber => &context.line_number,
                ScreenField::ReceiptQuantity => &context.requested_quantity,
                ScreenField::ItemNumber => &context.item_number,
                ScreenField::LineSuffix | ScreenField::CompleteLine => return false,
            };
            value.as_deref().map_or(true, |v| v.trim().is_empty())
        })
        .collect()
}

/// Parse a strictly positive quantity
pub fn parse_quantity(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|quantity| quantity.is_sign_positive() && !quantity.is_zero())
}

pub fn is_whole(quantity: Decimal) -> bool {
    quantity.fract().is_zero()
}

/// Number of serial numbers a quantity calls for; `None` unless it is a whole
/// number that fits in a `u64`
pub fn serial_count(quantity: Decimal) -> Option<u64> {
    if is_whole(quantity) {
        quantity.trunc().to_u64()
    } else {
        None
    }
}
