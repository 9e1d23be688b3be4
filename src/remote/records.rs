//! Typed views over the remote system's short-code records
//!
//! Every field code the workflow reads or writes is named here once. Reading a
//! record that lacks a mandatory field, or carries an unparseable value, is a
//! [`RecordError`] rather than a silently empty string.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use super::api::RemoteRecord;

pub mod fields {
    pub const PURCHASE_ORDER: &str = "PUNO";
    pub const LINE_NUMBER: &str = "PNLI";
    pub const LINE_SUFFIX: &str = "PNLS";
    pub const SUPPLIER: &str = "SUNO";
    pub const CURRENCY: &str = "CUCD";
    pub const FACILITY: &str = "FACI";
    pub const WAREHOUSE: &str = "WHLO";
    pub const WAREHOUSE_NAME: &str = "WHNM";
    pub const EXTERNAL_CODE: &str = "EXTC";
    pub const ITEM_NUMBER: &str = "ITNO";
    pub const ITEM_DESCRIPTION: &str = "ITDS";
    pub const CONTROL_METHOD: &str = "INDI";
    pub const EXPIRATION_REQUIRED: &str = "EXPC";
    pub const ORDERED_QUANTITY: &str = "ORQA";
    pub const REMAINING_QUANTITY: &str = "REQA";
    pub const RECEIPT_QUANTITY: &str = "RVQA";
    pub const UNIT_PRICE: &str = "PUPR";
    pub const REFERENCE_CATEGORY: &str = "RORC";
    pub const REFERENCE_ORDER: &str = "RORN";
    pub const ORDER_NUMBER: &str = "ORNO";
    pub const CUSTOMER: &str = "CUNO";
    pub const SERIAL_NUMBER: &str = "SERN";
    pub const LOT_NUMBER: &str = "BANO";
    pub const EXPIRATION_DATE: &str = "EXPI";
    pub const COMPANY: &str = "CONO";
    pub const DIVISION: &str = "DIVI";
    pub const USER: &str = "RESP";
    pub const MESSAGE_NUMBER: &str = "MSGN";
    pub const PACK_NUMBER: &str = "PACN";
    pub const TRANSACTION_SUBTYPE: &str = "E0PB";
    pub const COMPLETE_FLAG: &str = "OEND";
    pub const STATUS: &str = "STAT";
}

use fields::*;

/// Date format used on the wire (YYYYMMDD)
pub const REMOTE_DATE_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{entity} record is missing field {field}")]
    MissingField { entity: String, field: String },
    #[error("{entity} field {field} has invalid value '{value}'")]
    InvalidValue {
        entity: String,
        field: String,
        value: String,
    },
}

/// Reads named fields from one record on behalf of an entity
struct FieldReader<'a> {
    entity: &'static str,
    record: &'a RemoteRecord,
}

impl<'a> FieldReader<'a> {
    fn new(entity: &'static str, record: &'a RemoteRecord) -> Self {
        Self { entity, record }
    }

    fn optional(&self, field: &str) -> Option<String> {
        self.record
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn required(&self, field: &str) -> Result<String, RecordError> {
        self.optional(field).ok_or_else(|| RecordError::MissingField {
            entity: self.entity.to_string(),
            field: field.to_string(),
        })
    }

    fn decimal(&self, field: &str) -> Result<Decimal, RecordError> {
        let raw = self.required(field)?;
        Decimal::from_str(&raw).map_err(|_| RecordError::InvalidValue {
            entity: self.entity.to_string(),
            field: field.to_string(),
            value: raw,
        })
    }

    fn flag(&self, field: &str) -> Result<bool, RecordError> {
        match self.optional(field).as_deref() {
            None | Some("0") => Ok(false),
            Some("1") => Ok(true),
            Some(other) => Err(RecordError::InvalidValue {
                entity: self.entity.to_string(),
                field: field.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoLine {
    pub purchase_order: String,
    pub line_number: String,
    pub line_suffix: String,
    pub item_number: String,
    pub warehouse: String,
    pub facility: String,
    pub ordered_quantity: Decimal,
    pub unit_price: Decimal,
    pub reference_category: Option<String>,
    pub reference_order: Option<String>,
}

impl PoLine {
    pub fn from_record(record: &RemoteRecord) -> Result<Self, RecordError> {
        let r = FieldReader::new("purchase order line", record);
        Ok(Self {
            purchase_order: r.required(PURCHASE_ORDER)?,
            line_number: r.required(LINE_NUMBER)?,
            line_suffix: r.optional(LINE_SUFFIX).unwrap_or_else(|| "0".to_string()),
            item_number: r.required(ITEM_NUMBER)?,
            warehouse: r.required(WAREHOUSE)?,
            facility: r.required(FACILITY)?,
            ordered_quantity: r.decimal(ORDERED_QUANTITY)?,
            unit_price: r.decimal(UNIT_PRICE)?,
            reference_category: r.optional(REFERENCE_CATEGORY),
            reference_order: r.optional(REFERENCE_ORDER),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoHeader {
    pub purchase_order: String,
    pub supplier: String,
    pub currency: String,
}

impl PoHeader {
    pub fn from_record(record: &RemoteRecord) -> Result<Self, RecordError> {
        let r = FieldReader::new("purchase order header", record);
        Ok(Self {
            purchase_order: r.required(PURCHASE_ORDER)?,
            supplier: r.required(SUPPLIER)?,
            currency: r.required(CURRENCY)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemMaster {
    pub item_number: String,
    pub description: Option<String>,
    pub control_method_code: String,
    pub expiration_required: bool,
}

impl ItemMaster {
    pub fn from_record(record: &RemoteRecord) -> Result<Self, RecordError> {
        let r = FieldReader::new("item", record);
        Ok(Self {
            item_number: r.required(ITEM_NUMBER)?,
            description: r.optional(ITEM_DESCRIPTION),
            control_method_code: r.optional(CONTROL_METHOD).unwrap_or_else(|| "0".to_string()),
            expiration_required: r.flag(EXPIRATION_REQUIRED)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseRecord {
    pub warehouse: String,
    pub name: Option<String>,
    /// Present when an external system manages the warehouse
    pub external_code: Option<String>,
}

impl WarehouseRecord {
    pub fn from_record(record: &RemoteRecord) -> Result<Self, RecordError> {
        let r = FieldReader::new("warehouse", record);
        Ok(Self {
            warehouse: r.required(WAREHOUSE)?,
            name: r.optional(WAREHOUSE_NAME),
            external_code: r.optional(EXTERNAL_CODE),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemainingQuantity {
    pub remaining: Decimal,
}

impl RemainingQuantity {
    pub fn from_record(record: &RemoteRecord) -> Result<Self, RecordError> {
        let r = FieldReader::new("remaining quantity", record);
        Ok(Self {
            remaining: r.decimal(REMAINING_QUANTITY)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerOrderHead {
    pub order_number: String,
    pub customer: String,
}

impl CustomerOrderHead {
    pub fn from_record(record: &RemoteRecord) -> Result<Self, RecordError> {
        let r = FieldReader::new("customer order", record);
        Ok(Self {
            order_number: r.required(ORDER_NUMBER)?,
            customer: r.required(CUSTOMER)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionHead {
    pub message_number: String,
    pub status: String,
}

impl TransactionHead {
    pub fn from_record(record: &RemoteRecord) -> Result<Self, RecordError> {
        let r = FieldReader::new("receipt transaction", record);
        Ok(Self {
            message_number: r.required(MESSAGE_NUMBER)?,
            status: r.required(STATUS)?,
        })
    }
}

/// Read the transaction number handed back by header creation
pub fn message_number(record: &RemoteRecord) -> Result<String, RecordError> {
    FieldReader::new("receipt transaction", record).required(MESSAGE_NUMBER)
}

pub fn format_remote_date(date: NaiveDate) -> String {
    date.format(REMOTE_DATE_FORMAT).to_string()
}

pub fn format_flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
