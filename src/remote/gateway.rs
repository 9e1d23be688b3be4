//! Typed gateway over the ERP programs used by the receipt workflow
//!
//! One method per program/transaction. Callers never build raw requests or read
//! raw field codes; that all happens here and in [`super::records`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::api::{RemoteApi, RemoteError, RemoteRecord, RemoteRequest, RemoteResponse};
use super::records::{
    self, fields::*, format_flag, format_remote_date, CustomerOrderHead, ItemMaster, PoHeader,
    PoLine, RecordError, RemainingQuantity, TransactionHead, WarehouseRecord,
};

pub mod programs {
    pub const PURCHASE_ORDER: &str = "PPS200MI";
    pub const REMAINING_QUANTITY: &str = "PPS330MI";
    pub const ITEM: &str = "MMS200MI";
    pub const WAREHOUSE: &str = "MMS005MI";
    pub const CUSTOMER_ORDER: &str = "OIS100MI";
    pub const EQUIPMENT: &str = "MMS240MI";
    pub const LOT: &str = "MMS235MI";
    pub const RECEIPT: &str = "MHS850MI";
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("{operation} returned an unreadable record: {source}")]
    Record {
        operation: String,
        #[source]
        source: RecordError,
    },
    #[error("{operation} returned no record")]
    NoRecord { operation: String },
}

impl GatewayError {
    /// Message worth showing an operator, preferring the remote program's own text
    pub fn remote_message(&self) -> String {
        match self {
            GatewayError::Remote(err) => err.message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Remote(err) if err.is_not_found())
    }
}

/// Session values stamped on every record the workflow creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStamp {
    pub company: String,
    pub division: String,
    pub user: String,
}

/// Individual-item (equipment) record created ahead of the receipt
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EquipmentRecord {
    pub item_number: String,
    pub serial: String,
    pub facility: String,
    pub customer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptHeaderRequest {
    pub purchase_order: String,
    pub supplier: String,
    pub warehouse: String,
    pub facility: String,
    pub currency: String,
    pub transaction_subtype: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLineRequest {
    pub purchase_order: String,
    pub line_number: String,
    pub line_suffix: String,
    pub item_number: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub serial: Option<String>,
    pub lot: Option<String>,
    pub expiration: Option<NaiveDate>,
    pub complete_line: bool,
}

#[derive(Clone)]
pub struct ErpGateway {
    api: Arc<dyn RemoteApi>,
}

impl ErpGateway {
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        Self { api }
    }

    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, GatewayError> {
        debug!(operation = %request.operation(), fields = request.record.len(), "Calling remote program");
        Ok(self.api.call(request).await?)
    }

    /// Send a request that must answer with at least one record
    async fn fetch_one(&self, request: RemoteRequest) -> Result<RemoteRecord, GatewayError> {
        let operation = request.operation();
        let response = self.send(request.max_records(1)).await?;
        response
            .records
            .into_iter()
            .next()
            .ok_or(GatewayError::NoRecord { operation })
    }

    fn read<T>(
        operation: &str,
        record: &RemoteRecord,
        parse: impl FnOnce(&RemoteRecord) -> Result<T, RecordError>,
    ) -> Result<T, GatewayError> {
        parse(record).map_err(|source| GatewayError::Record {
            operation: operation.to_string(),
            source,
        })
    }

    /// Turn a read into an existence check: not-found means absent
    async fn exists(&self, request: RemoteRequest) -> Result<bool, GatewayError> {
        match self.send(request).await {
            Ok(response) => Ok(!response.records.is_empty()),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn po_line(
        &self,
        purchase_order: &str,
        line_number: &str,
        line_suffix: &str,
    ) -> Result<PoLine, GatewayError> {
        let request = RemoteRequest::new(programs::PURCHASE_ORDER, "GetLine")
            .field(PURCHASE_ORDER, purchase_order)
            .field(LINE_NUMBER, line_number)
            .field(LINE_SUFFIX, line_suffix);
        let operation = request.operation();
        let record = self.fetch_one(request).await?;
        Self::read(&operation, &record, PoLine::from_record)
    }

    pub async fn po_header(&self, purchase_order: &str) -> Result<PoHeader, GatewayError> {
        let request = RemoteRequest::new(programs::PURCHASE_ORDER, "GetHead")
            .field(PURCHASE_ORDER, purchase_order);
        let operation = request.operation();
        let record = self.fetch_one(request).await?;
        Self::read(&operation, &record, PoHeader::from_record)
    }

    pub async fn item(&self, item_number: &str) -> Result<ItemMaster, GatewayError> {
        let request =
            RemoteRequest::new(programs::ITEM, "GetItmBasic").field(ITEM_NUMBER, item_number);
        let operation = request.operation();
        let record = self.fetch_one(request).await?;
        Self::read(&operation, &record, ItemMaster::from_record)
    }

    pub async fn warehouse(&self, warehouse: &str) -> Result<WarehouseRecord, GatewayError> {
        let request =
            RemoteRequest::new(programs::WAREHOUSE, "GetWarehouse").field(WAREHOUSE, warehouse);
        let operation = request.operation();
        let record = self.fetch_one(request).await?;
        Self::read(&operation, &record, WarehouseRecord::from_record)
    }

    pub async fn remaining_quantity(
        &self,
        purchase_order: &str,
        line_number: &str,
        line_suffix: &str,
    ) -> Result<RemainingQuantity, GatewayError> {
        let request = RemoteRequest::new(programs::REMAINING_QUANTITY, "GetRemQty")
            .field(PURCHASE_ORDER, purchase_order)
            .field(LINE_NUMBER, line_number)
            .field(LINE_SUFFIX, line_suffix);
        let operation = request.operation();
        let record = self.fetch_one(request).await?;
        Self::read(&operation, &record, RemainingQuantity::from_record)
    }

    pub async fn customer_order(&self, order_number: &str) -> Result<CustomerOrderHead, GatewayError> {
        let request =
            RemoteRequest::new(programs::CUSTOMER_ORDER, "GetHead").field(ORDER_NUMBER, order_number);
        let operation = request.operation();
        let record = self.fetch_one(request).await?;
        Self::read(&operation, &record, CustomerOrderHead::from_record)
    }

    pub async fn serial_registered(&self, item_number: &str, serial: &str) -> Result<bool, GatewayError> {
        self.exists(
            RemoteRequest::new(programs::EQUIPMENT, "Get")
                .field(ITEM_NUMBER, item_number)
                .field(SERIAL_NUMBER, serial),
        )
        .await
    }

    pub async fn lot_registered(&self, item_number: &str, lot: &str) -> Result<bool, GatewayError> {
        self.exists(
            RemoteRequest::new(programs::LOT, "GetItmLot")
                .field(ITEM_NUMBER, item_number)
                .field(LOT_NUMBER, lot),
        )
        .await
    }

    pub async fn create_equipment(
        &self,
        session: &SessionStamp,
        equipment: &EquipmentRecord,
    ) -> Result<(), GatewayError> {
        let request = RemoteRequest::new(programs::EQUIPMENT, "Add")
            .field(COMPANY, &session.company)
            .field(DIVISION, &session.division)
            .field(USER, &session.user)
            .field(ITEM_NUMBER, &equipment.item_number)
            .field(SERIAL_NUMBER, &equipment.serial)
            .field(FACILITY, &equipment.facility)
            .optional_field(CUSTOMER, equipment.customer.as_deref());
        self.send(request).await?;
        Ok(())
    }

    pub async fn delete_equipment(&self, equipment: &EquipmentRecord) -> Result<(), GatewayError> {
        let request = RemoteRequest::new(programs::EQUIPMENT, "Del")
            .field(ITEM_NUMBER, &equipment.item_number)
            .field(SERIAL_NUMBER, &equipment.serial);
        self.send(request).await?;
        Ok(())
    }

    /// Create the receipt transaction header and return its message number
    pub async fn create_receipt_header(
        &self,
        session: &SessionStamp,
        header: &ReceiptHeaderRequest,
    ) -> Result<String, GatewayError> {
        let request = RemoteRequest::new(programs::RECEIPT, "AddHead")
            .field(COMPANY, &session.company)
            .field(DIVISION, &session.division)
            .field(USER, &session.user)
            .field(PURCHASE_ORDER, &header.purchase_order)
            .field(SUPPLIER, &header.supplier)
            .field(WAREHOUSE, &header.warehouse)
            .field(FACILITY, &header.facility)
            .field(CURRENCY, &header.currency)
            .field(TRANSACTION_SUBTYPE, &header.transaction_subtype);
        let operation = request.operation();
        let record = self.fetch_one(request).await?;
        Self::read(&operation, &record, records::message_number)
    }

    pub async fn add_pack(&self, message_number: &str, pack: &str) -> Result<(), GatewayError> {
        let request = RemoteRequest::new(programs::RECEIPT, "AddPack")
            .field(MESSAGE_NUMBER, message_number)
            .field(PACK_NUMBER, pack);
        self.send(request).await?;
        Ok(())
    }

    pub async fn add_line(
        &self,
        message_number: &str,
        pack: &str,
        line: &ReceiptLineRequest,
    ) -> Result<(), GatewayError> {
        let request = RemoteRequest::new(programs::RECEIPT, "AddLine")
            .field(MESSAGE_NUMBER, message_number)
            .field(PACK_NUMBER, pack)
            .field(PURCHASE_ORDER, &line.purchase_order)
            .field(LINE_NUMBER, &line.line_number)
            .field(LINE_SUFFIX, &line.line_suffix)
            .field(ITEM_NUMBER, &line.item_number)
            .field(RECEIPT_QUANTITY, line.quantity.normalize().to_string())
            .field(UNIT_PRICE, line.unit_price.normalize().to_string())
            .optional_field(SERIAL_NUMBER, line.serial.as_deref())
            .optional_field(LOT_NUMBER, line.lot.as_deref())
            .optional_field(EXPIRATION_DATE, line.expiration.map(format_remote_date))
            .field(COMPLETE_FLAG, format_flag(line.complete_line));
        self.send(request).await?;
        Ok(())
    }

    /// Ask the remote engine to process the transaction now
    pub async fn process(&self, message_number: &str) -> Result<(), GatewayError> {
        let request =
            RemoteRequest::new(programs::RECEIPT, "Process").field(MESSAGE_NUMBER, message_number);
        self.send(request).await?;
        Ok(())
    }

    pub async fn transaction_status(&self, message_number: &str) -> Result<TransactionHead, GatewayError> {
        let request =
            RemoteRequest::new(programs::RECEIPT, "GetHead").field(MESSAGE_NUMBER, message_number);
        let operation = request.operation();
        let record = self.fetch_one(request).await?;
        Self::read(&operation, &record, TransactionHead::from_record)
    }
}
