//! Receipt workflow orchestration
//!
//! A run walks Validate, Lookups, Warnings, Branch and Submit strictly in
//! order. Equipment records created on the serial branch are tracked for the
//! whole run; if the run fails for any reason after creating them, they are
//! deleted before the result is reported.

use futures::future::{join_all, try_join_all};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use super::compensation::{compensate, CompensationReport, ProvisionalTracker};
use super::errors::{IdentifierKind, LookupEntity, SubmissionStage, Violation, ViolationRule, WorkflowError};
use super::polling::{await_terminal_status, PollError, TerminalStatus};
use super::types::{
    ControlMethod, DiagnosticCategory, Identifier, ProvisionalRecord, ReceiptContext, ReceiptLine,
    ReceiptOutcome, StatusClassifier, TransactionHandle, TransactionStatus,
};
use super::validation::{is_whole, missing_fields, parse_quantity, serial_count, validate_identifiers};
use super::warnings::derive_warnings;
use crate::config::{PollingConfig, ReceiptConfig, WorkflowConfig};
use crate::host::{
    ConfirmKind, ConfirmPrompt, HostContext, LotPrompt, NotificationLevel, Notifier,
    OperatorPrompt, PromptOutcome, ScreenField, SerialPrompt,
};
use crate::remote::records::{ItemMaster, PoHeader, PoLine, WarehouseRecord};
use crate::remote::{
    ErpGateway, GatewayError, ReceiptHeaderRequest, ReceiptLineRequest, RemoteApi, SessionStamp,
};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

/// Every receipt goes into a single pack with this number
pub const RECEIPT_PACK: &str = "1";

const DEFAULT_LINE_SUFFIX: &str = "0";

/// Outcome of one run together with its audit trail
#[derive(Debug)]
pub struct RunReport {
    pub correlation_id: String,
    pub outcome: Result<ReceiptOutcome, WorkflowError>,
    /// Present when provisional records had to be rolled back
    pub compensation: Option<CompensationReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Operator input after validation
#[derive(Debug, Clone)]
struct ValidatedRequest {
    purchase_order: String,
    supplier: String,
    warehouse: String,
    line_number: String,
    line_suffix: String,
    item_number: String,
    quantity: Decimal,
    complete_line: bool,
}

#[derive(Debug, Clone)]
struct Lookups {
    line: PoLine,
    header: PoHeader,
    item: ItemMaster,
    warehouse: WarehouseRecord,
    remaining: Decimal,
    control_method: ControlMethod,
    drop_ship_customer: Option<String>,
}

impl Lookups {
    fn apply_to(&self, context: &mut ReceiptContext) {
        context.control_method = Some(self.control_method);
        context.expiration_required = self.item.expiration_required;
        context.remaining_quantity = Some(self.remaining);
        context.unit_price = Some(self.line.unit_price);
        context.currency = Some(self.header.currency.clone());
        context.facility = Some(self.line.facility.clone());
        context.drop_ship_customer = self.drop_ship_customer.clone();
        context.warehouse_external_code = self.warehouse.external_code.clone();
    }
}

fn lookup_error(entity: LookupEntity) -> impl FnOnce(GatewayError) -> WorkflowError {
    move |err| WorkflowError::Lookup {
        entity,
        remote_message: err.remote_message(),
    }
}

fn submission_error(stage: SubmissionStage) -> impl FnOnce(GatewayError) -> WorkflowError {
    move |err| WorkflowError::Submission {
        stage,
        remote_message: err.remote_message(),
    }
}

pub struct ReceiptWorkflow {
    gateway: ErpGateway,
    host: Arc<dyn HostContext>,
    operator: Arc<dyn OperatorPrompt>,
    notifier: Arc<dyn Notifier>,
    settings: WorkflowConfig,
    polling: PollingConfig,
    classifier: StatusClassifier,
}

impl ReceiptWorkflow {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        host: Arc<dyn HostContext>,
        operator: Arc<dyn OperatorPrompt>,
        notifier: Arc<dyn Notifier>,
        config: &ReceiptConfig,
    ) -> Self {
        Self {
            gateway: ErpGateway::new(remote),
            host,
            operator,
            notifier,
            settings: config.workflow.clone(),
            polling: config.polling.clone(),
            classifier: StatusClassifier::new(config.workflow.status_codes.clone()),
        }
    }

    /// Read the operator fields from the host screen
    pub fn capture_context(&self) -> ReceiptContext {
        ReceiptContext::capture(self.host.as_ref())
    }

    /// Capture the host screen and run the workflow on it
    pub async fn run(&self) -> RunReport {
        self.execute_with_audit(self.capture_context()).await
    }

    pub async fn execute(&self, context: ReceiptContext) -> Result<ReceiptOutcome, WorkflowError> {
        self.execute_with_audit(context).await.outcome
    }

    pub async fn execute_with_audit(&self, mut context: ReceiptContext) -> RunReport {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            &correlation_id,
            context.purchase_order.as_deref(),
            context.line_number.as_deref(),
        );

        async move {
            info!("Starting receipt workflow");
            let mut tracker = ProvisionalTracker::new();
            let outcome = self.run_steps(&mut context, &mut tracker).await;

            let compensation = match &outcome {
                Err(err) if !tracker.is_empty() => {
                    warn!(
                        error = %err,
                        provisional = tracker.len(),
                        "Receipt failed after creating equipment records"
                    );
                    Some(compensate(&self.gateway, &mut tracker).await)
                }
                Err(_) => None,
                Ok(_) => {
                    let confirmed = tracker.confirm();
                    if !confirmed.is_empty() {
                        debug!(count = confirmed.len(), "Equipment records confirmed by receipt");
                    }
                    None
                }
            };

            self.report(&outcome);

            RunReport {
                correlation_id,
                outcome,
                compensation,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_steps(
        &self,
        context: &mut ReceiptContext,
        tracker: &mut ProvisionalTracker,
    ) -> Result<ReceiptOutcome, WorkflowError> {
        let request = Self::validate(context)?;

        let lookups = self.lookup(&request).await?;
        lookups.apply_to(context);

        self.confirm_warnings(&request, &lookups).await?;

        let lines = match lookups.control_method {
            ControlMethod::Serial => self.receive_serials(&request, &lookups, tracker).await?,
            ControlMethod::Lot => self.receive_lot(&request, &lookups).await?,
            ControlMethod::None | ControlMethod::Manual => self.receive_plain(&request).await?,
        };

        let (transaction, status) = self.submit(&request, &lookups, &lines).await?;

        Ok(ReceiptOutcome {
            transaction,
            status,
            lines,
            context: context.clone(),
        })
    }

    fn validate(context: &ReceiptContext) -> Result<ValidatedRequest, WorkflowError> {
        let missing = missing_fields(context);
        if !missing.is_empty() {
            return Err(WorkflowError::Validation {
                missing_fields: missing,
            });
        }

        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        let raw_quantity = field(&context.requested_quantity);
        let quantity = parse_quantity(&raw_quantity).ok_or_else(|| WorkflowError::InvalidQuantity {
            field: ScreenField::ReceiptQuantity,
            value: raw_quantity.clone(),
        })?;

        Ok(ValidatedRequest {
            purchase_order: field(&context.purchase_order),
            supplier: field(&context.supplier),
            warehouse: field(&context.warehouse),
            line_number: field(&context.line_number),
            line_suffix: context
                .line_suffix
                .clone()
                .unwrap_or_else(|| DEFAULT_LINE_SUFFIX.to_string()),
            item_number: field(&context.item_number),
            quantity,
            complete_line: context.complete_line,
        })
    }

    async fn lookup(&self, request: &ValidatedRequest) -> Result<Lookups, WorkflowError> {
        let gateway = &self.gateway;

        let line = gateway
            .po_line(&request.purchase_order, &request.line_number, &request.line_suffix)
            .await
            .map_err(lookup_error(LookupEntity::PurchaseOrderLine))?;
        let header = gateway
            .po_header(&request.purchase_order)
            .await
            .map_err(lookup_error(LookupEntity::PurchaseOrderHeader))?;
        let item = gateway
            .item(&request.item_number)
            .await
            .map_err(lookup_error(LookupEntity::Item))?;
        let warehouse = gateway
            .warehouse(&request.warehouse)
            .await
            .map_err(lookup_error(LookupEntity::Warehouse))?;
        let remaining = gateway
            .remaining_quantity(&request.purchase_order, &request.line_number, &request.line_suffix)
            .await
            .map_err(lookup_error(LookupEntity::RemainingQuantity))?
            .remaining;

        let control_method =
            ControlMethod::from_code(&item.control_method_code).ok_or_else(|| WorkflowError::Lookup {
                entity: LookupEntity::Item,
                remote_message: format!(
                    "unknown inventory control method '{}'",
                    item.control_method_code
                ),
            })?;

        let drop_ship_customer = match (&line.reference_category, &line.reference_order) {
            (Some(category), Some(order)) if *category == self.settings.drop_ship_relation_code => {
                let head = gateway
                    .customer_order(order)
                    .await
                    .map_err(lookup_error(LookupEntity::DropShipCustomer))?;
                Some(head.customer)
            }
            _ => None,
        };

        info!(
            item = %item.item_number,
            control_method = ?control_method,
            remaining = %remaining,
            drop_ship = drop_ship_customer.is_some(),
            "Lookups complete"
        );

        Ok(Lookups {
            line,
            header,
            item,
            warehouse,
            remaining,
            control_method,
            drop_ship_customer,
        })
    }

    async fn confirm_warnings(
        &self,
        request: &ValidatedRequest,
        lookups: &Lookups,
    ) -> Result<(), WorkflowError> {
        let warnings = derive_warnings(
            &lookups.warehouse,
            &self.settings.transaction_subtype,
            request.quantity,
            lookups.remaining,
        );

        for warning in warnings {
            debug!(warning = warning.title(), "Asking operator to accept warning");
            if self.operator.confirm(&warning.to_prompt()).await?.is_cancelled() {
                info!(warning = warning.title(), "Operator declined warning");
                return Err(WorkflowError::UserCancelled);
            }
        }
        Ok(())
    }

    async fn receive_serials(
        &self,
        request: &ValidatedRequest,
        lookups: &Lookups,
        tracker: &mut ProvisionalTracker,
    ) -> Result<Vec<ReceiptLine>, WorkflowError> {
        let invalid_quantity = || WorkflowError::InvalidQuantity {
            field: ScreenField::ReceiptQuantity,
            value: request.quantity.normalize().to_string(),
        };
        if !is_whole(request.quantity) {
            return Err(invalid_quantity());
        }
        if request.quantity > Decimal::from(self.settings.max_serial_count) {
            return Err(WorkflowError::LimitExceeded {
                requested: request.quantity.normalize(),
                limit: self.settings.max_serial_count,
            });
        }
        let count = serial_count(request.quantity)
            .and_then(|count| u32::try_from(count).ok())
            .ok_or_else(invalid_quantity)?;

        let prompt = SerialPrompt {
            item_number: request.item_number.clone(),
            count,
        };
        let serials = match self.operator.serial_numbers(&prompt).await? {
            PromptOutcome::Entered(serials) => serials,
            PromptOutcome::Cancelled => return Err(WorkflowError::UserCancelled),
        };

        let mut violations = Vec::new();
        if serials.len() != count as usize {
            violations.push(Violation {
                positions: Vec::new(),
                identifier: String::new(),
                rule: ViolationRule::WrongCount {
                    expected: count as usize,
                    actual: serials.len(),
                },
            });
        }
        violations.extend(validate_identifiers(&serials));
        if !violations.is_empty() {
            return Err(WorkflowError::InputValidation { violations });
        }

        let registered = try_join_all(
            serials
                .iter()
                .map(|serial| self.gateway.serial_registered(&request.item_number, serial)),
        )
        .await
        .map_err(lookup_error(LookupEntity::SerialRegistration))?;

        if let Some((serial, _)) = serials.iter().zip(&registered).find(|(_, taken)| **taken) {
            return Err(WorkflowError::DuplicateIdentifier {
                kind: IdentifierKind::Serial,
                identifier: serial.clone(),
                item_number: request.item_number.clone(),
            });
        }

        let stamp = self.session_stamp();
        let records: Vec<ProvisionalRecord> = serials
            .iter()
            .map(|serial| ProvisionalRecord {
                item_number: request.item_number.clone(),
                serial: serial.clone(),
                facility: lookups.line.facility.clone(),
                customer: lookups.drop_ship_customer.clone(),
            })
            .collect();

        // Wait for every creation so each record that exists remotely is tracked
        let results = join_all(
            records
                .iter()
                .map(|record| self.gateway.create_equipment(&stamp, record)),
        )
        .await;

        let mut first_failure = None;
        for (record, result) in records.into_iter().zip(results) {
            match result {
                Ok(()) => tracker.track(record),
                Err(err) => {
                    warn!(serial = %record.serial, error = %err, "Equipment creation failed");
                    if first_failure.is_none() {
                        first_failure = Some(WorkflowError::Creation {
                            serial: record.serial,
                            remote_message: err.remote_message(),
                        });
                    }
                }
            }
        }
        if let Some(err) = first_failure {
            return Err(err);
        }

        info!(count = tracker.len(), "Equipment records created");

        Ok(serials
            .into_iter()
            .map(|serial| ReceiptLine {
                identifier: Some(Identifier::Serial(serial)),
                quantity: Decimal::ONE,
                expiration: None,
            })
            .collect())
    }

    async fn receive_lot(
        &self,
        request: &ValidatedRequest,
        lookups: &Lookups,
    ) -> Result<Vec<ReceiptLine>, WorkflowError> {
        let prompt = LotPrompt {
            item_number: request.item_number.clone(),
            quantity: request.quantity.normalize().to_string(),
            expiration_required: lookups.item.expiration_required,
        };
        let entry = match self.operator.lot(&prompt).await? {
            PromptOutcome::Entered(entry) => entry,
            PromptOutcome::Cancelled => return Err(WorkflowError::UserCancelled),
        };

        let mut violations = validate_identifiers(std::slice::from_ref(&entry.lot));
        if lookups.item.expiration_required && entry.expiration.is_none() {
            violations.push(Violation {
                positions: vec![1],
                identifier: entry.lot.clone(),
                rule: ViolationRule::MissingExpiration,
            });
        }
        if !violations.is_empty() {
            return Err(WorkflowError::InputValidation { violations });
        }

        let taken = self
            .gateway
            .lot_registered(&request.item_number, &entry.lot)
            .await
            .map_err(lookup_error(LookupEntity::LotRegistration))?;
        if taken {
            return Err(WorkflowError::DuplicateIdentifier {
                kind: IdentifierKind::Lot,
                identifier: entry.lot,
                item_number: request.item_number.clone(),
            });
        }

        Ok(vec![ReceiptLine {
            identifier: Some(Identifier::Lot(entry.lot)),
            quantity: request.quantity,
            expiration: entry.expiration,
        }])
    }

    async fn receive_plain(&self, request: &ValidatedRequest) -> Result<Vec<ReceiptLine>, WorkflowError> {
        let prompt = ConfirmPrompt {
            kind: ConfirmKind::Receipt,
            title: "Confirm receipt".to_string(),
            message: format!(
                "Receive {} of {} on purchase order {} line {}?",
                request.quantity.normalize(),
                request.item_number,
                request.purchase_order,
                request.line_number
            ),
        };
        if self.operator.confirm(&prompt).await?.is_cancelled() {
            return Err(WorkflowError::UserCancelled);
        }

        Ok(vec![ReceiptLine {
            identifier: None,
            quantity: request.quantity,
            expiration: None,
        }])
    }

    async fn submit(
        &self,
        request: &ValidatedRequest,
        lookups: &Lookups,
        lines: &[ReceiptLine],
    ) -> Result<(TransactionHandle, TransactionStatus), WorkflowError> {
        let header = ReceiptHeaderRequest {
            purchase_order: request.purchase_order.clone(),
            supplier: request.supplier.clone(),
            warehouse: request.warehouse.clone(),
            facility: lookups.line.facility.clone(),
            currency: lookups.header.currency.clone(),
            transaction_subtype: self.settings.transaction_subtype.clone(),
        };
        let number = self
            .gateway
            .create_receipt_header(&self.session_stamp(), &header)
            .await
            .map_err(submission_error(SubmissionStage::Header))?;
        let handle = TransactionHandle::new(number);
        info!(transaction = %handle, "Receipt transaction created");

        self.gateway
            .add_pack(handle.as_str(), RECEIPT_PACK)
            .await
            .map_err(submission_error(SubmissionStage::Pack))?;

        let settle = self.settings.pack_settle_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let line_requests: Vec<ReceiptLineRequest> = lines
            .iter()
            .map(|line| self.line_request(request, lookups, line))
            .collect();
        try_join_all(
            line_requests
                .iter()
                .map(|line| self.gateway.add_line(handle.as_str(), RECEIPT_PACK, line)),
        )
        .await
        .map_err(submission_error(SubmissionStage::Line))?;
        debug!(transaction = %handle, lines = line_requests.len(), "Lines attached");

        self.gateway
            .process(handle.as_str())
            .await
            .map_err(submission_error(SubmissionStage::Process))?;

        let terminal = await_terminal_status(&self.gateway, &handle, &self.classifier, &self.polling)
            .await
            .map_err(|err| match err {
                PollError::Remote(err) => submission_error(SubmissionStage::Status)(err),
                PollError::StillPending(status) => WorkflowError::Processing {
                    transaction: handle.clone(),
                    status,
                    category: DiagnosticCategory::Other,
                },
            })?;

        match terminal {
            TerminalStatus::Succeeded(status) => {
                info!(transaction = %handle, %status, "Receipt transaction processed");
                Ok((handle, status))
            }
            TerminalStatus::Failed(status, category) => Err(WorkflowError::Processing {
                transaction: handle,
                status,
                category,
            }),
        }
    }

    fn line_request(
        &self,
        request: &ValidatedRequest,
        lookups: &Lookups,
        line: &ReceiptLine,
    ) -> ReceiptLineRequest {
        let (serial, lot) = match &line.identifier {
            Some(Identifier::Serial(serial)) => (Some(serial.clone()), None),
            Some(Identifier::Lot(lot)) => (None, Some(lot.clone())),
            None => (None, None),
        };
        ReceiptLineRequest {
            purchase_order: request.purchase_order.clone(),
            line_number: request.line_number.clone(),
            line_suffix: request.line_suffix.clone(),
            item_number: request.item_number.clone(),
            quantity: line.quantity,
            unit_price: lookups.line.unit_price,
            serial,
            lot,
            expiration: line.expiration,
            complete_line: request.complete_line,
        }
    }

    fn session_stamp(&self) -> SessionStamp {
        let session = self.host.session();
        SessionStamp {
            company: session.company,
            division: session.division,
            user: session.user,
        }
    }

    fn report(&self, outcome: &Result<ReceiptOutcome, WorkflowError>) {
        match outcome {
            Ok(receipt) => {
                let quantity: Decimal = receipt.lines.iter().map(|line| line.quantity).sum();
                let message = format!(
                    "Received {} of {} on purchase order {} line {} (transaction {})",
                    quantity.normalize(),
                    receipt.context.item_number.as_deref().unwrap_or_default(),
                    receipt.context.purchase_order.as_deref().unwrap_or_default(),
                    receipt.context.line_number.as_deref().unwrap_or_default(),
                    receipt.transaction
                );
                info!(transaction = %receipt.transaction, "Receipt completed");
                self.notifier.notify(NotificationLevel::Success, &message);
                self.notifier.refresh_screen();
            }
            Err(err) if err.is_cancellation() => {
                info!("Receipt cancelled by operator");
                self.notifier.notify(NotificationLevel::Info, &err.to_string());
            }
            Err(err) => {
                warn!(error = %err, "Receipt failed");
                self.notifier.notify(NotificationLevel::Error, &err.to_string());
            }
        }
    }
}
