//! Host-context collaborator: field values on the active screen and session data

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Screen fields the receipt workflow reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScreenField {
    PurchaseOrder,
    Supplier,
    Warehouse,
    LineNumber,
    LineSuffix,
    ReceiptQuantity,
    ItemNumber,
    CompleteLine,
}

impl ScreenField {
    /// Field id as the host screen names it
    pub fn id(&self) -> &'static str {
        match self {
            ScreenField::PurchaseOrder => "PUNO",
            ScreenField::Supplier => "SUNO",
            ScreenField::Warehouse => "WHLO",
            ScreenField::LineNumber => "PNLI",
            ScreenField::LineSuffix => "PNLS",
            ScreenField::ReceiptQuantity => "RVQA",
            ScreenField::ItemNumber => "ITNO",
            ScreenField::CompleteLine => "OEND",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScreenField::PurchaseOrder => "purchase order",
            ScreenField::Supplier => "supplier",
            ScreenField::Warehouse => "warehouse",
            ScreenField::LineNumber => "line number",
            ScreenField::LineSuffix => "line suffix",
            ScreenField::ReceiptQuantity => "receipt quantity",
            ScreenField::ItemNumber => "item number",
            ScreenField::CompleteLine => "complete line",
        }
    }
}

impl std::fmt::Display for ScreenField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.id())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub company: String,
    pub division: String,
    pub user: String,
}

/// Read-only access to the host screen and session
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait HostContext: Send + Sync {
    /// Current value of a screen field, if the screen shows it
    fn field(&self, field: ScreenField) -> Option<String>;

    fn session(&self) -> SessionInfo;
}

/// Host context captured in a TOML file, keyed by screen field id
///
/// ```toml
/// [session]
/// company = "100"
/// division = "AAA"
/// user = "OPERATOR"
///
/// [fields]
/// PUNO = "4000123"
/// PNLI = "10"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHostContext {
    #[serde(default)]
    pub session: SessionInfo,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl FileHostContext {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_field(mut self, field: ScreenField, value: &str) -> Self {
        self.fields.insert(field.id().to_string(), value.to_string());
        self
    }
}

impl HostContext for FileHostContext {
    fn field(&self, field: ScreenField) -> Option<String> {
        self.fields.get(field.id()).cloned()
    }

    fn session(&self) -> SessionInfo {
        self.session.clone()
    }
}
