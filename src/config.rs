use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the receipt orchestrator
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ReceiptConfig {
    /// Workflow limits and remote status codes
    pub workflow: WorkflowConfig,
    /// Status polling after the transaction is processed
    pub polling: PollingConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WorkflowConfig {
    /// Upper bound on serial numbers collected in one run
    pub max_serial_count: u32,
    /// Transaction subtype written on the receipt header
    pub transaction_subtype: String,
    /// Reference order category marking a drop-ship (customer order) line
    pub drop_ship_relation_code: String,
    /// Delay between pack creation and line attachment, in milliseconds
    pub pack_settle_delay_ms: u64,
    /// Status codes reported by the remote transaction engine
    pub status_codes: StatusCodeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StatusCodeConfig {
    /// The single code treated as success
    pub success: String,
    /// Codes meaning the transaction is still being processed
    pub pending: Vec<String>,
    /// Codes pointing at a problem with the transaction header
    pub header_errors: Vec<String>,
    /// Codes pointing at a problem with a pack or one of its lines
    pub package_errors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PollingConfig {
    /// First delay before reading the status, in milliseconds
    pub initial_delay_ms: u64,
    /// Cap for the exponential backoff, in milliseconds
    pub max_delay_ms: u64,
    /// Maximum number of status reads
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl WorkflowConfig {
    pub fn pack_settle_delay(&self) -> Duration {
        Duration::from_millis(self.pack_settle_delay_ms)
    }
}

impl PollingConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig {
                max_serial_count: 100,
                transaction_subtype: "PR".to_string(),
                drop_ship_relation_code: "3".to_string(),
                pack_settle_delay_ms: 500,
                status_codes: StatusCodeConfig {
                    success: "90".to_string(),
                    pending: vec!["05".to_string(), "10".to_string()],
                    header_errors: vec!["15".to_string(), "16".to_string()],
                    package_errors: vec!["25".to_string(), "35".to_string()],
                },
            },
            polling: PollingConfig {
                initial_delay_ms: 500,
                max_delay_ms: 4_000,
                max_attempts: 6,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl ReceiptConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (po-receipt.toml in the working directory, or `path`)
    /// 3. Environment variables (prefixed with PO_RECEIPT, `__` between sections)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&ReceiptConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None if Path::new("po-receipt.toml").exists() => {
                builder = builder.add_source(File::with_name("po-receipt"));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("PO_RECEIPT")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("workflow.status_codes.pending")
                .with_list_parse_key("workflow.status_codes.header_errors")
                .with_list_parse_key("workflow.status_codes.package_errors")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_have_a_single_success_code_outside_other_lists() {
        let config = ReceiptConfig::default();
        let codes = &config.workflow.status_codes;
        assert_eq!(codes.success, "90");
        assert!(!codes.pending.contains(&codes.success));
        assert!(!codes.header_errors.contains(&codes.success));
        assert!(!codes.package_errors.contains(&codes.success));
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[workflow]\nmax_serial_count = 12\n\n[polling]\nmax_attempts = 2"
        )
        .unwrap();

        let config = ReceiptConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.workflow.max_serial_count, 12);
        assert_eq!(config.polling.max_attempts, 2);
        // untouched sections keep their defaults
        assert_eq!(config.workflow.transaction_subtype, "PR");
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn renders_as_toml() {
        let rendered = ReceiptConfig::default().to_toml().unwrap();
        assert!(rendered.contains("max_serial_count = 100"));
        assert!(rendered.contains("[workflow.status_codes]"));
    }
}
