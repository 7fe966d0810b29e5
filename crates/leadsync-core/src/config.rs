use crate::error::{Result, SyncError};
use crate::mapping::FieldMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Config — the single configuration surface, resolved once at startup
// ---------------------------------------------------------------------------

/// Process configuration. Loaded either from a YAML file or from environment
/// variables; any missing required value is a fatal startup error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub amocrm: AmoCrmConfig,
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmoCrmConfig {
    /// Account subdomain: `{subdomain}.amocrm.ru`.
    pub subdomain: String,
    /// Long-lived integration bearer token.
    pub token: String,
    /// Pipeline newly created deals are placed in.
    pub pipeline_id: i64,
    /// Stage within that pipeline for newly created deals.
    pub status_id: i64,
    /// Vendor-specific custom-field ids for contact data, when the account
    /// stores phone/email on the deal itself.
    #[serde(default)]
    pub field_ids: ContactFieldIds,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactFieldIds {
    pub phone: Option<i64>,
    pub email: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Spreadsheet id from the sheet URL.
    pub sheet_id: String,
    /// Path to the service-account key JSON.
    pub credentials_path: PathBuf,
    #[serde(default = "default_tab")]
    pub tab: String,
    /// Header of the column holding the linked deal id.
    #[serde(default = "default_identity_column")]
    pub identity_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Outbound sweep period, seconds.
    pub sweep_interval_secs: u64,
    /// Pause between rows during a sweep, milliseconds (CRM rate-limit
    /// courtesy, not a correctness requirement).
    pub row_delay_ms: u64,
    /// Webhook server listen port.
    pub port: u16,
    pub columns: FieldMap,
}

fn default_tab() -> String {
    "Sheet1".to_string()
}

fn default_identity_column() -> String {
    "lead_id".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
            row_delay_ms: 500,
            port: 8080,
            columns: FieldMap::default(),
        }
    }
}

impl Config {
    /// Load from a YAML file when a path is given, otherwise from the
    /// environment. Validation runs in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|e| {
                    SyncError::Config(format!("cannot read config file {}: {e}", p.display()))
                })?;
                serde_yaml::from_str(&raw)
                    .map_err(|e| SyncError::Config(format!("invalid config file: {e}")))?
            }
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build from environment variables, mirroring the names the deployment
    /// already uses (`AMOCRM_SUBDOMAIN`, `GOOGLE_SHEET_ID`, ...).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    /// Environment resolution against an injectable lookup, so the required
    /// variable handling is testable without mutating process environment.
    /// Every missing or unparseable required variable is reported in one
    /// aggregated error, not just the first.
    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut problems: Vec<String> = Vec::new();
        let mut require = |name: &str| -> String {
            match get(name) {
                Some(v) => v,
                None => {
                    problems.push(name.to_string());
                    String::new()
                }
            }
        };

        let subdomain = require("AMOCRM_SUBDOMAIN");
        let token = require("AMOCRM_INTEGRATION_TOKEN");
        let sheet_id = require("GOOGLE_SHEET_ID");
        let credentials = require("GOOGLE_APPLICATION_CREDENTIALS");

        let mut require_id = |name: &str| -> i64 {
            match get(name) {
                None => {
                    problems.push(name.to_string());
                    0
                }
                Some(v) => match v.trim().parse() {
                    Ok(id) => id,
                    Err(_) => {
                        problems.push(format!("{name} (invalid value '{v}')"));
                        0
                    }
                },
            }
        };
        let pipeline_id = require_id("AMOCRM_PIPELINE_ID");
        let status_id = require_id("AMOCRM_STATUS_ID");

        if !problems.is_empty() {
            return Err(SyncError::Config(format!(
                "missing or invalid environment variables: {}",
                problems.join(", ")
            )));
        }

        let mut sync = SyncConfig::default();
        if let Some(v) = get("SWEEP_INTERVAL_SECS") {
            sync.sweep_interval_secs = parse_value("SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("ROW_DELAY_MS") {
            sync.row_delay_ms = parse_value("ROW_DELAY_MS", &v)?;
        }
        if let Some(v) = get("PORT") {
            sync.port = parse_value("PORT", &v)?;
        }

        Ok(Self {
            amocrm: AmoCrmConfig {
                subdomain,
                token,
                pipeline_id,
                status_id,
                field_ids: ContactFieldIds {
                    phone: get("AMOCRM_PHONE_FIELD_ID")
                        .map(|v| parse_value("AMOCRM_PHONE_FIELD_ID", &v))
                        .transpose()?,
                    email: get("AMOCRM_EMAIL_FIELD_ID")
                        .map(|v| parse_value("AMOCRM_EMAIL_FIELD_ID", &v))
                        .transpose()?,
                },
            },
            sheets: SheetsConfig {
                sheet_id,
                credentials_path: PathBuf::from(credentials),
                tab: get("GOOGLE_SHEET_TAB").unwrap_or_else(default_tab),
                identity_column: get("SHEET_IDENTITY_COLUMN")
                    .unwrap_or_else(default_identity_column),
            },
            sync,
        })
    }

    /// Completeness check; called before first use.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.amocrm.subdomain.trim().is_empty() {
            problems.push("amocrm.subdomain is empty");
        }
        if self.amocrm.token.trim().is_empty() {
            problems.push("amocrm.token is empty");
        }
        if self.amocrm.pipeline_id <= 0 {
            problems.push("amocrm.pipeline_id must be a positive id");
        }
        if self.amocrm.status_id <= 0 {
            problems.push("amocrm.status_id must be a positive id");
        }
        if self.sheets.sheet_id.trim().is_empty() {
            problems.push("sheets.sheet_id is empty");
        }
        if !self.sheets.credentials_path.exists() {
            return Err(SyncError::Config(format!(
                "service-account key not found: {}",
                self.sheets.credentials_path.display()
            )));
        }
        if self.sheets.identity_column.trim().is_empty() {
            problems.push("sheets.identity_column is empty");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(problems.join("; ")))
        }
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SyncError::Config(format!("{name} has invalid value '{value}'")))
}
