//! Application configuration structures.
//!
//! Configuration is read from TOML (every field has a default) and then
//! overlaid with the environment variables the Lambda function is deployed
//! with: `S3_BUCKET`, `EMAIL_SENDER`, `EMAIL_RECIPIENT`, `EMAIL_PASSWORD`,
//! `ENVIRONMENT` and `USE_LOCALSTACK`.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deployment environment tag (dev, staging, prod, ...)
    #[serde(default = "defaults::environment")]
    pub environment: String,

    /// Listing pages to monitor
    #[serde(default)]
    pub source: SourceConfig,

    /// Keywords searched in bulletin documents
    #[serde(default = "defaults::keywords")]
    pub keywords: Vec<String>,

    /// HTTP client behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-run processing limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Object storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Email notification settings
    #[serde(default)]
    pub email: EmailConfig,

    /// Listing drop guard
    #[serde(default)]
    pub guard: GuardConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Default configuration overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Overlay values using an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bucket) = get("S3_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Some(sender) = get("EMAIL_SENDER") {
            self.email.sender = sender;
        }
        if let Some(recipient) = get("EMAIL_RECIPIENT") {
            self.email.recipient = recipient;
        }
        if let Some(password) = get("EMAIL_PASSWORD") {
            self.email.password = password;
        }
        if let Some(environment) = get("ENVIRONMENT") {
            self.environment = environment;
        }
        if let Some(flag) = get("USE_LOCALSTACK") {
            self.storage.use_localstack = parse_bool(&flag).ok_or_else(|| {
                AppError::config(format!("USE_LOCALSTACK must be a boolean, got '{flag}'"))
            })?;
        }
        if let Some(endpoint) = get("LOCALSTACK_ENDPOINT") {
            self.storage.localstack_endpoint = endpoint;
        }
        if let Some(region) = get("AWS_REGION") {
            self.storage.region = region;
        }
        Ok(())
    }

    /// Ensure every variable the deployed function depends on is present.
    ///
    /// All missing names are reported at once.
    pub fn require_environment(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.storage.bucket.trim().is_empty() {
            missing.push("S3_BUCKET".to_string());
        }
        if self.email.sender.trim().is_empty() {
            missing.push("EMAIL_SENDER".to_string());
        }
        if self.email.recipient.trim().is_empty() {
            missing.push("EMAIL_RECIPIENT".to_string());
        }
        if self.email.transport == EmailTransport::Smtp && self.email.password.is_empty() {
            missing.push("EMAIL_PASSWORD".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingEnv(missing))
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.urls.is_empty() {
            return Err(AppError::validation("source.urls is empty"));
        }
        for url in &self.source.urls {
            url::Url::parse(url)
                .map_err(|e| AppError::validation(format!("source url '{url}': {e}")))?;
        }
        if self.source.document_suffix.trim().is_empty() {
            return Err(AppError::validation("source.document_suffix is empty"));
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::validation("No keywords defined"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.max_retries == 0 {
            return Err(AppError::validation("http.max_retries must be > 0"));
        }
        if self.http.max_concurrent == 0 {
            return Err(AppError::validation("http.max_concurrent must be > 0"));
        }
        if self.limits.max_documents == 0 {
            return Err(AppError::validation("limits.max_documents must be > 0"));
        }
        if self.guard.max_drop_percent > 100 {
            return Err(AppError::validation(
                "guard.max_drop_percent must be within 0-100",
            ));
        }
        if self.storage.use_localstack && self.email.transport == EmailTransport::Ses {
            return Err(AppError::validation(
                "email.transport 'ses' is unavailable in local emulation mode",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: defaults::environment(),
            source: SourceConfig::default(),
            keywords: defaults::keywords(),
            http: HttpConfig::default(),
            limits: LimitsConfig::default(),
            storage: StorageConfig::default(),
            email: EmailConfig::default(),
            guard: GuardConfig::default(),
        }
    }
}

/// Parse the boolean spellings accepted for `USE_LOCALSTACK`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Bulletin listing pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Listing page URLs, scraped in order
    #[serde(default = "defaults::urls")]
    pub urls: Vec<String>,

    /// CSS selector for candidate anchors
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// Suffix that marks an anchor as a bulletin document
    #[serde(default = "defaults::document_suffix")]
    pub document_suffix: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            urls: defaults::urls(),
            link_selector: defaults::link_selector(),
            document_suffix: defaults::document_suffix(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per request before giving up
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay between attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// Maximum concurrent document downloads
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            retry_delay_ms: defaults::retry_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Per-run limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Only the first N listed documents are considered per run
    #[serde(default = "defaults::max_documents")]
    pub max_documents: usize,

    /// Stop scheduling downloads this many seconds before the deadline
    #[serde(default = "defaults::deadline_margin")]
    pub deadline_margin_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_documents: defaults::max_documents(),
            deadline_margin_secs: defaults::deadline_margin(),
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding markers, artifacts and logs
    #[serde(default)]
    pub bucket: String,

    /// Redirect AWS endpoints to LocalStack
    #[serde(default)]
    pub use_localstack: bool,

    /// LocalStack edge endpoint
    #[serde(default = "defaults::localstack_endpoint")]
    pub localstack_endpoint: String,

    /// AWS region
    #[serde(default = "defaults::region")]
    pub region: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            use_localstack: false,
            localstack_endpoint: defaults::localstack_endpoint(),
            region: defaults::region(),
        }
    }
}

/// How notification emails leave the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailTransport {
    /// Authenticated SMTP with STARTTLS
    #[default]
    Smtp,
    /// Amazon SES v2 SendEmail
    Ses,
    /// Log the message instead of sending it
    Log,
}

impl fmt::Display for EmailTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EmailTransport::Smtp => "smtp",
            EmailTransport::Ses => "ses",
            EmailTransport::Log => "log",
        };
        f.write_str(name)
    }
}

/// Email notification settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub sender: String,

    #[serde(default)]
    pub recipient: String,

    /// SMTP password, only ever taken from the environment
    #[serde(default, skip_serializing)]
    pub password: String,

    #[serde(default = "defaults::subject")]
    pub subject: String,

    #[serde(default = "defaults::smtp_host")]
    pub smtp_host: String,

    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub transport: EmailTransport,

    /// Attach matched PDFs to the email
    #[serde(default)]
    pub attach_documents: bool,

    /// Total attachment budget in bytes
    #[serde(default = "defaults::max_attachment_bytes")]
    pub max_attachment_bytes: usize,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sender: String::new(),
            recipient: String::new(),
            password: String::new(),
            subject: defaults::subject(),
            smtp_host: defaults::smtp_host(),
            smtp_port: defaults::smtp_port(),
            transport: EmailTransport::default(),
            attach_documents: false,
            max_attachment_bytes: defaults::max_attachment_bytes(),
        }
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .field("password", &"<redacted>")
            .field("subject", &self.subject)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("transport", &self.transport)
            .field("attach_documents", &self.attach_documents)
            .field("max_attachment_bytes", &self.max_attachment_bytes)
            .finish()
    }
}

/// Listing drop guard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Maximum allowed drop percentage (0-100)
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Previous listings smaller than this skip the drop check
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

mod defaults {
    pub fn environment() -> String {
        "dev".into()
    }

    // Source defaults
    pub fn urls() -> Vec<String> {
        vec!["http://omawww.sat.gob.mx/sala_prensa/boletin_tecnico/Paginas/default.aspx".into()]
    }
    pub fn link_selector() -> String {
        "a[href]".into()
    }
    pub fn document_suffix() -> String {
        ".pdf".into()
    }
    pub fn keywords() -> Vec<String> {
        vec![
            "CFDI 4.0".into(),
            "Anexo 20".into(),
            "contabilidad electrónica".into(),
            "e.firma".into(),
        ]
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        2000
    }
    pub fn max_concurrent() -> usize {
        2
    }

    // Limits
    pub fn max_documents() -> usize {
        10
    }
    pub fn deadline_margin() -> u64 {
        20
    }

    // Storage
    pub fn localstack_endpoint() -> String {
        "http://localhost:4566".into()
    }
    pub fn region() -> String {
        "us-east-1".into()
    }

    // Email
    pub fn subject() -> String {
        "Actualización en Boletines Técnicos del SAT".into()
    }
    pub fn smtp_host() -> String {
        "smtp.gmail.com".into()
    }
    pub fn smtp_port() -> u16 {
        587
    }
    pub fn max_attachment_bytes() -> usize {
        5 * 1024 * 1024
    }

    // Guard
    pub fn max_drop_percent() -> u8 {
        50
    }
    pub fn min_baseline() -> usize {
        5
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn configured() -> Config {
        let vars = env_map(&[
            ("S3_BUCKET", "sat-monitor-dev"),
            ("EMAIL_SENDER", "monitor@example.com"),
            ("EMAIL_RECIPIENT", "team@example.com"),
            ("EMAIL_PASSWORD", "app-password"),
        ]);
        let mut config = Config::default();
        config.apply_env_with(|k| vars.get(k).cloned()).unwrap();
        config
    }

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.http.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_ses_in_local_mode() {
        let mut config = Config::default();
        config.storage.use_localstack = true;
        config.email.transport = EmailTransport::Ses;
        assert!(config.validate().is_err());

        config.email.transport = EmailTransport::Smtp;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overlay_sets_all_fields() {
        let vars = env_map(&[
            ("S3_BUCKET", "bucket-a"),
            ("EMAIL_SENDER", "a@example.com"),
            ("EMAIL_RECIPIENT", "b@example.com"),
            ("EMAIL_PASSWORD", "secret"),
            ("ENVIRONMENT", "prod"),
            ("USE_LOCALSTACK", "true"),
        ]);
        let mut config = Config::default();
        config.apply_env_with(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.storage.bucket, "bucket-a");
        assert_eq!(config.email.sender, "a@example.com");
        assert_eq!(config.email.recipient, "b@example.com");
        assert_eq!(config.email.password, "secret");
        assert_eq!(config.environment, "prod");
        assert!(config.storage.use_localstack);
    }

    #[test]
    fn env_overlay_rejects_bad_bool() {
        let vars = env_map(&[("USE_LOCALSTACK", "maybe")]);
        let mut config = Config::default();
        assert!(config.apply_env_with(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let vars = env_map(&[("ENVIRONMENT", "  ")]);
        let mut config = Config::default();
        config.apply_env_with(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.environment, "dev");
    }

    #[test]
    fn require_environment_reports_every_missing_var() {
        let err = Config::default().require_environment().unwrap_err();
        match err {
            AppError::MissingEnv(names) => assert_eq!(
                names,
                vec![
                    "S3_BUCKET",
                    "EMAIL_SENDER",
                    "EMAIL_RECIPIENT",
                    "EMAIL_PASSWORD"
                ]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(configured().require_environment().is_ok());
    }

    #[test]
    fn password_not_required_for_log_transport() {
        let mut config = configured();
        config.email.password.clear();
        config.email.transport = EmailTransport::Log;
        assert!(config.require_environment().is_ok());
    }

    #[test]
    fn password_is_never_serialized_or_printed() {
        let config = configured();
        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("app-password"));
        assert!(!format!("{:?}", config).contains("app-password"));
    }

    #[test]
    fn toml_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            keywords = ["RMF"]

            [http]
            max_retries = 5

            [email]
            transport = "log"
            "#,
        )
        .unwrap();
        assert_eq!(config.keywords, vec!["RMF"]);
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.email.transport, EmailTransport::Log);
        assert_eq!(config.limits.max_documents, 10);
    }

    #[test]
    fn parse_bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("perhaps"), None);
    }
}
