// src/deploy/mod.rs

//! Hosting infrastructure plan.
//!
//! Describes the resources the scheduled function needs (bucket, role,
//! schedule, function, log group, error metric and alarm) and how local emulation mode
//! changes them. The plan is data only; provisioning is left to external
//! tooling that consumes the rendered JSON.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// JSON log filter matching the line the function emits once per failed run.
///
/// The function always answers with an invocation result, so the platform's
/// own `Errors` metric never counts these failures.
pub const RUN_FAILED_FILTER: &str =
    r#"{ ($.level = "ERROR") && ($.fields.message = "Monitoring run failed") }"#;

/// Metric the filter above increments.
pub const ERROR_METRIC_NAME: &str = "MonitorErrors";

/// Inputs of the infrastructure plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default = "defaults::project")]
    pub project: String,

    #[serde(default = "defaults::environment")]
    pub environment: String,

    /// Target LocalStack instead of AWS
    #[serde(default)]
    pub use_localstack: bool,

    /// Scheduler recurrence, passed through verbatim
    #[serde(default = "defaults::schedule_expression")]
    pub schedule_expression: String,

    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u32,

    #[serde(default = "defaults::memory_mb")]
    pub memory_mb: u32,

    #[serde(default = "defaults::log_retention_days")]
    pub log_retention_days: u32,

    /// Alarm fires when errors exceed this count within a period
    #[serde(default = "defaults::alarm_error_threshold")]
    pub alarm_error_threshold: u32,

    #[serde(default = "defaults::alarm_period_secs")]
    pub alarm_period_secs: u32,

    #[serde(default = "defaults::alarm_evaluation_periods")]
    pub alarm_evaluation_periods: u32,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project: defaults::project(),
            environment: defaults::environment(),
            use_localstack: false,
            schedule_expression: defaults::schedule_expression(),
            timeout_secs: defaults::timeout_secs(),
            memory_mb: defaults::memory_mb(),
            log_retention_days: defaults::log_retention_days(),
            alarm_error_threshold: defaults::alarm_error_threshold(),
            alarm_period_secs: defaults::alarm_period_secs(),
            alarm_evaluation_periods: defaults::alarm_evaluation_periods(),
        }
    }
}

impl DeployConfig {
    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() || self.environment.trim().is_empty() {
            return Err(AppError::validation("project and environment are required"));
        }
        if self.schedule_expression.trim().is_empty() {
            return Err(AppError::validation("schedule_expression is empty"));
        }
        // Platform bounds for a single function invocation
        if !(1..=900).contains(&self.timeout_secs) {
            return Err(AppError::validation("timeout_secs must be within 1-900"));
        }
        if !(128..=10240).contains(&self.memory_mb) {
            return Err(AppError::validation("memory_mb must be within 128-10240"));
        }
        Ok(())
    }

    fn function_name(&self) -> String {
        format!("{}-{}", self.project, self.environment)
    }

    fn metric_namespace(&self) -> String {
        format!("{}/{}", self.project, self.environment)
    }
}

/// Kind of planned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Bucket,
    BucketEncryption,
    BucketAcl,
    BucketOwnershipControls,
    BucketPublicAccessBlock,
    BucketLifecycle,
    ExecutionRole,
    SesPolicy,
    Function,
    LogGroup,
    ScheduleRule,
    ScheduleTarget,
    InvokePermission,
    ErrorMetricFilter,
    ErrorAlarm,
}

impl ResourceKind {
    /// Kinds that only exist outside local emulation mode.
    pub fn is_cloud_only(&self) -> bool {
        matches!(
            self,
            ResourceKind::BucketEncryption
                | ResourceKind::BucketAcl
                | ResourceKind::BucketOwnershipControls
                | ResourceKind::BucketPublicAccessBlock
                | ResourceKind::BucketLifecycle
                | ResourceKind::SesPolicy
                | ResourceKind::ErrorMetricFilter
                | ResourceKind::ErrorAlarm
        )
    }
}

/// One planned resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub name: String,
    /// 0 or 1
    pub count: u8,
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Full set of resources for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePlan {
    pub project: String,
    pub environment: String,
    pub use_localstack: bool,
    pub bucket_name: String,
    pub resources: Vec<Resource>,
}

impl ResourcePlan {
    /// Build the plan with a random bucket suffix from the thread RNG.
    pub fn generate(config: &DeployConfig) -> Result<Self> {
        Self::build(config, &mut rand::rng())
    }

    /// Build the plan drawing the bucket suffix from `rng`.
    pub fn build<R: Rng>(config: &DeployConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let bucket_name = if config.use_localstack {
            format!("{}-{}", config.project, config.environment)
        } else {
            format!(
                "{}-{}-{:08x}",
                config.project,
                config.environment,
                rng.random::<u32>()
            )
        };

        let function_name = config.function_name();
        let log_group = format!("/aws/lambda/{function_name}");
        let mut resources = Vec::new();

        let mut push = |kind: ResourceKind, name: String, attributes: serde_json::Value| {
            let count = u8::from(!(kind.is_cloud_only() && config.use_localstack));
            let attributes = match attributes {
                serde_json::Value::Object(map) => map.into_iter().collect(),
                _ => BTreeMap::new(),
            };
            resources.push(Resource {
                kind,
                name,
                count,
                attributes,
            });
        };

        push(
            ResourceKind::Bucket,
            bucket_name.clone(),
            serde_json::json!({ "force_destroy": config.use_localstack }),
        );
        push(
            ResourceKind::BucketEncryption,
            format!("{bucket_name}-encryption"),
            serde_json::json!({ "sse_algorithm": "AES256" }),
        );
        push(
            ResourceKind::BucketAcl,
            format!("{bucket_name}-acl"),
            serde_json::json!({ "acl": "private" }),
        );
        push(
            ResourceKind::BucketOwnershipControls,
            format!("{bucket_name}-ownership"),
            serde_json::json!({ "object_ownership": "BucketOwnerPreferred" }),
        );
        push(
            ResourceKind::BucketPublicAccessBlock,
            format!("{bucket_name}-public-access"),
            serde_json::json!({
                "block_public_acls": true,
                "block_public_policy": true,
                "ignore_public_acls": true,
                "restrict_public_buckets": true,
            }),
        );
        push(
            ResourceKind::BucketLifecycle,
            format!("{bucket_name}-lifecycle"),
            serde_json::json!({ "prefix": "logs/", "expiration_days": 90 }),
        );
        push(
            ResourceKind::ExecutionRole,
            format!("{function_name}-role"),
            serde_json::json!({ "service": "lambda.amazonaws.com" }),
        );
        push(
            ResourceKind::SesPolicy,
            format!("{function_name}-ses"),
            serde_json::json!({ "actions": ["ses:SendEmail", "ses:SendRawEmail"] }),
        );
        push(
            ResourceKind::Function,
            function_name.clone(),
            serde_json::json!({
                "handler": "bootstrap",
                "runtime": "provided.al2023",
                "timeout": config.timeout_secs,
                "memory_size": config.memory_mb,
                "environment": function_environment(config, &bucket_name),
            }),
        );
        push(
            ResourceKind::LogGroup,
            log_group.clone(),
            serde_json::json!({ "retention_in_days": config.log_retention_days }),
        );
        push(
            ResourceKind::ScheduleRule,
            format!("{function_name}-schedule"),
            serde_json::json!({ "schedule_expression": config.schedule_expression }),
        );
        push(
            ResourceKind::ScheduleTarget,
            format!("{function_name}-target"),
            serde_json::json!({ "function": function_name }),
        );
        push(
            ResourceKind::InvokePermission,
            format!("{function_name}-invoke"),
            serde_json::json!({ "principal": "events.amazonaws.com" }),
        );
        push(
            ResourceKind::ErrorMetricFilter,
            format!("{function_name}-errors-filter"),
            serde_json::json!({
                "log_group": log_group,
                "pattern": RUN_FAILED_FILTER,
                "metric_name": ERROR_METRIC_NAME,
                "namespace": config.metric_namespace(),
                "value": "1",
            }),
        );
        push(
            ResourceKind::ErrorAlarm,
            format!("{function_name}-errors"),
            serde_json::json!({
                "metric_name": ERROR_METRIC_NAME,
                "namespace": config.metric_namespace(),
                "statistic": "Sum",
                "comparison_operator": "GreaterThanThreshold",
                "threshold": config.alarm_error_threshold,
                "period": config.alarm_period_secs,
                "evaluation_periods": config.alarm_evaluation_periods,
            }),
        );

        Ok(Self {
            project: config.project.clone(),
            environment: config.environment.clone(),
            use_localstack: config.use_localstack,
            bucket_name,
            resources,
        })
    }

    /// Find a resource by kind.
    pub fn resource(&self, kind: ResourceKind) -> Option<&Resource> {
        self.resources.iter().find(|r| r.kind == kind)
    }

    /// Resources that will actually be created.
    pub fn active(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| r.count > 0)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Environment the deployed function is started with.
///
/// The password is a placeholder; the real secret is injected at deploy time.
fn function_environment(config: &DeployConfig, bucket_name: &str) -> BTreeMap<&'static str, String> {
    BTreeMap::from([
        ("S3_BUCKET", bucket_name.to_string()),
        ("EMAIL_SENDER", String::new()),
        ("EMAIL_RECIPIENT", String::new()),
        ("EMAIL_PASSWORD", String::new()),
        ("ENVIRONMENT", config.environment.clone()),
        ("USE_LOCALSTACK", config.use_localstack.to_string()),
    ])
}

mod defaults {
    pub fn project() -> String {
        "sat-monitor".into()
    }
    pub fn environment() -> String {
        "dev".into()
    }
    pub fn schedule_expression() -> String {
        "rate(1 day)".into()
    }
    pub fn timeout_secs() -> u32 {
        300
    }
    pub fn memory_mb() -> u32 {
        512
    }
    pub fn log_retention_days() -> u32 {
        14
    }
    pub fn alarm_error_threshold() -> u32 {
        1
    }
    pub fn alarm_period_secs() -> u32 {
        300
    }
    pub fn alarm_evaluation_periods() -> u32 {
        2
    }
}
