//! Audit trail for buffer configuration changes.
//!
//! Every pool and profile lifecycle event, attribute change and consumer
//! binding produces one structured [`AuditRecord`], emitted through
//! `tracing` under the `audit` target so it can be routed separately from
//! operational logs.
//!
//! A record carries a UTC timestamp, the emitting component, the action,
//! the object it touched and, for rejected requests, the SAI status. Requests
//! refused by admission control (no room in a pool, object still referenced)
//! are recorded as denials rather than failures.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonic_sai::{ObjectKey, SaiError, SaiStatus};

/// What kind of change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    PoolLifecycle,
    ProfileLifecycle,
    /// `set_attribute` on a pool or profile
    AttributeChange,
    /// Attach or detach of a priority group, queue or port
    ConsumerBinding,
    PortLifecycle,
    /// Whole buffer plans
    PlanApply,
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditCategory::PoolLifecycle => "POOL_LIFECYCLE",
            AuditCategory::ProfileLifecycle => "PROFILE_LIFECYCLE",
            AuditCategory::AttributeChange => "ATTRIBUTE_CHANGE",
            AuditCategory::ConsumerBinding => "CONSUMER_BINDING",
            AuditCategory::PortLifecycle => "PORT_LIFECYCLE",
            AuditCategory::PlanApply => "PLAN_APPLY",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    /// Refused by admission control
    Denied,
}

impl AuditOutcome {
    /// Outcome of a request rejected with `status`.
    pub fn of_rejection(status: SaiStatus) -> Self {
        match status {
            SaiStatus::InsufficientResources | SaiStatus::ObjectInUse => AuditOutcome::Denied,
            _ => AuditOutcome::Failure,
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
            AuditOutcome::Denied => write!(f, "denied"),
        }
    }
}

/// A single audit record, built with the `with_*` methods and emitted by
/// [`audit_log!`](crate::audit_log).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    pub source: String,
    pub action: String,
    pub outcome: AuditOutcome,

    /// Object id, formatted as in the object store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,

    /// SAI status name of a rejected request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// A successful action; [`with_rejection`](Self::with_rejection) turns
    /// it into a failure or denial.
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::Success,
            object: None,
            object_type: None,
            status: None,
            details: None,
            error: None,
        }
    }

    pub fn with_object(mut self, key: &ObjectKey) -> Self {
        self.object = Some(key.to_string());
        self.object_type = Some(key.object_type.to_string());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_rejection(mut self, error: &SaiError) -> Self {
        let status = error.status();
        self.outcome = AuditOutcome::of_rejection(status);
        self.status = Some(status.to_string());
        self.error = Some(error.to_string());
        self
    }

    /// A failure that never reached the SAI layer.
    pub fn with_failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = AuditOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Emits an [`AuditRecord`]: successes at info, failures and denials at warn.
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {{
        let record = $record;
        let object = record.object.as_deref().unwrap_or("-");
        match record.outcome {
            $crate::audit::AuditOutcome::Success => {
                tracing::info!(
                    target: "audit",
                    category = %record.category,
                    action = %record.action,
                    object,
                    audit_json = %record.to_json(),
                    "AUDIT: {} {} {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::AuditOutcome::Failure | $crate::audit::AuditOutcome::Denied => {
                tracing::warn!(
                    target: "audit",
                    category = %record.category,
                    action = %record.action,
                    object,
                    status = record.status.as_deref().unwrap_or(""),
                    audit_json = %record.to_json(),
                    "AUDIT: {} {} {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
        }
    }};
}

/// Initializes JSON logging for machine consumption.
///
/// `RUST_LOG` overrides `log_level` when set.
pub fn init_logging(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .json(),
        )
        .init();
}

/// Initializes human readable logging on stderr, keeping stdout for the
/// report.
pub fn init_logging_pretty(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}
