//! Buffer plans: a whole buffer configuration applied in one go.
//!
//! A plan uses the CONFIG_DB table names, one TOML table per object:
//!
//! ```toml
//! [BUFFER_POOL.ingress_lossless_pool]
//! type = "ingress"
//! mode = "dynamic"
//! size = 10485760
//!
//! [BUFFER_PROFILE.pg_lossless]
//! pool = "ingress_lossless_pool"
//! size = 1048576
//! dynamic_th = 0
//! xoff = 262144
//! xon = 262144
//!
//! [BUFFER_PG."Ethernet0|3-4"]
//! profile = "pg_lossless"
//! ```
//!
//! Pools are created first, then profiles, then priority group, queue and
//! port bindings. Within a table entries apply in name order. The first
//! rejected step stops the plan.

use std::collections::BTreeMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sonic_sai::{
    BufferPoolOid, BufferProfileAttr, BufferProfileOid, PortOid, SaiAttribute,
    SaiAttributeValue, SaiError, SaiObjectType, SaiResult, SaiStatus,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::audit::{AuditCategory, AuditRecord};
use crate::audit_log;
use crate::buffer::{
    BufferOrch, BufferOrchStats, BufferPoolType, PoolSnapshot, ProfileSnapshot,
    ProfileThresholdMode, ThresholdMode,
};

/// Prefix of front panel port names.
pub const PORT_NAME_PREFIX: &str = "Ethernet";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to read plan {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse plan {path}: {message}")]
    Parse { path: String, message: String },

    #[error("{step}: {message}")]
    Reference { step: String, message: String },

    #[error("{step} rejected: {error}")]
    Rejected {
        step: String,
        #[source]
        error: SaiError,
    },
}

impl PlanError {
    /// The SAI status of a rejected step.
    pub fn status(&self) -> Option<SaiStatus> {
        match self {
            PlanError::Rejected { error, .. } => Some(error.status()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPlan {
    #[serde(rename = "type")]
    pub pool_type: BufferPoolType,
    #[serde(default)]
    pub mode: Option<ThresholdMode>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePlan {
    pub pool: String,
    pub size: u64,
    #[serde(default)]
    pub mode: Option<ProfileThresholdMode>,
    #[serde(default)]
    pub dynamic_th: Option<i8>,
    #[serde(default)]
    pub static_th: Option<u64>,
    #[serde(default)]
    pub xoff: Option<u64>,
    #[serde(default)]
    pub xon: Option<u64>,
}

impl ProfilePlan {
    fn to_attributes(&self, pool: BufferPoolOid) -> Vec<SaiAttribute> {
        let mut attrs = vec![
            SaiAttribute::new(BufferProfileAttr::PoolId, SaiAttributeValue::Oid(pool.as_raw())),
            SaiAttribute::new(
                BufferProfileAttr::ReservedBufferSize,
                SaiAttributeValue::U64(self.size),
            ),
        ];
        if let Some(mode) = self.mode {
            attrs.push(SaiAttribute::new(
                BufferProfileAttr::ThresholdMode,
                SaiAttributeValue::S32(mode.to_sai()),
            ));
        }
        if let Some(alpha) = self.dynamic_th {
            attrs.push(SaiAttribute::new(
                BufferProfileAttr::SharedDynamicTh,
                SaiAttributeValue::I8(alpha),
            ));
        }
        if let Some(limit) = self.static_th {
            attrs.push(SaiAttribute::new(
                BufferProfileAttr::SharedStaticTh,
                SaiAttributeValue::U64(limit),
            ));
        }
        if let Some(xoff) = self.xoff {
            attrs.push(SaiAttribute::new(BufferProfileAttr::XoffTh, SaiAttributeValue::U64(xoff)));
        }
        if let Some(xon) = self.xon {
            attrs.push(SaiAttribute::new(BufferProfileAttr::XonTh, SaiAttributeValue::U64(xon)));
        }
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingPlan {
    pub profile: String,
}

/// A complete buffer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferPlan {
    #[serde(rename = "BUFFER_POOL", default)]
    pub pools: BTreeMap<String, PoolPlan>,

    #[serde(rename = "BUFFER_PROFILE", default)]
    pub profiles: BTreeMap<String, ProfilePlan>,

    /// Keyed `<port>|<pg or pg range>`.
    #[serde(rename = "BUFFER_PG", default)]
    pub priority_groups: BTreeMap<String, BindingPlan>,

    /// Keyed `<port>|<queue or queue range>`.
    #[serde(rename = "BUFFER_QUEUE", default)]
    pub queues: BTreeMap<String, BindingPlan>,

    /// Keyed by port name.
    #[serde(rename = "BUFFER_PORT_INGRESS_PROFILE", default)]
    pub ports: BTreeMap<String, BindingPlan>,
}

impl BufferPlan {
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, PlanError> {
        toml::from_str(content).map_err(|e| PlanError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Applies the plan, stopping at the first rejected step.
    ///
    /// Steps applied before a rejection stay applied.
    pub fn apply(&self, orch: &mut BufferOrch) -> Result<AppliedPlan, PlanError> {
        let mut applied = AppliedPlan::default();
        let result = self.apply_steps(orch, &mut applied);

        let record = AuditRecord::new(AuditCategory::PlanApply, "BufferPlan", "apply_buffer_plan");
        match &result {
            Ok(()) => {
                info!(steps = applied.steps, "Buffer plan applied");
                audit_log!(record.with_details(json!({
                    "steps": applied.steps,
                    "pools": applied.pools.len(),
                    "profiles": applied.profiles.len(),
                })));
            }
            Err(PlanError::Rejected { error, .. }) => {
                audit_log!(record
                    .with_rejection(error)
                    .with_details(json!({ "steps": applied.steps })));
            }
            Err(err) => {
                audit_log!(record.with_failure(err.to_string()));
            }
        }
        result.map(|()| applied)
    }

    fn apply_steps(&self, orch: &mut BufferOrch, applied: &mut AppliedPlan) -> Result<(), PlanError> {
        for (name, pool) in &self.pools {
            let step = format!("BUFFER_POOL|{}", name);
            let oid = orch
                .create_pool(pool.pool_type, pool.size, pool.mode)
                .map_err(|error| rejected(&step, error))?;
            debug!(step = %step, oid = %oid, "Applied plan step");
            applied.pools.insert(name.clone(), oid);
            applied.steps += 1;
        }

        for (name, profile) in &self.profiles {
            let step = format!("BUFFER_PROFILE|{}", name);
            let pool = *applied
                .pools
                .get(&profile.pool)
                .ok_or_else(|| reference(&step, format!("unknown pool {}", profile.pool)))?;
            let oid = orch
                .create(SaiObjectType::BufferProfile, &profile.to_attributes(pool))
                .and_then(|raw| {
                    BufferProfileOid::from_raw(raw).ok_or_else(|| {
                        SaiError::invalid_parameter(format!("0x{:016x} is not a profile", raw))
                    })
                })
                .map_err(|error| rejected(&step, error))?;
            debug!(step = %step, oid = %oid, "Applied plan step");
            applied.profiles.insert(name.clone(), oid);
            applied.steps += 1;
        }

        for (key, binding) in &self.priority_groups {
            let step = format!("BUFFER_PG|{}", key);
            let profile = applied.profile(&step, &binding.profile)?;
            let (port, indexes) = resolve_consumers(orch, &step, key)?;
            let pgs = orch
                .port_priority_groups(port)
                .map_err(|error| rejected(&step, error))?;
            for index in indexes {
                let pg = *pgs.get(index as usize).ok_or_else(|| {
                    reference(&step, format!("port has {} priority groups", pgs.len()))
                })?;
                orch.set_pg_profile(pg, Some(profile))
                    .map_err(|error| rejected(&step, error))?;
            }
            applied.steps += 1;
        }

        for (key, binding) in &self.queues {
            let step = format!("BUFFER_QUEUE|{}", key);
            let profile = applied.profile(&step, &binding.profile)?;
            let (port, indexes) = resolve_consumers(orch, &step, key)?;
            let queues = orch
                .port_queues(port)
                .map_err(|error| rejected(&step, error))?;
            for index in indexes {
                let queue = *queues.get(index as usize).ok_or_else(|| {
                    reference(&step, format!("port has {} queues", queues.len()))
                })?;
                orch.set_queue_profile(queue, Some(profile))
                    .map_err(|error| rejected(&step, error))?;
            }
            applied.steps += 1;
        }

        for (name, binding) in &self.ports {
            let step = format!("BUFFER_PORT_INGRESS_PROFILE|{}", name);
            let profile = applied.profile(&step, &binding.profile)?;
            let port = resolve_port(orch, &step, name)?;
            orch.set_port_profile(port, Some(profile))
                .map_err(|error| rejected(&step, error))?;
            applied.steps += 1;
        }

        Ok(())
    }
}

/// Object ids created by a plan, by name.
#[derive(Debug, Clone, Default)]
pub struct AppliedPlan {
    pub pools: BTreeMap<String, BufferPoolOid>,
    pub profiles: BTreeMap<String, BufferProfileOid>,
    pub steps: usize,
}

impl AppliedPlan {
    fn profile(&self, step: &str, name: &str) -> Result<BufferProfileOid, PlanError> {
        self.profiles
            .get(name)
            .copied()
            .ok_or_else(|| reference(step, format!("unknown profile {}", name)))
    }

    /// Current state of everything the plan created.
    pub fn report(&self, orch: &BufferOrch) -> SaiResult<PlanReport> {
        Ok(PlanReport {
            pools: self
                .pools
                .iter()
                .map(|(name, oid)| Ok((name.clone(), orch.pool_snapshot(*oid)?)))
                .collect::<SaiResult<_>>()?,
            profiles: self
                .profiles
                .iter()
                .map(|(name, oid)| Ok((name.clone(), orch.profile_snapshot(*oid)?)))
                .collect::<SaiResult<_>>()?,
            stats: orch.stats().clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub pools: BTreeMap<String, PoolSnapshot>,
    pub profiles: BTreeMap<String, ProfileSnapshot>,
    pub stats: BufferOrchStats,
}

/// Parses `Ethernet<N>` into the hardware port number.
pub fn parse_port_name(name: &str) -> Option<u32> {
    name.strip_prefix(PORT_NAME_PREFIX)?.parse().ok()
}

/// Parses `<port>|<index>` or `<port>|<first>-<last>`.
pub fn parse_consumer_key(key: &str) -> Option<(u32, RangeInclusive<u32>)> {
    let (port, indexes) = key.split_once('|')?;
    let hw_port_number = parse_port_name(port)?;
    let range = match indexes.split_once('-') {
        Some((first, last)) => first.parse().ok()?..=last.parse().ok()?,
        None => {
            let index = indexes.parse().ok()?;
            index..=index
        }
    };
    if range.is_empty() {
        return None;
    }
    Some((hw_port_number, range))
}

fn resolve_port(orch: &BufferOrch, step: &str, name: &str) -> Result<PortOid, PlanError> {
    let hw_port_number =
        parse_port_name(name).ok_or_else(|| reference(step, format!("bad port name {}", name)))?;
    orch.find_port(hw_port_number)
        .ok_or_else(|| reference(step, format!("unknown port {}", name)))
}

fn resolve_consumers(
    orch: &BufferOrch,
    step: &str,
    key: &str,
) -> Result<(PortOid, RangeInclusive<u32>), PlanError> {
    let (hw_port_number, indexes) =
        parse_consumer_key(key).ok_or_else(|| reference(step, format!("bad key {}", key)))?;
    let port = orch
        .find_port(hw_port_number)
        .ok_or_else(|| reference(step, format!("unknown port {}{}", PORT_NAME_PREFIX, hw_port_number)))?;
    Ok((port, indexes))
}

fn rejected(step: &str, error: SaiError) -> PlanError {
    PlanError::Rejected {
        step: step.to_string(),
        error,
    }
}

fn reference(step: &str, message: String) -> PlanError {
    PlanError::Reference {
        step: step.to_string(),
        message,
    }
}
