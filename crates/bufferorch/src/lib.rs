//! Shared buffer orchestration for SONiC switches.
//!
//! bufferorch owns the switch's shared packet-buffer objects (pools,
//! profiles, ingress priority groups, queues and ports) and keeps each
//! pool's shared size consistent with the reservations of the profiles
//! attached to consumers.
//!
//! Key features:
//! - SAI-style create / set / get / remove with index-qualified statuses
//! - Attribute validation from per-object metadata tables
//! - Admission control: no request may overcommit a pool
//! - Tiled buffer accounting with a pluggable tile reduction policy
//! - Structured audit records for every configuration change
//! - Whole-configuration plans loaded from TOML

pub mod audit;
pub mod buffer;
pub mod capability;
pub mod config;
pub mod plan;
pub mod shared;
pub mod validation;

pub use buffer::{
    BufferOrch, BufferOrchCallbacks, BufferOrchStats, BufferPoolType, PoolSnapshot,
    ProfileParams, ProfileSnapshot, ProfileThresholdMode, Threshold, ThresholdMode,
};
pub use capability::{HardwareCapability, StaticCapability};
pub use config::{BufferOrchConfig, ConfigError, HardwareProfile};
pub use plan::{AppliedPlan, BufferPlan, PlanError, PlanReport};
pub use shared::SharedBufferOrch;
