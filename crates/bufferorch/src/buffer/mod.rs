//! BufferOrch - Shared packet-buffer pools, profiles and their consumers.
//!
//! # Architecture
//!
//! ```text
//!   create / set / get / remove
//!              │
//!              ▼
//!     attribute validation
//!              │
//!              ▼
//!         BufferOrch ──> Accounting (what-if) ──> commit ──> BufferOrchCallbacks
//!              │
//!              ▼
//!   ObjectStore<BufferObject> + association lists
//! ```
//!
//! A pool's shared size is derived, never set: it is what remains after the
//! profiles with at least one consumer have taken their reservations. Every
//! request that could change a reservation is evaluated against a scratch
//! view first and either commits completely or leaves nothing behind.

mod accounting;
mod api;
mod orch;
mod tiling;
mod types;

pub use accounting::{Accounting, AccountingPlan, Change, PoolTotals};
pub use orch::{BufferOrch, BufferOrchCallbacks, BufferOrchStats, ProfileParams};
pub use tiling::{BroadcastMax, PerTileSum, ReductionKind, TileReductionPolicy};
pub use types::{
    effective_threshold_mode, BufferList, BufferObject, BufferPoolEntry, BufferPoolType,
    BufferProfileEntry, BufferStats, ConsumerSnapshot, ObjectSnapshot, PoolSnapshot,
    PortEntry, PortSnapshot, PriorityGroupEntry, ProfileSnapshot, ProfileThresholdMode,
    QueueEntry, Threshold, ThresholdMode,
};
