//! Agora Environment Abstraction Layer
//!
//! This crate provides the seams between the deterministic engine and the
//! things it drives:
//! - **Randomness**: `SimRng`, a seeded stream with read-only derivation
//! - **World**: the `Pack` capability set (initialize, apply, snapshot)
//! - **Agents**: the per-turn `TickContext` and private `AgentMemory`
//!
//! Nothing here reads a clock or OS entropy, so any run is reproducible
//! from its seed.
//!
//! # Example
//!
//! ```ignore
//! use agora_env::{SimRng, TickContext};
//!
//! let root = SimRng::new(42);
//! let mut turn_rng = root.derive(tick, Some(agent_id.as_str()));
//! let size = turn_rng.next_int(1, 100)?;
//! ```

mod context;
mod error;
mod pack;
pub mod rng;
mod types;

pub use context::TickContext;
pub use error::{AgentError, SetupError};
pub use pack::{ApplyContext, MetricSource, Pack, PackSetup, StateView};
pub use rng::{RngError, SimRng};
pub use types::{Action, ActionId, ActionResult, AgentId, AgentMemory, FailureKind};
