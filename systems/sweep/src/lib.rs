#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Sweep-clearing system for the character grid.
//!
//! A sweep wave releases sweepers that travel across the grid at constant
//! speed, destroy every occupant the injected classifier accepts, leave a
//! fading trail behind them and flash the cells they cleared. The
//! [`SweepCoordinator`] owns the whole lifecycle: it gates incoming requests,
//! spawns one sweeper per target-bearing row (or four from a radial origin),
//! advances them with swept collision so fast movement never skips a cell, and
//! publishes exactly one `SweepCompleted` event per wave.

mod agent;
mod collision;
mod config;
mod coordinator;
mod flash;
mod ticker;
mod trail;

pub use agent::CellPoint;
pub use config::{ConfigError, SweepConfig};
pub use coordinator::{
    RequestOutcome, SweepCoordinator, SweepPhase, SweepStatus, SweeperSnapshot,
};
pub use flash::FlashMarker;
pub use trail::TrailPoint;
