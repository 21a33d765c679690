//! Two-world low-thrust transfer planner.
//!
//! The workspace crates are re-exported here so front-ends (the CLI binaries,
//! the plot renderer, integration tests) depend on a single library.

pub use transfer_config as config;
pub use transfer_dynamics as dynamics;
pub use transfer_export as export;
pub use transfer_nlp as nlp;
pub use transfer_orbits as orbits;
pub use transfer_trajopt as trajopt;

pub use transfer_core::{
    Body, Control, ShapeError, State, Trajectory, Vector2, World, constants, state, vector,
};
pub use transfer_trajopt::{
    SolvedTransfer, TransferError, TransferReport, TransferRequest, compute_trajectory_to_other_world,
    plan_transfer, verify,
};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber shared by the binaries; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
