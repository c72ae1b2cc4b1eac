//! Portal
//!
//! A multi-tenant DAO governance engine: membership, staking, stake-weighted
//! voting, proposals and task bounties for many DAOs on one platform.

/// Module version information
pub mod version {
    /// The current version of the Portal library
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Re-export core components for easy access
pub mod core {
    pub use portal_common as common;
    pub use portal_config as config;
    pub use portal_storage as storage;
}

/// Re-export the per-DAO engines
pub mod systems {
    pub use portal_economic as economic;
    pub use portal_governance as governance;
}

/// Platform service hosting many DAOs
pub mod node {
    pub use portal_node_core as core;
}
