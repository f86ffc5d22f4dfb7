//! Bastion node bootstrap.
//!
//! Everything a node must establish before it joins the network:
//! - Restores the genesis snapshot into an empty store, verifying its hash
//! - Builds the peer admission whitelist from config, store and genesis
//! - Resolves a light-client trust anchor for state sync
//! - Classifies the admin listener address and loads its TLS material
//! - Tracks every acquired resource so it is released in reverse order

pub mod admin;
pub mod anchor;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod identity;
pub mod light_client;
pub mod logging;
pub mod restore;
pub mod shutdown;
pub mod teardown;
pub mod tls;
pub mod whitelist;

pub use admin::{
    build_admin_listener, classify_address, AdminEndpoint, AdminListener, AdminTlsMode,
    AdminTlsPolicy, ClassifiedAddress,
};
pub use anchor::{
    effective_providers, HeaderInfo, LightClient, LightClientConnector, ProviderError,
    SnapshotInfo, TrustAnchorResolver,
};
pub use bootstrap::{Bootstrap, BootstrapDeps, BootstrapOutput};
pub use config::NodeConfig;
pub use error::{BootstrapFailure, NodeError};
pub use identity::{load_genesis, load_or_create_node_key, node_id};
pub use light_client::HttpConnector;
pub use logging::{init_logging, LogFormat};
pub use restore::{apply_post_restore, RestoreGate};
pub use shutdown::ShutdownController;
pub use teardown::{TeardownError, TeardownRegistry};
pub use whitelist::{build_whitelist, PeerWhitelist, WhitelistSources};
