//! Genesis and node key loading.

use std::path::Path;

use bastion_crypto::{pubkey_to_node_id, NodeKey};
use bastion_types::GenesisDescriptor;

use crate::NodeError;

pub fn load_genesis(path: &Path) -> Result<GenesisDescriptor, NodeError> {
    GenesisDescriptor::from_json_file(path)
        .map_err(|e| NodeError::Config(format!("genesis {}: {e}", path.display())))
}

/// Load the node key, generating and persisting a new one when the file is
/// missing and `autogen` is set.
pub fn load_or_create_node_key(path: &Path, autogen: bool) -> Result<NodeKey, NodeError> {
    if path.exists() {
        return Ok(NodeKey::from_file(path)?);
    }
    if !autogen {
        return Err(NodeError::Config(format!(
            "node key {} not found",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let key = NodeKey::generate()?;
    key.write_file(path)?;
    tracing::info!(
        path = %path.display(),
        node_id = %node_id(&key)?,
        "generated node key"
    );
    Ok(key)
}

/// The node's own peer identity.
pub fn node_id(key: &NodeKey) -> Result<String, NodeError> {
    Ok(pubkey_to_node_id(&key.public_key_bytes())?)
}
