use proptest::prelude::*;

use bastion_crypto::{pubkey_to_node_id, NodeKey, NODE_ID_BYTES};

proptest! {
    /// Every valid key derives to a fixed-width lowercase hex identity.
    #[test]
    fn node_id_shape(seed in prop::array::uniform32(any::<u8>())) {
        let key = NodeKey::from_seed(&seed);
        let id = pubkey_to_node_id(&key.public_key_bytes()).unwrap();
        prop_assert_eq!(id.len(), NODE_ID_BYTES * 2);
        prop_assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Inputs that are not 32 bytes long never derive.
    #[test]
    fn wrong_lengths_fail(bytes in prop::collection::vec(any::<u8>(), 0..80)) {
        prop_assume!(bytes.len() != 32);
        prop_assert!(pubkey_to_node_id(&bytes).is_err());
    }
}
