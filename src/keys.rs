//! Deterministic key formats.
//!
//! These strings are shared with operational tooling and other processes
//! working on the same store, so they must stay byte-for-byte stable.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix under which every outbox record of `endpoint_name` lives.
pub fn outbox_prefix(endpoint_name: &str) -> String {
    format!("Outbox/{}/", endpoint_name)
}

/// `Outbox/{endpointName}/{messageId}` with backslashes replaced by underscores.
pub fn outbox_record_key(endpoint_name: &str, message_id: &str) -> String {
    format!(
        "{}{}",
        outbox_prefix(endpoint_name),
        message_id.replace('\\', "_")
    )
}

/// `{collection}{separator}{sagaId}`.
pub fn saga_container_key(collection: &str, separator: &str, saga_id: Uuid) -> String {
    format!("{}{}{}", collection, separator, saga_id.hyphenated())
}

/// Maximum key length before the identity key switches to its hashed form.
const MAX_IDENTITY_KEY_LEN: usize = 127;

/// Deterministic uniqueness key for `(sagaType, property, value)`.
///
/// The value is hashed so arbitrary values produce bounded, key-safe strings:
/// `{sagaType}/{property}/{hash(value)}`, where `+` in the type name becomes
/// `-`. Keys longer than 127 characters fall back to
/// `MoreThan127/{hash(sagaType + property)}/{hash(value)}`.
pub fn saga_unique_identity_key(saga_type: &str, property: &str, value: &str) -> String {
    let value_hash = hash_to_uuid(value);
    let key = format!("{}/{}/{}", saga_type.replace('+', "-"), property, value_hash);

    if key.len() > MAX_IDENTITY_KEY_LEN {
        let type_hash = hash_to_uuid(&format!("{}{}", saga_type, property));
        return format!("MoreThan127/{}/{}", type_hash, value_hash);
    }

    key
}

fn hash_to_uuid(input: &str) -> Uuid {
    let digest = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_key_replaces_backslashes() {
        assert_eq!(
            outbox_record_key("Sales", r"DOMAIN\user\42"),
            "Outbox/Sales/DOMAIN_user_42"
        );
        assert_eq!(outbox_record_key("Sales", "abc"), "Outbox/Sales/abc");
    }

    #[test]
    fn outbox_key_starts_with_prefix() {
        assert!(outbox_record_key("Sales", "abc").starts_with(&outbox_prefix("Sales")));
    }

    #[test]
    fn container_key_uses_separator() {
        let id = Uuid::parse_str("6f1c2b8e-0d5e-4a7f-9a63-2c0f0d4f5b11").unwrap();
        assert_eq!(
            saga_container_key("OrderSagaDatas", "/", id),
            "OrderSagaDatas/6f1c2b8e-0d5e-4a7f-9a63-2c0f0d4f5b11"
        );
    }

    #[test]
    fn identity_key_is_deterministic() {
        let a = saga_unique_identity_key("Shop.OrderSaga+Data", "OrderId", "o-1");
        let b = saga_unique_identity_key("Shop.OrderSaga+Data", "OrderId", "o-1");
        let c = saga_unique_identity_key("Shop.OrderSaga+Data", "OrderId", "o-2");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("Shop.OrderSaga-Data/OrderId/"));
    }

    #[test]
    fn long_identity_key_is_shortened() {
        let saga_type = "A".repeat(120);
        let key = saga_unique_identity_key(&saga_type, "OrderId", "o-1");

        assert!(key.starts_with("MoreThan127/"));
        assert!(key.len() <= MAX_IDENTITY_KEY_LEN);
        assert!(key.ends_with(&hash_to_uuid("o-1").to_string()));
    }
}
