//! Room Message Encryption
//!
//! Per-room symmetric encryption of message bodies. Room keys are derived
//! on demand from a master key and never stored; the room id is bound into
//! the ciphertext as associated data so a message cannot be replayed into
//! another room. Derivation is CPU-bound and runs off the async hot path.

use std::sync::Arc;

use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use uuid::Uuid;

use crate::shared::error::AppError;

/// Substituted for message content when decryption fails. Retrieval of the
/// surrounding history must not be blocked by one corrupt message.
pub const DECRYPT_PLACEHOLDER: &str = "message could not be decrypted";

/// PBKDF2 rounds for room key derivation.
const KDF_ITERATIONS: u32 = 100_000;
/// Suffix mixed into the per-room KDF salt.
const KDF_SALT_SUFFIX: &str = ":room-key";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypted message body as stored and transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessage {
    /// Hex ciphertext
    pub ciphertext: String,
    /// Hex 12-byte nonce
    pub iv: String,
    /// Hex 16-byte authentication tag
    pub tag: String,
}

/// Conditionally enabled room message cipher.
///
/// Without a master key every message is stored and transmitted in clear and
/// [`RoomCipher::is_enabled`] returns false everywhere.
#[derive(Clone)]
pub struct RoomCipher {
    master_key: Option<Arc<str>>,
}

impl RoomCipher {
    pub fn new(master_key: Option<String>) -> Self {
        if master_key.is_none() {
            tracing::warn!("No master key configured, messages will be stored in plaintext");
        }
        Self {
            master_key: master_key.map(Arc::from),
        }
    }

    /// Whether message bodies are encrypted at rest and on the wire.
    pub fn is_enabled(&self) -> bool {
        self.master_key.is_some()
    }

    /// Derive the 32-byte key for a room. Deterministic in (master, room id).
    fn derive_room_key(master_key: &str, room_id: Uuid) -> [u8; 32] {
        let salt = format!("{}{}", room_id, KDF_SALT_SUFFIX);
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(
            master_key.as_bytes(),
            salt.as_bytes(),
            KDF_ITERATIONS,
            &mut key,
        );
        key
    }

    /// Encrypt a sanitized message body for a room.
    pub async fn encrypt(
        &self,
        room_id: Uuid,
        plaintext: &str,
    ) -> Result<EncryptedMessage, AppError> {
        let master_key = self
            .master_key
            .clone()
            .ok_or_else(|| AppError::Internal("Encryption requested without master key".into()))?;
        let plaintext = plaintext.to_string();

        tokio::task::spawn_blocking(move || {
            let key = Self::derive_room_key(&master_key, room_id);
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
            let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

            let mut buffer = plaintext.into_bytes();
            let tag = cipher
                .encrypt_in_place_detached(&nonce, room_id.to_string().as_bytes(), &mut buffer)
                .map_err(|_| AppError::Internal("Message encryption failed".into()))?;

            Ok(EncryptedMessage {
                ciphertext: hex::encode(buffer),
                iv: hex::encode(nonce),
                tag: hex::encode(tag),
            })
        })
        .await
        .map_err(|e| AppError::Internal(format!("Encryption task failed: {}", e)))?
    }

    /// Decrypt a message body, verifying the tag against the room id.
    ///
    /// Tampering or a mismatched room is an error; callers substitute
    /// [`DECRYPT_PLACEHOLDER`] rather than propagating it to the room.
    pub async fn decrypt(
        &self,
        room_id: Uuid,
        ciphertext_hex: &str,
        iv_hex: &str,
        tag_hex: &str,
    ) -> Result<String, AppError> {
        let master_key = self
            .master_key
            .clone()
            .ok_or_else(|| AppError::Internal("Decryption requested without master key".into()))?;

        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|_| AppError::Internal("Malformed ciphertext encoding".into()))?;
        let iv = hex::decode(iv_hex)
            .map_err(|_| AppError::Internal("Malformed nonce encoding".into()))?;
        let tag = hex::decode(tag_hex)
            .map_err(|_| AppError::Internal("Malformed tag encoding".into()))?;

        if iv.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(AppError::Internal("Malformed nonce or tag length".into()));
        }

        tokio::task::spawn_blocking(move || {
            let key = Self::derive_room_key(&master_key, room_id);
            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

            let mut buffer = ciphertext;
            cipher
                .decrypt_in_place_detached(
                    Nonce::from_slice(&iv),
                    room_id.to_string().as_bytes(),
                    &mut buffer,
                    Tag::from_slice(&tag),
                )
                .map_err(|_| AppError::Internal("Message decryption failed".into()))?;

            String::from_utf8(buffer)
                .map_err(|_| AppError::Internal("Decrypted content is not valid UTF-8".into()))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Decryption task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cipher() -> RoomCipher {
        RoomCipher::new(Some("test-master-key-for-unit-tests".into()))
    }

    #[tokio::test]
    async fn encrypt_decrypt_roundtrips_byte_for_byte() {
        let cipher = cipher();
        let room_id = Uuid::new_v4();
        let plaintext = "the <b>exact</b> bytes, tabs\tand unicode \u{1F980}";

        let sealed = cipher.encrypt(room_id, plaintext).await.unwrap();
        let opened = cipher
            .decrypt(room_id, &sealed.ciphertext, &sealed.iv, &sealed.tag)
            .await
            .unwrap();

        assert_eq!(opened, plaintext);
    }

    #[tokio::test]
    async fn nonces_are_fresh_per_message() {
        let cipher = cipher();
        let room_id = Uuid::new_v4();

        let first = cipher.encrypt(room_id, "same text").await.unwrap();
        let second = cipher.encrypt(room_id, "same text").await.unwrap();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[tokio::test]
    async fn decrypting_with_another_room_key_fails() {
        let cipher = cipher();
        let sealed = cipher.encrypt(Uuid::new_v4(), "secret").await.unwrap();

        let other_room = Uuid::new_v4();
        let result = cipher
            .decrypt(other_room, &sealed.ciphertext, &sealed.iv, &sealed.tag)
            .await;

        assert!(result.is_err(), "wrong room must never yield plaintext");
    }

    #[tokio::test]
    async fn tampered_tag_is_rejected() {
        let cipher = cipher();
        let room_id = Uuid::new_v4();
        let sealed = cipher.encrypt(room_id, "secret").await.unwrap();

        let mut tag_bytes = hex::decode(&sealed.tag).unwrap();
        tag_bytes[0] ^= 0x01;
        let tampered = hex::encode(tag_bytes);

        let result = cipher
            .decrypt(room_id, &sealed.ciphertext, &sealed.iv, &tampered)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tampered_ciphertext_is_rejected() {
        let cipher = cipher();
        let room_id = Uuid::new_v4();
        let sealed = cipher.encrypt(room_id, "secret").await.unwrap();

        let mut ct = hex::decode(&sealed.ciphertext).unwrap();
        ct[0] ^= 0xFF;
        let tampered = hex::encode(ct);

        let result = cipher
            .decrypt(room_id, &tampered, &sealed.iv, &sealed.tag)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn disabled_without_master_key() {
        let cipher = RoomCipher::new(None);
        assert!(!cipher.is_enabled());
    }

    #[test]
    fn room_keys_are_deterministic_and_distinct() {
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();

        let first = RoomCipher::derive_room_key("master", room_a);
        let again = RoomCipher::derive_room_key("master", room_a);
        let other = RoomCipher::derive_room_key("master", room_b);

        assert_eq!(first, again);
        assert_ne!(first, other);
    }
}
