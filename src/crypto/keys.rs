use aes::Aes256;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use sha2::{Digest, Sha256};

use super::cipher::AES_KEY_SIZE;
use crate::message::EncryptionScheme;
use crate::utils::{MessagingError, Result};

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;

/// Fixed IV for key derivation. Derivation must be deterministic so the
/// server can recompute a device's key from the master key alone.
const KEY_DERIVATION_IV: &str = "QSaz5pMnMbar66FsNdI/ZQ==";

/// Derives per-user/device encryption keys from the server's master key.
#[derive(Clone)]
pub struct KeyDeriver {
    master_key: Vec<u8>,
}

impl KeyDeriver {
    pub fn new(master_key: Vec<u8>) -> Result<Self> {
        if master_key.len() != AES_KEY_SIZE {
            return Err(MessagingError::InvalidInput(format!(
                "The master key must be {AES_KEY_SIZE} bytes but is {} bytes",
                master_key.len()
            )));
        }
        Ok(Self { master_key })
    }

    pub fn from_base64(master_key: &str) -> Result<Self> {
        let key = BASE64
            .decode(master_key)
            .map_err(|e| MessagingError::InvalidInput(format!("Invalid master key: {e}")))?;
        Self::new(key)
    }

    /// Derives the key for `user` of `organisation` on `device`.
    ///
    /// Identity components are lower-cased, so the same principal always
    /// gets the same key. `EncryptionScheme::None` yields an empty key.
    pub fn derive(
        &self,
        scheme: EncryptionScheme,
        user: &str,
        organisation: &str,
        device: &str,
    ) -> Result<Vec<u8>> {
        match scheme {
            EncryptionScheme::None => Ok(Vec::new()),
            EncryptionScheme::AesCfb => {
                let password = format!(
                    "{}{}{}",
                    device.to_lowercase(),
                    user.to_lowercase(),
                    organisation.to_lowercase()
                );
                let mut key = Sha256::digest(password.as_bytes()).to_vec();

                let iv = BASE64.decode(KEY_DERIVATION_IV).map_err(|e| {
                    MessagingError::InvalidInput(format!("Invalid key derivation IV: {e}"))
                })?;

                Aes256CfbEnc::new_from_slices(&self.master_key, &iv)
                    .map_err(|_| {
                        MessagingError::InvalidInput(format!(
                            "Failed to derive the encryption key for the user ({user}), \
                             organisation ({organisation}) and device ({device})"
                        ))
                    })?
                    .encrypt(&mut key);

                Ok(key)
            }
        }
    }
}

impl std::fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDeriver")
            .field("master_key", &"<redacted>")
            .finish()
    }
}
