use aes::Aes256;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;
use sha1::{Digest, Sha1};

use crate::message::EncryptionScheme;
use crate::utils::{MessagingError, Result};

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

pub const AES_KEY_SIZE: usize = 32;
pub const AES_BLOCK_SIZE: usize = 16;

const KEY_CHECK_SIZE: usize = 20;

/// Encrypted data together with the base64 IV it was encrypted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub data: Vec<u8>,
    pub iv: String,
}

/// Encrypts `plaintext` under `scheme`.
///
/// The IV is generated here for every call and never accepted from the
/// caller. For `AesCfb` the ciphertext is `CFB(plaintext || sha1(plaintext))`;
/// the trailing digest lets `decrypt` reject a wrong key.
pub fn encrypt(scheme: EncryptionScheme, key: &[u8], plaintext: &[u8]) -> Result<Sealed> {
    match scheme {
        EncryptionScheme::None => Ok(Sealed {
            data: plaintext.to_vec(),
            iv: String::new(),
        }),
        EncryptionScheme::AesCfb => {
            let mut iv = [0u8; AES_BLOCK_SIZE];
            OsRng.fill_bytes(&mut iv);

            let mut buf = Vec::with_capacity(plaintext.len() + KEY_CHECK_SIZE);
            buf.extend_from_slice(plaintext);
            buf.extend_from_slice(&Sha1::digest(plaintext));

            Aes256CfbEnc::new_from_slices(key, &iv)
                .map_err(|_| {
                    MessagingError::InvalidInput(format!(
                        "Invalid {scheme} encryption key: expected {AES_KEY_SIZE} bytes but got {}",
                        key.len()
                    ))
                })?
                .encrypt(&mut buf);

            Ok(Sealed {
                data: buf,
                iv: BASE64.encode(iv),
            })
        }
    }
}

/// Decrypts `data` that was produced by `encrypt` with the same scheme and key.
pub fn decrypt(scheme: EncryptionScheme, key: &[u8], iv: &str, data: &[u8]) -> Result<Vec<u8>> {
    match scheme {
        EncryptionScheme::None => Ok(data.to_vec()),
        EncryptionScheme::AesCfb => {
            if key.is_empty() {
                return Err(MessagingError::DecryptionError(
                    "no encryption key is available".to_string(),
                ));
            }

            let iv = BASE64
                .decode(iv)
                .map_err(|e| MessagingError::DecryptionError(format!("invalid IV: {e}")))?;

            if data.len() < KEY_CHECK_SIZE {
                return Err(MessagingError::DecryptionError(format!(
                    "{} bytes of data is too short for {scheme}",
                    data.len()
                )));
            }

            let mut buf = data.to_vec();
            Aes256CfbDec::new_from_slices(key, &iv)
                .map_err(|_| {
                    MessagingError::DecryptionError(format!(
                        "invalid key ({} bytes) or IV ({} bytes)",
                        key.len(),
                        iv.len()
                    ))
                })?
                .decrypt(&mut buf);

            let check = buf.split_off(buf.len() - KEY_CHECK_SIZE);
            if Sha1::digest(&buf).as_slice() != check.as_slice() {
                return Err(MessagingError::DecryptionError(
                    "key or IV mismatch".to_string(),
                ));
            }

            Ok(buf)
        }
    }
}
