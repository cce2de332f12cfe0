//! Encryption at rest of sealed columns.
//!
//! A key is configured as `aesgcm:<hex>` with 16 or 32 key bytes, selecting
//! AES-128-GCM or AES-256-GCM. Sealed values are written as
//! `aesgcm:<base64(nonce || ciphertext)>`. Stored values without that prefix are
//! read as plaintext, so a key can be introduced on an existing database.

use crate::error::DaoError;
use crate::schema::EntitySchema;
use crate::sql::SetOp;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::postgres::{PgTypeInfo, PgValueRef};
use sqlx::Postgres;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;
use thiserror::Error;

pub const PREFIX: &str = "aesgcm:";
const NONCE_LEN: usize = 12;

static CIPHER: OnceLock<Cipher> = OnceLock::new();

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid data encryption key: {0}")]
    Key(String),
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error("value is encrypted but no data encryption key is configured")]
    NoKey,
    #[error("sealed value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// AES-GCM with a 128 or 256 bit key.
#[derive(Clone)]
pub enum Cipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cipher::Aes128(_) => f.write_str("Cipher(AES-128-GCM)"),
            Cipher::Aes256(_) => f.write_str("Cipher(AES-256-GCM)"),
        }
    }
}

impl Cipher {
    /// Parses `aesgcm:<hex key>`.
    pub fn parse(spec: &str) -> Result<Self, CryptoError> {
        let hex_key = spec
            .trim()
            .strip_prefix(PREFIX)
            .ok_or_else(|| CryptoError::Key(format!("expected {PREFIX}<hex>")))?;
        let key = hex::decode(hex_key).map_err(|e| CryptoError::Key(e.to_string()))?;
        let bad_len = |_| CryptoError::Key(format!("expected 16 or 32 bytes, got {}", key.len()));
        match key.len() {
            16 => Aes128Gcm::new_from_slice(&key).map(Cipher::Aes128).map_err(bad_len),
            32 => Aes256Gcm::new_from_slice(&key).map(Cipher::Aes256).map_err(bad_len),
            n => Err(CryptoError::Key(format!("expected 16 or 32 bytes, got {n}"))),
        }
    }

    /// Random nonce followed by the ciphertext.
    pub fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let (nonce, sealed) = match self {
            Cipher::Aes128(c) => {
                let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
                let sealed = c.encrypt(&nonce, plain);
                (nonce, sealed)
            }
            Cipher::Aes256(c) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let sealed = c.encrypt(&nonce, plain);
                (nonce, sealed)
            }
        };
        let sealed = sealed.map_err(|_| CryptoError::Encrypt)?;
        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_LEN {
            return Err(CryptoError::Decrypt);
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);
        let plain = match self {
            Cipher::Aes128(c) => c.decrypt(nonce, sealed),
            Cipher::Aes256(c) => c.decrypt(nonce, sealed),
        };
        plain.map_err(|_| CryptoError::Decrypt)
    }

    /// `aesgcm:<base64>` text of `plain`.
    pub fn seal(&self, plain: &str) -> Result<String, CryptoError> {
        Ok(format!("{PREFIX}{}", STANDARD.encode(self.encrypt(plain.as_bytes())?)))
    }

    /// Plaintext of a stored value; unprefixed values are returned as they are.
    pub fn open(&self, stored: &str) -> Result<String, CryptoError> {
        let Some(encoded) = stored.strip_prefix(PREFIX) else {
            return Ok(stored.to_string());
        };
        let data = STANDARD.decode(encoded).map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(self.decrypt(&data)?).map_err(|_| CryptoError::Decrypt)
    }
}

/// Installs the process-wide key. Returns false when one is already installed.
pub fn install(cipher: Cipher) -> bool {
    CIPHER.set(cipher).is_ok()
}

pub fn installed() -> Option<&'static Cipher> {
    CIPHER.get()
}

/// Seals with the installed key; without one the text is stored as is.
pub fn seal(plain: &str) -> Result<String, CryptoError> {
    match installed() {
        Some(c) => c.seal(plain),
        None => Ok(plain.to_string()),
    }
}

pub fn open(stored: &str) -> Result<String, CryptoError> {
    if !stored.starts_with(PREFIX) {
        return Ok(stored.to_string());
    }
    installed().ok_or(CryptoError::NoKey)?.open(stored)
}

/// Text written for a sealed column: strings as they are, other values as JSON.
fn seal_value(v: &Value) -> Result<Value, CryptoError> {
    let text = match v {
        Value::Null => return Ok(Value::Null),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    seal(&text).map(Value::String)
}

/// Seals the sealed columns of a row about to be inserted.
pub(crate) fn seal_row(
    schema: &EntitySchema,
    row: &mut Map<String, Value>,
) -> Result<(), DaoError> {
    for c in schema.columns.iter().filter(|c| c.sealed) {
        if let Some(v) = row.get_mut(c.name) {
            *v = seal_value(v)?;
        }
    }
    Ok(())
}

/// Seals the values assigned to sealed columns. Arithmetic and appends cannot
/// apply to ciphertext and are refused.
pub(crate) fn seal_sets(
    schema: &EntitySchema,
    sets: Vec<(&'static str, SetOp)>,
) -> Result<Vec<(&'static str, SetOp)>, DaoError> {
    sets.into_iter()
        .map(|(name, op)| {
            if !schema.column(name).is_some_and(|c| c.sealed) {
                return Ok((name, op));
            }
            match op {
                SetOp::Value(v) => Ok((name, SetOp::Value(seal_value(&v)?))),
                SetOp::Null => Ok((name, SetOp::Null)),
                SetOp::Add(_) | SetOp::Append(_) => {
                    Err(DaoError::validation(name, "sealed field can only be set"))
                }
            }
        })
        .collect()
}

/// Plaintext form of a sealed column type.
pub trait SealedText: Sized {
    fn from_text(text: String) -> Result<Self, CryptoError>;
}

impl SealedText for String {
    fn from_text(text: String) -> Result<Self, CryptoError> {
        Ok(text)
    }
}

impl SealedText for Map<String, Value> {
    fn from_text(text: String) -> Result<Self, CryptoError> {
        if text.is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Column value held in plaintext in memory and sealed in the database.
///
/// Serializes as the plain value, so views and diffs see plaintext; the
/// builders seal it on the way to the database and decoding opens it.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sealed<T>(pub T);

impl<T> Sealed<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Sealed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sealed(..)")
    }
}

impl<T> Deref for Sealed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Sealed<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> From<T> for Sealed<T> {
    fn from(v: T) -> Self {
        Sealed(v)
    }
}

impl<T> sqlx::Type<Postgres> for Sealed<T> {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r, T: SealedText> sqlx::Decode<'r, Postgres> for Sealed<T> {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let stored = <&str as sqlx::Decode<Postgres>>::decode(value)?;
        Ok(Sealed(T::from_text(open(stored)?)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::connector;
    use serde_json::json;

    const KEY_128: &str = "aesgcm:000102030405060708090a0b0c0d0e0f";
    const KEY_256: &str = "aesgcm:000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn both_key_sizes_round_trip() {
        for spec in [KEY_128, KEY_256] {
            let c = Cipher::parse(spec).unwrap();
            let sealed = c.seal("kubeconfig").unwrap();
            assert!(sealed.starts_with(PREFIX), "{sealed}");
            assert!(!sealed.contains("kubeconfig"));
            assert_eq!(c.open(&sealed).unwrap(), "kubeconfig");
        }
    }

    #[test]
    fn nonces_differ_per_seal() {
        let c = Cipher::parse(KEY_256).unwrap();
        assert_ne!(c.seal("same").unwrap(), c.seal("same").unwrap());
    }

    #[test]
    fn bad_keys_are_rejected() {
        assert!(matches!(
            Cipher::parse("000102030405060708090a0b0c0d0e0f"),
            Err(CryptoError::Key(_))
        ));
        assert!(matches!(Cipher::parse("aesgcm:zz"), Err(CryptoError::Key(_))));
        assert!(matches!(Cipher::parse("aesgcm:0001020304"), Err(CryptoError::Key(_))));
    }

    #[test]
    fn wrong_key_or_tampering_fails_to_open() {
        let a = Cipher::parse(KEY_128).unwrap();
        let b = Cipher::parse(KEY_256).unwrap();
        let sealed = a.seal("secret").unwrap();
        assert!(matches!(b.open(&sealed), Err(CryptoError::Decrypt)));

        let mut data = a.encrypt(b"secret").unwrap();
        let last = data.len() - 1;
        data[last] ^= 1;
        assert!(matches!(a.decrypt(&data), Err(CryptoError::Decrypt)));
        assert!(matches!(a.decrypt(&[0u8; 4]), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn plaintext_passes_through_open() {
        let c = Cipher::parse(KEY_128).unwrap();
        assert_eq!(c.open("not sealed").unwrap(), "not sealed");
    }

    #[test]
    fn objects_are_written_as_json_text() {
        let mut row = Map::new();
        row.insert("config_data".into(), json!({"kubeconfig": "x"}));
        row.insert("name".into(), json!("k8s"));
        seal_row(&connector::SCHEMA, &mut row).unwrap();
        // Unit tests never install a key, so the text stays readable.
        assert_eq!(row["config_data"], json!(r#"{"kubeconfig":"x"}"#));
        assert_eq!(row["name"], json!("k8s"));

        let back = Map::<String, Value>::from_text(r#"{"kubeconfig":"x"}"#.into()).unwrap();
        assert_eq!(back["kubeconfig"], json!("x"));
        assert!(Map::<String, Value>::from_text(String::new()).unwrap().is_empty());
    }

    #[test]
    fn sealed_sets_refuse_appends() {
        let sets = vec![("config_data", SetOp::Append(json!({"a": 1})))];
        let err = seal_sets(&connector::SCHEMA, sets).unwrap_err();
        assert!(err.is_validation());
        let kept =
            seal_sets(&connector::SCHEMA, vec![("name", SetOp::Append(json!("x")))]).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn debug_hides_the_value() {
        let s = Sealed("secret".to_string());
        assert_eq!(format!("{s:?}"), "Sealed(..)");
        assert_eq!(serde_json::to_value(&s).unwrap(), json!("secret"));
    }
}
