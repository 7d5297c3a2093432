//! Versioned, sealed configuration documents
//!
//! Each entity keeps its provider-facing configuration as one encrypted
//! blob. Inside the seal is a flat key/value document:
//!
//! ```text
//! {"version": 1, "data": {"vpc_id": "vpc-1", "zone_id": "Z123"}}
//! ```
//!
//! Typed views are plain structs with `#[serde(default)]`, so keys absent
//! from older documents decode to their defaults.

use crate::crypto::ConfCipher;
use crate::error::{ControlPlaneError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CONF_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ConfDocument {
    version: u32,
    #[serde(default)]
    data: Map<String, Value>,
}

/// Encrypted configuration blob; empty until first written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedConf(String);

impl SealedConf {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn seal<C: Serialize>(conf: &C, cipher: &ConfCipher) -> Result<Self> {
        let Value::Object(data) = serde_json::to_value(conf)? else {
            return Err(ControlPlaneError::Conf(
                "configuration must be a key/value document".into(),
            ));
        };
        let document = ConfDocument {
            version: CONF_VERSION,
            data,
        };
        let plaintext = serde_json::to_vec(&document)?;
        Ok(Self(cipher.seal(&plaintext)?))
    }

    pub fn open<C: DeserializeOwned + Default>(&self, cipher: &ConfCipher) -> Result<C> {
        if self.is_empty() {
            return Ok(C::default());
        }
        let plaintext = cipher.open(&self.0)?;
        let document: ConfDocument = serde_json::from_slice(&plaintext)?;
        if document.version > CONF_VERSION {
            return Err(ControlPlaneError::Conf(format!(
                "document version {} is newer than supported version {}",
                document.version, CONF_VERSION
            )));
        }
        Ok(serde_json::from_value(Value::Object(document.data))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Old {
        vpc_id: String,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct New {
        vpc_id: String,
        zone_id: String,
    }

    fn cipher() -> ConfCipher {
        ConfCipher::new([3u8; 32])
    }

    #[test]
    fn test_empty_blob_decodes_to_default() {
        let conf: New = SealedConf::default().open(&cipher()).unwrap();
        assert_eq!(conf, New::default());
    }

    #[test]
    fn test_absent_keys_decode_to_defaults() {
        let sealed = SealedConf::seal(&Old { vpc_id: "vpc-1".into() }, &cipher()).unwrap();
        let conf: New = sealed.open(&cipher()).unwrap();
        assert_eq!(conf.vpc_id, "vpc-1");
        assert_eq!(conf.zone_id, "");
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let document = serde_json::json!({"version": CONF_VERSION + 1, "data": {}});
        let sealed = SealedConf(cipher().seal(document.to_string().as_bytes()).unwrap());
        let result: Result<New> = sealed.open(&cipher());
        assert!(matches!(result, Err(ControlPlaneError::Conf(_))));
    }

    #[test]
    fn test_blob_is_not_plaintext() {
        let sealed = SealedConf::seal(&Old { vpc_id: "vpc-secret".into() }, &cipher()).unwrap();
        assert!(!serde_json::to_string(&sealed).unwrap().contains("vpc-secret"));
    }
}
