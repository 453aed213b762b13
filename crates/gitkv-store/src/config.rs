use gitkv_types::DigestAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::head::validate_head_ref;

/// Configuration for an [`ObjectStore`](crate::ObjectStore).
///
/// ```toml
/// digest = "sha1"
/// head_ref = "refs/heads/master"
/// verify_on_load = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Digest function used to address objects.
    pub digest: DigestAlgorithm,
    /// Key of the head ref.
    pub head_ref: String,
    /// Re-hash loaded objects and reject any whose digest differs.
    pub verify_on_load: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::Sha1,
            head_ref: "refs/heads/master".to_string(),
            verify_on_load: true,
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Check that `head_ref` is a valid `refs/heads/` name.
    pub fn validate(&self) -> StoreResult<()> {
        validate_head_ref(&self.head_ref)
            .map_err(|reason| StoreError::Config(format!("head_ref {:?}: {reason}", self.head_ref)))
    }

    /// Select the digest function.
    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Point the store at another head ref.
    pub fn with_head_ref(mut self, head_ref: impl Into<String>) -> Self {
        self.head_ref = head_ref.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.digest, DigestAlgorithm::Sha1);
        assert_eq!(config.head_ref, "refs/heads/master");
        assert!(config.verify_on_load);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(StoreConfig::from_toml_str("").unwrap(), StoreConfig::default());
    }

    #[test]
    fn parse_full_toml() {
        let config = StoreConfig::from_toml_str(
            r#"
            digest = "blake3"
            head_ref = "refs/heads/main"
            verify_on_load = false
            "#,
        )
        .unwrap();
        assert_eq!(config.digest, DigestAlgorithm::Blake3);
        assert_eq!(config.head_ref, "refs/heads/main");
        assert!(!config.verify_on_load);
    }

    #[test]
    fn toml_roundtrip() {
        let config = StoreConfig::default().with_digest(DigestAlgorithm::Blake3);
        let text = config.to_toml_string().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_bad_values() {
        for source in [
            r#"digest = "md5""#,
            r#"head_ref = "master""#,
            r#"head_ref = "refs/heads/bad..name""#,
            "verify_on_load = 3",
        ] {
            assert!(
                matches!(StoreConfig::from_toml_str(source), Err(StoreError::Config(_))),
                "{source}"
            );
        }
    }
}
