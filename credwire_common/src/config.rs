//! Overrides for the secret data keys we use to recognize credentials.
//!
//! The overlay is stored as a JSON blob under the `credentials` key of a
//! cluster-wide `ConfigMap`:
//!
//! ```json
//! {
//!   "s3": {
//!     "s3AccessKeyIDName": "customAccessKeyID",
//!     "s3SecretAccessKeyName": "customSecretAccessKey"
//!   },
//!   "gcs": {
//!     "gcsCredentialFileName": "service-account.json"
//!   }
//! }
//! ```
//!
//! Every field is optional, and an empty string means "use the built-in
//! default".

use crate::credentials::{gcs, s3};
use crate::prelude::*;

/// The `ConfigMap` data key which holds our JSON overlay.
pub const CREDENTIAL_CONFIG_KEY_NAME: &str = "credentials";

/// Credential overlay for all supported storage backends.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// S3-compatible storage.
    pub s3: S3Config,
    /// Google Cloud Storage.
    pub gcs: GcsConfig,
}

impl CredentialConfig {
    /// Parse an overlay from JSON. Malformed input is an error, and no part of
    /// the overlay is applied.
    pub fn from_json(json: &str) -> Result<CredentialConfig> {
        serde_json::from_str(json).context("unable to parse credential config JSON")
    }

    /// Load our overlay from a `ConfigMap`. If the map has no
    /// `CREDENTIAL_CONFIG_KEY_NAME` entry, we use the defaults.
    pub fn from_config_map(config_map: &ConfigMap) -> Result<CredentialConfig> {
        let blob = config_map
            .data
            .as_ref()
            .and_then(|data| data.get(CREDENTIAL_CONFIG_KEY_NAME));
        match blob {
            Some(json) => Self::from_json(json).with_context(|| {
                format!(
                    "invalid {:?} entry in config map {:?}",
                    CREDENTIAL_CONFIG_KEY_NAME,
                    config_map.metadata.name.as_deref().unwrap_or(""),
                )
            }),
            None => {
                debug!("no credential config found, using defaults");
                Ok(CredentialConfig::default())
            }
        }
    }
}

/// Overrides for S3 secrets.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct S3Config {
    /// The secret data key holding the access key ID. A secret containing
    /// this key is treated as an S3 secret.
    #[serde(rename = "s3AccessKeyIDName", skip_serializing_if = "String::is_empty")]
    pub access_key_id_name: String,

    /// The secret data key holding the secret access key.
    #[serde(
        rename = "s3SecretAccessKeyName",
        skip_serializing_if = "String::is_empty"
    )]
    pub secret_access_key_name: String,
}

impl S3Config {
    /// The access key ID data key to look for, after applying defaults.
    pub fn access_key_id_name(&self) -> &str {
        or_default(&self.access_key_id_name, s3::AWS_ACCESS_KEY_ID_NAME)
    }

    /// The secret access key data key to use, after applying defaults.
    pub fn secret_access_key_name(&self) -> &str {
        or_default(&self.secret_access_key_name, s3::AWS_SECRET_ACCESS_KEY_NAME)
    }
}

/// Overrides for Google Cloud Storage secrets.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct GcsConfig {
    /// The secret data key holding the credential file. A secret containing
    /// this key is treated as a GCS secret, and the key is also used as the
    /// file name once mounted.
    #[serde(
        rename = "gcsCredentialFileName",
        skip_serializing_if = "String::is_empty"
    )]
    pub credential_file_name: String,
}

impl GcsConfig {
    /// The credential file name to look for, after applying defaults.
    pub fn credential_file_name(&self) -> &str {
        or_default(&self.credential_file_name, gcs::GCS_CREDENTIAL_FILE_NAME)
    }
}

/// Empty strings mean "unset".
fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

#[test]
fn empty_overlay_uses_defaults() {
    let config = CredentialConfig::from_json("{}").unwrap();
    assert_eq!(config, CredentialConfig::default());
    assert_eq!(config.s3.access_key_id_name(), "awsAccessKeyID");
    assert_eq!(config.s3.secret_access_key_name(), "awsSecretAccessKey");
    assert_eq!(
        config.gcs.credential_file_name(),
        "gcloud-application-credentials.json"
    );
}

#[test]
fn overlay_overrides_key_names() {
    let json = r#"
{
  "s3": {
    "s3AccessKeyIDName": "custom-key",
    "s3SecretAccessKeyName": "custom-secret"
  },
  "gcs": {
    "gcsCredentialFileName": "sa.json"
  },
  "somethingElse": true
}"#;
    let config = CredentialConfig::from_json(json).unwrap();
    assert_eq!(config.s3.access_key_id_name(), "custom-key");
    assert_eq!(config.s3.secret_access_key_name(), "custom-secret");
    assert_eq!(config.gcs.credential_file_name(), "sa.json");
}

#[test]
fn empty_strings_fall_back_to_defaults() {
    let json = r#"{ "s3": { "s3AccessKeyIDName": "" }, "gcs": { "gcsCredentialFileName": "" } }"#;
    let config = CredentialConfig::from_json(json).unwrap();
    assert_eq!(config.s3.access_key_id_name(), s3::AWS_ACCESS_KEY_ID_NAME);
    assert_eq!(config.gcs.credential_file_name(), gcs::GCS_CREDENTIAL_FILE_NAME);
}

#[test]
fn malformed_overlay_is_an_error() {
    assert!(CredentialConfig::from_json("{ \"s3\": ").is_err());
    assert!(CredentialConfig::from_json(r#"{ "s3": "nope" }"#).is_err());
}

#[test]
fn config_map_without_credentials_key_uses_defaults() {
    let config_map = ConfigMap {
        data: Some(
            vec![("other".to_owned(), "{}".to_owned())]
                .into_iter()
                .collect(),
        ),
        ..ConfigMap::default()
    };
    assert_eq!(
        CredentialConfig::from_config_map(&config_map).unwrap(),
        CredentialConfig::default()
    );
    assert_eq!(
        CredentialConfig::from_config_map(&ConfigMap::default()).unwrap(),
        CredentialConfig::default()
    );
}

#[test]
fn config_map_with_malformed_credentials_is_an_error() {
    let config_map = ConfigMap {
        data: Some(
            vec![(CREDENTIAL_CONFIG_KEY_NAME.to_owned(), "not json".to_owned())]
                .into_iter()
                .collect(),
        ),
        ..ConfigMap::default()
    };
    assert!(CredentialConfig::from_config_map(&config_map).is_err());
}
