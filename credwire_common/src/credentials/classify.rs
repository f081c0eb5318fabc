//! Deciding which storage backend a secret belongs to.

use k8s_openapi::ByteString;

use crate::config::CredentialConfig;
use crate::prelude::*;

/// The kind of credentials a secret holds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// S3-compatible credentials, injected as environment variables.
    S3,
    /// Google Cloud Storage credentials, mounted as a file.
    Gcs,
    /// Not a storage secret we know about.
    Unrecognized,
}

impl Classification {
    /// Classify a whole `Secret`. A secret without any data is
    /// `Unrecognized`.
    pub fn of_secret(secret: &Secret, config: &CredentialConfig) -> Classification {
        match &secret.data {
            Some(data) => classify(data, config),
            None => Classification::Unrecognized,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Classification::S3 => "s3",
            Classification::Gcs => "gcs",
            Classification::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

/// Classify secret data by which key names it contains.
///
/// The S3 access key ID name is checked before the GCS credential file name,
/// so a secret containing both is always `S3`.
pub fn classify(
    data: &BTreeMap<String, ByteString>,
    config: &CredentialConfig,
) -> Classification {
    if data.contains_key(config.s3.access_key_id_name()) {
        Classification::S3
    } else if data.contains_key(config.gcs.credential_file_name()) {
        Classification::Gcs
    } else {
        Classification::Unrecognized
    }
}

#[cfg(test)]
fn data(keys: &[&str]) -> BTreeMap<String, ByteString> {
    keys.iter()
        .map(|k| ((*k).to_owned(), ByteString(b"value".to_vec())))
        .collect()
}

#[test]
fn default_keys_classify() {
    let config = CredentialConfig::default();
    assert_eq!(
        classify(&data(&["awsAccessKeyID", "awsSecretAccessKey"]), &config),
        Classification::S3
    );
    assert_eq!(
        classify(&data(&["gcloud-application-credentials.json"]), &config),
        Classification::Gcs
    );
    assert_eq!(
        classify(&data(&["token", "ca.crt"]), &config),
        Classification::Unrecognized
    );
    assert_eq!(classify(&data(&[]), &config), Classification::Unrecognized);
}

#[test]
fn s3_key_wins_when_both_are_present() {
    let config = CredentialConfig::default();
    let both = data(&["gcloud-application-credentials.json", "awsAccessKeyID"]);
    assert_eq!(classify(&both, &config), Classification::S3);
}

#[test]
fn overridden_key_classifies_without_default_key() {
    let config = CredentialConfig::from_json(r#"{"s3": {"s3AccessKeyIDName": "custom-key"}}"#)
        .unwrap();
    assert_eq!(
        classify(&data(&["custom-key"]), &config),
        Classification::S3
    );
    // The default key no longer counts once overridden.
    assert_eq!(
        classify(&data(&["awsAccessKeyID"]), &config),
        Classification::Unrecognized
    );
}

#[test]
fn overridden_gcs_file_name_classifies() {
    let config =
        CredentialConfig::from_json(r#"{"gcs": {"gcsCredentialFileName": "sa.json"}}"#).unwrap();
    assert_eq!(classify(&data(&["sa.json"]), &config), Classification::Gcs);
}

#[test]
fn classification_is_repeatable() {
    let config = CredentialConfig::default();
    let secret_data = data(&["awsAccessKeyID", "gcloud-application-credentials.json"]);
    let first = classify(&secret_data, &config);
    let second = classify(&secret_data, &config);
    assert_eq!(first, second);
}

#[test]
fn secret_without_data_is_unrecognized() {
    assert_eq!(
        Classification::of_secret(&Secret::default(), &CredentialConfig::default()),
        Classification::Unrecognized
    );
}
