//! Support for Google Cloud Storage credentials.
//!
//! GCS credentials are a JSON key file. We mount the whole secret as a
//! directory and point `GOOGLE_APPLICATION_CREDENTIALS` at the file inside it.

use k8s_openapi::api::core::v1::SecretVolumeSource;

use crate::config::GcsConfig;
use crate::prelude::*;

/// Default secret data key (and mounted file name) for the credential file.
/// Its presence marks a secret as a GCS secret.
pub const GCS_CREDENTIAL_FILE_NAME: &str = "gcloud-application-credentials.json";
/// Where we mount GCS credential secrets. Includes the trailing slash.
pub const GCS_CREDENTIAL_VOLUME_MOUNT_PATH: &str = "/var/secrets/";
/// Environment variable pointing at the credential file.
pub const GCS_CREDENTIAL_ENV_KEY: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Build a volume sourced from `secret`, and a read-only mount of that volume
/// at `GCS_CREDENTIAL_VOLUME_MOUNT_PATH`. The volume is named after the
/// secret.
pub fn build_secret_volume(secret: &Secret) -> (Volume, VolumeMount) {
    let secret_name = secret.metadata.name.clone().unwrap_or_default();
    let volume = Volume {
        name: secret_name.clone(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name.clone()),
            ..SecretVolumeSource::default()
        }),
        ..Volume::default()
    };
    let volume_mount = VolumeMount {
        name: secret_name,
        mount_path: GCS_CREDENTIAL_VOLUME_MOUNT_PATH.to_owned(),
        read_only: Some(true),
        ..VolumeMount::default()
    };
    (volume, volume_mount)
}

/// Build the environment variable which tells Google client libraries where
/// to find the mounted credential file.
pub fn build_credential_env(config: &GcsConfig) -> EnvVar {
    EnvVar {
        name: GCS_CREDENTIAL_ENV_KEY.to_owned(),
        value: Some(format!(
            "{}{}",
            GCS_CREDENTIAL_VOLUME_MOUNT_PATH,
            config.credential_file_name(),
        )),
        value_from: None,
    }
}

#[test]
fn volume_and_mount_are_named_after_the_secret() {
    use crate::store::fixtures;

    let secret = fixtures::secret("ns1", "gcscred", &[(GCS_CREDENTIAL_FILE_NAME, "{}")]);
    let (volume, mount) = build_secret_volume(&secret);
    assert_eq!(volume.name, "gcscred");
    assert_eq!(
        volume.secret.and_then(|s| s.secret_name).as_deref(),
        Some("gcscred")
    );
    assert_eq!(mount.name, "gcscred");
    assert_eq!(mount.mount_path, "/var/secrets/");
    assert_eq!(mount.read_only, Some(true));
}

#[test]
fn credential_env_points_at_mounted_file() {
    let env = build_credential_env(&GcsConfig::default());
    assert_eq!(env.name, "GOOGLE_APPLICATION_CREDENTIALS");
    assert_eq!(
        env.value.as_deref(),
        Some("/var/secrets/gcloud-application-credentials.json")
    );

    let config = GcsConfig {
        credential_file_name: "sa.json".to_owned(),
    };
    assert_eq!(
        build_credential_env(&config).value.as_deref(),
        Some("/var/secrets/sa.json")
    );
}
