//! Support for S3-compatible storage credentials.
//!
//! S3 credentials are passed to the workload as environment variables which
//! reference the secret directly, so the values never pass through us.

use k8s_openapi::api::core::v1::{EnvVarSource, SecretKeySelector};

use crate::config::S3Config;
use crate::prelude::*;

/// Default secret data key for the access key ID. Its presence marks a secret
/// as an S3 secret.
pub const AWS_ACCESS_KEY_ID_NAME: &str = "awsAccessKeyID";
/// Default secret data key for the secret access key.
pub const AWS_SECRET_ACCESS_KEY_NAME: &str = "awsSecretAccessKey";

/// Environment variable holding the access key ID.
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable holding the secret access key.
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// Environment variable holding the full endpoint URL.
pub const AWS_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";
/// Environment variable holding the region.
pub const AWS_REGION: &str = "AWS_REGION";
/// Environment variable holding the bare endpoint host.
pub const S3_ENDPOINT: &str = "S3_ENDPOINT";
/// Environment variable controlling HTTPS use.
pub const S3_USE_HTTPS: &str = "S3_USE_HTTPS";
/// Environment variable controlling certificate verification.
pub const S3_VERIFY_SSL: &str = "S3_VERIFY_SSL";

/// Secret annotation naming a custom S3 endpoint (host, no scheme).
pub const S3_SECRET_ENDPOINT_ANNOTATION: &str = "serving.kubeflow.org/s3-endpoint";
/// Secret annotation naming the S3 region.
pub const S3_SECRET_REGION_ANNOTATION: &str = "serving.kubeflow.org/s3-region";
/// Secret annotation controlling certificate verification.
pub const S3_SECRET_SSL_ANNOTATION: &str = "serving.kubeflow.org/s3-verifyssl";
/// Secret annotation controlling HTTPS use. `"0"` means plain HTTP.
pub const S3_SECRET_HTTPS_ANNOTATION: &str = "serving.kubeflow.org/s3-usehttps";

/// Build the environment variables needed to use the S3 credentials in
/// `secret`.
///
/// The two credential variables come first, followed by any variables
/// derived from the secret's endpoint annotations.
pub fn build_secret_envs(secret: &Secret, config: &S3Config) -> Vec<EnvVar> {
    let secret_name = secret.metadata.name.clone().unwrap_or_default();
    let mut envs = vec![
        secret_key_env(
            AWS_ACCESS_KEY_ID,
            &secret_name,
            config.access_key_id_name(),
        ),
        secret_key_env(
            AWS_SECRET_ACCESS_KEY,
            &secret_name,
            config.secret_access_key_name(),
        ),
    ];

    let annotations = match &secret.metadata.annotations {
        Some(annotations) => annotations,
        None => return envs,
    };

    if let Some(endpoint) = annotations.get(S3_SECRET_ENDPOINT_ANNOTATION) {
        let mut scheme = "https";
        if let Some(use_https) = annotations.get(S3_SECRET_HTTPS_ANNOTATION) {
            if use_https == "0" {
                scheme = "http";
            }
            envs.push(literal_env(S3_USE_HTTPS, use_https));
        }
        envs.push(literal_env(S3_ENDPOINT, endpoint));
        envs.push(literal_env(
            AWS_ENDPOINT_URL,
            &format!("{}://{}", scheme, endpoint),
        ));
    }
    if let Some(region) = annotations.get(S3_SECRET_REGION_ANNOTATION) {
        envs.push(literal_env(AWS_REGION, region));
    }
    if let Some(verify_ssl) = annotations.get(S3_SECRET_SSL_ANNOTATION) {
        envs.push(literal_env(S3_VERIFY_SSL, verify_ssl));
    }
    envs
}

/// An environment variable read from `key` in the secret `secret_name`.
fn secret_key_env(env_name: &str, secret_name: &str, key: &str) -> EnvVar {
    EnvVar {
        name: env_name.to_owned(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: Some(secret_name.to_owned()),
                key: key.to_owned(),
                optional: None,
            }),
            ..EnvVarSource::default()
        }),
    }
}

/// An environment variable with a fixed value.
fn literal_env(env_name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: env_name.to_owned(),
        value: Some(value.to_owned()),
        value_from: None,
    }
}

#[cfg(test)]
fn secret_ref(env: &EnvVar) -> Option<(&str, &str)> {
    let selector = env.value_from.as_ref()?.secret_key_ref.as_ref()?;
    Some((selector.name.as_deref()?, selector.key.as_str()))
}

#[test]
fn credential_envs_reference_the_secret() {
    use crate::store::fixtures;

    let secret = fixtures::secret("ns1", "s3cred", &[("awsAccessKeyID", "AKIA")]);
    let envs = build_secret_envs(&secret, &S3Config::default());
    assert_eq!(envs.len(), 2);
    assert_eq!(envs[0].name, AWS_ACCESS_KEY_ID);
    assert_eq!(secret_ref(&envs[0]), Some(("s3cred", "awsAccessKeyID")));
    assert_eq!(envs[1].name, AWS_SECRET_ACCESS_KEY);
    assert_eq!(secret_ref(&envs[1]), Some(("s3cred", "awsSecretAccessKey")));
}

#[test]
fn credential_envs_use_overridden_key_names() {
    use crate::store::fixtures;

    let secret = fixtures::secret("ns1", "s3cred", &[("custom-key", "AKIA")]);
    let config = S3Config {
        access_key_id_name: "custom-key".to_owned(),
        secret_access_key_name: "custom-secret".to_owned(),
    };
    let envs = build_secret_envs(&secret, &config);
    assert_eq!(secret_ref(&envs[0]), Some(("s3cred", "custom-key")));
    assert_eq!(secret_ref(&envs[1]), Some(("s3cred", "custom-secret")));
}

#[test]
fn endpoint_annotations_add_envs_in_order() {
    use crate::store::fixtures;

    let secret = fixtures::annotate(
        fixtures::secret("ns1", "s3cred", &[("awsAccessKeyID", "AKIA")]),
        &[
            (S3_SECRET_ENDPOINT_ANNOTATION, "minio.local:9000"),
            (S3_SECRET_HTTPS_ANNOTATION, "0"),
            (S3_SECRET_REGION_ANNOTATION, "us-west-2"),
            (S3_SECRET_SSL_ANNOTATION, "0"),
        ],
    );
    let envs = build_secret_envs(&secret, &S3Config::default());
    let literals = envs[2..]
        .iter()
        .map(|env| (env.name.as_str(), env.value.as_deref().unwrap_or("")))
        .collect::<Vec<_>>();
    assert_eq!(
        literals,
        vec![
            (S3_USE_HTTPS, "0"),
            (S3_ENDPOINT, "minio.local:9000"),
            (AWS_ENDPOINT_URL, "http://minio.local:9000"),
            (AWS_REGION, "us-west-2"),
            (S3_VERIFY_SSL, "0"),
        ]
    );
}

#[test]
fn endpoint_defaults_to_https() {
    use crate::store::fixtures;

    let secret = fixtures::annotate(
        fixtures::secret("ns1", "s3cred", &[("awsAccessKeyID", "AKIA")]),
        &[(S3_SECRET_ENDPOINT_ANNOTATION, "s3.example.com")],
    );
    let envs = build_secret_envs(&secret, &S3Config::default());
    assert_eq!(envs.len(), 4);
    assert_eq!(envs[3].name, AWS_ENDPOINT_URL);
    assert_eq!(envs[3].value.as_deref(), Some("https://s3.example.com"));
}

#[test]
fn use_https_without_endpoint_is_ignored() {
    use crate::store::fixtures;

    let secret = fixtures::annotate(
        fixtures::secret("ns1", "s3cred", &[("awsAccessKeyID", "AKIA")]),
        &[(S3_SECRET_HTTPS_ANNOTATION, "0")],
    );
    assert_eq!(build_secret_envs(&secret, &S3Config::default()).len(), 2);
}
