//! Tools for talking to Kubernetes.
//!
//! We shell out to `kubectl` rather than speaking the API directly, so we pick
//! up whatever cluster, context and credentials the user already has set up.

use serde::de::DeserializeOwned;
use std::process::{Command, Stdio};

use crate::prelude::*;

/// Run `kubectl`, capture output as JSON, and parse it using the
/// specified type. Empty output is returned as `None`, which is what
/// `kubectl get --ignore-not-found` prints for a missing object.
pub fn kubectl_parse_optional_json<T: DeserializeOwned>(args: &[&str]) -> Result<Option<T>> {
    let output = Command::new("kubectl")
        .args(args)
        // Pass `stderr` through on console instead of capturing.
        .stderr(Stdio::inherit())
        .output()
        .with_context(|| format!("error starting kubectl with {:?}", args))?;
    if !output.status.success() {
        return Err(format_err!("error running kubectl with {:?}", args));
    }
    parse_optional_json(&output.stdout)
        .with_context(|| format!("error parsing output of kubectl {:?}", args))
}

/// Parse JSON output, treating all-whitespace output as `None`.
fn parse_optional_json<T: DeserializeOwned>(output: &[u8]) -> Result<Option<T>> {
    if output.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(output)?))
}

/// Fetch a single namespaced object of type `kind`, or `None` if it does not
/// exist.
pub fn get_object<T: DeserializeOwned>(kind: &str, key: &NamespacedName) -> Result<Option<T>> {
    trace!("fetching {} {}", kind, key);
    kubectl_parse_optional_json(&[
        "get",
        kind,
        &key.name,
        "--namespace",
        &key.namespace,
        "--output",
        "json",
        "--ignore-not-found",
    ])
}

/// Fetch a `ConfigMap`, or `None` if it does not exist.
pub fn config_map(key: &NamespacedName) -> Result<Option<ConfigMap>> {
    get_object("configmap", key)
}

/// An `ObjectStore` backed by `kubectl` and the current kubeconfig context.
#[derive(Clone, Copy, Debug, Default)]
pub struct KubectlStore;

impl ObjectStore for KubectlStore {
    fn service_account(&self, key: &NamespacedName) -> Result<Option<ServiceAccount>> {
        get_object("serviceaccount", key)
    }

    fn secret(&self, key: &NamespacedName) -> Result<Option<Secret>> {
        get_object("secret", key)
    }
}

#[test]
fn empty_output_means_not_found() {
    let parsed: Option<Secret> = parse_optional_json(b"").unwrap();
    assert!(parsed.is_none());
    let parsed: Option<Secret> = parse_optional_json(b"\n  \n").unwrap();
    assert!(parsed.is_none());
}

#[test]
fn secret_data_is_base64_decoded() {
    let json = br#"
{
  "apiVersion": "v1",
  "kind": "Secret",
  "metadata": { "name": "s3cred", "namespace": "ns1" },
  "data": { "awsAccessKeyID": "QUtJQQ==" }
}"#;
    let secret: Secret = parse_optional_json(json).unwrap().expect("secret");
    assert_eq!(secret.metadata.name.as_deref(), Some("s3cred"));
    let data = secret.data.expect("data");
    assert_eq!(data["awsAccessKeyID"].0, b"AKIA".to_vec());
}

#[test]
fn service_account_secret_references_are_parsed() {
    let json = br#"
{
  "apiVersion": "v1",
  "kind": "ServiceAccount",
  "metadata": { "name": "default", "namespace": "ns1" },
  "secrets": [ { "name": "s3cred" }, { "name": "gcscred" } ]
}"#;
    let sa: ServiceAccount = parse_optional_json(json).unwrap().expect("service account");
    let names = sa
        .secrets
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| r.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["s3cred", "gcscred"]);
}

#[test]
fn malformed_output_is_an_error() {
    assert!(parse_optional_json::<Secret>(b"{ nope").is_err());
}
