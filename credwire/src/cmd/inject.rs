//! The `inject` subcommand.

use credwire_common::{
    credentials::CredentialBuilder, k8s_openapi::api::core::v1::Pod, prelude::*,
};
use std::{
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};
use structopt::StructOpt;

use crate::service_account_identity;

/// Options for `inject`.
#[derive(Debug, StructOpt)]
pub struct Opt {
    /// The namespace to look in. Defaults to the pod's namespace, or
    /// `default`.
    #[structopt(long = "namespace", short = "n")]
    namespace: Option<String>,

    /// The service account to use. Defaults to the pod's
    /// `serviceAccountName`, or `default`.
    #[structopt(long = "service-account")]
    service_account: Option<String>,

    /// The container to inject into. Defaults to the first container.
    #[structopt(long = "container", short = "c")]
    container: Option<String>,

    /// Path to a pod manifest in YAML or JSON, or `-` for standard input.
    #[structopt(parse(from_os_str))]
    pod_manifest: PathBuf,
}

/// Run the `inject` subcommand.
pub fn run<S: ObjectStore>(opt: &Opt, builder: &CredentialBuilder<S>) -> Result<()> {
    let mut pod = read_pod(&opt.pod_manifest)?;
    inject_pod(opt, builder, &mut pod)?;
    let stdout = io::stdout();
    serde_yaml::to_writer(stdout.lock(), &pod).context("error writing pod manifest")?;
    Ok(())
}

/// Inject credentials into `pod` in place.
fn inject_pod<S: ObjectStore>(
    opt: &Opt,
    builder: &CredentialBuilder<S>,
    pod: &mut Pod,
) -> Result<()> {
    let namespace = opt
        .namespace
        .clone()
        .or_else(|| pod.metadata.namespace.clone())
        .unwrap_or_else(|| "default".to_owned());
    let pod_spec = pod
        .spec
        .as_mut()
        .ok_or_else(|| format_err!("pod manifest has no spec"))?;
    let identity = service_account_identity(
        &namespace,
        opt.service_account.as_deref(),
        pod_spec.service_account_name.as_deref(),
    );
    debug!(service_account = %identity, "injecting credentials");
    builder.inject_into_pod_spec(&identity, pod_spec, opt.container.as_deref())
}

/// Read a pod manifest from `path`, or from standard input if `path` is `-`.
fn read_pod(path: &Path) -> Result<Pod> {
    let mut manifest = String::new();
    if path.as_os_str() == "-" {
        io::stdin()
            .read_to_string(&mut manifest)
            .context("can't read pod manifest from standard input")?;
    } else {
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut manifest))
            .with_context(|| format!("can't read {}", path.display()))?;
    }
    // YAML is a superset of JSON, so this handles both.
    serde_yaml::from_str(&manifest).context("can't parse pod manifest")
}

#[test]
fn injects_into_pod_from_manifest() {
    use credwire_common::{
        config::CredentialConfig,
        k8s_openapi::{
            api::core::v1::ObjectReference, apimachinery::pkg::apis::meta::v1::ObjectMeta,
            ByteString,
        },
        store::MemoryStore,
    };

    let manifest = r#"
apiVersion: v1
kind: Pod
metadata:
  name: model
  namespace: ns1
spec:
  serviceAccountName: models
  containers:
    - name: predictor
      image: example/predictor
"#;
    let mut pod: Pod = serde_yaml::from_str(manifest).unwrap();

    let mut store = MemoryStore::new();
    store
        .insert_service_account(ServiceAccount {
            metadata: ObjectMeta {
                name: Some("models".to_owned()),
                namespace: Some("ns1".to_owned()),
                ..ObjectMeta::default()
            },
            secrets: Some(vec![ObjectReference {
                name: Some("s3cred".to_owned()),
                ..ObjectReference::default()
            }]),
            ..ServiceAccount::default()
        })
        .unwrap();
    store
        .insert_secret(Secret {
            metadata: ObjectMeta {
                name: Some("s3cred".to_owned()),
                namespace: Some("ns1".to_owned()),
                ..ObjectMeta::default()
            },
            data: Some(
                vec![("awsAccessKeyID".to_owned(), ByteString(b"AKIA".to_vec()))]
                    .into_iter()
                    .collect(),
            ),
            ..Secret::default()
        })
        .unwrap();
    let builder = CredentialBuilder::with_config(store, CredentialConfig::default());

    let opt = Opt {
        namespace: None,
        service_account: None,
        container: None,
        pod_manifest: PathBuf::from("-"),
    };
    inject_pod(&opt, &builder, &mut pod).unwrap();

    let container = &pod.spec.as_ref().unwrap().containers[0];
    let names = container
        .env
        .iter()
        .flatten()
        .map(|env| env.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"]);

    let rendered = serde_yaml::to_string(&pod).unwrap();
    assert!(rendered.contains("secretKeyRef"), "{}", rendered);
}
