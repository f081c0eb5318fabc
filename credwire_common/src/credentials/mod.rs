//! Injecting storage credentials from a `ServiceAccount`'s secrets into a
//! container.
//!
//! For each secret attached to the service account, we decide whether it
//! holds S3 or GCS credentials (see [`classify`]) and then either add
//! environment variables (S3) or mount the secret as a volume (GCS).
//!
//! ## Failure policy
//!
//! Injection is fail-open. A missing service account, a secret we can't
//! fetch, or a secret we don't recognize is logged and skipped, and the
//! caller still gets `Ok(())`. The only visible symptom is that the expected
//! variables or volumes are absent. Only a malformed credential config is a
//! hard error, and that is reported when the builder is constructed.
//!
//! ## Duplicate secrets
//!
//! We don't deduplicate. If a service account has two GCS secrets, the
//! container gets two volumes, two mounts at `/var/secrets/` and two
//! `GOOGLE_APPLICATION_CREDENTIALS` variables, which Kubernetes will reject
//! or resolve in favor of the last one. Existing deployments may depend on
//! this, so it stays until someone decides otherwise.

use tracing::{debug_span, Dispatch};

use crate::config::CredentialConfig;
use crate::prelude::*;

mod classify;
pub mod gcs;
pub mod s3;

pub use self::classify::{classify, Classification};

/// The service account we use when none is specified.
pub const DEFAULT_SERVICE_ACCOUNT_NAME: &str = "default";

/// The service account whose secrets we should inject.
///
/// An empty name always means `DEFAULT_SERVICE_ACCOUNT_NAME`, however the
/// identity was built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceAccountIdentity {
    /// The namespace of the service account, and of its secrets.
    namespace: String,
    /// The name of the service account, possibly empty.
    name: String,
}

impl ServiceAccountIdentity {
    /// Identify a service account.
    pub fn new<N, M>(namespace: N, name: M) -> Self
    where
        N: Into<String>,
        M: Into<String>,
    {
        ServiceAccountIdentity {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The namespace of the service account.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The name of the service account, after applying the default.
    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_SERVICE_ACCOUNT_NAME
        } else {
            &self.name
        }
    }

    /// The key used to look up this service account.
    pub fn key(&self) -> NamespacedName {
        NamespacedName::new(self.namespace(), self.name())
    }

    /// The key used to look up one of this service account's secrets.
    fn secret_key(&self, secret_name: &str) -> NamespacedName {
        NamespacedName::new(self.namespace(), secret_name)
    }
}

impl fmt::Display for ServiceAccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace(), self.name())
    }
}

/// What we learned about one secret referenced by a service account.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SecretReport {
    /// The name of the secret.
    pub name: String,
    /// How we classified the secret, or `None` if we couldn't fetch it.
    pub classification: Option<Classification>,
}

/// Injects credentials from service account secrets into containers.
pub struct CredentialBuilder<S> {
    /// Where we look up service accounts and secrets.
    store: S,
    /// Our key name overrides.
    config: CredentialConfig,
    /// If present, our log events go here instead of the global subscriber.
    dispatch: Option<Dispatch>,
}

impl<S: ObjectStore> CredentialBuilder<S> {
    /// Create a builder, reading our overlay from `config_map`. Fails if the
    /// overlay is malformed.
    pub fn new(store: S, config_map: &ConfigMap) -> Result<Self> {
        let config = CredentialConfig::from_config_map(config_map)?;
        Ok(Self::with_config(store, config))
    }

    /// Create a builder using an already-parsed overlay.
    pub fn with_config(store: S, config: CredentialConfig) -> Self {
        CredentialBuilder {
            store,
            config,
            dispatch: None,
        }
    }

    /// Send our log events to `dispatch`.
    pub fn with_log_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Our credential overlay.
    pub fn config(&self) -> &CredentialConfig {
        &self.config
    }

    /// Add environment variables, volume mounts and volumes for every storage
    /// secret attached to the service account `identity`.
    ///
    /// Secrets are processed in the order the service account lists them,
    /// and everything is appended in that order. Nothing already present in
    /// `container` or `volumes` is changed or removed. Lookup failures are
    /// logged and skipped; see the module docs.
    pub fn create_secret_volume_and_env(
        &self,
        identity: &ServiceAccountIdentity,
        container: &mut Container,
        volumes: &mut Vec<Volume>,
    ) -> Result<()> {
        self.with_logging(|| {
            let span = debug_span!("inject_credentials", service_account = %identity);
            let _enter = span.enter();

            let service_account = match self.find_service_account(identity) {
                Some(service_account) => service_account,
                None => return Ok(()),
            };
            for key in secret_keys(identity, &service_account) {
                let secret = match self.find_secret(&key) {
                    Some(secret) => secret,
                    None => continue,
                };
                let classification = Classification::of_secret(&secret, &self.config);
                apply(classification, &secret, &self.config, container, volumes);
            }
            Ok(())
        })
    }

    /// Like `create_secret_volume_and_env`, but for a whole pod. We inject
    /// into the container named `container_name`, or the first container if
    /// `None`.
    pub fn inject_into_pod_spec(
        &self,
        identity: &ServiceAccountIdentity,
        pod_spec: &mut PodSpec,
        container_name: Option<&str>,
    ) -> Result<()> {
        let PodSpec {
            containers,
            volumes,
            ..
        } = pod_spec;
        let container = match container_name {
            Some(name) => containers
                .iter_mut()
                .find(|c| c.name == name)
                .ok_or_else(|| format_err!("pod has no container named {:?}", name))?,
            None => containers
                .first_mut()
                .ok_or_else(|| format_err!("pod has no containers"))?,
        };
        // Leave an absent volume list absent unless we actually add to it.
        let had_volumes = volumes.is_some();
        let mut pod_volumes = volumes.take().unwrap_or_default();
        let result = self.create_secret_volume_and_env(identity, container, &mut pod_volumes);
        if had_volumes || !pod_volumes.is_empty() {
            *volumes = Some(pod_volumes);
        }
        result
    }

    /// Classify every secret attached to `identity` without changing
    /// anything. Returns `None` if the service account can't be found.
    pub fn classify_service_account(
        &self,
        identity: &ServiceAccountIdentity,
    ) -> Option<Vec<SecretReport>> {
        self.with_logging(|| {
            let service_account = self.find_service_account(identity)?;
            let reports = secret_keys(identity, &service_account)
                .map(|key| {
                    let classification = self
                        .find_secret(&key)
                        .map(|secret| Classification::of_secret(&secret, &self.config));
                    SecretReport {
                        name: key.name,
                        classification,
                    }
                })
                .collect();
            Some(reports)
        })
    }

    /// Look up a service account, logging any failure.
    fn find_service_account(
        &self,
        identity: &ServiceAccountIdentity,
    ) -> Option<ServiceAccount> {
        match self.store.service_account(&identity.key()) {
            Ok(Some(service_account)) => Some(service_account),
            Ok(None) => {
                error!(service_account = %identity, "failed to find service account");
                None
            }
            Err(err) => {
                error!(
                    service_account = %identity,
                    "failed to find service account: {:#}",
                    err
                );
                None
            }
        }
    }

    /// Look up a secret, logging any failure.
    fn find_secret(&self, key: &NamespacedName) -> Option<Secret> {
        match self.store.secret(key) {
            Ok(Some(secret)) => Some(secret),
            Ok(None) => {
                error!(secret = %key, "failed to find secret");
                None
            }
            Err(err) => {
                error!(secret = %key, "failed to find secret: {:#}", err);
                None
            }
        }
    }

    /// Run `f` with our log dispatch, if we have one.
    fn with_logging<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

/// The lookup keys for every named secret `service_account` references, in
/// order. Secrets always live in the service account's namespace.
fn secret_keys<'a>(
    identity: &'a ServiceAccountIdentity,
    service_account: &'a ServiceAccount,
) -> impl Iterator<Item = NamespacedName> + 'a {
    service_account
        .secrets
        .iter()
        .flatten()
        .filter_map(move |reference| match reference.name.as_deref() {
            Some(name) if !name.is_empty() => Some(identity.secret_key(name)),
            _ => {
                debug!("skipping secret reference without a name");
                None
            }
        })
}

/// Apply the mutation for one classified secret. This only ever appends to
/// `container` and `volumes`.
pub fn apply(
    classification: Classification,
    secret: &Secret,
    config: &CredentialConfig,
    container: &mut Container,
    volumes: &mut Vec<Volume>,
) {
    let secret_name = secret.metadata.name.as_deref().unwrap_or("");
    match classification {
        Classification::S3 => {
            info!(secret = secret_name, "setting secret envs for s3");
            let envs = s3::build_secret_envs(secret, &config.s3);
            container.env.get_or_insert_with(Vec::new).extend(envs);
        }
        Classification::Gcs => {
            info!(secret = secret_name, "setting secret volume for gcs");
            let (volume, volume_mount) = gcs::build_secret_volume(secret);
            volumes.push(volume);
            container
                .volume_mounts
                .get_or_insert_with(Vec::new)
                .push(volume_mount);
            container
                .env
                .get_or_insert_with(Vec::new)
                .push(gcs::build_credential_env(&config.gcs));
        }
        Classification::Unrecognized => {
            trace!(secret = secret_name, "skipping non gcs/s3 secret");
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::store::{fixtures, MemoryStore};

    /// Log output captured from a `CredentialBuilder`.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn dispatch(&self) -> Dispatch {
            let buffer = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || buffer.clone())
                .with_max_level(tracing::Level::TRACE)
                .with_ansi(false)
                .finish();
            Dispatch::new(subscriber)
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// A store which fails to fetch some objects.
    struct FlakyStore {
        inner: MemoryStore,
        broken_secrets: Vec<&'static str>,
        broken_service_account: bool,
    }

    impl ObjectStore for FlakyStore {
        fn service_account(&self, key: &NamespacedName) -> Result<Option<ServiceAccount>> {
            if self.broken_service_account {
                Err(format_err!("api server unavailable while fetching {}", key))
            } else {
                self.inner.service_account(key)
            }
        }

        fn secret(&self, key: &NamespacedName) -> Result<Option<Secret>> {
            if self.broken_secrets.iter().any(|name| *name == key.name) {
                Err(format_err!("connection reset while fetching {}", key))
            } else {
                self.inner.secret(key)
            }
        }
    }

    fn store(service_account: ServiceAccount, secrets: Vec<Secret>) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_service_account(service_account).unwrap();
        for secret in secrets {
            store.insert_secret(secret).unwrap();
        }
        store
    }

    fn s3_secret(name: &str) -> Secret {
        fixtures::secret(
            "ns1",
            name,
            &[("awsAccessKeyID", "AKIA"), ("awsSecretAccessKey", "shh")],
        )
    }

    fn gcs_secret(name: &str) -> Secret {
        fixtures::secret("ns1", name, &[(gcs::GCS_CREDENTIAL_FILE_NAME, "{}")])
    }

    fn env_names(container: &Container) -> Vec<&str> {
        container
            .env
            .iter()
            .flatten()
            .map(|env| env.name.as_str())
            .collect()
    }

    #[test]
    fn injects_s3_envs_for_default_service_account() {
        let store = store(
            fixtures::service_account("ns1", "default", &["s3cred"]),
            vec![s3_secret("s3cred")],
        );
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", ""),
                &mut container,
                &mut volumes,
            )
            .unwrap();

        assert_eq!(
            env_names(&container),
            vec![s3::AWS_ACCESS_KEY_ID, s3::AWS_SECRET_ACCESS_KEY]
        );
        let selector = container.env.as_ref().unwrap()[0]
            .value_from
            .as_ref()
            .and_then(|source| source.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(selector.name.as_deref(), Some("s3cred"));
        assert_eq!(selector.key, "awsAccessKeyID");
        assert!(volumes.is_empty());
        assert!(container.volume_mounts.is_none());
    }

    #[test]
    fn injects_gcs_volume_mount_and_env() {
        let store = store(
            fixtures::service_account("ns1", "sa", &["gcscred"]),
            vec![gcs_secret("gcscred")],
        );
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "sa"),
                &mut container,
                &mut volumes,
            )
            .unwrap();

        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].name, "gcscred");
        let mounts = container.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].name, "gcscred");
        assert_eq!(mounts[0].mount_path, gcs::GCS_CREDENTIAL_VOLUME_MOUNT_PATH);
        let env = container.env.as_ref().unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].name, gcs::GCS_CREDENTIAL_ENV_KEY);
        assert_eq!(
            env[0].value.as_deref(),
            Some("/var/secrets/gcloud-application-credentials.json")
        );
    }

    #[test]
    fn mutations_follow_secret_order() {
        let store = store(
            fixtures::service_account("ns1", "sa", &["x", "y", "z"]),
            vec![
                s3_secret("x"),
                fixtures::secret("ns1", "y", &[("token", "abc")]),
                gcs_secret("z"),
            ],
        );
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "sa"),
                &mut container,
                &mut volumes,
            )
            .unwrap();

        assert_eq!(
            env_names(&container),
            vec![
                s3::AWS_ACCESS_KEY_ID,
                s3::AWS_SECRET_ACCESS_KEY,
                gcs::GCS_CREDENTIAL_ENV_KEY,
            ]
        );
        assert_eq!(
            volumes.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            vec!["z"]
        );
    }

    #[test]
    fn missing_service_account_is_not_an_error() {
        let store = store(fixtures::service_account("ns1", "sa", &["x"]), vec![s3_secret("x")]);
        let logs = LogBuffer::default();
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default())
            .with_log_dispatch(logs.dispatch());

        let original = Container {
            name: "predictor".to_owned(),
            env: Some(vec![EnvVar {
                name: "EXISTING".to_owned(),
                value: Some("1".to_owned()),
                value_from: None,
            }]),
            ..Container::default()
        };
        let mut container = original.clone();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "nope"),
                &mut container,
                &mut volumes,
            )
            .unwrap();

        assert_eq!(container, original);
        assert!(volumes.is_empty());
        let logs = logs.contents();
        assert!(logs.contains("failed to find service account"), "{}", logs);
        assert!(logs.contains("ns1/nope"), "{}", logs);
    }

    #[test]
    fn failed_secret_fetch_does_not_block_others() {
        let store = FlakyStore {
            inner: store(
                fixtures::service_account("ns1", "sa", &["x", "y", "z"]),
                vec![s3_secret("x"), s3_secret("y"), gcs_secret("z")],
            ),
            broken_secrets: vec!["y"],
            broken_service_account: false,
        };
        let logs = LogBuffer::default();
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default())
            .with_log_dispatch(logs.dispatch());

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "sa"),
                &mut container,
                &mut volumes,
            )
            .unwrap();

        assert_eq!(
            env_names(&container),
            vec![
                s3::AWS_ACCESS_KEY_ID,
                s3::AWS_SECRET_ACCESS_KEY,
                gcs::GCS_CREDENTIAL_ENV_KEY,
            ]
        );
        assert_eq!(volumes.len(), 1);
        let logs = logs.contents();
        assert!(logs.contains("failed to find secret"), "{}", logs);
        assert!(logs.contains("connection reset"), "{}", logs);
    }

    #[test]
    fn missing_secret_is_skipped() {
        let store = store(
            fixtures::service_account("ns1", "sa", &["gone", "z"]),
            vec![gcs_secret("z")],
        );
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "sa"),
                &mut container,
                &mut volumes,
            )
            .unwrap();
        assert_eq!(env_names(&container), vec![gcs::GCS_CREDENTIAL_ENV_KEY]);
    }

    #[test]
    fn existing_entries_are_preserved() {
        let store = store(
            fixtures::service_account("ns1", "sa", &["z"]),
            vec![gcs_secret("z")],
        );
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());

        let mut container = Container {
            env: Some(vec![EnvVar {
                name: "EXISTING".to_owned(),
                value: Some("1".to_owned()),
                value_from: None,
            }]),
            volume_mounts: Some(vec![VolumeMount {
                name: "data".to_owned(),
                mount_path: "/data".to_owned(),
                ..VolumeMount::default()
            }]),
            ..Container::default()
        };
        let mut volumes = vec![Volume {
            name: "data".to_owned(),
            ..Volume::default()
        }];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "sa"),
                &mut container,
                &mut volumes,
            )
            .unwrap();

        assert_eq!(
            env_names(&container),
            vec!["EXISTING", gcs::GCS_CREDENTIAL_ENV_KEY]
        );
        let mounts = container.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts[0].name, "data");
        assert_eq!(mounts[1].name, "z");
        assert_eq!(volumes[0].name, "data");
        assert_eq!(volumes[1].name, "z");
    }

    #[test]
    fn duplicate_gcs_secrets_are_not_deduplicated() {
        let store = store(
            fixtures::service_account("ns1", "sa", &["gcs-a", "gcs-b"]),
            vec![gcs_secret("gcs-a"), gcs_secret("gcs-b")],
        );
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "sa"),
                &mut container,
                &mut volumes,
            )
            .unwrap();

        // Both secrets are mounted at the same path.
        assert_eq!(volumes.len(), 2);
        let mounts = container.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 2);
        assert!(mounts
            .iter()
            .all(|m| m.mount_path == gcs::GCS_CREDENTIAL_VOLUME_MOUNT_PATH));
        assert_eq!(
            env_names(&container),
            vec![gcs::GCS_CREDENTIAL_ENV_KEY, gcs::GCS_CREDENTIAL_ENV_KEY]
        );
    }

    #[test]
    fn unrecognized_secret_changes_nothing() {
        let secret = fixtures::secret("ns1", "y", &[("token", "abc")]);
        let config = CredentialConfig::default();
        let classification = Classification::of_secret(&secret, &config);
        assert_eq!(classification, Classification::Unrecognized);

        let mut container = Container::default();
        let mut volumes = vec![];
        apply(classification, &secret, &config, &mut container, &mut volumes);
        assert_eq!(container, Container::default());
        assert!(volumes.is_empty());
    }

    #[test]
    fn overridden_key_is_used_for_injection() {
        let store = store(
            fixtures::service_account("ns1", "sa", &["custom"]),
            vec![fixtures::secret("ns1", "custom", &[("custom-key", "AKIA")])],
        );
        let config =
            CredentialConfig::from_json(r#"{"s3": {"s3AccessKeyIDName": "custom-key"}}"#)
                .unwrap();
        let builder = CredentialBuilder::with_config(store, config);

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "sa"),
                &mut container,
                &mut volumes,
            )
            .unwrap();
        assert_eq!(
            env_names(&container),
            vec![s3::AWS_ACCESS_KEY_ID, s3::AWS_SECRET_ACCESS_KEY]
        );
    }

    #[test]
    fn malformed_config_map_fails_construction() {
        let config_map = ConfigMap {
            data: Some(
                vec![(
                    crate::config::CREDENTIAL_CONFIG_KEY_NAME.to_owned(),
                    "{ broken".to_owned(),
                )]
                .into_iter()
                .collect(),
            ),
            ..ConfigMap::default()
        };
        assert!(CredentialBuilder::new(MemoryStore::new(), &config_map).is_err());
    }

    #[test]
    fn injects_into_named_pod_container() {
        let store = store(
            fixtures::service_account("ns1", "sa", &["z"]),
            vec![gcs_secret("z")],
        );
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());

        let mut pod_spec = PodSpec {
            containers: vec![
                Container {
                    name: "sidecar".to_owned(),
                    ..Container::default()
                },
                Container {
                    name: "predictor".to_owned(),
                    ..Container::default()
                },
            ],
            ..PodSpec::default()
        };
        let identity = ServiceAccountIdentity::new("ns1", "sa");
        builder
            .inject_into_pod_spec(&identity, &mut pod_spec, Some("predictor"))
            .unwrap();

        assert!(pod_spec.containers[0].env.is_none());
        assert_eq!(
            env_names(&pod_spec.containers[1]),
            vec![gcs::GCS_CREDENTIAL_ENV_KEY]
        );
        assert_eq!(pod_spec.volumes.as_ref().map(Vec::len), Some(1));

        assert!(builder
            .inject_into_pod_spec(&identity, &mut pod_spec, Some("missing"))
            .is_err());
        assert!(builder
            .inject_into_pod_spec(&identity, &mut PodSpec::default(), None)
            .is_err());
    }

    #[test]
    fn reports_classification_per_secret() {
        let store = FlakyStore {
            inner: store(
                fixtures::service_account("ns1", "sa", &["x", "y", "z", "w"]),
                vec![
                    s3_secret("x"),
                    fixtures::secret("ns1", "y", &[("token", "abc")]),
                    gcs_secret("z"),
                    s3_secret("w"),
                ],
            ),
            broken_secrets: vec!["w"],
            broken_service_account: false,
        };
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());

        let reports = builder
            .classify_service_account(&ServiceAccountIdentity::new("ns1", "sa"))
            .unwrap();
        let summary = reports
            .iter()
            .map(|r| (r.name.as_str(), r.classification))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                ("x", Some(Classification::S3)),
                ("y", Some(Classification::Unrecognized)),
                ("z", Some(Classification::Gcs)),
                ("w", None),
            ]
        );
        assert!(builder
            .classify_service_account(&ServiceAccountIdentity::new("ns1", "nope"))
            .is_none());
    }

    #[test]
    fn empty_service_account_name_means_default() {
        let identity = ServiceAccountIdentity::new("ns1", "");
        assert_eq!(identity.name(), DEFAULT_SERVICE_ACCOUNT_NAME);
        assert_eq!(identity.key(), NamespacedName::new("ns1", "default"));
        assert_eq!(identity.to_string(), "ns1/default");
    }

    #[test]
    fn literal_identity_with_empty_name_uses_default_account() {
        let store = store(
            fixtures::service_account("ns1", "default", &["s3cred"]),
            vec![s3_secret("s3cred")],
        );
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());
        let identity = ServiceAccountIdentity {
            namespace: "ns1".to_owned(),
            name: String::new(),
        };

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(&identity, &mut container, &mut volumes)
            .unwrap();
        assert_eq!(
            env_names(&container),
            vec![s3::AWS_ACCESS_KEY_ID, s3::AWS_SECRET_ACCESS_KEY]
        );
    }

    #[test]
    fn pod_spec_is_untouched_when_service_account_is_missing() {
        let builder = CredentialBuilder::with_config(MemoryStore::new(), CredentialConfig::default());
        let original = PodSpec {
            containers: vec![Container {
                name: "predictor".to_owned(),
                ..Container::default()
            }],
            ..PodSpec::default()
        };
        let mut pod_spec = original.clone();
        builder
            .inject_into_pod_spec(&ServiceAccountIdentity::new("ns1", "nope"), &mut pod_spec, None)
            .unwrap();
        assert_eq!(pod_spec, original);
        assert!(pod_spec.volumes.is_none());
    }

    #[test]
    fn pod_spec_keeps_empty_volume_list() {
        let store = store(
            fixtures::service_account("ns1", "sa", &["x"]),
            vec![s3_secret("x")],
        );
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default());
        let mut pod_spec = PodSpec {
            containers: vec![Container::default()],
            volumes: Some(vec![]),
            ..PodSpec::default()
        };
        builder
            .inject_into_pod_spec(&ServiceAccountIdentity::new("ns1", "sa"), &mut pod_spec, None)
            .unwrap();
        assert_eq!(pod_spec.volumes, Some(vec![]));
    }

    #[test]
    fn service_account_lookup_failure_is_not_an_error() {
        let store = FlakyStore {
            inner: store(fixtures::service_account("ns1", "sa", &["x"]), vec![s3_secret("x")]),
            broken_secrets: vec![],
            broken_service_account: true,
        };
        let logs = LogBuffer::default();
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default())
            .with_log_dispatch(logs.dispatch());

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "sa"),
                &mut container,
                &mut volumes,
            )
            .unwrap();

        assert_eq!(container, Container::default());
        assert!(volumes.is_empty());
        let logs = logs.contents();
        assert!(logs.contains("failed to find service account"), "{}", logs);
        assert!(logs.contains("api server unavailable"), "{}", logs);
    }

    #[test]
    fn unrecognized_secret_is_logged() {
        let store = store(
            fixtures::service_account("ns1", "sa", &["plain-token"]),
            vec![fixtures::secret("ns1", "plain-token", &[("token", "abc")])],
        );
        let logs = LogBuffer::default();
        let builder = CredentialBuilder::with_config(store, CredentialConfig::default())
            .with_log_dispatch(logs.dispatch());

        let mut container = Container::default();
        let mut volumes = vec![];
        builder
            .create_secret_volume_and_env(
                &ServiceAccountIdentity::new("ns1", "sa"),
                &mut container,
                &mut volumes,
            )
            .unwrap();

        assert_eq!(container, Container::default());
        let logs = logs.contents();
        assert!(logs.contains("TRACE"), "{}", logs);
        assert!(logs.contains("skipping non gcs/s3 secret"), "{}", logs);
        assert!(logs.contains("plain-token"), "{}", logs);
    }
}
