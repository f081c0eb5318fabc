//! Looking up cluster objects by namespace and name.

use crate::prelude::*;

/// A namespace-qualified object name, used as a lookup key.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NamespacedName {
    /// The Kubernetes namespace.
    pub namespace: String,
    /// The object's name within `namespace`.
    pub name: String,
}

impl NamespacedName {
    /// Create a new `NamespacedName`.
    pub fn new<N, M>(namespace: N, name: M) -> Self
    where
        N: Into<String>,
        M: Into<String>,
    {
        NamespacedName {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Read-only access to the cluster objects we need.
///
/// Both methods return `Ok(None)` when the object does not exist, and `Err`
/// for any other failure, so callers can tell the two apart if they care.
pub trait ObjectStore {
    /// Fetch a `ServiceAccount`.
    fn service_account(&self, key: &NamespacedName) -> Result<Option<ServiceAccount>>;

    /// Fetch a `Secret`.
    fn secret(&self, key: &NamespacedName) -> Result<Option<Secret>>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn service_account(&self, key: &NamespacedName) -> Result<Option<ServiceAccount>> {
        (**self).service_account(key)
    }

    fn secret(&self, key: &NamespacedName) -> Result<Option<Secret>> {
        (**self).secret(key)
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for Box<S> {
    fn service_account(&self, key: &NamespacedName) -> Result<Option<ServiceAccount>> {
        (**self).service_account(key)
    }

    fn secret(&self, key: &NamespacedName) -> Result<Option<Secret>> {
        (**self).secret(key)
    }
}

/// An in-memory `ObjectStore`, for embedding and for tests.
///
/// Objects are keyed by the namespace and name in their own metadata.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    service_accounts: BTreeMap<NamespacedName, ServiceAccount>,
    secrets: BTreeMap<NamespacedName, Secret>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a `ServiceAccount`.
    pub fn insert_service_account(&mut self, service_account: ServiceAccount) -> Result<()> {
        let key = metadata_key(&service_account.metadata)
            .context("cannot store service account")?;
        self.service_accounts.insert(key, service_account);
        Ok(())
    }

    /// Add or replace a `Secret`.
    pub fn insert_secret(&mut self, secret: Secret) -> Result<()> {
        let key = metadata_key(&secret.metadata).context("cannot store secret")?;
        self.secrets.insert(key, secret);
        Ok(())
    }

    /// Builder-style version of `insert_service_account`.
    pub fn with_service_account(mut self, service_account: ServiceAccount) -> Result<Self> {
        self.insert_service_account(service_account)?;
        Ok(self)
    }

    /// Builder-style version of `insert_secret`.
    pub fn with_secret(mut self, secret: Secret) -> Result<Self> {
        self.insert_secret(secret)?;
        Ok(self)
    }
}

impl ObjectStore for MemoryStore {
    fn service_account(&self, key: &NamespacedName) -> Result<Option<ServiceAccount>> {
        Ok(self.service_accounts.get(key).cloned())
    }

    fn secret(&self, key: &NamespacedName) -> Result<Option<Secret>> {
        Ok(self.secrets.get(key).cloned())
    }
}

/// Build a lookup key from object metadata.
fn metadata_key(
    metadata: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
) -> Result<NamespacedName> {
    let name = metadata
        .name
        .as_deref()
        .ok_or_else(|| format_err!("object has no metadata.name"))?;
    let namespace = metadata
        .namespace
        .as_deref()
        .ok_or_else(|| format_err!("object {:?} has no metadata.namespace", name))?;
    Ok(NamespacedName::new(namespace, name))
}


#[test]
fn memory_store_distinguishes_missing_objects() {
    let store = MemoryStore::new()
        .with_service_account(fixtures::service_account("ns1", "default", &["s3cred"]))
        .unwrap()
        .with_secret(fixtures::secret("ns1", "s3cred", &[("awsAccessKeyID", "id")]))
        .unwrap();

    let sa = store
        .service_account(&NamespacedName::new("ns1", "default"))
        .unwrap()
        .expect("service account should exist");
    assert_eq!(sa.metadata.name.as_deref(), Some("default"));
    assert!(store
        .service_account(&NamespacedName::new("ns2", "default"))
        .unwrap()
        .is_none());
    assert!(store
        .secret(&NamespacedName::new("ns1", "s3cred"))
        .unwrap()
        .is_some());
    assert!(store
        .secret(&NamespacedName::new("ns1", "missing"))
        .unwrap()
        .is_none());
}

#[test]
fn memory_store_rejects_objects_without_names() {
    let mut store = MemoryStore::new();
    assert!(store.insert_secret(Secret::default()).is_err());
}

#[test]
fn namespaced_name_display() {
    assert_eq!(NamespacedName::new("ns1", "s3cred").to_string(), "ns1/s3cred");
}
