//! Code shared between the `credwire` library and command-line tool.
//!
//! The interesting part lives in [`credentials`]: given a Kubernetes
//! `ServiceAccount`, find the storage secrets attached to it and wire them
//! into a container as environment variables or mounted files.

#![warn(missing_docs)]

pub use anyhow;
pub use k8s_openapi;
pub use serde_json;
pub use tracing;

pub mod config;
pub mod credentials;
pub mod errors;
pub mod kubernetes;
pub mod store;
pub mod tracing_support;

/// Common imports used by many modules.
pub mod prelude {
    pub use anyhow::{format_err, Context};
    pub use k8s_openapi::api::core::v1::{
        ConfigMap, Container, EnvVar, PodSpec, Secret, ServiceAccount, Volume,
        VolumeMount,
    };
    pub use serde::{Deserialize, Serialize};
    pub use std::{collections::BTreeMap, fmt};
    pub use tracing::{debug, error, info, trace, warn};

    pub use super::store::{NamespacedName, ObjectStore};
    pub use super::{Error, Result};
}

/// Error type for this crate's functions.
pub use anyhow::Error;

/// Result type for this crate's functions.
pub use anyhow::Result;

/// The version of `credwire_common`.
pub fn credwire_common_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
