//! Command-line tool for injecting storage credentials into pod manifests.

use credwire_common::{
    config::CredentialConfig,
    credwire_common_version,
    credentials::{CredentialBuilder, ServiceAccountIdentity},
    kubernetes::{self, KubectlStore},
    prelude::*,
    quick_main,
    tracing_support::initialize_tracing,
};
use structopt::StructOpt;

mod cmd;

/// Command-line options, parsed using `structopt`.
#[derive(Debug, StructOpt)]
#[structopt(about = "Inject storage credentials from service account secrets.")]
struct Opt {
    /// The config map holding our credential overlay.
    #[structopt(
        long = "config-map",
        env = "CREDWIRE_CONFIG_MAP",
        default_value = "credwire-config"
    )]
    config_map: String,

    /// The namespace of `--config-map`.
    #[structopt(
        long = "config-namespace",
        env = "CREDWIRE_CONFIG_NAMESPACE",
        default_value = "credwire-system"
    )]
    config_namespace: String,

    /// Don't read a config map, and use the built-in key names.
    #[structopt(long = "no-config")]
    no_config: bool,

    #[structopt(subcommand)]
    cmd: cmd::Cmd,
}

impl Opt {
    /// Load our credential overlay. A config map which exists but can't be
    /// parsed is an error.
    fn credential_config(&self) -> Result<CredentialConfig> {
        if self.no_config {
            return Ok(CredentialConfig::default());
        }
        let key = NamespacedName::new(self.config_namespace.as_str(), self.config_map.as_str());
        match kubernetes::config_map(&key)? {
            Some(config_map) => CredentialConfig::from_config_map(&config_map),
            None => {
                warn!(config_map = %key, "config map not found, using default key names");
                Ok(CredentialConfig::default())
            }
        }
    }
}

/// Our real entry point.
fn run() -> Result<()> {
    initialize_tracing();
    let opt = Opt::from_args();
    debug!("credwire_common {}, args: {:?}", credwire_common_version(), opt);

    let builder = CredentialBuilder::with_config(KubectlStore, opt.credential_config()?);
    debug!(config = ?builder.config(), "loaded credential config");
    opt.cmd.run(&builder)
}

quick_main!(run);

/// Build the identity of the service account to use, given the
/// command-line values and (optionally) the pod's own setting.
pub(crate) fn service_account_identity(
    namespace: &str,
    service_account: Option<&str>,
    pod_service_account: Option<&str>,
) -> ServiceAccountIdentity {
    let name = service_account.or(pod_service_account).unwrap_or("");
    ServiceAccountIdentity::new(namespace, name)
}

#[test]
fn service_account_precedence() {
    assert_eq!(
        service_account_identity("ns1", Some("cli"), Some("pod")).name(),
        "cli"
    );
    assert_eq!(service_account_identity("ns1", None, Some("pod")).name(), "pod");
    assert_eq!(service_account_identity("ns1", None, None).name(), "default");
}
