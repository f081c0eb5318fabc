//! Our subcommands.

use credwire_common::{credentials::CredentialBuilder, prelude::*};
use structopt::StructOpt;

mod classify;
mod inject;

/// The available subcommands.
#[derive(Debug, StructOpt)]
pub enum Cmd {
    /// Inject credentials into a pod manifest and print the result as YAML.
    #[structopt(name = "inject")]
    Inject(inject::Opt),

    /// Show how each secret of a service account would be classified.
    #[structopt(name = "classify")]
    Classify(classify::Opt),
}

impl Cmd {
    /// Run the selected subcommand.
    pub fn run<S: ObjectStore>(&self, builder: &CredentialBuilder<S>) -> Result<()> {
        match self {
            Cmd::Inject(opt) => inject::run(opt, builder),
            Cmd::Classify(opt) => classify::run(opt, builder),
        }
    }
}
