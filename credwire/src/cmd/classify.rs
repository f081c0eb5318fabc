//! The `classify` subcommand.

use credwire_common::{
    credentials::{CredentialBuilder, SecretReport},
    prelude::*,
};
use std::io::{self, Write};
use structopt::StructOpt;

use crate::service_account_identity;

/// Options for `classify`.
#[derive(Debug, StructOpt)]
pub struct Opt {
    /// The namespace of the service account.
    #[structopt(long = "namespace", short = "n", default_value = "default")]
    namespace: String,

    /// The service account to inspect.
    #[structopt(long = "service-account")]
    service_account: Option<String>,

    /// Print JSON instead of a table.
    #[structopt(long = "json")]
    json: bool,
}

/// Run the `classify` subcommand.
pub fn run<S: ObjectStore>(opt: &Opt, builder: &CredentialBuilder<S>) -> Result<()> {
    let identity = service_account_identity(&opt.namespace, opt.service_account.as_deref(), None);
    let reports = builder
        .classify_service_account(&identity)
        .ok_or_else(|| format_err!("could not find service account {}", identity))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if opt.json {
        serde_json::to_writer_pretty(&mut out, &reports)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", render_table(&reports))?;
    }
    Ok(())
}

/// Format reports as a simple two-column table.
fn render_table(reports: &[SecretReport]) -> String {
    let width = reports
        .iter()
        .map(|r| r.name.len())
        .chain(Some("SECRET".len()))
        .max()
        .unwrap_or(0);
    let mut table = format!("{:<width$}  {}\n", "SECRET", "BACKEND", width = width);
    for report in reports {
        let backend = match report.classification {
            Some(classification) => classification.to_string(),
            None => "(unavailable)".to_owned(),
        };
        table.push_str(&format!("{:<width$}  {}\n", report.name, backend, width = width));
    }
    table
}

#[test]
fn table_lists_every_secret() {
    use credwire_common::credentials::Classification;

    let reports = vec![
        SecretReport {
            name: "s3cred".to_owned(),
            classification: Some(Classification::S3),
        },
        SecretReport {
            name: "missing-secret".to_owned(),
            classification: None,
        },
    ];
    assert_eq!(
        render_table(&reports),
        "SECRET          BACKEND\n\
         s3cred          s3\n\
         missing-secret  (unavailable)\n"
    );
}
