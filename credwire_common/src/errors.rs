//! Reporting fatal errors from command-line tools.

use std::fmt;

use anyhow::Error;

/// Formats an error followed by each of its causes, one per line.
pub struct DisplayCauses<'a> {
    err: &'a Error,
    backtrace: bool,
}

/// Display `err` and its causes. Call `with_backtrace` to append the
/// captured backtrace as well.
pub fn display_causes(err: &Error) -> DisplayCauses<'_> {
    DisplayCauses {
        err,
        backtrace: false,
    }
}

impl DisplayCauses<'_> {
    /// Also print the backtrace, if `enabled`.
    pub fn with_backtrace(mut self, enabled: bool) -> Self {
        self.backtrace = enabled;
        self
    }
}

impl fmt::Display for DisplayCauses<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.err)?;
        for cause in self.err.chain().skip(1) {
            writeln!(f, "  caused by: {}", cause)?;
        }
        if self.backtrace {
            write!(f, "{}", self.err.backtrace())?;
        }
        Ok(())
    }
}

/// Define `main` in terms of a `fn() -> Result<()>`. Errors are printed to
/// standard error with their causes, and the process exits with status 1.
/// The backtrace is included when `RUST_BACKTRACE` is set.
#[macro_export]
macro_rules! quick_main {
    ($wrapped:ident) => {
        fn main() {
            if let Err(err) = $wrapped() {
                let backtrace = ::std::env::var_os("RUST_BACKTRACE").is_some();
                eprint!(
                    "{}",
                    $crate::errors::display_causes(&err).with_backtrace(backtrace)
                );
                ::std::process::exit(1);
            }
        }
    };
}

#[test]
fn displays_cause_chain() {
    use anyhow::Context;

    let err = Err::<(), _>(anyhow::format_err!("connection reset"))
        .context("failed to fetch secret ns1/s3cred")
        .unwrap_err();
    assert_eq!(
        display_causes(&err).to_string(),
        "ERROR: failed to fetch secret ns1/s3cred\n  caused by: connection reset\n"
    );
}
