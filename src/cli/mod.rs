//! Command facade: flag parsing helpers and one `run_*` function per
//! subcommand. Everything printed to stdout happens here.

mod commands;
mod invoke;
pub mod pickers;
mod session;
mod setup;
mod sync;

pub use commands::{AssetArgs, ConnectArgs, ModifierArgs, TestArgs};
pub use invoke::run_test;
pub use setup::{run_export, run_import, run_init, run_target};
pub use sync::{run_create, run_decompress, run_delete, run_diff, run_pull, run_push};

use std::ffi::OsString;

/// Rewrites single-dash long flags (`-service=A`, `-all`) into the
/// double-dash form clap expects. Short flags such as `-v` and values
/// such as `-1` pass through.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text.strip_prefix('-') else {
                return arg;
            };
            if rest.starts_with('-') {
                return arg;
            }
            let flag = rest.split('=').next().unwrap_or_default();
            if flag.len() > 1 && flag.starts_with(|c: char| c.is_ascii_alphabetic()) {
                OsString::from(format!("-{text}"))
            } else {
                arg
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(args: &[&str]) -> Vec<String> {
        normalize_args(args.iter().map(OsString::from))
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect()
    }

    #[test]
    fn test_single_dash_long_flags() {
        assert_eq!(
            norm(&["cb-cli", "push", "-service=A", "-all-roles", "--collection", "B"]),
            vec!["cb-cli", "push", "--service=A", "--all-roles", "--collection", "B"]
        );
    }

    #[test]
    fn test_short_flags_and_values_untouched() {
        assert_eq!(
            norm(&["cb-cli", "-v", "push", "-data-page-size", "-1", "-", "plain"]),
            vec!["cb-cli", "-v", "push", "--data-page-size", "-1", "-", "plain"]
        );
    }
}
