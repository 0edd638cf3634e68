//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::Parser;

use commands::Commands;

/// Depforge - prebuilt dependency bundle builder
///
/// Build, publish, and consume the toolchain and SDK bundles a project's
/// builds depend on.
#[derive(Parser, Debug)]
#[command(name = "depforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        if let Some(cmd) = self.command {
            cmd.run().await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_lists_split_on_commas() {
        let cli =
            Cli::try_parse_from(["depforge", "build", "sdk", "--only", "zlib,glib"]).unwrap();
        match cli.command {
            Some(Commands::Build { only, exclude, .. }) => {
                assert_eq!(only, vec!["zlib", "glib"]);
                assert!(exclude.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }

        // Repeating the flag still accumulates.
        let cli = Cli::try_parse_from([
            "depforge", "build", "sdk", "--exclude", "v8", "--exclude", "glib",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Build { exclude, .. }) => {
                assert_eq!(exclude, vec!["v8", "glib"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
