use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod logging;
mod reporter;

use commands::LocationArgs;

#[derive(Parser)]
#[command(name = "harness")]
#[command(version)]
#[command(propagate_version = true)]
#[command(about = "Run compiled test modules and write a uniform JSON report")]
#[command(long_about = "Harness - runs compiled test modules and writes a uniform JSON report

Harness locates test modules (shared libraries exporting a harness manifest,
or libtest executables), runs every marked test case and writes one JSON
report. The exit code is 2 when any case hit a critical error, 1 when any case
failed, and 0 otherwise.

QUICK START:
    harness run --search-path target/debug     Run every *.Tests module found
    harness list -m target/debug/libbank.so    Show cases without running them

CONFIGURATION:
    Settings come from harness.toml (nearest one up from the current
    directory), then HARNESS_* environment variables, then flags.

For more information on a specific command, use 'harness help <command>'.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tests and write the JSON report
    ///
    /// Locates test modules, discovers their cases, runs them and writes
    /// the report. Prints a colored summary unless --quiet is given. With no
    /// modules or search paths configured, the directory holding the harness
    /// executable is searched.
    ///
    /// EXAMPLES:
    ///     harness run                              Use harness.toml
    ///     harness run -s target/debug              Search a directory
    ///     harness run -m out/libbank.so -m out/libauth.so  Explicit modules
    ///     harness run --runner libtest -s target/debug/deps  Drive libtest binaries
    ///     harness run --report ci/results.json     Custom report path
    ///
    /// ENVIRONMENT VARIABLES:
    ///     HARNESS_RUNNER               reflection or libtest
    ///     HARNESS_MODULES              ';'-separated module paths
    ///     HARNESS_SEARCH_PATHS         ';'-separated directories
    ///     HARNESS_MODULE_PATTERN       File name glob
    ///     HARNESS_REPORT_PATH          Report location
    ///     HARNESS_LOG_LEVEL            trace, debug, info, warn or error
    ///     HARNESS_ASYNC_TIMEOUT_SECS   Async test timeout
    ///     RUST_LOG                     Overrides the log filter entirely
    #[command(visible_alias = "r")]
    Run {
        #[command(flatten)]
        location: LocationArgs,
        /// Test backend (reflection, libtest)
        #[arg(long, short = 'r', value_name = "RUNNER")]
        runner: Option<String>,
        /// Where to write the JSON report
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
        /// Seconds to wait for an async test before giving up on it
        #[arg(long, value_name = "SECS")]
        async_timeout: Option<String>,
        /// Disable colored output
        #[arg(long, env = "NO_COLOR")]
        no_color: bool,
        /// Only print the totals and failures
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// List discovered tests without running them
    ///
    /// Loads every located module and prints the cases it marks as tests.
    /// Uses the built-in engine regardless of the configured runner.
    ///
    /// EXAMPLES:
    ///     harness list                     Use harness.toml
    ///     harness list -s target/debug     Search a directory
    ///     harness list --json              Machine-readable output
    #[command(visible_alias = "ls")]
    List {
        #[command(flatten)]
        location: LocationArgs,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Disable colored output
        #[arg(long, env = "NO_COLOR")]
        no_color: bool,
    },

    /// Generate shell completions
    ///
    /// Outputs shell completion scripts for bash, zsh, fish, or powershell.
    /// Redirect to a file and source it in your shell configuration.
    ///
    /// EXAMPLES:
    ///     harness completions bash > ~/.bash_completions/harness.bash
    ///     harness completions zsh > ~/.zfunc/_harness
    ///     harness completions fish > ~/.config/fish/completions/harness.fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    match dispatch(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(commands::CONFIG_ERROR_EXIT)
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Run {
            location,
            runner,
            report,
            async_timeout,
            no_color,
            quiet,
        } => commands::run::run(commands::run::RunArgs {
            location,
            runner,
            report,
            async_timeout,
            no_color,
            quiet,
        }),
        Commands::List {
            location,
            json,
            no_color,
        } => commands::list::run(commands::list::ListArgs {
            location,
            json,
            no_color,
        }),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::parse_from([
            "harness",
            "run",
            "-m",
            "a.so",
            "-m",
            "b.so",
            "--runner",
            "libtest",
            "--quiet",
        ]);

        match cli.command {
            Commands::Run {
                location,
                runner,
                quiet,
                ..
            } => {
                assert_eq!(location.modules, vec![PathBuf::from("a.so"), PathBuf::from("b.so")]);
                assert_eq!(runner.as_deref(), Some("libtest"));
                assert!(quiet);
            }
            _ => panic!("expected the run command"),
        }
    }
}
