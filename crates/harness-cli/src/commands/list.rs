//! List command - show discovered cases without running them

use super::{apply_default_search_path, config_failure, LocationArgs};
use crate::logging;
use anyhow::Result;
use colored::*;
use harness_config::{HarnessSettings, Overrides, RunnerKind};
use harness_core::{CaseListing, ReflectionRunner};
use std::process::ExitCode;

/// Arguments for the list command
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub location: LocationArgs,
    /// Output in JSON format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
}

/// Run the list command
pub fn run(args: ListArgs) -> Result<ExitCode> {
    let mut config = match args.location.resolve(&Overrides::default()) {
        Ok(config) => config,
        Err(e) => return Ok(config_failure(&e)),
    };

    logging::init(&config.settings.log_level, !args.no_color);
    apply_default_search_path(&mut config.settings);

    let listings: Vec<CaseListing> = ReflectionRunner::from_settings(&listing_settings(&config.settings))
        .discover()
        .iter()
        .map(|case| case.listing())
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(ExitCode::SUCCESS);
    }

    if args.no_color {
        colored::control::set_override(false);
    }

    if listings.is_empty() {
        println!("{}", "No tests found.".yellow());
    } else {
        for listing in &listings {
            println!("{}", format_listing(listing));
        }
        println!();
        println!(
            "Found {} test{}",
            listings.len().to_string().bold(),
            if listings.len() == 1 { "" } else { "s" }
        );
    }

    if args.no_color {
        colored::control::unset_override();
    }

    Ok(ExitCode::SUCCESS)
}

/// Discovery only works on harness modules, whatever runner is configured
fn listing_settings(settings: &HarnessSettings) -> HarnessSettings {
    HarnessSettings {
        runner: RunnerKind::Reflection,
        ..settings.clone()
    }
}

fn format_listing(listing: &CaseListing) -> String {
    let mut line = format!(
        "{}::{} [{}]",
        listing.class_name, listing.test_name, listing.family
    );
    if listing.parameterized {
        line.push_str(" (parameterized, not executed)");
    }
    line
}
