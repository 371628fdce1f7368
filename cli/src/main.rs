mod cli;
mod config;
mod logging;
mod output;

use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::Parser;
use ghpulse_core::config::Config;
use ghpulse_core::github::GitHubClient;
use ghpulse_core::report::{self, ReportOptions};
use ghpulse_core::period;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init(cli.verbose);
    let cfg = config::load();

    // Fail on bad credentials before anything touches the network.
    let settings =
        Config::from_env(cli.env_file.as_deref()).context("Failed to load configuration")?;
    debug!(?settings, "configuration loaded");

    let json = cli.json || (!cli.authors && cfg.json.unwrap_or(false));
    let show_authors = cli.authors || cli.changes || cfg.authors.unwrap_or(false);
    let options = ReportOptions {
        changes: cli.changes,
    };

    let use_color = if cli.no_color || json {
        false
    } else if let Some(cfg_color) = cfg.color {
        cfg_color
    } else {
        std::io::stdout().is_terminal()
    };
    output::set_color_enabled(use_color);

    let client = GitHubClient::new(&settings).context("Failed to create GitHub client")?;

    let spinner = if !json {
        let sp = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_strings(&[
                "\u{2802}", "\u{2816}", "\u{2834}", "\u{2830}", "\u{2860}", "\u{28e0}", "\u{28c0}",
                "\u{2880}",
            ])
            .template("{spinner} {msg}")
        {
            sp.set_style(style);
        }
        sp.set_message(format!("Connecting to {}...", settings.repo));
        sp.enable_steady_tick(std::time::Duration::from_millis(80));
        Some(sp)
    } else {
        None
    };

    let result = report::collect_report(&client, period::today(), options, |phase| {
        if let Some(sp) = &spinner {
            sp.set_message(phase.to_string());
        }
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(sp) = &spinner {
                sp.finish_and_clear();
            }
            return Err(e).with_context(|| format!("Failed to collect metrics for {}", settings.repo));
        }
    };

    if let Some(sp) = &spinner {
        sp.finish_with_message(format!("\u{2713} {}", output::summary_line(&report)));
    }

    if json {
        println!("{}", output::render_json(&report)?);
    } else {
        println!();
        output::render_terminal(&report, show_authors);
    }

    Ok(())
}
