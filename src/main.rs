/*
 * aurpkg - A small AUR search, fetch and build helper.
 * Copyright (C) 2025  aurpkg contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser};
use console::style;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{debug, error, warn};

mod aur;
mod config;
mod error;
mod logging;
mod ui;

use aur::builder::fetch_url;
use aur::selection::{self, SelectionOutcome};
use aur::{info, search};
use aur::{AurBuilder, Endpoints, HttpTransport, SystemRunner, Transport};
use config::Config;
use error::AurError;
use ui::Painter;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\n",
    "Copyright (C) 2025  aurpkg contributors\n",
    "License GPLv3+: GNU GPL version 3 or later <https://gnu.org/licenses/gpl.html>\n\n",
    "This is free software; you are free to change and redistribute it.\n",
    "There is NO WARRANTY, to the extent permitted by law."
);

#[derive(Parser, Debug)]
#[command(name = "aurpkg")]
#[command(version = VERSION)]
#[command(long_version = LONG_VERSION)]
#[command(about = "Search, inspect, fetch and build packages from the AUR.")]
struct Cli {
    /// Search the AUR and pick packages to build and install
    #[arg(short = 's', long, value_name = "QUERY")]
    search: Option<String>,

    /// Show details for one or more packages
    #[arg(short = 'i', long, value_name = "PACKAGE", num_args = 1..)]
    info: Vec<String>,

    /// Download a file into the working directory
    #[arg(short = 'g', long, value_name = "URL")]
    get: Option<String>,

    /// Enable colored output
    #[arg(short = 'c', long)]
    colors: bool,

    /// Raise log verbosity (repeatable)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn has_command(&self) -> bool {
        self.search.is_some() || !self.info.is_empty() || self.get.is_some()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.has_command() {
        let help = Cli::command().render_help();
        eprintln!("{}", help);
        return ExitCode::FAILURE;
    }

    let (mut config, diagnostics) = Config::load();
    if cli.colors {
        config.color = true;
    }
    console::set_colors_enabled(config.color);
    console::set_colors_enabled_stderr(config.color);

    let level = logging::effective_level(&config.logging.level, cli.verbose);
    logging::init_with_file(level, config.logging.file.as_deref());
    debug!("aurpkg {} starting, log level {}", VERSION, level);
    for message in &diagnostics {
        warn!("{}", message);
    }

    match run(&cli, &config) {
        Ok(code) => code,
        Err(e) => {
            if let Some(aur_err) = e.downcast_ref::<AurError>() {
                error!(category = %aur_err.category(), "{}", aur_err);
            }
            let p = Painter::new(config.color);
            eprintln!("{} {:#}", p.paint(style("error:").red().bold()), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &Config) -> Result<ExitCode> {
    config.validate()?;

    let endpoints = Endpoints::from_config(&config.aur);
    let transport = HttpTransport::from_config(&config.aur);
    let painter = Painter::new(config.color);

    if let Some(query) = &cli.search {
        if handle_search(query, config, &transport, &endpoints, &painter)?
            == SelectionOutcome::NothingToDo
        {
            eprintln!(" there is nothing to do");
            return Ok(ExitCode::SUCCESS);
        }
    }

    if !cli.info.is_empty() {
        handle_info(&cli.info, &transport, &endpoints, &painter)?;
    }

    if let Some(url) = &cli.get {
        let dest = fetch_url(&transport, url, &config.work_dir())?;
        println!(
            "{} {}",
            painter.paint(style("::").blue().bold()),
            painter.paint(style(format!("saved {}", dest.display())).white().bold())
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_search(
    query: &str,
    config: &Config,
    transport: &dyn Transport,
    endpoints: &Endpoints,
    painter: &Painter,
) -> Result<SelectionOutcome> {
    let results = search::search(transport, endpoints, query)?;

    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", search::render_results(&results, painter))?;
    write!(stdout, "{}", search::render_prompt(painter))?;
    stdout.flush()?;
    drop(stdout);

    let line = selection::read_selection(io::stdin().lock()).context("failed to read selection")?;

    let runner = SystemRunner;
    let builder = AurBuilder::from_config(config, transport, &runner, endpoints);
    debug!("working directory {}", builder.work_dir().display());

    let mut ordinal = 0usize;
    let outcome = selection::drive(&line, &results, |_, pkg| {
        ordinal += 1;
        builder.acquire(ordinal, pkg)
    })?;

    if let SelectionOutcome::Processed(n) = outcome {
        debug!("processed {} package(s)", n);
    }
    Ok(outcome)
}

fn handle_info(
    names: &[String],
    transport: &dyn Transport,
    endpoints: &Endpoints,
    painter: &Painter,
) -> Result<()> {
    for (i, name) in names.iter().enumerate() {
        let details = info::fetch_info(transport, endpoints, name)?;
        if i > 0 {
            println!("{}", info::SEPARATOR);
        }
        print!("{}", info::render_info(&details, painter));
    }
    Ok(())
}
