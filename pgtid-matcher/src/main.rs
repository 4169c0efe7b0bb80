//! Pseudo-GTID matcher binary.
//!
//! Translates a candidate replica's replication position onto an intended source server by
//! aligning both servers' logs on the newest marker they share. Prints the result as JSON and
//! never changes replication itself.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use pgtid_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::{LogSelectionArg, load_matcher_config};
use crate::core::{MatchReport, start_matcher_with_config};
use crate::error::{MatcherError, MatcherResult};

mod config;
mod core;
mod error;

/// Translates a replica's position onto another server using pseudo-GTID markers.
#[derive(Parser, Debug)]
#[command(name = "pgtid-matcher")]
struct Args {
    /// Which logs of the instance are searched for its newest marker, replacing the
    /// configured selection.
    #[arg(long, value_enum)]
    log_selection: Option<LogSelectionArg>,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::from(err.exit_code())
        }
    }
}

fn run() -> MatcherResult<()> {
    let args = Args::parse();

    let matcher_config = load_matcher_config(args.log_selection)?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(MatcherError::config)?;

    let report = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(matcher_config))?;

    print_report(&report, args.pretty)
}

async fn async_main(
    matcher_config: pgtid_config::shared::MatcherServiceConfig,
) -> MatcherResult<MatchReport> {
    match start_matcher_with_config(matcher_config).await {
        Ok(report) => Ok(report),
        Err(err) => {
            error!("{err}");
            Err(err)
        }
    }
}

fn print_report(report: &MatchReport, pretty: bool) -> MatcherResult<()> {
    let mut stdout = std::io::stdout().lock();
    if pretty {
        serde_json::to_writer_pretty(&mut stdout, report).map_err(std::io::Error::from)?;
    } else {
        serde_json::to_writer(&mut stdout, report).map_err(std::io::Error::from)?;
    }
    writeln!(stdout)?;

    Ok(())
}
