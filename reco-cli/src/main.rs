#![allow(missing_docs)]

use clap::Parser;
use reco_cli::Opts;
use std::process::{ExitCode, Termination};

fn main() -> ExitCode {
    match Opts::parse().run() {
        Ok(code) => code,
        result @ Err(_) => result.report(),
    }
}
