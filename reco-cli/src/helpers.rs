//! File-system plumbing around a run: reading the configuration, opening the input event store,
//! and creating the output one, each wrapped with an [`anyhow::Context`] message naming the path.

use anyhow::{Context, Result};
use reco_core::config::Config;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Reads and parses the YAML module configuration at `path`.
pub fn read_config(path: &Path) -> Result<Config> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read '{}'", path.display()))?;
    Config::parse(&yaml).with_context(|| format!("unable to parse '{}'", path.display()))
}

/// Opens the bincode-encoded event file at `path` for reading.
pub fn open_input(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(
        File::open(path).with_context(|| format!("unable to open '{}'", path.display()))?,
    ))
}

/// Creates the bincode-encoded event file at `path` for writing. Refuses to overwrite an existing
/// file, matching the teacher's own `write_grid` behaviour.
pub fn create_output(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(
        File::options()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("unable to write '{}'", path.display()))?,
    ))
}
