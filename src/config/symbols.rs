//! Symbol List Loader
//!
//! Reads the static symbol universe from a CSV file with a `symbol`
//! header column. Loaded once at startup, before the push feed is
//! subscribed; never re-read during the run.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::domain::Symbol;

/// Load symbols from `path`, dropping blacklisted and duplicate entries.
///
/// # Errors
/// Fails if the file can't be read, has no `symbol` column, contains a
/// malformed symbol, or yields an empty list.
pub fn load_symbols(path: &Path, blacklist: &[String]) -> Result<Vec<Symbol>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open symbols file: {}", path.display()))?;

    let symbols = parse_symbols(file, blacklist)
        .with_context(|| format!("Invalid symbols file: {}", path.display()))?;

    info!(
        path = %path.display(),
        count = symbols.len(),
        blacklisted = blacklist.len(),
        "Symbol list loaded"
    );

    Ok(symbols)
}

/// Parse a symbol CSV from any reader.
pub fn parse_symbols<R: Read>(reader: R, blacklist: &[String]) -> Result<Vec<Symbol>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let column = csv
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .position(|h| h.eq_ignore_ascii_case("symbol"))
        .context("CSV has no `symbol` column")?;

    let blacklist: HashSet<&str> = blacklist.iter().map(|s| s.trim()).collect();
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    for (line, record) in csv.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV row {}", line + 2))?;
        let raw = record.get(column).unwrap_or_default();
        if raw.is_empty() {
            continue;
        }

        let symbol = Symbol::parse(raw).with_context(|| format!("Row {}", line + 2))?;

        if blacklist.contains(symbol.as_str()) {
            continue;
        }
        if !seen.insert(symbol.clone()) {
            warn!(symbol = %symbol, "Duplicate symbol ignored");
            continue;
        }
        symbols.push(symbol);
    }

    anyhow::ensure!(!symbols.is_empty(), "Symbol list is empty after filtering");
    Ok(symbols)
}
