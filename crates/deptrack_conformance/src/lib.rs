//! Conformance test helpers for the deptrack dependency tracker.
//!
//! Provides in-memory batch drivers that run source text through the full
//! pipeline (parse → declare → check → record) and return structured results
//! for assertion in integration tests, plus the [`manual`] syntax-walking
//! tracker used to cross-check the request-based records.

#![warn(missing_docs)]

pub mod manual;

use deptrack_emit::{normalize, NormalizedRecord};
use deptrack_frontend::{Batch, BatchOptions, BatchOutput};
use deptrack_query::FileRecord;
use deptrack_source::{FileRole, SourceDb};

/// The two-file scenario: each file reads its own private `x` through an
/// interpolation. The literal and type queries behind it are shared, so the
/// second file gets them from the cache.
pub const SCENARIO_SOURCE: &str =
    "fileprivate var v: String { return \"\\(x)\" }; fileprivate let x = \"a\"";

/// Builds a source database. `primaries` get records; `secondaries` are
/// only declared.
pub fn source_db(primaries: &[(&str, &str)], secondaries: &[(&str, &str)]) -> SourceDb {
    let mut db = SourceDb::new();
    for (name, text) in primaries {
        db.add_source(*name, *text, FileRole::Primary);
    }
    for (name, text) in secondaries {
        db.add_source(*name, *text, FileRole::Secondary);
    }
    db
}

/// Runs one batch with default options over in-memory primaries.
pub fn run_batch(primaries: &[(&str, &str)]) -> BatchOutput {
    run_batch_with(primaries, &[], BatchOptions::default())
}

/// Runs one batch with explicit secondaries and options.
pub fn run_batch_with(
    primaries: &[(&str, &str)],
    secondaries: &[(&str, &str)],
    options: BatchOptions,
) -> BatchOutput {
    Batch::new(source_db(primaries, secondaries), options)
        .run()
        .expect("batch failed to start")
}

/// Runs the two-file scenario with `jobs` workers.
pub fn run_scenario(jobs: usize) -> BatchOutput {
    let options = BatchOptions {
        jobs,
        ..BatchOptions::default()
    };
    run_batch_with(
        &[("1.input", SCENARIO_SOURCE), ("2.input", SCENARIO_SOURCE)],
        &[],
        options,
    )
}

/// The record of `file`, panicking with the available names if missing.
pub fn record<'a>(output: &'a BatchOutput, file: &str) -> &'a FileRecord {
    output.record(file).unwrap_or_else(|| {
        let names: Vec<&str> = output.records.iter().map(|r| r.file.as_str()).collect();
        panic!("no record for {file}; have {names:?}")
    })
}

/// The normalized record of `file`.
pub fn normalized(output: &BatchOutput, file: &str) -> NormalizedRecord {
    normalize(record(output, file))
}

/// Error messages of `output`, for assertion failures.
pub fn messages(output: &BatchOutput) -> Vec<String> {
    output
        .diagnostics
        .iter()
        .map(|d| format!("{}: {}", d.code, d.message))
        .collect()
}
