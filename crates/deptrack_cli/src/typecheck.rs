//! `deptrack typecheck`: one batch over the given files.
//!
//! 1. Load config (`--config`, else `deptrack.toml` in the working directory)
//! 2. Load primary and secondary files into a `SourceDb`
//! 3. Pair `--emit-reference-dependencies-path` values with primaries
//! 4. Run the batch
//! 5. Render diagnostics and report unavailable records

use std::path::{Path, PathBuf};

use deptrack_config::TrackerConfig;
use deptrack_diagnostics::{DiagnosticRenderer, TerminalRenderer};
use deptrack_frontend::{Batch, BatchOptions};
use deptrack_source::{FileId, FileRole, SourceDb};
use tracing::info;

use crate::{GlobalArgs, TypecheckArgs};

/// Runs the `deptrack typecheck` command.
///
/// Returns exit code 0 if the batch produced no errors, 1 otherwise. A
/// record that could not be written is a warning, not an error.
pub fn run(args: &TypecheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_config(global)?;

    if args.primary_files.is_empty() && args.files.is_empty() {
        return Err("no input files".into());
    }
    if args.emit_paths.len() > args.primary_files.len() {
        return Err(format!(
            "{} record paths given for {} primary files",
            args.emit_paths.len(),
            args.primary_files.len()
        )
        .into());
    }

    let mut source_db = SourceDb::new();
    let mut primaries: Vec<FileId> = Vec::new();
    for path in &args.primary_files {
        let id = source_db
            .load_file(Path::new(path), FileRole::Primary)
            .map_err(|e| format!("cannot read {path}: {e}"))?;
        primaries.push(id);
    }
    for path in &args.files {
        source_db
            .load_file(Path::new(path), FileRole::Secondary)
            .map_err(|e| format!("cannot read {path}: {e}"))?;
    }

    let mut options = BatchOptions::from(&config);
    if let Some(jobs) = args.jobs {
        options.jobs = jobs;
    }

    let mut batch = Batch::new(source_db, options);
    for (id, path) in primaries.iter().zip(&args.emit_paths) {
        batch = batch.with_output(*id, PathBuf::from(path));
    }
    if let Some(manifest) = args.manifest.as_ref().or(config.emit.manifest.as_ref()) {
        batch = batch.with_manifest(PathBuf::from(manifest));
    }

    let output = batch.run()?;
    info!(
        records = output.records.len(),
        hits = output.stats.cache.hits,
        misses = output.stats.cache.misses,
        "batch complete"
    );

    let renderer = TerminalRenderer::new(global.color);
    for diag in &output.diagnostics {
        if global.quiet && !diag.severity.is_error() {
            continue;
        }
        eprintln!("{}", renderer.render(diag, &output.sources));
    }

    if !global.quiet {
        let unavailable = output.manifest.unavailable().count();
        eprintln!(
            "    Checked {} file(s), {} record(s) unavailable",
            output.records.len() + unavailable,
            unavailable
        );
    }

    Ok(if output.has_errors() { 1 } else { 0 })
}

fn load_config(global: &GlobalArgs) -> Result<TrackerConfig, Box<dyn std::error::Error>> {
    match global.config {
        Some(ref path) => Ok(deptrack_config::load_config(Path::new(path))?),
        None => {
            let cwd = std::env::current_dir()?;
            Ok(deptrack_config::discover_config(&cwd)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deptrack_emit::{equivalent, load_record, EmissionManifest};
    use deptrack_query::DependencyKind;

    fn global(config: Option<&Path>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: config.map(|p| p.to_string_lossy().into_owned()),
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn typecheck_scenario_writes_records_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let source = "fileprivate var v: String { return \"\\(x)\" }\nfileprivate let x = \"a\"\n";
        let config = write(dir.path(), "deptrack.toml", "[batch]\njobs = 2\n");
        let args = TypecheckArgs {
            primary_files: vec![
                write(dir.path(), "1.input", source),
                write(dir.path(), "2.input", source),
            ],
            files: Vec::new(),
            emit_paths: vec![
                dir.path().join("1.deps").to_string_lossy().into_owned(),
                dir.path().join("2.deps").to_string_lossy().into_owned(),
            ],
            manifest: Some(dir.path().join("manifest.json").to_string_lossy().into_owned()),
            jobs: None,
        };
        let code = run(&args, &global(Some(Path::new(&config)))).unwrap();
        assert_eq!(code, 0);

        let one = load_record(&dir.path().join("1.deps")).unwrap();
        let two = load_record(&dir.path().join("2.deps")).unwrap();
        assert!(one.uses("literal string-literal", DependencyKind::UsesLiteralConversion));
        assert!(equivalent(&one, &two));
        let manifest = EmissionManifest::load(&dir.path().join("manifest.json")).unwrap();
        assert_eq!(manifest.unavailable().count(), 0);
    }

    #[test]
    fn too_many_record_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "deptrack.toml", "");
        let args = TypecheckArgs {
            primary_files: vec![write(dir.path(), "a.input", "let a = 1")],
            files: Vec::new(),
            emit_paths: vec!["a.deps".into(), "b.deps".into()],
            manifest: None,
            jobs: None,
        };
        assert!(run(&args, &global(Some(Path::new(&config)))).is_err());
    }

    #[test]
    fn syntax_errors_exit_with_one() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "deptrack.toml", "");
        let args = TypecheckArgs {
            primary_files: vec![write(dir.path(), "bad.input", "func (")],
            files: Vec::new(),
            emit_paths: Vec::new(),
            manifest: None,
            jobs: Some(1),
        };
        assert_eq!(run(&args, &global(Some(Path::new(&config)))).unwrap(), 1);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "deptrack.toml", "");
        let args = TypecheckArgs {
            primary_files: vec![dir.path().join("nope.input").to_string_lossy().into_owned()],
            files: Vec::new(),
            emit_paths: Vec::new(),
            manifest: None,
            jobs: None,
        };
        assert!(run(&args, &global(Some(Path::new(&config)))).is_err());
    }
}
