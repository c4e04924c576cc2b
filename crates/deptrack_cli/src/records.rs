//! `deptrack normalize` and `deptrack compare`: record inspection.

use std::path::Path;

use deptrack_emit::{diff, load_record, normalize as normalize_record};

use crate::GlobalArgs;

/// Prints the normalized lines of the record at `path`.
pub fn normalize(path: &str) -> Result<i32, Box<dyn std::error::Error>> {
    let record = load_record(Path::new(path))?;
    print!("{}", normalize_record(&record));
    Ok(0)
}

/// Compares two records. Returns exit code 0 if they are equivalent and 1
/// otherwise, printing the lines unique to each side.
pub fn compare(left: &str, right: &str, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let a = load_record(Path::new(left))?;
    let b = load_record(Path::new(right))?;
    let difference = diff(&a, &b);
    if difference.is_empty() {
        if global.verbose {
            eprintln!("{left} and {right} are equivalent");
        }
        return Ok(0);
    }
    if !global.quiet {
        print!("{difference}");
    }
    Ok(1)
}
