//! Comparison of records modulo sequence numbers.
//!
//! Sequence numbers depend on the order in which workers happened to intern
//! entities, so two runs over the same inputs can number things differently.
//! Normalization drops them, replaces consumer references by the consumers'
//! identifiers, and sorts the resulting lines.

use std::collections::BTreeSet;
use std::fmt;

use deptrack_query::FileRecord;

/// A record reduced to sorted, sequence-free lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    /// One line per provided entity, per used entity, and the interface hash.
    pub lines: Vec<String>,
}

/// Lines present in only one of two normalized records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDiff {
    /// Lines only in the left record.
    pub only_left: Vec<String>,
    /// Lines only in the right record.
    pub only_right: Vec<String>,
}

impl RecordDiff {
    /// Returns `true` if the records normalize identically.
    pub fn is_empty(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty()
    }
}

impl fmt::Display for RecordDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.only_left {
            writeln!(f, "- {line}")?;
        }
        for line in &self.only_right {
            writeln!(f, "+ {line}")?;
        }
        Ok(())
    }
}

impl fmt::Display for NormalizedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Normalizes `record`. The file name is not part of the result, so records
/// of two files with the same contents normalize identically.
pub fn normalize(record: &FileRecord) -> NormalizedRecord {
    let mut lines = BTreeSet::new();
    lines.insert(format!("interface-hash {}", record.interface_hash));
    for p in &record.provides {
        let private = if p.private { " private" } else { "" };
        lines.insert(format!(
            "provides {} {} {}{private}",
            p.kind.as_str(),
            p.identifier,
            p.fingerprint
        ));
    }
    for d in &record.depends {
        let mut consumers: Vec<&str> = d
            .consumers
            .iter()
            .map(|&seq| record.identifier_of(seq).unwrap_or("?"))
            .collect();
        consumers.sort_unstable();
        consumers.dedup();
        let line = if consumers.is_empty() {
            format!("depends {} {}", d.kind, d.identifier)
        } else {
            format!("depends {} {} <- {}", d.kind, d.identifier, consumers.join(", "))
        };
        lines.insert(line);
    }
    NormalizedRecord {
        lines: lines.into_iter().collect(),
    }
}

/// Returns `true` if `a` and `b` are equal after normalization.
pub fn equivalent(a: &FileRecord, b: &FileRecord) -> bool {
    normalize(a) == normalize(b)
}

/// Lines unique to each side after normalization.
pub fn diff(a: &FileRecord, b: &FileRecord) -> RecordDiff {
    let left: BTreeSet<String> = normalize(a).lines.into_iter().collect();
    let right: BTreeSet<String> = normalize(b).lines.into_iter().collect();
    RecordDiff {
        only_left: left.difference(&right).cloned().collect(),
        only_right: right.difference(&left).cloned().collect(),
    }
}
