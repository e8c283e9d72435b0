use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Datelike;
use tracing::warn;

use crate::model::{CanonicalRecord, SummaryEntry};
use crate::util::{round2, write_json_compact, write_json_pretty};

use super::flow::Measure;

pub const SUMMARY_FILE_NAME: &str = "summary.json";

#[derive(Debug, Clone, PartialEq)]
pub struct YearWrite {
    pub path: PathBuf,
    pub entry: SummaryEntry,
}

pub fn year_key(record: &CanonicalRecord) -> String {
    format!("{:04}", record.date.year())
}

pub fn partition_by_year(records: Vec<CanonicalRecord>) -> BTreeMap<String, Vec<CanonicalRecord>> {
    let mut partitions: BTreeMap<String, Vec<CanonicalRecord>> = BTreeMap::new();
    for record in records {
        partitions.entry(year_key(&record)).or_default().push(record);
    }
    partitions
}

/// Writes each year's dataset in full, replacing any earlier file for that
/// year, and returns the summary entry each file contributes.
pub fn write_year_files(
    output_dir: &Path,
    partitions: &BTreeMap<String, Vec<CanonicalRecord>>,
    measure: Measure,
) -> Result<Vec<YearWrite>> {
    let mut writes = Vec::with_capacity(partitions.len());
    for (year, records) in partitions {
        let file = format!("{year}.json");
        let path = output_dir.join(&file);
        write_json_compact(&path, records)?;

        let total = records.iter().map(|record| measure.of(record)).sum::<f64>();
        writes.push(YearWrite {
            path,
            entry: SummaryEntry {
                year: year.clone(),
                total: round2(total),
                record_count: Some(records.len()),
                file,
            },
        });
    }
    Ok(writes)
}

/// Per-flow rollup of `{year -> total, file}`, newest year first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryIndex {
    entries: Vec<SummaryEntry>,
}

impl SummaryIndex {
    /// Loads an existing index. A missing file is an empty index; an
    /// unreadable one is logged and rebuilt.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        match serde_json::from_slice::<Vec<SummaryEntry>>(&raw) {
            Ok(entries) => {
                let mut index = Self { entries };
                index.sort();
                Ok(index)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "summary index unreadable; rebuilding");
                Ok(Self::default())
            }
        }
    }

    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    /// Drops any entry for the same year, inserts `entry`, keeps the order.
    pub fn upsert(&mut self, entry: SummaryEntry) {
        self.entries.retain(|existing| existing.year != entry.year);
        self.entries.push(entry);
        self.sort();
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_pretty(path, &self.entries)
    }

    fn sort(&mut self) {
        self.entries
            .sort_by_key(|entry| Reverse(entry.year.clone()));
    }
}
