use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{error, info, warn};

use crate::commands::inventory::{discover_candidates, file_name};
use crate::model::{FileOutcome, FileStatus, RunReport, SummaryEntry};
use crate::util::ensure_directory;

use super::flow::FlowConfig;
use super::partition::{SUMMARY_FILE_NAME, SummaryIndex, partition_by_year, write_year_files};
use super::records::{RowTransformer, SheetParse};
use super::workbook::SheetReader;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_dir: PathBuf,
    pub output_root: PathBuf,
    pub header_scan_rows: usize,
    pub extension: String,
}

/// Receives one notification per attempted file.
pub trait ProgressObserver {
    fn file_finished(&mut self, index: usize, total: usize, outcome: &FileOutcome);
}

#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn file_finished(&mut self, index: usize, total: usize, outcome: &FileOutcome) {
        info!(
            file = %outcome.file,
            done = index + 1,
            total,
            processed = outcome.is_processed(),
            "file finished"
        );
    }
}

pub struct PipelineOrchestrator<R: SheetReader> {
    config: PipelineConfig,
    reader: R,
    transformer: RowTransformer,
}

impl<R: SheetReader> PipelineOrchestrator<R> {
    pub fn new(config: PipelineConfig, reader: R) -> Result<Self> {
        Ok(Self {
            config,
            reader,
            transformer: RowTransformer::new()?,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one flow over the source directory.
    ///
    /// `Err` is reserved for configuration failures (missing directory, no
    /// candidate files); nothing is written in that case. Every per-file
    /// failure is recorded in the report instead, as is a failure to update
    /// the summary index after year files were written. The run succeeds
    /// when at least one file was processed and the index was written.
    pub fn run(
        &self,
        flow: &FlowConfig,
        observer: &mut dyn ProgressObserver,
    ) -> Result<RunReport> {
        let candidates =
            discover_candidates(&self.config.source_dir, &self.config.extension, flow.filter)?;
        if candidates.is_empty() {
            bail!(
                "no .{} files for flow '{}' found in {}",
                self.config.extension,
                flow.name(),
                self.config.source_dir.display()
            );
        }

        let output_dir = flow.output_dir(&self.config.output_root);
        info!(
            flow = flow.name(),
            source = %self.config.source_dir.display(),
            output = %output_dir.display(),
            candidates = candidates.len(),
            "starting conversion"
        );

        let total = candidates.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut run_entries: BTreeMap<String, (String, SummaryEntry)> = BTreeMap::new();

        for (index, path) in candidates.iter().enumerate() {
            let file = file_name(path).unwrap_or_else(|_| path.display().to_string());

            let status = match self.process_file(path, flow, &output_dir) {
                Ok(FileResult::Processed {
                    entries,
                    records,
                    dropped_rows,
                }) => {
                    let years = entries
                        .iter()
                        .map(|entry| entry.year.clone())
                        .collect::<Vec<String>>();
                    for entry in entries {
                        if let Some((previous, _)) = run_entries.get(&entry.year) {
                            warn!(
                                year = %entry.year,
                                previous = %previous,
                                file = %file,
                                "year already written in this run; replacing"
                            );
                        }
                        run_entries.insert(entry.year.clone(), (file.clone(), entry));
                    }
                    FileStatus::Processed {
                        records,
                        dropped_rows,
                        years,
                    }
                }
                Ok(FileResult::Skipped {
                    reason,
                    found_columns,
                }) => {
                    warn!(
                        file = %file,
                        reason = %reason,
                        found_columns = ?found_columns,
                        "skipping file"
                    );
                    FileStatus::Skipped {
                        reason,
                        found_columns,
                    }
                }
                Err(err) => {
                    let detail = format!("{err:#}");
                    error!(file = %file, error = %detail, "file failed");
                    FileStatus::Errored { detail }
                }
            };

            let outcome = FileOutcome { file, status };
            observer.file_finished(index, total, &outcome);
            outcomes.push(outcome);
        }

        let processed_count = outcomes.iter().filter(|outcome| outcome.is_processed()).count();
        let years_written = run_entries.keys().rev().cloned().collect::<Vec<String>>();

        let mut summary_error = None;
        if processed_count > 0 {
            let summary_path = output_dir.join(SUMMARY_FILE_NAME);
            let entries = run_entries.into_values().map(|(_, entry)| entry);
            match update_summary(&summary_path, entries) {
                Ok(years) => info!(
                    path = %summary_path.display(),
                    years,
                    "wrote summary index"
                ),
                Err(err) => {
                    let detail = format!("{err:#}");
                    error!(
                        path = %summary_path.display(),
                        error = %detail,
                        "summary index not updated"
                    );
                    summary_error = Some(detail);
                }
            }
        } else {
            warn!(flow = flow.name(), "no files processed; summary index left untouched");
        }

        info!(
            flow = flow.name(),
            processed = processed_count,
            total,
            "conversion finished"
        );

        Ok(RunReport {
            flow: flow.name().to_string(),
            success: processed_count > 0 && summary_error.is_none(),
            configuration_error: None,
            summary_error,
            candidate_count: total,
            processed_count,
            output_directory: output_dir.display().to_string(),
            years_written,
            outcomes,
        })
    }

    fn process_file(&self, path: &Path, flow: &FlowConfig, output_dir: &Path) -> Result<FileResult> {
        let name = file_name(path)?;
        info!(file = %name, "processing");

        let rows = self.reader.read_rows(path)?;
        let parsed = match self
            .transformer
            .parse_sheet(&rows, flow, self.config.header_scan_rows)
        {
            SheetParse::Parsed(parsed) => parsed,
            SheetParse::Rejected {
                reason,
                found_columns,
            } => {
                return Ok(FileResult::Skipped {
                    reason,
                    found_columns,
                });
            }
        };

        let records = parsed.records.len();
        if parsed.dropped_rows > 0 {
            info!(file = %name, dropped = parsed.dropped_rows, "dropped rows without period or code");
        }
        if records == 0 {
            return Ok(FileResult::Skipped {
                reason: "no rows with a recognizable period".to_string(),
                found_columns: Vec::new(),
            });
        }

        ensure_directory(output_dir)?;
        let partitions = partition_by_year(parsed.records);
        let writes = write_year_files(output_dir, &partitions, flow.primary_measure)?;
        for write in &writes {
            info!(
                path = %write.path.display(),
                records = write.entry.record_count.unwrap_or_default(),
                total = write.entry.total,
                "wrote year file"
            );
        }

        Ok(FileResult::Processed {
            entries: writes.into_iter().map(|write| write.entry).collect(),
            records,
            dropped_rows: parsed.dropped_rows,
        })
    }
}

/// Folds this run's entries into the on-disk index; returns the year count.
fn update_summary(
    summary_path: &Path,
    entries: impl IntoIterator<Item = SummaryEntry>,
) -> Result<usize> {
    let mut index = SummaryIndex::load(summary_path)?;
    for entry in entries {
        index.upsert(entry);
    }
    index.write(summary_path)?;
    Ok(index.entries().len())
}

enum FileResult {
    Processed {
        entries: Vec<SummaryEntry>,
        records: usize,
        dropped_rows: usize,
    },
    Skipped {
        reason: String,
        found_columns: Vec<String>,
    },
}
