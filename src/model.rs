use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One cleaned spreadsheet row, as written to a `<year>.json` file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub date: NaiveDate,
    pub code: String,
    pub label: String,
    #[serde(flatten)]
    pub classification: Classification,
    pub value_fob: f64,
    pub value_cif: f64,
    pub weight: f64,
}

/// Flow-dependent classification columns. Flattened into the record so the
/// subheading flows emit `sector` and the end-use flow emits the group keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Classification {
    Sector {
        sector: String,
    },
    EndUse {
        group_code: String,
        group: String,
        subgroup_code: String,
        subgroup: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub year: String,
    #[serde(alias = "total_cif", alias = "total_fob")]
    pub total: f64,
    #[serde(
        default,
        alias = "records",
        skip_serializing_if = "Option::is_none"
    )]
    pub record_count: Option<usize>,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Processed {
        records: usize,
        dropped_rows: usize,
        years: Vec<String>,
    },
    Skipped {
        reason: String,
        found_columns: Vec<String>,
    },
    Errored {
        detail: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub file: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self.status, FileStatus::Processed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub flow: String,
    pub success: bool,
    pub configuration_error: Option<String>,
    pub summary_error: Option<String>,
    pub candidate_count: usize,
    pub processed_count: usize,
    pub output_directory: String,
    pub years_written: Vec<String>,
    pub outcomes: Vec<FileOutcome>,
}

impl RunReport {
    pub fn configuration_failure(flow: &str, output_directory: String, error: String) -> Self {
        Self {
            flow: flow.to_string(),
            success: false,
            configuration_error: Some(error),
            summary_error: None,
            candidate_count: 0,
            processed_count: 0,
            output_directory,
            years_written: Vec::new(),
            outcomes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub source_directory: String,
    pub output_root: String,
    pub success: bool,
    pub published: Option<bool>,
    pub flows: Vec<RunReport>,
}

/// Loose view of a run manifest used by `status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRunSnapshot {
    pub run_id: Option<String>,
    pub updated_at: Option<String>,
    pub success: Option<bool>,
    pub published: Option<bool>,
    #[serde(default)]
    pub flows: Vec<FlowRunSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowRunSnapshot {
    pub flow: Option<String>,
    pub success: Option<bool>,
    pub processed_count: Option<usize>,
    pub candidate_count: Option<usize>,
    pub configuration_error: Option<String>,
    pub summary_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileEntry {
    pub filename: String,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub flow: String,
    pub source_directory: String,
    pub file_count: usize,
    pub files: Vec<SourceFileEntry>,
}
