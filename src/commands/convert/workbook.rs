use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};

/// Source of raw grid rows for one spreadsheet file.
pub trait SheetReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<Vec<String>>>;
}

/// Reads the first worksheet of an xlsx/xls/ods workbook.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineSheetReader;

impl SheetReader for CalamineSheetReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<Vec<String>>> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("failed to open workbook: {}", path.display()))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .with_context(|| format!("workbook has no sheets: {}", path.display()))?;

        let range = workbook.worksheet_range(&sheet_name).with_context(|| {
            format!("failed to read sheet '{sheet_name}' in {}", path.display())
        })?;

        Ok(range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.clone(),
        Data::Float(value) => {
            if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
                format!("{value:.0}")
            } else {
                value.to_string()
            }
        }
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => value
            .as_datetime()
            .map(|datetime| datetime.format("%Y / %m").to_string())
            .unwrap_or_else(|| value.to_string()),
        Data::DateTimeIso(value) | Data::DurationIso(value) => value.clone(),
        Data::Error(error) => format!("#ERROR:{error:?}"),
    }
}
