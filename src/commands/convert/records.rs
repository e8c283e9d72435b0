use anyhow::Result;
use tracing::debug;

use crate::model::{CanonicalRecord, Classification};

use super::code::{classify_sector, normalize_code};
use super::describe::DescriptionCleaner;
use super::flow::{ClassificationStrategy, Field, FlowConfig};
use super::header::locate_header;
use super::period::PeriodParser;
use super::schema::{SchemaMap, found_columns, map_schema};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSheet {
    pub records: Vec<CanonicalRecord>,
    pub dropped_rows: usize,
}

/// Structural verdict on one sheet, before any output is written.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetParse {
    Parsed(ParsedSheet),
    Rejected {
        reason: String,
        found_columns: Vec<String>,
    },
}

pub struct RowTransformer {
    periods: PeriodParser,
    descriptions: DescriptionCleaner,
}

impl RowTransformer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            periods: PeriodParser::new()?,
            descriptions: DescriptionCleaner::new()?,
        })
    }

    pub fn parse_sheet(
        &self,
        rows: &[Vec<String>],
        flow: &FlowConfig,
        header_scan_rows: usize,
    ) -> SheetParse {
        let Some(header_index) = locate_header(rows, header_scan_rows, flow) else {
            return SheetParse::Rejected {
                reason: format!("header row not found within first {header_scan_rows} rows"),
                found_columns: Vec::new(),
            };
        };

        let labels = &rows[header_index];
        let schema = map_schema(labels, flow.columns);
        for (field, binding) in schema.bindings() {
            debug!(
                field = field.as_str(),
                column = %binding.label,
                index = binding.index,
                "mapped column"
            );
        }

        let missing = schema.missing(flow.required);
        if !missing.is_empty() {
            let names = missing
                .iter()
                .map(|field| field.as_str())
                .collect::<Vec<&str>>()
                .join(", ");
            return SheetParse::Rejected {
                reason: format!("missing required columns: {names}"),
                found_columns: found_columns(labels),
            };
        }

        let mut records = Vec::new();
        let mut dropped_rows = 0_usize;
        for row in &rows[header_index + 1..] {
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            match self.build_record(row, &schema, flow) {
                Some(record) => records.push(record),
                None => dropped_rows += 1,
            }
        }

        SheetParse::Parsed(ParsedSheet {
            records,
            dropped_rows,
        })
    }

    /// `None` when the row has no usable period or code.
    fn build_record(
        &self,
        row: &[String],
        schema: &SchemaMap,
        flow: &FlowConfig,
    ) -> Option<CanonicalRecord> {
        let date = self.periods.parse(schema.value(Field::Period, row))?;

        let raw_code = schema.value(Field::Code, row);
        if raw_code.is_empty() {
            return None;
        }
        let code = normalize_code(raw_code);

        let label = self
            .descriptions
            .clean(schema.value(Field::Description, row), flow.cleaning);

        let classification = match flow.classification {
            ClassificationStrategy::SectorLookup => Classification::Sector {
                sector: classify_sector(&code).to_string(),
            },
            ClassificationStrategy::GroupPassthrough => Classification::EndUse {
                group_code: schema.value(Field::GroupCode, row).to_string(),
                group: schema.value(Field::GroupName, row).to_string(),
                subgroup_code: schema.value(Field::SubgroupCode, row).to_string(),
                subgroup: schema.value(Field::SubgroupName, row).to_string(),
            },
        };

        Some(CanonicalRecord {
            date,
            code,
            label,
            classification,
            value_fob: parse_measure(schema.value(Field::Fob, row)),
            value_cif: parse_measure(schema.value(Field::Cif, row)),
            weight: parse_measure(schema.value(Field::Weight, row)),
        })
    }
}

/// Unparsable or non-finite measures count as zero; published datasets
/// already rely on that lenience.
pub fn parse_measure(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}
