//! Spreadsheet -> per-year JSON conversion for the trade flows.

mod code;
mod describe;
mod flow;
mod header;
mod partition;
mod period;
mod pipeline;
mod records;
mod run;
mod schema;
#[cfg(test)]
mod tests;
mod text;
mod workbook;

pub use flow::{FileFilter, FlowConfig};
pub use partition::{SUMMARY_FILE_NAME, SummaryIndex};
pub use run::run;
