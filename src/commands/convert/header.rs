use std::collections::HashSet;

use super::flow::{Field, FlowConfig};
use super::text::normalize_text;

/// Finds the first row, within `max_rows`, holding both a period label and a
/// classification-code label for the flow. Providers prepend a variable
/// number of title rows, so the position has to be sniffed.
pub fn locate_header(rows: &[Vec<String>], max_rows: usize, flow: &FlowConfig) -> Option<usize> {
    let period_anchors = flow.spellings(Field::Period);
    let code_anchors = flow.spellings(Field::Code);

    rows.iter().take(max_rows).position(|row| {
        let cells = row
            .iter()
            .map(|cell| normalize_text(cell))
            .filter(|cell| !cell.is_empty())
            .collect::<HashSet<String>>();

        period_anchors.iter().any(|anchor| cells.contains(anchor))
            && code_anchors.iter().any(|anchor| cells.contains(anchor))
    })
}
