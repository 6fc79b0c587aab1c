use serde::Serialize;

use super::model::Cell;
use crate::error::{EchemError, Result};

/// Field group that only appears on the final cycle of split exports.
const FINAL_CYCLE_ONLY_FIELD: &str = "EnergyD";
const RECORD_FIELD: &str = "Record";

// ---------------------------------------------------------------------------
// Layout variants, resolved once per file
// ---------------------------------------------------------------------------

/// Which sheet of a workbook holds the readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SheetLayout {
    /// Exactly one sheet: use it.
    SingleSheet,
    /// Several sheets; `index` names the first one matching "record".
    MultiSheetWithRecord { index: usize },
    /// Several sheets and none of them is a record sheet.
    MultiSheetNoRecord,
}

impl SheetLayout {
    pub fn resolve(sheet_names: &[String]) -> Self {
        if sheet_names.len() == 1 {
            return SheetLayout::SingleSheet;
        }
        match sheet_names
            .iter()
            .position(|name| name.to_lowercase().contains("record"))
        {
            Some(index) => SheetLayout::MultiSheetWithRecord { index },
            None => SheetLayout::MultiSheetNoRecord,
        }
    }

    /// Index of the sheet to parse, or `NoRecordSheet`.
    pub fn sheet_index(&self, sheet_names: &[String]) -> Result<usize> {
        match self {
            SheetLayout::SingleSheet => Ok(0),
            SheetLayout::MultiSheetWithRecord { index } => Ok(*index),
            SheetLayout::MultiSheetNoRecord => Err(EchemError::NoRecordSheet {
                sheets: sheet_names.to_vec(),
            }),
        }
    }
}

/// How column headers are laid out on the selected sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeaderLayout {
    /// One header row of field names.
    Flat,
    /// Two header rows: cycle id on top, field name below, one column group
    /// per cycle.
    CycleSplit,
}

impl HeaderLayout {
    pub fn detect(first_header: &str) -> Self {
        if first_header.contains("Cycle") {
            HeaderLayout::CycleSplit
        } else {
            HeaderLayout::Flat
        }
    }
}

// ---------------------------------------------------------------------------
// RecordTable – header + rows, before typing into readings
// ---------------------------------------------------------------------------

/// A rectangular table of loosely-typed cells with a single header row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RecordTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a sheet grid (first row = header) into a tidy [`RecordTable`],
/// unfolding cycle-split layouts.
pub fn parse_sheet(cells: &[Vec<Cell>]) -> Result<(RecordTable, HeaderLayout)> {
    let first_header = cells
        .first()
        .and_then(|row| row.first())
        .and_then(Cell::as_text)
        .ok_or_else(|| EchemError::MalformedFile("sheet has no header row".into()))?;

    let layout = HeaderLayout::detect(&first_header);
    log::debug!("sheet header layout: {layout:?} (first header '{first_header}')");

    let table = match layout {
        HeaderLayout::Flat => parse_flat(cells),
        HeaderLayout::CycleSplit => parse_cycle_split(cells)?,
    };
    Ok((table, layout))
}

fn header_text(cell: Option<&Cell>) -> String {
    cell.and_then(Cell::as_text).unwrap_or_default().trim().to_string()
}

fn parse_flat(cells: &[Vec<Cell>]) -> RecordTable {
    let headers: Vec<String> = cells[0].iter().map(|c| header_text(Some(c))).collect();
    let width = headers.len();
    let rows = cells[1..]
        .iter()
        .map(|row| {
            (0..width)
                .map(|j| row.get(j).cloned().unwrap_or(Cell::Empty))
                .collect()
        })
        .collect();
    RecordTable { headers, rows }
}

/// One cycle's column group in a split sheet.
struct CycleBlock {
    cycle_id: String,
    /// (source column, field name)
    columns: Vec<(usize, String)>,
}

fn parse_cycle_split(cells: &[Vec<Cell>]) -> Result<RecordTable> {
    if cells.len() < 2 {
        return Err(EchemError::MalformedFile(
            "cycle-split sheet needs two header rows".into(),
        ));
    }
    let top = &cells[0];
    let fields = &cells[1];
    let width = top.len().max(fields.len());

    // Merged cycle-id cells only carry text in their first column.
    let mut blocks: Vec<CycleBlock> = Vec::new();
    let mut current_cycle = String::new();
    for j in 0..width {
        let id = header_text(top.get(j));
        if !id.is_empty() {
            current_cycle = id;
        }
        let field = header_text(fields.get(j));
        if field.is_empty() || field == FINAL_CYCLE_ONLY_FIELD {
            continue;
        }
        match blocks.iter_mut().find(|b| b.cycle_id == current_cycle) {
            Some(block) => block.columns.push((j, field)),
            None => blocks.push(CycleBlock {
                cycle_id: current_cycle.clone(),
                columns: vec![(j, field)],
            }),
        }
    }

    // Union of field names across cycles, first-appearance order.
    let mut headers: Vec<String> = Vec::new();
    for block in &blocks {
        for (_, field) in &block.columns {
            if !headers.contains(field) {
                headers.push(field.clone());
            }
        }
    }

    let mut rows = Vec::new();
    for block in &blocks {
        let before = rows.len();
        for source in &cells[2..] {
            let values: Vec<(&str, Cell)> = block
                .columns
                .iter()
                .map(|(j, field)| {
                    (field.as_str(), source.get(*j).cloned().unwrap_or(Cell::Empty))
                })
                .collect();

            if values.iter().all(|(_, c)| c.is_empty()) {
                continue;
            }
            if values
                .iter()
                .filter(|(field, _)| *field != RECORD_FIELD)
                .all(|(_, c)| c.is_empty())
            {
                continue;
            }

            let mut row = vec![Cell::Empty; headers.len()];
            for (field, cell) in values {
                if let Some(k) = headers.iter().position(|h| h == field) {
                    row[k] = cell;
                }
            }
            rows.push(row);
        }
        log::debug!(
            "cycle block '{}': {} rows",
            block.cycle_id,
            rows.len() - before
        );
    }

    Ok(RecordTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn num(v: f64) -> Cell {
        Cell::Number(v)
    }

    #[test]
    fn record_sheet_is_selected_among_several() {
        let sheets = names(&["Summary", "Record1"]);
        let layout = SheetLayout::resolve(&sheets);
        assert_eq!(layout, SheetLayout::MultiSheetWithRecord { index: 1 });
        assert_eq!(layout.sheet_index(&sheets).unwrap(), 1);
    }

    #[test]
    fn record_match_is_case_insensitive() {
        let sheets = names(&["Info", "RECORD-export", "record"]);
        assert_eq!(
            SheetLayout::resolve(&sheets),
            SheetLayout::MultiSheetWithRecord { index: 1 }
        );
    }

    #[test]
    fn missing_record_sheet_is_an_error() {
        let sheets = names(&["Summary", "Data"]);
        let layout = SheetLayout::resolve(&sheets);
        assert_eq!(layout, SheetLayout::MultiSheetNoRecord);
        match layout.sheet_index(&sheets) {
            Err(EchemError::NoRecordSheet { sheets }) => assert_eq!(sheets.len(), 2),
            other => panic!("expected NoRecordSheet, got {other:?}"),
        }
    }

    #[test]
    fn single_sheet_is_used_whatever_its_name() {
        let sheets = names(&["Data"]);
        assert_eq!(SheetLayout::resolve(&sheets), SheetLayout::SingleSheet);
        assert_eq!(SheetLayout::resolve(&sheets).sheet_index(&sheets).unwrap(), 0);
    }

    #[test]
    fn flat_sheet_pads_short_rows() {
        let cells = vec![
            vec![text("Record"), text("Current/mA"), text("Voltage/V")],
            vec![num(1.0), num(0.5)],
        ];
        let (table, layout) = parse_sheet(&cells).unwrap();
        assert_eq!(layout, HeaderLayout::Flat);
        assert_eq!(table.headers, vec!["Record", "Current/mA", "Voltage/V"]);
        assert_eq!(table.rows[0][2], Cell::Empty);
    }

    #[test]
    fn cycle_split_sheet_is_unfolded_in_cycle_order() {
        let cells = vec![
            vec![
                text("Cycle 1"),
                Cell::Empty,
                Cell::Empty,
                text("Cycle 2"),
                Cell::Empty,
                Cell::Empty,
            ],
            vec![
                text("Record"),
                text("Current/mA"),
                text("Voltage/V"),
                text("Record"),
                text("Current/mA"),
                text("EnergyD"),
            ],
            vec![num(1.0), num(-0.1), num(1.2), num(10.0), num(0.1), num(5.0)],
            vec![num(2.0), num(-0.1), num(1.1), num(11.0), Cell::Empty, num(5.0)],
            vec![num(3.0), Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty],
            vec![Cell::Empty, Cell::Empty, Cell::Empty, num(12.0), num(0.2), Cell::Empty],
        ];
        let (table, layout) = parse_sheet(&cells).unwrap();
        assert_eq!(layout, HeaderLayout::CycleSplit);
        assert_eq!(table.headers, vec!["Record", "Current/mA", "Voltage/V"]);

        let records: Vec<Option<f64>> = table.rows.iter().map(|r| r[0].as_f64()).collect();
        // Cycle 1 keeps rows 1 and 2 (row 3 only has Record); cycle 2 keeps
        // rows 10 and 12 (row 11 only has Record once EnergyD is dropped).
        assert_eq!(records, vec![Some(1.0), Some(2.0), Some(10.0), Some(12.0)]);
        // Cycle 2 has no voltage column.
        assert_eq!(table.rows[2][2], Cell::Empty);
    }

    #[test]
    fn empty_sheet_is_malformed() {
        assert!(matches!(parse_sheet(&[]), Err(EchemError::MalformedFile(_))));
    }
}
