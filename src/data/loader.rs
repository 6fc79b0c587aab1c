use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde::Serialize;

use super::filter::{extract_readings, LoadReport};
use super::layout::{parse_sheet, HeaderLayout, RecordTable, SheetLayout};
use super::model::{Cell, RawReading};
use crate::error::{EchemError, Result};

const RECORD_HEADER: &str = "Record";

// ---------------------------------------------------------------------------
// Loaded data
// ---------------------------------------------------------------------------

/// Where the readings came from inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceLayout {
    Csv,
    Workbook {
        sheet: SheetLayout,
        header: HeaderLayout,
    },
}

/// Tidy readings plus an account of the rows that were dropped.
#[derive(Debug, Clone)]
pub struct CyclerData {
    pub readings: Vec<RawReading>,
    pub report: LoadReport,
    pub layout: SourceLayout,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a cycler export.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`          – first header must be `Record`
/// * `.xlsx` / `.xls` – one sheet, or a sheet whose name contains "record";
///   optionally split into one column group per cycle
pub fn load_file(path: &Path) -> Result<CyclerData> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let data = match ext.as_str() {
        "csv" => load_csv_reader(std::fs::File::open(path)?)?,
        "xlsx" | "xls" => load_workbook(path)?,
        other => return Err(EchemError::UnsupportedFormat(format!(".{other}"))),
    };

    log::info!(
        "loaded {} readings from {} ({} rows dropped)",
        data.readings.len(),
        path.display(),
        data.report.rows_dropped()
    );
    Ok(data)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Load a CSV export from any byte stream.
///
/// The header row must start with `Record`; nothing past the header is read
/// otherwise.
pub fn load_csv_reader<R: Read>(reader: R) -> Result<CyclerData> {
    let table = read_csv_table(reader)?;
    let (readings, report) = extract_readings(&table)?;
    Ok(CyclerData {
        readings,
        report,
        layout: SourceLayout::Csv,
    })
}

fn read_csv_table<R: Read>(reader: R) -> Result<RecordTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    match headers.first() {
        Some(first) if first == RECORD_HEADER => {}
        first => {
            return Err(EchemError::MalformedFile(format!(
                "CSV first column must be '{RECORD_HEADER}', found {first:?}"
            )))
        }
    }

    let width = headers.len();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(
            (0..width)
                .map(|j| Cell::parse(record.get(j).unwrap_or("")))
                .collect(),
        );
    }

    Ok(RecordTable { headers, rows })
}

// ---------------------------------------------------------------------------
// Workbook loader
// ---------------------------------------------------------------------------

fn load_workbook(path: &Path) -> Result<CyclerData> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names();

    let sheet_layout = SheetLayout::resolve(&sheet_names);
    let index = sheet_layout.sheet_index(&sheet_names)?;
    log::debug!(
        "workbook sheets {sheet_names:?}: {sheet_layout:?}, using '{}'",
        sheet_names[index]
    );

    let range = workbook.worksheet_range(&sheet_names[index])?;
    let cells: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();

    let (table, header) = parse_sheet(&cells)?;
    let (readings, report) = extract_readings(&table)?;
    Ok(CyclerData {
        readings,
        report,
        layout: SourceLayout::Workbook {
            sheet: sheet_layout,
            header,
        },
    })
}

/// Spreadsheet cell → [`Cell`]. Text stays text even if it looks numeric,
/// which is how placeholder currents are told apart from measurements.
fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.trim().to_string()),
        Data::Empty => Cell::Empty,
        #[allow(unreachable_patterns)]
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Record,Cycle,Current/mA,Capacity/mAh,SpeCap/mAh/g,Voltage/V,dQ/dV/mAh/V";

    #[test]
    fn csv_without_record_header_is_malformed() {
        let text = "Index,Current/mA\n1,0.5\n";
        assert!(matches!(
            load_csv_reader(text.as_bytes()),
            Err(EchemError::MalformedFile(_))
        ));
    }

    #[test]
    fn csv_rows_are_typed_and_placeholders_dropped() {
        let text = format!(
            "{HEADER}\n\
             1,1,-0.5,0.01,10.0,1.2,-3.0\n\
             2,1,-,0.02,20.0,1.1,-3.5\n\
             3,1,,0.03,30.0,1.0,-4.0\n\
             4,1,0,0.03,30.0,1.0,0\n"
        );
        let data = load_csv_reader(text.as_bytes()).unwrap();
        assert_eq!(data.layout, SourceLayout::Csv);
        assert_eq!(data.readings.len(), 2);
        assert_eq!(data.report.dropped_non_numeric_current, 1);
        assert_eq!(data.report.dropped_missing_current, 1);
        assert_eq!(data.readings[0].voltage, 1.2);
        assert_eq!(data.readings[1].record_index, 3);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        match load_file(Path::new("cell_01.txt")) {
            Err(EchemError::UnsupportedFormat(ext)) => assert_eq!(ext, ".txt"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn spreadsheet_text_is_not_coerced() {
        assert_eq!(cell_from_data(&Data::String("0.5".into())), Cell::Text("0.5".into()));
        assert_eq!(cell_from_data(&Data::String(" ".into())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Int(3)), Cell::Number(3.0));
    }
}
