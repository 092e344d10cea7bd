//! In-process spreadsheet conversion
//!
//! - Forward: `calamine` reads the first worksheet of .xlsx/.xls/.ods → CSV
//! - Reverse: CSV → .xlsx with `rust_xlsxwriter`
//!
//! Only cell values survive. Writing .xls or .ods is not supported; use an
//! external tool for those.

use super::{ConversionService, TEMP_EXTENSION};
use crate::error::ConversionError;
use crate::separator::Separator;
use crate::table::Table;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::Path;

const TOOL_NAME: &str = "builtin";

/// Conversion backed by calamine and rust_xlsxwriter
#[derive(Debug, Clone, Copy, Default)]
pub struct Builtin;

impl ConversionService for Builtin {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn convert(&self, input: &Path, output: &Path, ext: &str) -> Result<(), ConversionError> {
        match ext.to_ascii_lowercase().as_str() {
            TEMP_EXTENSION => import_first_sheet(input, output),
            "xlsx" => export_xlsx(input, output),
            other => Err(ConversionError::Unsupported {
                tool: TOOL_NAME.to_string(),
                detail: format!("writing .{} files (only .xlsx and .csv)", other),
            }),
        }
    }
}

fn failed(detail: String) -> ConversionError {
    ConversionError::ToolFailed {
        tool: TOOL_NAME.to_string(),
        detail,
    }
}

/// Read the first worksheet and write it as CSV
fn import_first_sheet(input: &Path, output: &Path) -> Result<(), ConversionError> {
    let mut workbook = open_workbook_auto(input)
        .map_err(|e| failed(format!("failed to open {}: {}", input.display(), e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| failed(format!("{} has no worksheets", input.display())))?
        .map_err(|e| failed(format!("failed to read first worksheet: {}", e)))?;

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(output)
        .map_err(|e| failed(format!("failed to create {}: {}", output.display(), e)))?;

    // calamine ranges start at the first used cell; keep the sheet's origin
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let width = range.width() + first_col as usize;
    let blank_row = vec![String::new(); width.max(1)];
    for _ in 0..first_row {
        writer
            .write_record(&blank_row)
            .map_err(|e| failed(e.to_string()))?;
    }

    for row in range.rows() {
        let mut record: Vec<String> = vec![String::new(); first_col as usize];
        record.extend(row.iter().map(cell_text));
        writer
            .write_record(&record)
            .map_err(|e| failed(e.to_string()))?;
    }

    writer.flush().map_err(|e| failed(e.to_string()))?;
    Ok(())
}

/// Read CSV and write a single-sheet .xlsx; blank lines stay blank rows
fn export_xlsx(input: &Path, output: &Path) -> Result<(), ConversionError> {
    let content = fs::read_to_string(input)
        .map_err(|e| failed(format!("failed to open {}: {}", input.display(), e)))?;
    let table = Table::parse(&content, Separator::Comma)
        .map_err(|e| failed(format!("invalid CSV: {}", e)))?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (row_idx, record) in table.rows().iter().enumerate() {
        let row = u32::try_from(row_idx).map_err(|_| failed("too many rows".to_string()))?;

        for (col_idx, value) in record.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col =
                u16::try_from(col_idx).map_err(|_| failed("too many columns".to_string()))?;
            let written = match canonical_number(value) {
                Some(number) => worksheet.write_number(row, col, number).map(|_| ()),
                None => worksheet.write_string(row, col, value).map(|_| ()),
            };
            written.map_err(|e| failed(format!("failed to write cell: {}", e)))?;
        }
    }

    workbook
        .save(output)
        .map_err(|e| failed(format!("failed to save {}: {}", output.display(), e)))?;
    Ok(())
}

/// Text for a spreadsheet cell
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

/// Format a number the way it would be typed, without a trailing `.0`
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A number only when formatting it again gives back the same text, so
/// values like `007` or `1.50` stay strings
fn canonical_number(text: &str) -> Option<f64> {
    let number: f64 = text.parse().ok()?;
    (number.is_finite() && format_number(number) == text).then_some(number)
}
