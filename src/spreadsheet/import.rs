//! xlsx rows to new tasks.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, ExcelDateTime, Reader, Xlsx};

use super::{
    CONTROLLER, CREATED_AT, DEADLINE, FEEDBACK, NOTES, STATUS, STORE, STORE_MANAGER, TITLE,
    VALIDATION, VISIT_DATE,
};
use crate::dates::{
    day_month_year_to_iso, excel_date_to_iso, excel_serial_to_iso, now_rfc3339, today_iso,
};
use crate::db::TaskStore;
use crate::errors::AppError;
use crate::models::{CreateTaskRequest, Identity, TaskStatus, Validation};

/// A cell as far as the import cares.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    /// A cell formatted as a date or duration
    Date(ExcelDateTime),
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                CellValue::Text(s.clone())
            }
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::DateTime(dt) => CellValue::Date(*dt),
            Data::Bool(b) => CellValue::Text(b.to_string()),
        }
    }
}

impl CellValue {
    /// Trimmed text of the cell. Whole numbers lose their fraction.
    pub fn text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Date(dt) => {
                excel_date_to_iso(dt).unwrap_or_else(|| dt.as_f64().to_string())
            }
        }
    }
}

/// One data row keyed by header text.
pub type SheetRow = HashMap<String, CellValue>;

fn import_error(message: impl Into<String>, imported: usize) -> AppError {
    AppError::Import {
        message: message.into(),
        imported,
    }
}

/// Read the first sheet. The first row holds the headers; fully empty rows are skipped.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<SheetRow>, AppError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| import_error("Le fichier ne contient aucune feuille", 0))??;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| CellValue::from(cell).text())
        .collect();

    let parsed: Vec<SheetRow> = rows
        .map(|row| {
            headers
                .iter()
                .zip(row.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), CellValue::from(cell)))
                .collect::<SheetRow>()
        })
        .filter(|row| row.values().any(|cell| !cell.text().is_empty()))
        .collect();

    tracing::debug!(rows = parsed.len(), columns = headers.len(), "Sheet read");
    Ok(parsed)
}

/// Normalize a date cell to `YYYY-MM-DD` text, or empty when it is not a date.
///
/// Text containing `-` is kept as is, `D/M/Y` text is reordered, date cells are
/// decoded by calamine and bare numbers are read as 1900-system serials.
pub fn normalize_date(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Number(serial) => excel_serial_to_iso(*serial).unwrap_or_default(),
        CellValue::Date(dt) => excel_date_to_iso(dt).unwrap_or_default(),
        CellValue::Text(raw) => {
            let raw = raw.trim();
            if raw.contains('-') {
                raw.to_string()
            } else if raw.contains('/') {
                day_month_year_to_iso(raw).unwrap_or_default()
            } else {
                String::new()
            }
        }
    }
}

static EMPTY: CellValue = CellValue::Empty;

fn cell<'a>(row: &'a SheetRow, header: &str) -> &'a CellValue {
    row.get(header).unwrap_or(&EMPTY)
}

fn optional_text(row: &SheetRow, header: &str) -> Option<String> {
    let text = cell(row, header).text();
    (!text.is_empty()).then_some(text)
}

fn optional_date(row: &SheetRow, header: &str) -> Option<String> {
    let date = normalize_date(cell(row, header));
    (!date.is_empty()).then_some(date)
}

/// Map one row to a create request. Unknown status or validation labels are errors.
pub fn row_to_request(row: &SheetRow) -> Result<CreateTaskRequest, String> {
    let status = optional_text(row, STATUS)
        .map(|label| label.parse::<TaskStatus>())
        .transpose()?;
    let validation = optional_text(row, VALIDATION)
        .map(|label| label.parse::<Validation>())
        .transpose()?;

    Ok(CreateTaskRequest {
        store: optional_text(row, STORE),
        store_manager: optional_text(row, STORE_MANAGER),
        controller: optional_text(row, CONTROLLER),
        title: optional_text(row, TITLE),
        notes: optional_text(row, NOTES),
        feedback: optional_text(row, FEEDBACK),
        status,
        validation,
        date: optional_date(row, VISIT_DATE),
        deadline: optional_date(row, DEADLINE),
        created_at: optional_date(row, CREATED_AT),
        guide_photos: Vec::new(),
        compliance_photos: Vec::new(),
    })
}

pub fn import_success_message(count: usize) -> String {
    format!("{} tâche(s) importée(s) avec succès !", count)
}

/// Create one task per row, in order. The first failing row stops the import;
/// rows already created stay. Returns the number of tasks created.
pub async fn import_rows(
    store: &dyn TaskStore,
    identity: &Identity,
    rows: Vec<SheetRow>,
) -> Result<usize, AppError> {
    if !identity.can_create_tasks() {
        return Err(AppError::Forbidden(
            "Action non autorisée pour ce profil".to_string(),
        ));
    }

    let created_at = now_rfc3339();
    let today = today_iso();
    let mut imported = 0;

    for (index, row) in rows.iter().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let request = row_to_request(row).map_err(|reason| {
            tracing::warn!(line, imported, "Import stopped: {}", reason);
            import_error(format!("Ligne {}: {}", line, reason), imported)
        })?;

        let new_task = request.into_new_task(created_at.clone(), today.clone());
        if let Err(e) = store.insert(new_task).await {
            tracing::error!(line, imported, "Erreur lors de l'import: {}", e);
            return Err(import_error(
                format!("Erreur lors de l'import (ligne {})", line),
                imported,
            ));
        }
        imported += 1;
    }

    tracing::info!(imported, who = %identity.name, "Spreadsheet imported");
    Ok(imported)
}
