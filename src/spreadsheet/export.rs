//! Task list to xlsx.

use rust_xlsxwriter::{Format, Workbook};

use super::{COLUMNS, SHEET_NAME};
use crate::dates::format_day_month_year;
use crate::errors::AppError;
use crate::models::Task;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// `Suivi_Taches_Vogue_<YYYY-MM-DD>.xlsx`
pub fn export_file_name(today: &str) -> String {
    format!("Suivi_Taches_Vogue_{}.xlsx", today)
}

/// Cell texts of one task, in column order.
pub fn task_row(task: &Task) -> [String; 12] {
    [
        task.store.clone(),
        task.store_manager.clone(),
        task.title.clone(),
        task.notes.clone(),
        task.feedback.clone(),
        task.controller.clone(),
        format_day_month_year(&task.date),
        format_day_month_year(&task.deadline),
        task.status.to_string(),
        task.validation.to_string(),
        format_day_month_year(&task.created_at),
        task.id.clone(),
    ]
}

/// Build the workbook for `tasks` and return the file bytes.
pub fn write_workbook(tasks: &[&Task]) -> Result<Vec<u8>, AppError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, column) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, column.width)?;
        worksheet.write_string_with_format(0, col, column.header, &header_format)?;
    }

    for (index, task) in tasks.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, value) in task_row(task).iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(row, col as u16, value)?;
            }
        }
    }

    let buffer = workbook.save_to_buffer()?;
    tracing::info!(rows = tasks.len(), bytes = buffer.len(), "Workbook exported");
    Ok(buffer)
}
