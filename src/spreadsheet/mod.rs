//! Spreadsheet interchange.
//!
//! One sheet, one row per task, under a fixed header row. Export writes the
//! visible tasks; import turns every data row into a new task.

mod export;
mod import;

pub use export::*;
pub use import::*;

pub const SHEET_NAME: &str = "Tâches";

/// A column of the interchange sheet.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    /// Export width, in characters
    pub width: f64,
}

pub const STORE: &str = "Magasin";
pub const STORE_MANAGER: &str = "Responsable magasin";
pub const TITLE: &str = "Tâche demandée";
pub const NOTES: &str = "Commentaire VM";
pub const FEEDBACK: &str = "Retour magasin";
pub const CONTROLLER: &str = "Contrôleur";
pub const VISIT_DATE: &str = "Date de passage";
pub const DEADLINE: &str = "Deadline";
pub const STATUS: &str = "Statut";
pub const VALIDATION: &str = "Validation";
pub const CREATED_AT: &str = "Date de création";
pub const ID: &str = "ID";

/// Header order of the sheet.
pub const COLUMNS: [Column; 12] = [
    Column { header: STORE, width: 20.0 },
    Column { header: STORE_MANAGER, width: 20.0 },
    Column { header: TITLE, width: 35.0 },
    Column { header: NOTES, width: 40.0 },
    Column { header: FEEDBACK, width: 40.0 },
    Column { header: CONTROLLER, width: 20.0 },
    Column { header: VISIT_DATE, width: 15.0 },
    Column { header: DEADLINE, width: 15.0 },
    Column { header: STATUS, width: 12.0 },
    Column { header: VALIDATION, width: 15.0 },
    Column { header: CREATED_AT, width: 18.0 },
    Column { header: ID, width: 38.0 },
];
