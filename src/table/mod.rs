//! Table loading: spreadsheet files into ordered rows

mod loader;
mod row;

pub use loader::{load_rows, SpreadsheetFormat};
pub use row::{CellValue, Row};
