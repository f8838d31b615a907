pub mod category;
pub mod price;
pub mod row;
pub mod service;

pub use category::map_category_to_id;
pub use price::{parse_price, ParsedPrice};
pub use row::{parse_rows, CsvRow, CSV_COLUMNS};
pub use service::{CsvImportResult, CsvImportService, CsvRowError, CsvRowResult};
