pub mod csv;
pub mod save;

pub use csv::{series_keys, to_csv, ExportOptions};
pub use save::{save_csv, save_csv_at, timestamp};
