//! File input and output

pub mod csv_reader;
pub mod query_writer;

pub use csv_reader::{read_categories, read_categories_from};
pub use query_writer::write_atomically;
