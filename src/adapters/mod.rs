//! Live implementations of the port traits.

pub mod csv_file;
pub mod devrev;
pub mod warehouse;

pub use csv_file::CsvSource;
pub use devrev::DevRevGateway;
pub use warehouse::WarehouseSource;
