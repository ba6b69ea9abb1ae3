//! Data layer: in-memory tables and the loaders that fill them.

pub mod datatable;
pub mod loaders;

pub use datatable::{DataColumn, DataRow, DataTable, DataType, DataValue};
