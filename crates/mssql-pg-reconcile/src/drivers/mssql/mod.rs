//! Microsoft SQL Server driver (Tiberius).

mod dialect;
mod reader;

pub use dialect::MssqlDialect;
pub use reader::MssqlReader;
