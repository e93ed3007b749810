//! PostgreSQL driver.

mod dialect;
mod reader;

pub use dialect::PostgresDialect;
pub use reader::PostgresReader;
