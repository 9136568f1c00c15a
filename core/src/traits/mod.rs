//! Execution seam between the compiler and a database connection.

mod driver;

pub use driver::*;
