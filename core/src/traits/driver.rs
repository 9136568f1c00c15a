use crate::error::DriverError;
use crate::row::Row;

/// Runs rendered SQL and returns every row as a column-name map.
///
/// This is the only place the compiler touches a connection. Statements
/// are issued one at a time, in order, on the caller's thread.
pub trait Driver {
    fn fetch_all(&self, sql: &str) -> Result<Vec<Row>, DriverError>;
}

impl<D: Driver + ?Sized> Driver for &D {
    fn fetch_all(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        (**self).fetch_all(sql)
    }
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn fetch_all(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        (**self).fetch_all(sql)
    }
}
