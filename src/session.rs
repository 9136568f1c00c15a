use relq_core::{Driver, Query, QueryConfig, QueryResult, Result};

/// A connection paired with the configuration its queries compile under.
///
/// ```
/// use relq::{Dialect, QueryConfig, Relq};
///
/// let conn = rusqlite::Connection::open_in_memory().unwrap();
/// let db = Relq::with_config(conn, QueryConfig::default().with_max_depth(4)).unwrap();
/// assert_eq!(db.config().dialect, Dialect::SQLite);
/// ```
#[derive(Debug)]
pub struct Relq<C> {
    conn: C,
    config: QueryConfig,
}

impl<C: Driver> Relq<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            config: QueryConfig::default(),
        }
    }

    /// Validates `config` before accepting it.
    pub fn with_config(conn: C, config: QueryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { conn, config })
    }

    /// Starts a query over `table` (`"users"` or `"users as u"`).
    pub fn query(&self, table: &str) -> Result<Query> {
        let mut query = Query::new(self.config.clone());
        query.from(table)?;
        Ok(query)
    }

    /// Runs `query` on this connection.
    #[track_caller]
    pub fn get(&self, query: Query) -> Result<QueryResult> {
        query.get(&self.conn)
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Gets a reference to the underlying connection
    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }
}
