use scoreboard_common::Error;
use tokio_postgres::Error as PgError;

use crate::pool::PoolError;

/// Map a raw `tokio_postgres` failure onto the crate-wide [`Error`].
pub(crate) fn map_pg_error(err: PgError) -> Error {
    Error::Database(Box::new(err))
}

pub(crate) fn map_pool_error(err: PoolError) -> Error {
    Error::Database(Box::new(err))
}
