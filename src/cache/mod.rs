// SPDX-License-Identifier: MPL-2.0

mod db;
mod profiles;
mod schema;

pub use db::CacheDb;
pub use profiles::ProfileCache;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found")]
    NotFound,
    #[error("database path error: {0}")]
    Path(String),
}
