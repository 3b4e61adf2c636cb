pub mod db;
pub mod error;
pub mod repository;
pub mod sqlite;

pub use error::{Result, StoreError};
pub use repository::{Collection, Filter, Repository, RepositoryExt};
pub use sqlite::SqliteRepository;
