mod config;
mod connection;
mod error;
mod models;
mod relay;
mod session;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use relay::MongoEventRelay;
pub use session::MongoSessionStore;
pub use store::MongoGameStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
