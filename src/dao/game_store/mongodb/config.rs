use std::env;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "live_trivia";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;

/// Connection settings of the MongoDB backend.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    /// Pings attempted before startup gives up on the server.
    pub connect_attempts: u32,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, database_name: Option<&str>) -> MongoResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        options
            .app_name
            .get_or_insert_with(|| env!("CARGO_PKG_NAME").to_owned());

        Ok(Self {
            options,
            database_name: database_name.unwrap_or(DEFAULT_DATABASE).to_owned(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        })
    }

    /// Read `MONGO_URI` (required), `MONGO_DB` and `MONGO_CONNECT_ATTEMPTS`.
    pub async fn from_env() -> MongoResult<Self> {
        let uri =
            env::var("MONGO_URI").map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let database_name = env::var("MONGO_DB").ok().filter(|name| !name.is_empty());
        let mut config = Self::from_uri(&uri, database_name.as_deref()).await?;
        if let Some(attempts) = env::var("MONGO_CONNECT_ATTEMPTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
        {
            config.connect_attempts = attempts.max(1);
        }
        Ok(config)
    }
}
