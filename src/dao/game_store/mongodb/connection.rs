use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

const FIRST_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Build the client and wait until the server answers a ping.
///
/// Startup usually races the database container, so failed pings are retried
/// with a doubling backoff up to `connect_attempts` times.
pub async fn open_database(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut backoff = FIRST_BACKOFF;
    for attempt in 1.. {
        let Err(source) = database.run_command(doc! { "ping": 1 }).await else {
            break;
        };
        if attempt >= config.connect_attempts {
            return Err(MongoDaoError::InitialPing {
                attempts: attempt,
                source,
            });
        }
        warn!(
            attempt,
            retry_in_ms = backoff.as_millis() as u64,
            error = %source,
            "MongoDB not reachable yet"
        );
        sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }

    info!(database = %config.database_name, "MongoDB answered the initial ping");
    Ok((client, database))
}
