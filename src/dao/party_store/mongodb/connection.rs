use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// Build a client for `config` and ping its database until it answers or the retries run out.
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let retry = config.retry;
    let max_attempts = retry.max_attempts.max(1);
    let mut attempts = 0;
    let mut delay = retry.initial_delay;

    loop {
        attempts += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                info!(database = %config.database_name, attempts, "connected to MongoDB");
                return Ok((client, database));
            }
            Err(source) if attempts >= max_attempts => {
                return Err(MongoDaoError::InitialPing { attempts, source });
            }
            Err(err) => {
                warn!(
                    database = %config.database_name,
                    attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "MongoDB not reachable yet, retrying"
                );
                sleep(delay).await;
                delay = retry.next_delay(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::party_store::mongodb::config::ConnectRetry;

    #[tokio::test]
    async fn gives_up_after_the_configured_attempts() {
        let config = MongoConfig::from_uri("mongodb://127.0.0.1:1", None)
            .await
            .unwrap()
            .with_store_timeout(Some(Duration::from_millis(50)))
            .with_retry(ConnectRetry {
                max_attempts: 2,
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(10),
            });

        let err = establish_connection(&config).await.err().unwrap();
        assert!(matches!(err, MongoDaoError::InitialPing { attempts: 2, .. }));
    }
}
