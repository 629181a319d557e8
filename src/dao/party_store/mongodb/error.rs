use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert party `{id}`")]
    InsertParty {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update party `{id}`")]
    UpdateParty {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update the status of {count} parties")]
    UpdateParties {
        count: usize,
        #[source]
        source: MongoError,
    },
    #[error("failed to list active parties")]
    ListParties {
        #[source]
        source: MongoError,
    },
    #[error("party document `{id}` has an invalid identifier")]
    CorruptParty {
        id: String,
        #[source]
        source: uuid::Error,
    },
    #[error("failed to update users")]
    UpdateUsers {
        #[source]
        source: MongoError,
    },
    #[error("failed to load users")]
    LoadUsers {
        #[source]
        source: MongoError,
    },
    #[error("failed to query friends of `{user_id}`")]
    LoadFriends {
        user_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to write friendships of `{user_id}`")]
    WriteFriends {
        user_id: String,
        #[source]
        source: MongoError,
    },
}
