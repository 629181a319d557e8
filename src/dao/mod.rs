/// Database model definitions.
pub mod models;
/// Persistence gateway for users, friendships and parties.
pub mod party_store;
/// Storage abstraction layer for database operations.
pub mod storage;
