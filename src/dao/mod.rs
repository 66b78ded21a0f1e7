/// Durable per-game records (games, links, participants, answers).
pub mod game_store;
/// Database model definitions.
pub mod models;
/// Cross-process fan-out transport for broadcast events.
pub mod relay;
/// Ephemeral session snapshot storage with compare-and-swap.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
