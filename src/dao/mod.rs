//! Persistence layer: store primitives, typed records, and the repository.

pub mod game;
pub mod keys;
pub mod kv;
pub mod models;
pub mod storage;
