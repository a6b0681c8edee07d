pub mod archive;
pub mod dedup;
pub mod engine;
pub mod intake;
pub mod models;
pub mod pagination;
pub mod storage;
pub mod transform;
pub mod types;
