pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod server;
pub mod storage;

#[cfg(test)]
pub mod testing;
