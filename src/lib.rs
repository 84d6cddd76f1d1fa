pub mod actors;
pub mod cli;
pub mod config;
pub mod context;
pub mod fetcher;
pub mod io;
pub mod logging;
pub mod merger;
mod my_regex;
pub mod orchestrator;
pub mod outside;
pub mod result;
pub mod server;
pub mod types;
