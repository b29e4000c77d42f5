pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod headless;
pub mod infra;
pub mod setup;
pub mod ui;
