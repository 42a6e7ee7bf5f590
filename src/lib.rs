pub mod app;
pub mod catalog;
pub mod config;
pub mod executor;
pub mod orchestration;
pub mod provider;
pub mod shared;
