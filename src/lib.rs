// Library for tests to access modules

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod enumerator;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod monitoring_repo;
pub mod report_writer;
pub mod retry;
pub mod runner;
pub mod version;
