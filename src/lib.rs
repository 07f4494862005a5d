#![forbid(unsafe_code)]

pub mod analyze;
pub mod cli;
pub mod config;
pub mod context;
pub mod crawl;
pub mod density;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod logging;
pub mod output;
pub mod phrases;
pub mod pipeline;
pub mod rank;
pub mod relevance;
pub mod retry;
pub mod sitemap;
pub mod targets;
pub mod text;
pub mod themes;
pub mod urls;
pub mod verify;
