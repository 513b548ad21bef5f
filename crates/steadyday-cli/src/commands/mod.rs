pub mod config;
pub mod data;
pub mod run;
pub mod stats;
pub mod templates;
pub mod tick;
