//! Natural-language questions over a SQLite database
//!
//! A tool-calling model inspects the schema and runs bounded SQL through a
//! fixed three-tool catalogue until it calls `finish`.

pub mod agent;
pub mod cli;
pub mod config;
pub mod db;
pub mod llm;
pub mod tools;
