pub mod config;
pub mod db;
pub mod generator;
pub mod measurement;
pub mod sweep;
