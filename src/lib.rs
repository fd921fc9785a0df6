pub mod analytics;
pub mod capture;
pub mod common;
pub mod config;
pub mod dashboard;
pub mod runtime;
pub mod storage;
pub mod web;
