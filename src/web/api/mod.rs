pub mod admin;
pub mod analytics;
pub mod dashboard;
pub mod ws;
