pub mod events;
pub mod json_guard;
pub mod user_agent;
