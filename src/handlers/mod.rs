pub mod auth;
pub mod completions;
pub mod habits;
pub mod health;
pub mod streaks;
pub mod ws;
