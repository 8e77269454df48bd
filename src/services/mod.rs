pub mod habits;
pub mod streaks;
