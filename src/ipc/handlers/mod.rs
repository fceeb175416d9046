pub mod bulletin;
pub mod core;
pub mod grades;
pub mod ranking;
