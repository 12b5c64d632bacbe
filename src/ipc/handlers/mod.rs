pub mod content;
pub mod core;
pub mod gradebook;
pub mod groups;
pub mod mobile;
pub mod plans;
pub mod saves;
pub mod workspace;
