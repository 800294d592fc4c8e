// Shared types
pub mod types;

// Modular tools
pub mod clean;
pub mod extract;
pub mod fetch;
