pub mod logger;
pub mod target;
