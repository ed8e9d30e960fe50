pub mod define;
pub mod errors;
pub mod pps;
pub mod slice;
pub mod sps;
pub mod utils;
