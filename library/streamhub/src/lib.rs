pub mod define;
pub mod errors;
pub mod ring;
pub mod streamer;
pub mod worker;
pub mod writer;
