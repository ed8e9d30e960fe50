pub mod define;
pub mod demuxer;
pub mod errors;
pub mod packet;
pub mod parsers;
pub mod pes;
pub mod timestamp;
pub mod ts;
