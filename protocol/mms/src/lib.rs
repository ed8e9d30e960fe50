pub mod asf;
pub mod command;
pub mod connection;
pub mod define;
pub mod errors;
pub mod guid;
pub mod http;
pub mod mmsh;
pub mod mmst;
pub mod session;
pub mod transport;
pub mod uri;
