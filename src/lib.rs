pub mod circuit;
pub mod config;
pub mod errors;
pub mod gate;
pub mod init;
pub mod logging;
pub mod notify;
pub mod recovery;
pub mod risk;
pub mod stage;
pub mod store;
