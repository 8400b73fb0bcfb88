pub mod cat;
pub mod config;
pub mod gc;
pub mod init;
pub mod install;
pub mod list;
pub mod mirror;
pub mod resolve;
