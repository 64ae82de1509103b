pub mod build;
pub mod dev;
pub mod init;
pub mod monitor;
pub mod preview;
pub mod serve;
pub mod sync;
