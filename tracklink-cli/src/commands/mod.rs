pub mod daemon;
pub mod init;
pub mod inspect;
pub mod status;
pub mod sync;
