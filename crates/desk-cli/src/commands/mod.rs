pub mod common;
pub mod config;
pub mod manage;
pub mod queue;
pub mod record;
pub mod show;
pub mod sync;
pub mod transcribe;
pub mod watch;
