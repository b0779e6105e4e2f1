pub mod value;
pub mod record;
pub mod config;
pub mod classify;
pub mod point;
pub mod error;
pub mod sink;

pub mod dispatcher;
pub mod sync_dispatcher;
pub mod async_dispatcher;
pub mod buffering_dispatcher;
pub mod layer;

#[cfg(feature = "console")]
pub mod console;

pub mod client;
pub mod env;
pub mod init;
pub mod memory_sink;
pub mod noop_sink;
