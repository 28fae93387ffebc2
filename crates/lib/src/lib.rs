//! linetalk core library: config, LINE webhook types and client, A3RT Talk client,
//! background dispatcher, and the HTTP gateway used by the CLI.

pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod line;
pub mod talk;
