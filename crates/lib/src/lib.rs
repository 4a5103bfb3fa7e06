//! Beacon core library: conversation reference store, proactive dispatch, direct sends,
//! connector client, and the HTTP gateway used by the CLI.

pub mod channels;
pub mod config;
pub mod direct;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod init;
pub mod references;
pub mod schema;
