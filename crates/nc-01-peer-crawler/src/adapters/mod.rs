//! Adapters Layer
//!
//! - `lookup` - XOR-ordered discovery source seeded from bootnodes
//! - `session` - TCP status-handshake session
//! - `listener` - answers status handshakes from other crawlers

pub mod listener;
pub mod lookup;
pub mod session;

pub use listener::Listener;
pub use lookup::{LookupConfig, LookupSource};
pub use session::TcpStatusSession;
