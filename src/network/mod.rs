pub mod handlers;
pub mod message;
pub mod operations;
pub mod server;

pub use message::{COMMAND_LENGTH, InvKind, Message, PROTOCOL_VERSION};
pub use operations::send_transaction_once;
pub use server::Server;
