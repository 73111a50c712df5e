mod connection;
mod handler;
mod message;

pub use connection::{Connection, ConnectionTasks, PumpTiming};
pub use handler::{admit, reject, resolve_user_id, ws_handler, WsQuery};
pub use message::ControlMessage;
