pub mod command_router;
pub mod transport;

pub use command_router::*;
pub use transport::{ChatTransport, TransportError};
