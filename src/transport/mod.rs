//! Transport module - Unix domain socket listener.
//!
//! The gateway only listens on Unix domain sockets (Linux/macOS).

mod socket;

pub use socket::SocketListener;
