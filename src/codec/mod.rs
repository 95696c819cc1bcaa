//! Codec module - serialization/deserialization for payloads.
//!
//! Every frame payload on the gateway socket is UTF-8 JSON, handled by
//! [`JsonCodec`].
//!
//! # Design
//!
//! Codecs are implemented as marker structs with static methods rather than trait objects.
//!
//! # Example
//!
//! ```
//! use hammer_gateway::codec::JsonCodec;
//! use hammer_gateway::protocol::Request;
//!
//! let request = Request::new("echo", "ping").param("a", "1");
//! let encoded = JsonCodec::encode(&request).unwrap();
//! let decoded: Request = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod json;

pub use json::JsonCodec;
