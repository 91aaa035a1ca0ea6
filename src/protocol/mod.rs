//! Niimbot vendor protocol: framing, requests and responses.

pub mod command;
pub mod packet;
pub mod response;

pub use command::{Command, InfoKey, RequestCode};
pub use packet::{decode, encode, Decoded, Frame, Packet};
pub use response::Response;
