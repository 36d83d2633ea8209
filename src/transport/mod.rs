//! HTTP transport used by the Quickwit committer.

mod http;

pub use http::{HttpTransport, TransportError};
