//! Owners portal transport.
//!
//! `Transport` is the seam between the session/dispatch logic and the
//! network. `HttpTransport` is the production implementation; tests script
//! their own.

pub mod client;
pub mod transport;

pub use client::{Endpoints, HttpTransport, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use transport::{cookie_pair, merge_cookies, Request, Response, Transport};
