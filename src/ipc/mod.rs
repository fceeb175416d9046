//! JSON-lines protocol: one request per stdin line, one reply per stdout line.

mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use error::{rejected, ErrorCode};
pub use router::handle_request;
pub use types::{AppState, Request};
