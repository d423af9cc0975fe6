//! JSON-RPC 2.0 client plumbing for talking to avalanchego.

pub mod error;
pub mod transport;

pub use error::JsonError;
pub use error::JsonRequest;
pub use error::JsonResult;
pub use transport::HttpTransport;
pub use transport::Transport;
