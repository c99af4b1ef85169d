//! Socket and connection establishment.
//!
//! The DNS → TCP → TLS connect flow:
//! - [`stream`]: the connected socket type handed to the HTTP layer
//! - [`connect`]: the [`connect::Connector`] (with the resolving dial
//!   hook), the [`connect::Dial`] fallback seam, and address selection
//!
//! Connection reuse is disabled throughout: every request opens a fresh
//! connection, so race winners and losers never contend for a pooled
//! socket.

pub mod connect;
pub mod stream;

pub use connect::{Connector, Dial, Dialing, SystemDial};
pub use stream::SocketType;
