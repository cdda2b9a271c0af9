//! OPC UA binary client stack
//!
//! The wire-level machinery for talking to OPC UA servers over
//! `opc.tcp`: transport framing and chunking, the secure channel with its
//! token rotation and request correlation, sessions with identity
//! handling and auto-batching, subscriptions with typed notification
//! channels, and exponential-backoff reconnection.
//!
//! ```no_run
//! use ua_client::{ClientConfig, IdentityToken, Session};
//! use ua_types::NodeId;
//!
//! # async fn demo() -> ua_client::Result<()> {
//! let config = ClientConfig::new("opc.tcp://plc.example:4840");
//! let session = Session::connect(config, None, None, IdentityToken::Anonymous).await?;
//!
//! let values = session
//!     .read_values(vec![NodeId::string(2, "Demo.Temperature")])
//!     .await?;
//! println!("{:?}", values[0]);
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
#[cfg(test)]
pub(crate) mod testing;
pub mod crypto;
pub mod error;
pub mod reconnect;
pub mod session;
pub mod subscription;
pub mod transport;

pub use channel::{ChannelState, SecureChannel};
pub use config::{ClientConfig, IdentityToken, TransportLimits};
pub use crypto::{AppIdentity, SecurityMode, SecurityPolicy};
pub use error::{Error, Result};
pub use reconnect::{BackoffPolicy, Reconnector};
pub use session::browse::ManagedBrowseResult;
pub use session::services::get_endpoints;
pub use session::Session;
pub use subscription::{
    MonitoredItemHandle, Notification, Subscription, SubscriptionEvent, SubscriptionParams,
};
