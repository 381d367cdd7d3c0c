//! GCP provider
//!
//! Implements [`crate::client::ResourceClient`] against Google Cloud REST APIs.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - The resource client used by the engine
//! - [`http`] - HTTP utilities and status classification
//! - [`resources`] - Resource kind to endpoint mapping and descriptor building
//!
//! # Example
//!
//! ```ignore
//! use infraprobe::gcp::client::{GcpOptions, GcpResourceClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpResourceClient::new(GcpOptions::new("my-project")).await?;
//!     let vpc = client
//!         .fetch(&ResourceSelector::new(ResourceKind::Network, "main-vpc"))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod resources;
