//! infraprobe
//!
//! Asserts the infrastructure state declared by a provisioning tool's output
//! file against live cloud resources.
//!
//! - [`declaration`] - loads the declared outputs and resolves keys
//! - [`client`] - the provider abstraction the engine fetches through
//! - [`gcp`] - Google Cloud implementation of that abstraction
//! - [`assertion`] - assertions, predicates and the assertions file
//! - [`engine`] - evaluation with retry, bounded concurrency and a deadline
//! - [`report`] - summaries and rendering

pub mod assertion;
pub mod client;
pub mod config;
pub mod declaration;
pub mod engine;
pub mod gcp;
pub mod report;
