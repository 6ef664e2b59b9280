//! # Autoflow SDK
//!
//! Rust client for the Autoflow workflow automation API.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autoflow_sdk::{AutomationBackend, AutomationClient, ApprovalStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AutomationClient::builder()
//!         .base_url("http://localhost:8080")
//!         .api_key(Some("your-api-key".to_string()))
//!         .build()?;
//!
//!     for approval in client.list_approvals(Some(ApprovalStatus::Pending)).await? {
//!         println!("{}: {}", approval.id, approval.effective_response());
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;

pub use autoflow_core::*;
pub use client::{AutomationClient, AutomationClientBuilder};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
