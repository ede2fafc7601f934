//! Minimal Arcade tool-provider client for toolgate
//!
//! This crate covers the four calls a tool gateway needs: listing tool
//! definitions, starting a per-user authorization, checking its status, and
//! executing a tool on the user's behalf.
//!
//! # Quick Start
//!
//! ```no_run
//! // Requires ARCADE_API_KEY environment variable
//! use toolgate_arcade_sdk::{Arcade, AuthorizeToolRequest, ListToolsParams};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arcade::from_env()?;
//!
//! let tools = client
//!     .tools()
//!     .list(&ListToolsParams::toolkit("GoogleNews"))
//!     .await?;
//!
//! for tool in &tools.items {
//!     println!("{}", tool.qualified_name());
//! }
//!
//! let auth = client
//!     .tools()
//!     .authorize(&AuthorizeToolRequest::new("GoogleNews.SearchNewsStories", "me@example.com"))
//!     .await?;
//! if let Some(url) = auth.url {
//!     println!("Visit {}", url);
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod error;
mod tools;

pub use auth::{AuthorizationResponse, AuthorizationStatus, AuthorizeToolRequest};
pub use client::{Arcade, ArcadeBuilder, Auth, Tools};
pub use error::{ApiErrorResponse, ArcadeError, RetryConfig};
pub use tools::{
    ExecuteToolRequest, ExecuteToolResponse, InputParameter, ListToolsParams, ListToolsResponse,
    ToolAuthorizationRequirement, ToolDefinition, ToolInput, ToolOutput, ToolOutputError,
    ToolRequirements, ToolkitDefinition, ValueSchema,
};
