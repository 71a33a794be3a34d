use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ToolError;

pub mod ads;
pub mod adsets;
pub mod campaigns;
pub mod creatives;
pub mod insights;
pub mod media;
pub mod search;
pub mod targeting;

/// One MCP tool. Implementations dispatch on the `action` member of `args`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}
