pub mod builtin;
pub mod error;
pub mod http_retry;
pub mod registry;
pub mod types;

pub use error::ToolError;
pub use registry::{Tool, ToolHandle, ToolRegistry};
pub use types::{
    PropertySchema, ToolCategory, ToolContext, ToolDefinition, ToolInputSchema, ToolOutput,
};

use std::sync::Arc;

/// Built-in tools grouped by the category they are registered under
pub fn builtin_tools() -> Vec<(ToolCategory, Vec<Arc<dyn Tool>>)> {
    vec![
        (
            ToolCategory::Data,
            vec![Arc::new(builtin::PriceLookupTool::new()) as Arc<dyn Tool>],
        ),
        (
            ToolCategory::Blockchain,
            vec![
                Arc::new(builtin::TokenLookupTool::new()) as Arc<dyn Tool>,
                Arc::new(builtin::ToRawAmountTool::new()),
                Arc::new(builtin::BuildTransferTool::new()),
            ],
        ),
        (
            ToolCategory::Social,
            vec![Arc::new(builtin::ComposePostTool::new()) as Arc<dyn Tool>],
        ),
    ]
}
