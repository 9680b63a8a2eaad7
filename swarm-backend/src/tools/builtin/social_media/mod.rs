pub mod compose_post;

pub use compose_post::ComposePostTool;
