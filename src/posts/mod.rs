pub mod core;
pub mod handlers;
pub mod store;
pub mod types;

pub use core::{PageAssembler, render_post};
pub use store::{PostsCache, PostsCacheStats};
pub use types::{
    ContentBlock, FallbackMode, PostDetail, PostSummary, PostsConfig, RenderedPost,
    RenderedSection,
};

#[cfg(test)]
mod tests;
