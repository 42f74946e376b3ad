// Capability tools the executor dispatches plan steps to
pub mod sandbox;
pub mod web_search;

pub use sandbox::{CodeRunner, NodeSandbox};
pub use web_search::{SearchCredentials, WebSearch, WebSearchClient};
