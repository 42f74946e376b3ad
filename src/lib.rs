//! Natural-language requests answered by planning and running tool calls:
//! sandboxed JavaScript, web search and delegated model calls, with
//! credential failover around the whole pipeline.

pub mod agent;
pub mod api;
pub mod shared;
pub mod tools;
