pub mod catalog;
pub mod fetcher;
pub mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod normalize;
pub mod resolver;

pub use catalog::discover;
pub use fetcher::{fetch_all, FetchConfig};
pub use http::{HttpClient, Response, RetryPolicy, WebClient, BROWSER_USER_AGENT};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryClient;
pub use resolver::resolve_pages;
