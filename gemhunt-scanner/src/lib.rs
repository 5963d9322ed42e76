pub mod bing;
pub mod client;
pub mod collaborator;
pub mod duckduckgo;
pub mod error;
pub mod fetcher;
pub mod google;
pub mod llm;
pub mod prompts;
pub mod pubmed;
pub mod result;
pub mod serpapi;

pub use collaborator::{ImageFetcher, ImageSource, KeywordSuggester, LeafContext, LinkDiscoverer};
pub use error::ScanError;
pub use result::{LinkRecord, Lookup};
