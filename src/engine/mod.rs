//! Traversal engine
//!
//! The generic tree-walking core shared by every site: request descriptors,
//! the stage contract, the fetch seam, and the dispatch loop that drives a
//! site pipeline from seed to emitted records.

mod driver;
mod fetcher;
mod report;
mod request;
mod stage;

pub use driver::Driver;
pub use fetcher::{FetchResponse, Fetcher, HttpFetcher};
pub use report::{BranchFailure, CrawlReport};
pub use request::{HttpMethod, RenderMode, StageRequest};
pub use stage::{Branch, SitePipeline, Stage, StageFn, StageOutcome};
