//! Stage contract and site pipelines
//!
//! A stage is one level of a site's discovery tree: a pure, synchronous
//! function of (response, accumulated record) deciding how the traversal
//! continues. The per-site callback chains of the original spiders become an
//! explicit finite sequence of stages indexed by tree depth, driven by one
//! generic dispatch loop.

use crate::engine::fetcher::FetchResponse;
use crate::engine::request::StageRequest;
use crate::record::VehicleRecord;
use crate::StageResult;

/// One in-flight (pending request, record snapshot) pair between two stages
///
/// The record is an owned copy: forking never shares state across siblings.
#[derive(Debug, Clone)]
pub struct Branch {
    pub request: StageRequest,
    pub record: VehicleRecord,
}

impl Branch {
    pub fn new(request: StageRequest, record: VehicleRecord) -> Self {
        Self { request, record }
    }
}

/// What a stage decided about its branch
///
/// Shape mismatches and unparseable payloads are `Err(StageError)` from the
/// stage function, not an outcome variant.
#[derive(Debug)]
pub enum StageOutcome {
    /// Continue traversal: each child carries its own copy of the record
    Fork(Vec<Branch>),

    /// The branch is terminal; hand the completed records to the sink.
    /// Listing-style terminal stages resolve several records from one
    /// response, so emission carries a list.
    Emit(Vec<VehicleRecord>),

    /// The response yielded no usable branches; the branch is dropped
    /// silently and logged, not treated as an error
    Skip { reason: String },
}

impl StageOutcome {
    /// Skips with a reason
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip {
            reason: reason.into(),
        }
    }

    /// Emits a single completed record
    pub fn emit_one(record: VehicleRecord) -> Self {
        Self::Emit(vec![record])
    }
}

/// Boxed stage function
pub type StageFn = Box<dyn Fn(&FetchResponse, &VehicleRecord) -> StageResult + Send + Sync>;

/// A named stage of a site pipeline
pub struct Stage {
    pub name: &'static str,
    run: StageFn,
}

impl Stage {
    pub fn new(
        name: &'static str,
        run: impl Fn(&FetchResponse, &VehicleRecord) -> StageResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            run: Box::new(run),
        }
    }

    /// Runs the stage function
    pub fn run(&self, response: &FetchResponse, record: &VehicleRecord) -> StageResult {
        (self.run)(response, record)
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).finish()
    }
}

/// A site's complete traversal description
///
/// Seed branches enter the tree at depth 0; a branch forked by the stage at
/// depth `d` is handled by the stage at depth `d + 1`. `required_fields`
/// lists the columns the tree shape structurally guarantees; the driver
/// refuses to emit a record missing one.
#[derive(Debug)]
pub struct SitePipeline {
    pub site: String,
    pub seeds: Vec<Branch>,
    pub stages: Vec<Stage>,
    pub required_fields: Vec<&'static str>,
}

impl SitePipeline {
    /// Number of tree levels
    pub fn depth(&self) -> usize {
        self.stages.len()
    }

    /// The stage handling branches at the given depth
    pub fn stage(&self, depth: usize) -> Option<&Stage> {
        self.stages.get(depth)
    }
}
