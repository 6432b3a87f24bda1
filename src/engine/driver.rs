//! Traversal driver - generic dispatch loop
//!
//! This module contains the engine that walks a site's discovery tree:
//! - Seeding the run from the pipeline's seed branches
//! - Dispatching every pending branch through the fetcher as an independent
//!   task, bounded by the configured concurrency limit
//! - Handing each response to the stage function for the branch's depth
//! - Spawning forked children, collecting emitted records into the sink,
//!   and logging skipped and abandoned branches
//!
//! Branches share no mutable state: each task owns its request and its copy
//! of the record, so a failure abandons exactly one branch. Completed
//! records reach the sink in arrival order, which is not discovery order.

use crate::config::EngineConfig;
use crate::engine::fetcher::Fetcher;
use crate::engine::report::{BranchFailure, CrawlReport};
use crate::engine::stage::{Branch, SitePipeline, StageOutcome};
use crate::output::RecordSink;
use crate::record::VehicleRecord;
use crate::{FetchError, StageError, TrawlError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Why a branch was abandoned
#[derive(Debug)]
enum BranchFault {
    Fetch(FetchError),
    Stage(StageError),
}

impl std::fmt::Display for BranchFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchFault::Fetch(e) => write!(f, "{}", e),
            BranchFault::Stage(e) => write!(f, "{}", e),
        }
    }
}

/// Result of one branch task
struct TaskDone {
    depth: usize,
    url: String,
    outcome: Result<StageOutcome, BranchFault>,
}

/// Traversal driver for one site pipeline
pub struct Driver {
    pipeline: Arc<SitePipeline>,
    fetcher: Arc<dyn Fetcher>,
    config: EngineConfig,
    config_hash: String,
}

impl Driver {
    /// Creates a driver
    ///
    /// # Arguments
    ///
    /// * `pipeline` - The site's traversal description
    /// * `fetcher` - The network collaborator (shared across branches)
    /// * `config` - Engine knobs (concurrency, delays, retry budget)
    /// * `config_hash` - Hash of the config file, recorded in the report
    pub fn new(
        pipeline: SitePipeline,
        fetcher: Arc<dyn Fetcher>,
        config: EngineConfig,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            fetcher,
            config,
            config_hash: config_hash.into(),
        }
    }

    /// Runs the crawl to completion
    ///
    /// The run ends when every branch has emitted, skipped, or been
    /// abandoned; branch failures never abort the crawl. Sink failures do:
    /// losing the output file is not a branch-local condition.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Counters, duration, and abandoned branches
    /// * `Err(TrawlError)` - Empty pipeline or sink failure
    pub async fn run(&self, sink: &mut dyn RecordSink) -> Result<CrawlReport, TrawlError> {
        if self.pipeline.stages.is_empty() {
            return Err(TrawlError::Pipeline(format!(
                "pipeline '{}' has no stages",
                self.pipeline.site
            )));
        }

        tracing::info!(
            "Starting crawl of '{}': {} seed(s), {} stage(s), concurrency {}",
            self.pipeline.site,
            self.pipeline.seeds.len(),
            self.pipeline.depth(),
            self.config.max_concurrent_branches
        );

        let start = Instant::now();
        let mut report = CrawlReport::new(&self.pipeline.site, &self.config_hash);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_branches as usize));
        let mut tasks: JoinSet<TaskDone> = JoinSet::new();

        for seed in &self.pipeline.seeds {
            self.spawn_branch(&mut tasks, &semaphore, seed.clone(), 0);
            report.branches_dispatched += 1;
        }

        let mut joined_count = 0u64;
        while let Some(joined) = tasks.join_next().await {
            let done = match joined {
                Ok(done) => done,
                Err(e) => {
                    // A panicking stage loses its branch, nothing else
                    tracing::error!("Branch task aborted: {}", e);
                    continue;
                }
            };

            let stage_name = self
                .pipeline
                .stage(done.depth)
                .map(|s| s.name)
                .unwrap_or("<unknown>");

            match done.outcome {
                Ok(StageOutcome::Fork(children)) => {
                    let child_depth = done.depth + 1;
                    if children.is_empty() {
                        report.branches_skipped += 1;
                        tracing::debug!("Stage {} forked no children for {}", stage_name, done.url);
                    } else if child_depth < self.pipeline.depth() {
                        tracing::debug!(
                            "Stage {} forked {} branch(es) from {}",
                            stage_name,
                            children.len(),
                            done.url
                        );
                        for child in children {
                            self.spawn_branch(&mut tasks, &semaphore, child, child_depth);
                            report.branches_dispatched += 1;
                        }
                    } else {
                        tracing::error!(
                            "Stage {} forked past the last stage for {}",
                            stage_name,
                            done.url
                        );
                        report.failures.push(BranchFailure::new(
                            done.url,
                            stage_name,
                            "fork past the last stage",
                        ));
                    }
                }

                Ok(StageOutcome::Emit(records)) => {
                    for record in records {
                        if let Some(missing) = self.missing_required(&record) {
                            tracing::warn!(
                                "Dropping record from {}: required field '{}' is empty",
                                done.url,
                                missing
                            );
                            report.failures.push(BranchFailure::new(
                                done.url.clone(),
                                stage_name,
                                format!("required field '{}' is empty", missing),
                            ));
                            continue;
                        }

                        sink.emit(&record)?;
                        report.records_emitted += 1;
                    }
                }

                Ok(StageOutcome::Skip { reason }) => {
                    report.branches_skipped += 1;
                    tracing::debug!("Skipping {} at stage {}: {}", done.url, stage_name, reason);
                }

                Err(fault) => {
                    tracing::warn!(
                        "Abandoning branch {} at stage {}: {}",
                        done.url,
                        stage_name,
                        fault
                    );
                    report
                        .failures
                        .push(BranchFailure::new(done.url, stage_name, fault.to_string()));
                }
            }

            joined_count += 1;
            if joined_count % 25 == 0 {
                tracing::info!(
                    "Progress: {} branches finished, {} records emitted, {} abandoned",
                    joined_count,
                    report.records_emitted,
                    report.branches_failed()
                );
            }
        }

        report.duration = start.elapsed();
        tracing::info!(
            "Crawl of '{}' completed: {} records emitted, {} skipped, {} abandoned in {:?}",
            self.pipeline.site,
            report.records_emitted,
            report.branches_skipped,
            report.branches_failed(),
            report.duration
        );

        Ok(report)
    }

    /// Spawns one branch as an independent task
    ///
    /// The task acquires a concurrency permit, applies the politeness delay,
    /// fetches, and runs the stage function for its depth. The permit is
    /// released before parsing; only the fetch needs a slot.
    fn spawn_branch(
        &self,
        tasks: &mut JoinSet<TaskDone>,
        semaphore: &Arc<Semaphore>,
        branch: Branch,
        depth: usize,
    ) {
        let pipeline = Arc::clone(&self.pipeline);
        let fetcher = Arc::clone(&self.fetcher);
        let semaphore = Arc::clone(semaphore);
        let delay = Duration::from_millis(self.config.request_delay_ms);

        tasks.spawn(async move {
            let Branch { request, record } = branch;
            let url = request.url.clone();

            let permit = semaphore
                .acquire_owned()
                .await
                .expect("concurrency semaphore is never closed");

            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }

            let response = match fetcher.fetch(&request).await {
                Ok(response) => response,
                Err(e) => {
                    return TaskDone {
                        depth,
                        url,
                        outcome: Err(BranchFault::Fetch(e)),
                    }
                }
            };
            drop(permit);

            let outcome = match pipeline.stage(depth) {
                Some(stage) => stage.run(&response, &record).map_err(BranchFault::Stage),
                None => Err(BranchFault::Stage(StageError::ShapeMismatch(format!(
                    "no stage at depth {}",
                    depth
                )))),
            };

            TaskDone {
                depth,
                url,
                outcome,
            }
        });
    }

    /// Returns the first required field the record leaves empty
    fn missing_required(&self, record: &VehicleRecord) -> Option<&'static str> {
        self.pipeline
            .required_fields
            .iter()
            .find(|field| !record.has_value(field))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fetcher::FetchResponse;
    use crate::engine::request::StageRequest;
    use crate::engine::stage::Stage;
    use crate::SinkError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Fetcher serving canned bodies by URL
    struct FixtureFetcher {
        responses: HashMap<String, String>,
    }

    #[async_trait]
    impl Fetcher for FixtureFetcher {
        async fn fetch(&self, request: &StageRequest) -> Result<FetchResponse, FetchError> {
            match self.responses.get(&request.url) {
                Some(body) => Ok(FetchResponse::new(request.url.clone(), 200, body.clone())),
                None => Err(FetchError::Status {
                    url: request.url.clone(),
                    status: 404,
                }),
            }
        }
    }

    /// Sink collecting records in memory
    #[derive(Default)]
    struct VecSink {
        records: Vec<VehicleRecord>,
    }

    impl RecordSink for VecSink {
        fn emit(&mut self, record: &VehicleRecord) -> Result<(), SinkError> {
            self.records.push(record.clone());
            Ok(())
        }
    }

    fn create_test_engine_config() -> EngineConfig {
        EngineConfig {
            max_concurrent_branches: 4,
            request_delay_ms: 0,
            max_retries: 1,
            retry_backoff_ms: 100,
            timeout_secs: 5,
        }
    }

    fn seed(url: &str) -> Vec<Branch> {
        vec![Branch::new(
            StageRequest::get(url),
            VehicleRecord::seeded("Testmake"),
        )]
    }

    #[tokio::test]
    async fn test_empty_pipeline_rejected() {
        let pipeline = SitePipeline {
            site: "empty".to_string(),
            seeds: seed("https://example.com/"),
            stages: vec![],
            required_fields: vec![],
        };
        let driver = Driver::new(
            pipeline,
            Arc::new(FixtureFetcher {
                responses: HashMap::new(),
            }),
            create_test_engine_config(),
            "hash",
        );

        let mut sink = VecSink::default();
        assert!(driver.run(&mut sink).await.is_err());
    }

    #[tokio::test]
    async fn test_single_stage_emit() {
        let pipeline = SitePipeline {
            site: "one".to_string(),
            seeds: seed("https://example.com/models"),
            stages: vec![Stage::new("models", |response, record| {
                let mut record = record.clone();
                record.model = Some(response.body.trim().to_string());
                Ok(StageOutcome::emit_one(record))
            })],
            required_fields: vec!["make", "model"],
        };

        let mut responses = HashMap::new();
        responses.insert("https://example.com/models".to_string(), "Canyon".to_string());

        let driver = Driver::new(
            pipeline,
            Arc::new(FixtureFetcher { responses }),
            create_test_engine_config(),
            "hash",
        );

        let mut sink = VecSink::default();
        let report = driver.run(&mut sink).await.unwrap();

        assert_eq!(report.records_emitted, 1);
        assert_eq!(report.branches_dispatched, 1);
        assert!(report.failures.is_empty());
        assert_eq!(sink.records[0].model.as_deref(), Some("Canyon"));
    }

    #[tokio::test]
    async fn test_required_field_validation_drops_record() {
        let pipeline = SitePipeline {
            site: "incomplete".to_string(),
            seeds: seed("https://example.com/models"),
            stages: vec![Stage::new("models", |_, record| {
                // Leaves `model` unset
                Ok(StageOutcome::emit_one(record.clone()))
            })],
            required_fields: vec!["make", "model"],
        };

        let mut responses = HashMap::new();
        responses.insert("https://example.com/models".to_string(), "{}".to_string());

        let driver = Driver::new(
            pipeline,
            Arc::new(FixtureFetcher { responses }),
            create_test_engine_config(),
            "hash",
        );

        let mut sink = VecSink::default();
        let report = driver.run(&mut sink).await.unwrap();

        assert_eq!(report.records_emitted, 0);
        assert_eq!(report.branches_failed(), 1);
        assert!(report.failures[0].reason.contains("model"));
        assert!(sink.records.is_empty());
    }

    #[tokio::test]
    async fn test_fork_past_last_stage_is_failure() {
        let pipeline = SitePipeline {
            site: "overflow".to_string(),
            seeds: seed("https://example.com/"),
            stages: vec![Stage::new("only", |_, record| {
                Ok(StageOutcome::Fork(vec![Branch::new(
                    StageRequest::get("https://example.com/next"),
                    record.clone(),
                )]))
            })],
            required_fields: vec![],
        };

        let mut responses = HashMap::new();
        responses.insert("https://example.com/".to_string(), "{}".to_string());

        let driver = Driver::new(
            pipeline,
            Arc::new(FixtureFetcher { responses }),
            create_test_engine_config(),
            "hash",
        );

        let mut sink = VecSink::default();
        let report = driver.run(&mut sink).await.unwrap();

        assert_eq!(report.branches_failed(), 1);
        assert!(report.failures[0].reason.contains("last stage"));
    }
}
