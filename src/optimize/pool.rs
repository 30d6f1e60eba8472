//! Bounded optimizer worker pool
//!
//! Jobs are CPU-bound HTML rewrites, so each one runs on tokio's blocking
//! thread pool while holding a permit from a semaphore sized to the
//! configured worker count. A job that outlives the job timeout is reported
//! as failed; its permit is released only when the rewrite actually ends.

use super::{apply_rules, compress_whitespace, ContentOptimizer, OptimizeError, OptimizeMode};
use crate::config::OptimizeConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Smallest pool the optimizer will run with
pub const MIN_WORKERS: usize = 2;

/// Shared optimizer pool
///
/// Cloning is cheap and every clone schedules onto the same permits.
#[derive(Clone)]
pub struct OptimizerPool {
    permits: Arc<Semaphore>,
    workers: usize,
    job_timeout: Duration,
    compress: bool,
    deep: bool,
}

impl OptimizerPool {
    /// Starts a pool sized from the optimize configuration
    pub fn start(config: &OptimizeConfig) -> Self {
        let workers = config.max_workers.max(MIN_WORKERS);
        debug!("Starting optimizer pool with {} workers", workers);

        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            job_timeout: Duration::from_millis(config.job_timeout_ms),
            compress: !config.disable_compress,
            deep: !config.disable_deep_optimize,
        }
    }

    /// Number of jobs that can run at once
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns true once the pool has been terminated
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Lighter pass: script, style, prefetch and tracking removal
    pub async fn optimize_shallow(&self, html: String) -> Result<String, OptimizeError> {
        self.run(html, OptimizeMode::Shallow).await
    }

    /// Full pass used on the render path
    pub async fn optimize_full(&self, html: String) -> Result<String, OptimizeError> {
        self.run(html, OptimizeMode::Full).await
    }

    /// Stops accepting jobs; queued and future jobs fail with `PoolClosed`
    ///
    /// Jobs already running finish in the background.
    pub fn terminate(&self) {
        self.permits.close();
    }

    /// Waits for running jobs to finish, then terminates the pool
    pub async fn shutdown(&self) {
        if let Ok(all) = self.permits.acquire_many(self.workers as u32).await {
            all.forget();
        }
        self.terminate();
        debug!("Optimizer pool shut down");
    }

    fn effective_mode(&self, mode: OptimizeMode) -> OptimizeMode {
        if self.deep {
            mode
        } else {
            OptimizeMode::Shallow
        }
    }

    async fn run(&self, html: String, mode: OptimizeMode) -> Result<String, OptimizeError> {
        let mode = self.effective_mode(mode);
        let compress = self.compress;
        let permits = Arc::clone(&self.permits);

        let job = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|_| OptimizeError::PoolClosed)?;

            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                run_pipeline(&html, mode, compress)
            })
            .await
            .map_err(|e| OptimizeError::WorkerPanicked(e.to_string()))?
        };

        match tokio::time::timeout(self.job_timeout, job).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Optimizer job exceeded {:?}", self.job_timeout);
                Err(OptimizeError::Timeout(self.job_timeout))
            }
        }
    }
}

#[async_trait]
impl ContentOptimizer for OptimizerPool {
    async fn optimize(&self, html: String, mode: OptimizeMode) -> Result<String, OptimizeError> {
        self.run(html, mode).await
    }
}

/// Rules first, then compression
fn run_pipeline(html: &str, mode: OptimizeMode, compress: bool) -> Result<String, OptimizeError> {
    let rewritten = apply_rules(html, mode)?;
    if compress {
        Ok(compress_whitespace(&rewritten))
    } else {
        Ok(rewritten)
    }
}
