/// Monitor daemon: the consumer half of the device pipeline.
///
/// This module implements the loop that:
/// 1. Receives `SensorMessage`s from one or more producers (`ingest::sensor`)
/// 2. Dispatches each one to a worker in a fixed-size thread pool
/// 3. Runs `FloodRiskEngine::assess` on the worker
/// 4. Forwards the tagged outcome to whoever handles alerting
///
/// The engine is shared read-mostly through an `Arc`, so workers never
/// coordinate with each other. Outcomes may arrive out of order; use
/// `device_id` + `sequence` to correlate.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};

use threadpool::ThreadPool;
use tracing::{debug, info, warn};

use crate::engine::{FloodRiskEngine, RiskAssessment};
use crate::error::EngineError;
use crate::ingest::sensor::SensorMessage;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Monitor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Worker threads running assessments (default: 4)
    pub workers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of assessing one device reading.
#[derive(Debug)]
pub struct AssessmentOutcome {
    pub device_id: String,
    pub sequence: u64,
    pub result: Result<RiskAssessment, EngineError>,
}

impl AssessmentOutcome {
    /// True when the assessment succeeded and recommends evacuation.
    pub fn should_navigate(&self) -> bool {
        self.result.as_ref().is_ok_and(|a| a.should_navigate)
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct Monitor {
    engine: Arc<FloodRiskEngine>,
    pool: ThreadPool,
}

impl Monitor {
    pub fn new(engine: Arc<FloodRiskEngine>) -> Self {
        Self::with_config(engine, MonitorConfig::default())
    }

    pub fn with_config(engine: Arc<FloodRiskEngine>, config: MonitorConfig) -> Self {
        Self {
            engine,
            pool: ThreadPool::with_name("floodrisk-assess".to_string(), config.workers.max(1)),
        }
    }

    /// Queues one message for assessment; the outcome is sent on `tx`.
    pub fn submit(&self, message: SensorMessage, tx: Sender<AssessmentOutcome>) {
        let engine = Arc::clone(&self.engine);
        self.pool.execute(move || {
            let result = engine.assess(&message.reading, &message.location);
            match &result {
                Ok(a) if a.should_navigate => info!(
                    device = %message.device_id,
                    sequence = message.sequence,
                    alerts = a.alerts.len(),
                    level = %a.risk_level,
                    "threshold alert; evacuation advised"
                ),
                Ok(a) => debug!(
                    device = %message.device_id,
                    sequence = message.sequence,
                    level = %a.risk_level,
                    "reading assessed"
                ),
                Err(e) => warn!(
                    device = %message.device_id,
                    sequence = message.sequence,
                    error = %e,
                    "assessment failed"
                ),
            }

            let outcome = AssessmentOutcome {
                device_id: message.device_id,
                sequence: message.sequence,
                result,
            };
            if tx.send(outcome).is_err() {
                debug!("outcome receiver gone; dropping result");
            }
        });
    }

    /// Drains `rx` until every producer hangs up, assessing each message on
    /// the pool. Waits for in-flight work before returning the number of
    /// messages processed. `tx` is dropped on return, so a consumer
    /// iterating the outcome channel ends once the last outcome is read.
    pub fn run(&self, rx: Receiver<SensorMessage>, tx: Sender<AssessmentOutcome>) -> usize {
        info!(workers = self.pool.max_count(), "monitor started");

        let mut processed = 0usize;
        for message in rx {
            self.submit(message, tx.clone());
            processed += 1;
        }

        self.pool.join();
        if self.pool.panic_count() > 0 {
            warn!(panics = self.pool.panic_count(), "assessment workers panicked");
        }
        info!(processed, "monitor stopped; input channel closed");
        processed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
