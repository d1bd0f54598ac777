//! Sync executor: load both sides, diff them, apply the diff to the target.
//!
//! A run moves `Pending -> Running(phase) -> Completed | Failed`. The
//! phases are `LoadingSource -> LoadingTarget -> Diffing -> Applying`; a
//! dry run stops after `Diffing`.
//!
//! Applying walks the diff tree in the order it was built. Creates run
//! parent first, deletes run children first. A per-record write failure is
//! recorded against its node; with `continue_on_failure` the node's subtree
//! is skipped and the walk moves on, otherwise the run aborts. Whatever was
//! applied before an abort stays in the report.

use crate::{
    diff::{AttrChange, DiffElement},
    error::Result,
    telemetry::{MemoryProbe, PhaseMeter, PhaseStats, ProcessMemory},
    Adapter, CreateRequest, Diff, DiffAction, DiffSummary, Error, FieldName, Identifier,
    LoadObserver, ParentRef, Status, SyncOptions, TypeName,
};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Diff nodes visited between memory samples while applying.
const CHECKPOINT_INTERVAL: usize = 256;

/// A phase of a running sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    LoadingSource,
    LoadingTarget,
    Diffing,
    Applying,
}

/// Why a run ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum FailureReason {
    /// Cancellation was observed at a checkpoint.
    Cancelled,
    Error { phase: Phase, message: String },
}

/// Lifecycle of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "camelCase")]
pub enum RunState {
    Pending,
    Running(Phase),
    Completed,
    Failed(FailureReason),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }
}

/// Outcome of one apply attempt, in apply order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub action: DiffAction,
    pub status: Status,
    pub type_name: TypeName,
    pub identifier: Identifier,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub changes: IndexMap<FieldName, AttrChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Records processed per action while applying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCounts {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    /// Excluded by a skip flag, or beneath a failed node.
    pub skip: usize,
    pub no_change: usize,
    pub failed: usize,
}

/// Telemetry for each phase that ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_source: Option<PhaseStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_target: Option<PhaseStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffing: Option<PhaseStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applying: Option<PhaseStats>,
}

impl PhaseTimings {
    fn set(&mut self, phase: Phase, stats: PhaseStats) {
        let slot = match phase {
            Phase::LoadingSource => &mut self.loading_source,
            Phase::LoadingTarget => &mut self.loading_target,
            Phase::Diffing => &mut self.diffing,
            Phase::Applying => &mut self.applying,
        };
        *slot = Some(stats);
    }
}

/// Everything known about a run once it ends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub source: String,
    pub target: String,
    pub diff: Option<Diff>,
    pub summary: Option<DiffSummary>,
    pub applied: ActionCounts,
    pub phases: PhaseTimings,
    pub log: Vec<SyncLogEntry>,
    pub error: Option<String>,
}

impl SyncReport {
    fn new(source: &str, target: &str, dry_run: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Pending,
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            source: source.to_string(),
            target: target.to_string(),
            diff: None,
            summary: None,
            applied: ActionCounts::default(),
            phases: PhaseTimings::default(),
            log: Vec::new(),
            error: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == RunState::Failed(FailureReason::Cancelled)
    }

    /// Log entries of failed apply attempts.
    pub fn failures(&self) -> impl Iterator<Item = &SyncLogEntry> {
        self.log.iter().filter(|entry| entry.status == Status::Failure)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    fn enter(&mut self, phase: Phase) {
        info!(run_id = %self.id, phase = ?phase, "entering phase");
        self.state = RunState::Running(phase);
    }

    fn complete(&mut self) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
        info!(
            run_id = %self.id,
            create = self.applied.create,
            update = self.applied.update,
            delete = self.applied.delete,
            failed = self.applied.failed,
            "sync completed"
        );
    }

    fn fail(&mut self, phase: Phase, err: Error) {
        self.finished_at = Some(Utc::now());
        self.error = Some(err.to_string());
        self.state = match err {
            Error::Cancelled => {
                warn!(run_id = %self.id, phase = ?phase, "sync cancelled");
                RunState::Failed(FailureReason::Cancelled)
            }
            other => {
                error!(run_id = %self.id, phase = ?phase, error = %other, "sync failed");
                RunState::Failed(FailureReason::Error {
                    phase,
                    message: other.to_string(),
                })
            }
        };
    }
}

/// Result of applying one diff to a target.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub applied: ActionCounts,
    pub log: Vec<SyncLogEntry>,
    pub stats: PhaseStats,
    /// Set when the walk aborted.
    pub error: Option<Error>,
}

/// Runs syncs with one set of options.
pub struct Synchronizer {
    options: SyncOptions,
    cancel: CancellationToken,
    probe: Arc<dyn MemoryProbe>,
}

impl Synchronizer {
    pub fn new(options: SyncOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
            probe: Arc::new(ProcessMemory),
        }
    }

    /// Builder-style method to share a cancellation token with the caller.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run a full sync of `source` into `target`.
    pub async fn run(&self, source: &mut dyn Adapter, target: &mut dyn Adapter) -> SyncReport {
        let mut report = SyncReport::new(source.name(), target.name(), self.options.dry_run);
        info!(
            run_id = %report.id,
            source = %report.source,
            target = %report.target,
            dry_run = report.dry_run,
            "sync started"
        );

        if !self.load(&mut report, Phase::LoadingSource, source).await
            || !self.load(&mut report, Phase::LoadingTarget, target).await
        {
            return report;
        }

        if self.cancel.is_cancelled() {
            report.fail(Phase::Diffing, Error::Cancelled);
            return report;
        }
        report.enter(Phase::Diffing);
        let meter = PhaseMeter::start(self.probe.as_ref());
        let diffed = crate::diff_stores(source.store(), target.store(), &self.options.diff);
        report.phases.set(Phase::Diffing, meter.finish());
        let diff = match diffed {
            Ok(diff) => diff,
            Err(err) => {
                report.fail(Phase::Diffing, err);
                return report;
            }
        };
        let summary = diff.summary();
        info!(run_id = %report.id, summary = %summary, "diff computed");
        report.summary = Some(summary);
        report.applied.skip = summary.skip;

        if self.options.dry_run {
            report.diff = Some(diff);
            report.complete();
            return report;
        }

        if self.cancel.is_cancelled() {
            report.diff = Some(diff);
            report.fail(Phase::Applying, Error::Cancelled);
            return report;
        }
        report.enter(Phase::Applying);
        let outcome = self.apply(&diff, target).await;
        report.phases.set(Phase::Applying, outcome.stats);
        report.applied.create += outcome.applied.create;
        report.applied.update += outcome.applied.update;
        report.applied.delete += outcome.applied.delete;
        report.applied.skip += outcome.applied.skip;
        report.applied.no_change += outcome.applied.no_change;
        report.applied.failed += outcome.applied.failed;
        report.log = outcome.log;

        if let Some(err) = outcome.error {
            report.diff = Some(diff);
            report.fail(Phase::Applying, err);
            return report;
        }

        let completed = target.sync_complete(&diff, &self.options).await;
        report.diff = Some(diff);
        match completed {
            Ok(()) => report.complete(),
            Err(err) => report.fail(Phase::Applying, err),
        }
        report
    }

    /// Run one load phase. Returns false once the report has failed.
    async fn load(&self, report: &mut SyncReport, phase: Phase, adapter: &mut dyn Adapter) -> bool {
        if self.cancel.is_cancelled() {
            report.fail(phase, Error::Cancelled);
            return false;
        }
        report.enter(phase);
        let sampler = LoadSampler(Mutex::new(PhaseMeter::start(self.probe.as_ref())));
        let loaded = adapter.load_observed(&self.cancel, &sampler).await;
        let meter = sampler.0.into_inner().unwrap_or_else(PoisonError::into_inner);
        report.phases.set(phase, meter.finish());
        if let Err(err) = loaded {
            report.fail(phase, err);
            return false;
        }
        info!(
            run_id = %report.id,
            adapter = %adapter.name(),
            records = adapter.store().count(None),
            "adapter loaded"
        );
        true
    }

    /// Apply a computed diff to `target`'s backing system and store.
    pub async fn apply(&self, diff: &Diff, target: &mut dyn Adapter) -> ApplyOutcome {
        let mut meter = PhaseMeter::start(self.probe.as_ref());
        let mut walk = Apply {
            target,
            continue_on_failure: self.options.continue_on_failure,
            cancel: &self.cancel,
            meter: &mut meter,
            visited: 0,
            applied: ActionCounts::default(),
            log: Vec::new(),
        };
        let result = walk.walk(diff, None).await;
        let Apply { applied, log, .. } = walk;

        ApplyOutcome {
            applied,
            log,
            stats: meter.finish(),
            error: result.err(),
        }
    }
}

/// Takes a memory checkpoint as each top-level type finishes loading.
struct LoadSampler<'p>(Mutex<PhaseMeter<'p>>);

impl LoadObserver for LoadSampler<'_> {
    fn type_loaded(&self, _type_name: &str, _records: usize) {
        if let Ok(mut meter) = self.0.lock() {
            meter.checkpoint();
        }
    }
}

/// State of one apply walk.
struct Apply<'a, 'p> {
    target: &'a mut dyn Adapter,
    continue_on_failure: bool,
    cancel: &'a CancellationToken,
    meter: &'a mut PhaseMeter<'p>,
    visited: usize,
    applied: ActionCounts,
    log: Vec<SyncLogEntry>,
}

impl<'a, 'p> Apply<'a, 'p> {
    fn walk<'b>(&'b mut self, diff: &'b Diff, parent: Option<&'b ParentRef>) -> BoxFuture<'b, Result<()>> {
        async move {
            for element in diff.iter() {
                if self.cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                self.visited += 1;
                if self.visited % CHECKPOINT_INTERVAL == 0 {
                    self.meter.checkpoint();
                }

                match self.node(element, parent).await {
                    Ok(()) => {}
                    Err(err) if self.continue_on_failure && err.is_record_failure() => {
                        debug!(
                            type_name = %element.type_name,
                            identifier = %element.identity,
                            "continuing past failed record"
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(())
        }
        .boxed()
    }

    fn node<'b>(&'b mut self, element: &'b DiffElement, parent: Option<&'b ParentRef>) -> BoxFuture<'b, Result<()>> {
        async move {
            let me = ParentRef {
                type_name: element.type_name.clone(),
                identity: element.identity.clone(),
            };

            match element.action {
                DiffAction::Create => {
                    if let Err(err) = self.create(element, parent).await {
                        self.failed(element, &err);
                        return Err(err);
                    }
                    self.succeeded(element);
                    self.walk(&element.children, Some(&me)).await
                }
                DiffAction::Update => {
                    if let Err(err) = self.update(element).await {
                        self.failed(element, &err);
                        return Err(err);
                    }
                    self.succeeded(element);
                    self.walk(&element.children, Some(&me)).await
                }
                DiffAction::Delete => {
                    let failed_before = self.applied.failed;
                    self.walk(&element.children, Some(&me)).await?;
                    if self.applied.failed > failed_before {
                        warn!(
                            type_name = %element.type_name,
                            identifier = %element.identity,
                            "children not deleted, keeping parent"
                        );
                        self.applied.skip += 1;
                        return Ok(());
                    }
                    if let Err(err) = self.delete(element).await {
                        self.failed(element, &err);
                        return Err(err);
                    }
                    self.succeeded(element);
                    Ok(())
                }
                DiffAction::NoChange => {
                    self.applied.no_change += 1;
                    self.walk(&element.children, Some(&me)).await
                }
            }
        }
        .boxed()
    }

    async fn create(&mut self, element: &DiffElement, parent: Option<&ParentRef>) -> Result<()> {
        let mut request = CreateRequest::new(
            element.type_name.clone(),
            element.ids.clone(),
            element.new_attrs(),
        );
        request.parent = parent.cloned();

        let mut record = self.target.create(&request).await?;
        record.set_status(Status::Success, "created");
        let store = self.target.store_mut();
        match parent {
            Some(parent) => store.add_child(&parent.type_name, &parent.identity, record),
            None => store.add(record),
        }
    }

    async fn update(&mut self, element: &DiffElement) -> Result<()> {
        let record = self
            .target
            .store()
            .get(&element.type_name, &element.identity)?
            .clone();
        let attrs = element.new_attrs();

        self.target.update(&record, &attrs).await?;
        let stored = self
            .target
            .store_mut()
            .get_mut(&element.type_name, &element.identity)?;
        stored.update(&attrs)?;
        stored.set_status(Status::Success, "updated");
        Ok(())
    }

    async fn delete(&mut self, element: &DiffElement) -> Result<()> {
        let record = self
            .target
            .store()
            .get(&element.type_name, &element.identity)?
            .clone();

        self.target.delete(&record).await?;
        let mut removed = self
            .target
            .store_mut()
            .remove(&element.type_name, &element.identity)?;
        removed.delete()?;
        Ok(())
    }

    fn succeeded(&mut self, element: &DiffElement) {
        match element.action {
            DiffAction::Create => self.applied.create += 1,
            DiffAction::Update => self.applied.update += 1,
            DiffAction::Delete => self.applied.delete += 1,
            DiffAction::NoChange => self.applied.no_change += 1,
        }
        debug!(
            action = %element.action,
            type_name = %element.type_name,
            identifier = %element.identity,
            "applied"
        );
        self.log.push(SyncLogEntry {
            action: element.action,
            status: Status::Success,
            type_name: element.type_name.clone(),
            identifier: element.identity.clone(),
            changes: element.changes.clone(),
            message: None,
        });
    }

    fn failed(&mut self, element: &DiffElement, err: &Error) {
        let message = err.to_string();
        warn!(
            action = %element.action,
            type_name = %element.type_name,
            identifier = %element.identity,
            error = %message,
            "apply failed"
        );

        if let Ok(record) = self
            .target
            .store_mut()
            .get_mut(&element.type_name, &element.identity)
        {
            record.set_status(Status::Failure, message.clone());
        }

        self.applied.failed += 1;
        if element.action != DiffAction::Delete {
            self.applied.skip += subtree_size(&element.children);
        }
        self.log.push(SyncLogEntry {
            action: element.action,
            status: Status::Failure,
            type_name: element.type_name.clone(),
            identifier: element.identity.clone(),
            changes: element.changes.clone(),
            message: Some(message),
        });
    }
}

fn subtree_size(diff: &Diff) -> usize {
    diff.iter()
        .map(|element| 1 + subtree_size(&element.children))
        .sum()
}
