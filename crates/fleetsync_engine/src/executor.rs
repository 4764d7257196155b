//! Sync execution.
//!
//! The executor owns the destination adapter wrapped in its gates. For
//! in-process adapters the limiter gates each operation:
//!
//! ```text
//! DryRunGuard -> RateLimitedDestination -> adapter
//! ```
//!
//! For the HTTP adapter it gates each request on the wire, so pages and
//! re-sends are paced individually:
//!
//! ```text
//! DryRunGuard -> HttpDestination -> VerbGuard -> RateLimitedClient -> client
//! ```
//!
//! Items run strictly in order, one at a time. The only place a run
//! suspends is the limiter wait in front of each remote call.

use crate::adapter::DestinationAdapter;
use crate::config::{EngineConfig, HttpDestinationConfig};
use crate::error::{EngineResult, SyncError};
use crate::guard::{DryRunGuard, DryRunSwitch, VerbGuard};
use crate::http::{HttpClient, HttpDestination};
use crate::limiter::{
    AdaptiveRateLimiter, LimiterStats, RateLimitedClient, RateLimitedDestination,
};
use crate::plan::build_plan;
use crate::revert::{revert_run, RevertReport};
use chrono::Utc;
use fleetsync_model::{
    DestinationRecord, ItemOutcome, OutcomeStatus, RevertEntry, RevertLog, SourceRecord,
    SyncAction, SyncItem, SyncResult,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which items a run may execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every item.
    #[default]
    All,
    /// Only items whose source id is listed.
    Only(BTreeSet<String>),
}

impl Selection {
    /// Builds a selection from source ids. No ids means all items.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            Selection::All
        } else {
            Selection::Only(ids)
        }
    }

    /// Returns true if the source id may execute.
    pub fn includes(&self, source_id: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(ids) => ids.contains(source_id),
        }
    }
}

/// Options for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Intercept every write.
    pub dry_run: bool,
    /// The operator already confirmed. Read by the presentation layer only.
    pub auto_confirm: bool,
    /// Skip updates, only create.
    pub create_only: bool,
    /// Eligible items.
    pub selection: Selection,
}

/// Destination stack built by [`SyncExecutor::http`].
pub type HttpStack<C> = HttpDestination<VerbGuard<RateLimitedClient<C>>>;

impl RunOptions {
    /// Creates options for a full, live run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets dry-run.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets auto-confirm.
    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    /// Sets create-only.
    pub fn with_create_only(mut self, create_only: bool) -> Self {
        self.create_only = create_only;
        self
    }

    /// Sets the selection.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// The action `item` actually runs under these options, with the
    /// reason when it is skipped.
    pub fn effective_action(&self, item: &SyncItem) -> (SyncAction, Option<&'static str>) {
        if !self.selection.includes(&item.source.id) {
            return (SyncAction::Skip, Some("not selected"));
        }
        match item.action {
            SyncAction::Create => (SyncAction::Create, None),
            SyncAction::Update if self.create_only => (SyncAction::Skip, Some("create-only")),
            SyncAction::Update => (SyncAction::Update, None),
            SyncAction::Skip => (SyncAction::Skip, Some("no changes")),
        }
    }
}

/// Cooperative cancellation signal, checked between items.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Retries a call while it is throttled, up to `max_retries` extra attempts.
///
/// The wait between attempts comes from the limiter gating the call, which
/// has already backed off by the time the error surfaces here.
pub(crate) fn with_throttle_retry<T>(
    max_retries: u32,
    mut call: impl FnMut() -> EngineResult<T>,
) -> EngineResult<T> {
    let mut attempt = 0;
    loop {
        match call() {
            Err(err) if err.is_throttled() && attempt < max_retries => {
                attempt += 1;
                debug!(attempt, max_retries, "retrying throttled call");
            }
            result => return result,
        }
    }
}

fn destination_limiter(config: &EngineConfig) -> Arc<AdaptiveRateLimiter> {
    Arc::new(AdaptiveRateLimiter::new(
        "destination",
        config.destination_limits.clone(),
    ))
}

/// Runs sync items against the destination.
///
/// `D` is the rate-limited adapter stack below the dry-run guard.
pub struct SyncExecutor<D> {
    destination: DryRunGuard<D>,
    limiter: Arc<AdaptiveRateLimiter>,
    switch: DryRunSwitch,
    config: EngineConfig,
}

impl<A: DestinationAdapter> SyncExecutor<RateLimitedDestination<A>> {
    /// Wraps `destination` behind the limiter and the dry-run switch. Every
    /// adapter operation waits its turn at the limiter.
    pub fn new(
        destination: A,
        limiter: Arc<AdaptiveRateLimiter>,
        switch: DryRunSwitch,
        config: EngineConfig,
    ) -> Self {
        let limited = RateLimitedDestination::new(destination, Arc::clone(&limiter));
        Self::assemble(limited, limiter, switch, config)
    }

    /// Creates an executor with its own destination limiter built from
    /// `config`.
    pub fn with_config(destination: A, switch: DryRunSwitch, config: EngineConfig) -> Self {
        let limiter = destination_limiter(&config);
        Self::new(destination, limiter, switch, config)
    }

    /// The wrapped adapter, below both gates.
    pub fn destination(&self) -> &A {
        self.destination.inner().inner()
    }
}

impl<C: HttpClient> SyncExecutor<HttpStack<C>> {
    /// Builds the HTTP stack over `client`. Every request, including each
    /// snapshot page and each re-send, waits its turn at `limiter`; the
    /// transport guard sits above the limiter so refused writes never
    /// consume a slot.
    pub fn http_with_limiter(
        http: HttpDestinationConfig,
        client: C,
        limiter: Arc<AdaptiveRateLimiter>,
        switch: DryRunSwitch,
        config: EngineConfig,
    ) -> Self {
        let limited = RateLimitedClient::new(client, Arc::clone(&limiter));
        let client = VerbGuard::new(limited, switch.clone());
        Self::assemble(HttpDestination::new(http, client), limiter, switch, config)
    }

    /// Builds the HTTP stack with a destination limiter built from
    /// `config`.
    pub fn http(
        http: HttpDestinationConfig,
        client: C,
        switch: DryRunSwitch,
        config: EngineConfig,
    ) -> Self {
        let limiter = destination_limiter(&config);
        Self::http_with_limiter(http, client, limiter, switch, config)
    }

    /// The HTTP adapter, below the dry-run guard.
    pub fn destination(&self) -> &HttpStack<C> {
        self.destination.inner()
    }
}

impl<D: DestinationAdapter> SyncExecutor<D> {
    fn assemble(
        destination: D,
        limiter: Arc<AdaptiveRateLimiter>,
        switch: DryRunSwitch,
        config: EngineConfig,
    ) -> Self {
        Self {
            destination: DryRunGuard::new(destination, switch.clone()),
            limiter,
            switch,
            config,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Statistics of the destination limiter.
    pub fn limiter_stats(&self) -> LimiterStats {
        self.limiter.stats()
    }

    /// Reads the destination snapshot through the limiter.
    pub fn fetch_snapshot(&self) -> EngineResult<Vec<DestinationRecord>> {
        let snapshot = with_throttle_retry(self.config.max_throttle_retries, || {
            self.destination.list()
        })?;
        info!(records = snapshot.len(), "fetched destination snapshot");
        Ok(snapshot)
    }

    /// Fetches the snapshot and builds the plan for `records`.
    pub fn plan(&self, records: &[SourceRecord]) -> EngineResult<Vec<SyncItem>> {
        let snapshot = self.fetch_snapshot()?;
        Ok(build_plan(records, &snapshot))
    }

    /// Executes planned items in order.
    ///
    /// Every successful live create is appended to `log` as soon as it
    /// happens. Item failures are recorded in the result and the run moves
    /// on; an authentication failure aborts the run with an error, keeping
    /// the entries already appended.
    pub fn execute(
        &self,
        items: &[SyncItem],
        options: &RunOptions,
        cancel: &CancelToken,
        log: &mut RevertLog,
    ) -> EngineResult<SyncResult> {
        self.switch.set(options.dry_run);
        let run_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now();

        info!(
            %run_id,
            items = items.len(),
            dry_run = options.dry_run,
            create_only = options.create_only,
            "sync run started"
        );

        let mut outcomes = Vec::with_capacity(items.len());
        let mut cancelled = false;
        for (idx, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(%run_id, processed = idx, remaining = items.len() - idx, "sync run cancelled");
                cancelled = true;
                break;
            }

            outcomes.push(self.execute_item(item, options, &run_id, log)?);

            let done = idx + 1;
            if self.config.progress_every > 0 && done % self.config.progress_every == 0 {
                info!(%run_id, done, total = items.len(), "sync progress");
            }
        }

        let result =
            SyncResult::from_outcomes(run_id, timestamp, options.dry_run, cancelled, outcomes);
        info!(
            run_id = %result.run_id,
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            errors = result.errors,
            cancelled = result.cancelled,
            "sync run finished"
        );
        Ok(result)
    }

    /// Deletes the records created by `run_id` and consumes their log
    /// entries. With `dry_run` the deletes are intercepted and the log is
    /// left untouched.
    pub fn revert(
        &self,
        run_id: &str,
        log: &mut RevertLog,
        dry_run: bool,
    ) -> EngineResult<RevertReport> {
        self.switch.set(dry_run);
        revert_run(
            &self.destination,
            log,
            run_id,
            dry_run,
            self.config.max_throttle_retries,
        )
    }

    fn execute_item(
        &self,
        item: &SyncItem,
        options: &RunOptions,
        run_id: &str,
        log: &mut RevertLog,
    ) -> EngineResult<ItemOutcome> {
        let (action, skip_reason) = options.effective_action(item);
        let endpoint = item.mapped.endpoint;
        let name = item.display_name().to_string();

        let mut outcome = ItemOutcome {
            source_id: item.source.id.clone(),
            name: name.clone(),
            classification: item.classification,
            endpoint,
            action,
            status: OutcomeStatus::Skipped,
            destination_id: item.matched.destination_id.clone(),
            changed_fields: item.changed_fields(),
            message: skip_reason.map(str::to_string),
            error: None,
        };

        let retries = self.config.max_throttle_retries;
        let result = match action {
            SyncAction::Skip => return Ok(outcome),
            SyncAction::Create => {
                with_throttle_retry(retries, || self.destination.create(endpoint, &item.mapped.fields))
                    .map(|id| {
                        if !options.dry_run {
                            log.append(RevertEntry::new(id.clone(), endpoint, run_id, name.clone()));
                        }
                        outcome.destination_id = Some(id);
                        OutcomeStatus::Created
                    })
            }
            SyncAction::Update => match item.matched.destination_id.as_deref() {
                Some(id) => {
                    let payload = item.update_payload();
                    // The record keeps its collection even when the device
                    // now classifies into another one.
                    let collection = item.matched.endpoint;
                    with_throttle_retry(retries, || {
                        self.destination.update(collection, id, &payload)
                    })
                    .map(|()| OutcomeStatus::Updated)
                }
                None => Err(SyncError::Protocol(
                    "update planned without a matched destination record".into(),
                )),
            },
        };

        match result {
            Ok(status) => {
                debug!(source_id = %outcome.source_id, ?status, "item done");
                outcome.status = status;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(
                    %run_id,
                    source_id = %outcome.source_id,
                    %endpoint,
                    error = %err,
                    "item failed"
                );
                outcome.status = OutcomeStatus::Failed;
                outcome.error = Some(err.kind());
                outcome.message = Some(err.to_string());
            }
        }
        Ok(outcome)
    }
}
