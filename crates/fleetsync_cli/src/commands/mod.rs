//! CLI command implementations.

pub mod plan;
pub mod results;
pub mod revert;
pub mod sync;

use crate::client::ReqwestClient;
use fleetsync_engine::{
    AdaptiveRateLimiter, DryRunSwitch, EngineConfig, HttpDestinationConfig, HttpStack,
    PlanSummary, RateLimitedSource, SourceAdapter, SyncExecutor,
};
use fleetsync_model::{SourceRecord, SyncAction, SyncItem};
use fleetsync_store::JsonFileSource;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

/// Executor as wired by the CLI: every reqwest request passes the
/// destination limiter, with the transport guard above it.
pub type CmdbExecutor = SyncExecutor<HttpStack<ReqwestClient>>;

/// Connection settings for the CMDB.
pub struct Remote {
    base_url: Option<String>,
    token: Option<String>,
}

impl Remote {
    /// Creates connection settings.
    pub fn new(base_url: Option<String>, token: Option<String>) -> Self {
        Self { base_url, token }
    }

    /// Base URL, if configured.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Builds the executor over the CMDB API, with both dry-run guards
    /// bound to `switch`.
    pub fn executor(
        &self,
        switch: DryRunSwitch,
        config: EngineConfig,
    ) -> Result<CmdbExecutor, Box<dyn Error>> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or("CMDB base URL required (--base-url or FLEETSYNC_BASE_URL)")?;
        let client = ReqwestClient::new(self.token.clone())?;
        Ok(SyncExecutor::http(
            HttpDestinationConfig::new(base_url),
            client,
            switch,
            config,
        ))
    }
}

/// Reads the registry export through the source limiter.
pub fn load_source(path: &Path, config: &EngineConfig) -> Result<Vec<SourceRecord>, Box<dyn Error>> {
    let limiter = Arc::new(AdaptiveRateLimiter::new("source", config.source_limits.clone()));
    let source = RateLimitedSource::new(JsonFileSource::new(path), limiter);
    Ok(source.fetch()?)
}

/// Asks for a literal `yes` on stdin.
pub fn confirm(question: &str) -> io::Result<bool> {
    print!("{question} Type 'yes' to continue: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}

/// Lower-case action name.
pub fn action_name(action: SyncAction) -> &'static str {
    match action {
        SyncAction::Create => "create",
        SyncAction::Update => "update",
        SyncAction::Skip => "skip",
    }
}

/// Prints the plan summary block.
pub fn print_summary(summary: &PlanSummary) {
    println!("Plan:");
    println!("  Items:   {}", summary.total);
    println!("  Create:  {}", summary.creates());
    println!("  Update:  {}", summary.updates());
    println!("  Skip:    {}", summary.skips());
    if !summary.by_classification.is_empty() {
        println!();
        println!("By classification:");
        for (classification, count) in &summary.by_classification {
            println!("  {:<16} {count}", classification.label());
        }
    }
}

/// Prints one planned item with its changed fields.
pub fn print_item(item: &SyncItem) {
    let target = item.matched.destination_id.as_deref().unwrap_or("-");
    println!(
        "  {:<7} {:<24} {:<16} -> {} #{}",
        action_name(item.action),
        item.display_name(),
        item.classification.label(),
        item.mapped.endpoint,
        target
    );
    if item.action == SyncAction::Update {
        for field in item.changed_fields() {
            println!("            ~ {field}");
        }
    }
}
