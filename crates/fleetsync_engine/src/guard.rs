//! Dry-run interception.
//!
//! Two independent layers read the same [`DryRunSwitch`]:
//!
//! - [`DryRunGuard`] wraps a [`DestinationAdapter`] and answers every write
//!   with a synthesized success without calling the adapter.
//! - [`VerbGuard`] wraps an [`HttpClient`] and refuses any mutating verb
//!   that still reaches the transport while dry-run is on.
//!
//! Reads pass both layers untouched.

use crate::adapter::DestinationAdapter;
use crate::error::{EngineResult, SyncError};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use fleetsync_model::{Attributes, DestinationRecord, Endpoint};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Prefix of identifiers synthesized for intercepted creates.
pub const DRY_RUN_ID_PREFIX: &str = "dry-run-";

/// Shared dry-run flag.
///
/// Clones observe the same flag, so the executor can flip it for a run and
/// both guard layers see the change.
#[derive(Debug, Clone, Default)]
pub struct DryRunSwitch {
    enabled: Arc<AtomicBool>,
}

impl DryRunSwitch {
    /// Creates a switch.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    /// Returns true while dry-run is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turns dry-run on or off.
    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

/// Operation-level interceptor.
pub struct DryRunGuard<D> {
    inner: D,
    switch: DryRunSwitch,
}

impl<D: DestinationAdapter> DryRunGuard<D> {
    /// Wraps an adapter.
    pub fn new(inner: D, switch: DryRunSwitch) -> Self {
        Self { inner, switch }
    }

    /// The switch this guard reads.
    pub fn switch(&self) -> &DryRunSwitch {
        &self.switch
    }

    /// The wrapped adapter.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: DestinationAdapter> DestinationAdapter for DryRunGuard<D> {
    fn create(&self, endpoint: Endpoint, attrs: &Attributes) -> EngineResult<String> {
        if self.switch.is_enabled() {
            let id = format!("{DRY_RUN_ID_PREFIX}{}", Uuid::new_v4());
            info!(%endpoint, %id, "dry-run: create intercepted");
            return Ok(id);
        }
        self.inner.create(endpoint, attrs)
    }

    fn update(
        &self,
        endpoint: Option<Endpoint>,
        id: &str,
        attrs: &Attributes,
    ) -> EngineResult<()> {
        if self.switch.is_enabled() {
            info!(?endpoint, id, fields = attrs.len(), "dry-run: update intercepted");
            return Ok(());
        }
        self.inner.update(endpoint, id, attrs)
    }

    fn delete(&self, endpoint: Endpoint, id: &str) -> EngineResult<()> {
        if self.switch.is_enabled() {
            info!(%endpoint, id, "dry-run: delete intercepted");
            return Ok(());
        }
        self.inner.delete(endpoint, id)
    }

    fn list(&self) -> EngineResult<Vec<DestinationRecord>> {
        self.inner.list()
    }
}

/// Transport-level interceptor.
pub struct VerbGuard<C> {
    inner: C,
    switch: DryRunSwitch,
}

impl<C: HttpClient> VerbGuard<C> {
    /// Wraps a client.
    pub fn new(inner: C, switch: DryRunSwitch) -> Self {
        Self { inner, switch }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: HttpClient> HttpClient for VerbGuard<C> {
    fn send(&self, request: &HttpRequest) -> EngineResult<HttpResponse> {
        if self.switch.is_enabled() && request.method.is_mutating() {
            warn!(
                method = %request.method,
                url = %request.url,
                "dry-run: mutating request refused at transport"
            );
            return Err(SyncError::DryRunBlocked {
                method: request.method.to_string(),
                url: request.url.clone(),
            });
        }
        self.inner.send(request)
    }
}
