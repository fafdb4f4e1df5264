//! Resource discovery protocol
//!
//! Every service adapter exposes its resources through [`ResourceIterator`],
//! a pull-based cursor that yields one top-level resource (with its
//! dependents attached) per call. Adapters usually do not implement the
//! cursor by hand: they implement [`PageSource`] and let [`PagedIterator`]
//! handle buffering, exhaustion, sticky failures, closing and cancellation.

use crate::error::{DiscoveryError, Result};
use crate::model::{Provider, Resource, Service};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Default number of top-level items requested per upstream page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Stateful cursor over discovered resources
#[async_trait]
pub trait ResourceIterator: Send {
    /// Returns the next resource, or `Ok(None)` once the iteration is
    /// exhausted. Exhaustion is permanent. Fails with
    /// [`DiscoveryError::IteratorClosed`] after [`close`](Self::close).
    async fn next(&mut self) -> Result<Option<Resource>>;

    /// Releases upstream handles held by the cursor. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// One cloud service adapter.
///
/// The iterator returned by [`import`](Self::import) borrows the adapter,
/// so the adapter can only be closed once every iterator is gone.
pub trait ResourceImporter: Send + Sync {
    fn service(&self) -> Service;

    fn provider(&self) -> &Provider;

    /// Start a lazy discovery run. No upstream call happens until the first
    /// `next()`.
    fn import(&self, cancel: CancellationToken) -> Box<dyn ResourceIterator + '_>;

    /// Release the upstream client handle
    fn close(self: Box<Self>);
}

/// Builds the adapter for a service
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        provider: &Provider,
        service: Service,
    ) -> Result<Box<dyn ResourceImporter>>;
}

/// Upstream listing for one service, consumed by [`PagedIterator`]
#[async_trait]
pub trait PageSource: Send {
    /// Raw top-level item returned by the listing call
    type Item: Send;

    /// Fetch the next page of at most `page_size` items. `Ok(None)` when no
    /// pages remain.
    async fn fetch_page(&mut self, page_size: usize) -> Result<Option<Vec<Self::Item>>>;

    /// Build the resource tree for one item. `Ok(None)` skips the item.
    async fn enrich(
        &mut self,
        item: Self::Item,
        cancel: &CancellationToken,
    ) -> Result<Option<Resource>>;
}

/// Run an upstream call unless `cancel` fires first
pub async fn guarded<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(DiscoveryError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DiscoveryError::Cancelled),
        result = fut => result,
    }
}

/// [`ResourceIterator`] over a paged upstream listing
pub struct PagedIterator<S: PageSource> {
    source: S,
    cancel: CancellationToken,
    /// Items of the current page not yet yielded
    buffer: VecDeque<S::Item>,
    page_size: usize,
    exhausted: bool,
    failure: Option<DiscoveryError>,
    closed: bool,
    names: NameLedger,
}

impl<S: PageSource> PagedIterator<S> {
    pub fn new(source: S, cancel: CancellationToken) -> Self {
        Self::with_page_size(source, cancel, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(source: S, cancel: CancellationToken, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            source,
            cancel,
            buffer: VecDeque::with_capacity(page_size),
            page_size,
            exhausted: false,
            failure: None,
            closed: false,
            names: NameLedger::default(),
        }
    }

    fn fail(&mut self, error: DiscoveryError) -> DiscoveryError {
        self.buffer.clear();
        self.failure = Some(error.clone());
        error
    }
}

#[async_trait]
impl<S: PageSource> ResourceIterator for PagedIterator<S> {
    async fn next(&mut self) -> Result<Option<Resource>> {
        if self.closed {
            return Err(DiscoveryError::IteratorClosed);
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.fail(DiscoveryError::Cancelled));
            }

            if let Some(item) = self.buffer.pop_front() {
                let enriched = {
                    let cancel = self.cancel.clone();
                    guarded(&cancel, self.source.enrich(item, &cancel)).await
                };
                match enriched {
                    Ok(Some(mut resource)) => {
                        self.names.claim(&mut resource);
                        return Ok(Some(resource));
                    }
                    Ok(None) => continue,
                    Err(e) => return Err(self.fail(e)),
                }
            }

            if self.exhausted {
                return Ok(None);
            }

            let page = {
                let cancel = self.cancel.clone();
                guarded(&cancel, self.source.fetch_page(self.page_size)).await
            };
            match page {
                Ok(Some(items)) => {
                    tracing::debug!("Fetched page with {} items", items.len());
                    self.buffer.extend(items);
                }
                Ok(None) => self.exhausted = true,
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.buffer.clear();
        }
        Ok(())
    }
}

/// Tracks the names handed out by one iteration so that two different
/// resources never share a declarative identifier.
///
/// The first resource to claim a name keeps it and later ones get a
/// suffix, so a colliding name depends on listing order and is not a pure
/// function of the resource id.
#[derive(Debug, Default)]
pub struct NameLedger {
    /// name -> native id
    taken: HashMap<String, String>,
}

impl NameLedger {
    /// Claim names for `resource` and all of its dependents, renaming on
    /// collision
    pub fn claim(&mut self, resource: &mut Resource) {
        self.claim_one(resource);
        for dependent in &mut resource.dependents {
            self.claim(dependent);
        }
    }

    fn claim_one(&mut self, resource: &mut Resource) {
        match self.taken.get(&resource.name) {
            None => {}
            Some(id) if *id == resource.id => return,
            Some(_) => {
                let base = format!("{}_{}", resource.name, resource.resource_type.short_suffix());
                let mut candidate = base.clone();
                let mut n = 2;
                while self
                    .taken
                    .get(&candidate)
                    .is_some_and(|id| *id != resource.id)
                {
                    candidate = format!("{}_{}", base, n);
                    n += 1;
                }
                tracing::warn!(
                    resource = %resource.id,
                    "Name {} already taken, using {}",
                    resource.name,
                    candidate
                );
                resource.name = candidate;
            }
        }
        self.taken.insert(resource.name.clone(), resource.id.clone());
    }
}

/// Drain an iterator into its top-level resources, closing it afterwards
pub async fn collect_resources(
    mut iter: Box<dyn ResourceIterator + '_>,
) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();
    let outcome = loop {
        match iter.next().await {
            Ok(Some(resource)) => resources.push(resource),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    iter.close()?;
    outcome.map(|_| resources)
}
