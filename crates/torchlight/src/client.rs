//! Cache-first batch highlighting.
//!
//! [`Client::highlight`] resolves a batch of blocks in three steps:
//!
//! 1. Fill every block it can from the cache.
//! 2. Send the rest to the highlight service in a single request (or, with
//!    `chunk_size` set, one request per chunk, all in flight at once).
//! 3. Merge the answers back by id, render anything still missing locally,
//!    and cache what the service actually answered.
//!
//! Blocks the service never answered for are not cached, so a service outage
//! does not outlive itself.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::block::{Block, Rendered};
use crate::cache::{self, BLOCK_TTL, CacheStore};
use crate::config::Config;
use crate::error::{Error, RequestError, Result};
use crate::policy::ErrorPolicy;
use crate::service::{HighlightRequest, HighlightResponse, HighlightService, HttpService};

/// Resolves blocks through the cache and the highlight service.
pub struct Client {
    config: Config,
    cache: Arc<dyn CacheStore>,
    service: Arc<dyn HighlightService>,
    policy: ErrorPolicy,
}

impl Client {
    /// Create a client talking to the configured host over HTTP.
    pub fn new(config: Config, cache: Arc<dyn CacheStore>) -> Result<Self> {
        let service = Arc::new(HttpService::from_config(&config)?);
        Ok(Self::with_service(config, cache, service))
    }

    /// Create a client with an explicit service implementation.
    pub fn with_service(
        config: Config,
        cache: Arc<dyn CacheStore>,
        service: Arc<dyn HighlightService>,
    ) -> Self {
        let policy = ErrorPolicy::from_config(&config);
        Self {
            config,
            cache,
            service,
            policy,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Replace the policy derived from the configured environment.
    pub fn set_policy(&mut self, policy: ErrorPolicy) {
        self.policy = policy;
    }

    /// The cache key for a block.
    pub fn cache_key(&self, block: &Block) -> String {
        cache::block_key(block)
    }

    /// Highlight a batch of blocks.
    ///
    /// Blocks are keyed by id; when two blocks share an id the later one
    /// replaces the earlier one but keeps its position. The result is in
    /// submission order and every block in it has `wrapped` and
    /// `highlighted` set.
    ///
    /// At most one request is made (per chunk, with chunking enabled), and
    /// none when everything is cached.
    pub fn highlight(&self, blocks: impl IntoIterator<Item = Block>) -> Result<Vec<Block>> {
        let mut blocks = self.index(blocks);
        let total = blocks.len();

        self.fill_from_cache(blocks.values_mut());

        let mut needed: Vec<&mut Block> = blocks
            .values_mut()
            .filter(|block| !block.is_resolved())
            .collect();

        tracing::debug!(
            cached = total - needed.len(),
            needed = needed.len(),
            "resolved blocks from cache"
        );

        if !needed.is_empty() {
            self.request(&mut needed)?;
        }

        Ok(blocks.into_values().collect())
    }

    fn index(&self, blocks: impl IntoIterator<Item = Block>) -> IndexMap<String, Block> {
        let mut indexed = IndexMap::new();
        for mut block in blocks {
            if block.theme.is_none() {
                block.theme = Some(self.config.theme.clone());
            }
            indexed.insert(block.id.clone(), block);
        }
        indexed
    }

    fn fill_from_cache<'a>(&self, blocks: impl Iterator<Item = &'a mut Block>) {
        for block in blocks {
            let key = self.cache_key(block);
            let Some(cached) = self.cache.get(&key) else {
                continue;
            };

            // Bare strings are sentinels from other writers, not entries.
            if cached.is_string() {
                continue;
            }

            match serde_json::from_value::<Rendered>(cached) {
                Ok(rendered) => {
                    tracing::trace!(id = %block.id, key = %key, "cache hit");
                    block.apply(&rendered);
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "ignoring malformed cache entry"),
            }
        }
    }

    /// Request highlighting for `blocks`, merge the answers into them, and
    /// fall back to local rendering for anything left over.
    fn request(&self, blocks: &mut [&mut Block]) -> Result<()> {
        let responses = match self.token()? {
            Some(token) => match self.config.chunk_size {
                Some(size) if size > 0 && blocks.len() > size => {
                    self.request_chunks(token, blocks, size)
                }
                _ => vec![self.send(token, blocks)],
            },
            None => Vec::new(),
        };

        let mut answered: HashMap<String, Rendered> = HashMap::new();
        for response in responses {
            match response {
                Ok(response) => answered.extend(response.into_map()),
                Err(e) => self.policy.check(Error::Request(e))?,
            }
        }

        for block in blocks.iter_mut() {
            if let Some(rendered) = answered.get(&block.id) {
                block.apply(rendered);
            }
            if block.ensure_rendered() {
                tracing::debug!(id = %block.id, "rendered block locally");
            }
        }

        self.store(blocks, &answered);
        Ok(())
    }

    /// Fire one request per chunk concurrently and wait for all of them.
    ///
    /// Requests block on I/O, so they run on a pool with one thread per
    /// chunk instead of the global rayon pool.
    fn request_chunks(
        &self,
        token: &str,
        blocks: &[&mut Block],
        size: usize,
    ) -> Vec<Result<HighlightResponse, RequestError>> {
        let chunks = blocks.len().div_ceil(size);
        tracing::debug!(
            blocks = blocks.len(),
            chunk_size = size,
            chunks,
            "requesting blocks in chunks"
        );

        let fan_out = || -> Vec<Result<HighlightResponse, RequestError>> {
            blocks
                .par_chunks(size)
                .with_max_len(1)
                .map(|chunk| self.send(token, chunk))
                .collect()
        };

        match rayon::ThreadPoolBuilder::new().num_threads(chunks).build() {
            Ok(pool) => pool.install(fan_out),
            Err(e) => {
                tracing::warn!(error = %e, "could not start request pool, using the global pool");
                fan_out()
            }
        }
    }

    fn send(
        &self,
        token: &str,
        blocks: &[&mut Block],
    ) -> Result<HighlightResponse, RequestError> {
        let request = HighlightRequest::new(blocks.iter().map(|block| &**block));
        let span = tracing::debug_span!("highlight_request", blocks = blocks.len());
        span.in_scope(|| self.service.highlight(token, &request))
    }

    fn token(&self) -> Result<Option<&str>> {
        let token = self.config.token();
        if token.is_none() {
            self.policy
                .check(Error::configuration("No Torchlight token configured."))?;
        }
        Ok(token)
    }

    /// Cache every block the service answered for.
    fn store(&self, blocks: &[&mut Block], answered: &HashMap<String, Rendered>) {
        for block in blocks.iter().filter(|b| answered.contains_key(&b.id)) {
            let rendered = block.rendered();
            if rendered.is_empty() {
                continue;
            }
            match serde_json::to_value(&rendered) {
                Ok(value) => self.cache.put(&self.cache_key(block), value, BLOCK_TTL),
                Err(e) => tracing::warn!(id = %block.id, error = %e, "could not cache block"),
            }
        }
    }
}
