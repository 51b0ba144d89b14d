//! Highlighting followed by post-processing.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::block::Block;
use crate::cache;
use crate::client::Client;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::policy::ErrorPolicy;

/// Rewrites a highlighted block in place.
///
/// Processors run after the block is fully resolved (from the cache, the
/// service, or the local fallback), in the order they were added. Each one
/// sees the changes made by the ones before it.
pub trait PostProcessor: Send + Sync {
    fn process(&self, block: &mut Block);
}

impl<F> PostProcessor for F
where
    F: Fn(&mut Block) + Send + Sync,
{
    fn process(&self, block: &mut Block) {
        self(block)
    }
}

type Factory = Arc<dyn Fn() -> Box<dyn PostProcessor> + Send + Sync>;

/// A post-processor to add: either an instance, or the name of one
/// registered with [`Manager::register_processor`].
pub enum ProcessorRef {
    Instance(Box<dyn PostProcessor>),
    Named(String),
}

impl ProcessorRef {
    pub fn instance(processor: impl PostProcessor + 'static) -> Self {
        ProcessorRef::Instance(Box::new(processor))
    }

    pub fn named(name: impl Into<String>) -> Self {
        ProcessorRef::Named(name.into())
    }
}

impl From<Box<dyn PostProcessor>> for ProcessorRef {
    fn from(processor: Box<dyn PostProcessor>) -> Self {
        ProcessorRef::Instance(processor)
    }
}

impl From<&str> for ProcessorRef {
    fn from(name: &str) -> Self {
        ProcessorRef::Named(name.to_string())
    }
}

impl From<String> for ProcessorRef {
    fn from(name: String) -> Self {
        ProcessorRef::Named(name)
    }
}

impl std::fmt::Debug for ProcessorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessorRef::Instance(_) => f.write_str("ProcessorRef::Instance(..)"),
            ProcessorRef::Named(name) => f.debug_tuple("ProcessorRef::Named").field(name).finish(),
        }
    }
}

/// Runs the [`Client`] and then every registered post-processor.
///
/// The manager owns the error policy: it is derived from the configured
/// environment and can be overridden with [`override_environment`].
///
/// [`override_environment`]: Manager::override_environment
pub struct Manager {
    client: Client,
    processors: Vec<Box<dyn PostProcessor>>,
    registry: HashMap<String, Factory>,
    environment: Option<String>,
}

impl Manager {
    /// Build a manager over HTTP with the cache store named in `config`.
    pub fn new(config: Config) -> Result<Self> {
        let cache = cache::store_from_config(&config)?;
        let client = Client::new(config, cache)?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            processors: Vec::new(),
            registry: HashMap::new(),
            environment: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The active environment: the override if set, else the configured one.
    pub fn environment(&self) -> &str {
        self.environment
            .as_deref()
            .unwrap_or(&self.client.config().environment)
    }

    /// Replace (or, with `None`, restore) the environment used to decide
    /// whether errors are raised.
    pub fn override_environment(&mut self, environment: Option<&str>) {
        self.environment = environment.map(str::to_string);
        let policy = ErrorPolicy::for_environment(self.environment());
        self.client.set_policy(policy);
    }

    /// Make a processor available by name to [`add_post_processors`].
    ///
    /// [`add_post_processors`]: Manager::add_post_processors
    pub fn register_processor<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn PostProcessor> + Send + Sync + 'static,
    {
        self.registry.insert(name.into(), Arc::new(factory));
    }

    /// Append one processor.
    pub fn add_post_processor(&mut self, processor: impl PostProcessor + 'static) {
        self.processors.push(Box::new(processor));
    }

    /// Append processors in order.
    ///
    /// A name that was never registered is a configuration error. Processors
    /// before it stay added; it and everything after it are not.
    pub fn add_post_processors<I>(&mut self, processors: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<ProcessorRef>,
    {
        for processor in processors {
            let processor = match processor.into() {
                ProcessorRef::Instance(processor) => processor,
                ProcessorRef::Named(name) => match self.registry.get(&name) {
                    Some(factory) => factory(),
                    None => {
                        return Err(Error::configuration(format!(
                            "Post-processor '{name}' is not a registered post-processor"
                        )));
                    }
                },
            };
            self.processors.push(processor);
        }
        Ok(())
    }

    pub fn post_processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Highlight `blocks` and post-process the result.
    pub fn highlight(&self, blocks: impl IntoIterator<Item = Block>) -> Result<Vec<Block>> {
        let mut blocks = self.client.highlight(blocks)?;
        self.run_pipeline(&mut blocks);
        Ok(blocks)
    }

    /// Run every processor over every resolved block, block by block.
    pub fn run_pipeline(&self, blocks: &mut [Block]) {
        for block in blocks.iter_mut().filter(|b| b.is_resolved()) {
            for processor in &self.processors {
                processor.process(block);
            }
        }
    }

    /// Ids of every `__torchlight-block-[id]` placeholder in `content`, in
    /// order of first appearance, without duplicates.
    pub fn find_block_ids(content: &str) -> Vec<String> {
        static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"__torchlight-block-\[(.+?)\]").expect("placeholder regex is valid")
        });

        let mut ids: Vec<String> = Vec::new();
        for captures in PLACEHOLDER.captures_iter(content) {
            let id = &captures[1];
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
        ids
    }
}
