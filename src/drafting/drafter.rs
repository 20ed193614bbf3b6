use anyhow::{Context, Result};
use std::sync::Arc;

use super::store::DraftStore;
use super::types::{DraftItem, DraftTask};
use super::worker::DraftWorker;
use crate::generation::{CachedGenerator, GenerationRequest, Generator};

/// Drafts sections through the cached generator and saves them to a [`DraftStore`]
///
/// Prompt construction stays with the caller: `build_request` turns a task
/// into the request sent to the model.
pub struct GeneratingDrafter<G, F> {
    generator: Arc<CachedGenerator<G>>,
    store: DraftStore,
    build_request: F,
}

impl<G, F> GeneratingDrafter<G, F> {
    pub fn new(generator: Arc<CachedGenerator<G>>, store: DraftStore, build_request: F) -> Self {
        Self {
            generator,
            store,
            build_request,
        }
    }

    pub fn store(&self) -> &DraftStore {
        &self.store
    }
}

impl<S, G, F> DraftWorker<S> for GeneratingDrafter<G, F>
where
    S: DraftItem,
    G: Generator,
    F: Fn(&DraftTask<S>) -> GenerationRequest + Send + Sync,
{
    fn draft(&self, task: &DraftTask<S>) -> Result<String> {
        let request = (self.build_request)(task);
        let generation = self
            .generator
            .generate(&request)
            .with_context(|| format!("Generation failed for {}", task.id()))?;

        self.store.save(task.id(), &generation.text)?;
        Ok(generation.text)
    }

    fn already_drafted(&self, id: &str) -> bool {
        self.store.exists(id)
    }
}
