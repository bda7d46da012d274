//! Process-wide cache of loaded pipelines and tokenizers.
//!
//! Loading a model is the expensive part of a run, so the cache keeps the most
//! recently used pipelines (keyed by task and model) and tokenizers (keyed by
//! model) up to a fixed capacity. Each key owns a slot: the first caller for a
//! key loads into it while later callers for that key wait on the slot. The
//! map lock is only held to find or insert slots, so a slow load never blocks
//! hits on other keys.

use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::{debug, info};

use super::{Backend, EngineError, GenerationParams, GenerationRequest, Pipeline, TaskKind, Tokenizer};

const WARM_UP_PROMPT: &str = "Warm-up input.";

type Slot<V> = Arc<Mutex<Option<V>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// LRU map from key to a lazily filled slot.
struct SlotCache<K, V> {
    kind: &'static str,
    slots: Mutex<LruCache<K, Slot<V>>>,
}

impl<K: Hash + Eq + Clone + Debug, V: Clone> SlotCache<K, V> {
    fn new(kind: &'static str, cap: NonZeroUsize) -> Self {
        Self { kind, slots: Mutex::new(LruCache::new(cap)) }
    }

    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }
        let slot: Slot<V> = Arc::new(Mutex::new(None));
        if let Some((evicted, _)) = slots.push(key.clone(), Arc::clone(&slot)) {
            debug!(kind = self.kind, key = ?evicted, "evicted from cache");
        }
        slot
    }

    /// Value for `key`, running `load` on a miss. A failed load leaves no entry.
    fn get_or_load(&self, key: &K, load: impl FnOnce() -> Result<V, EngineError>) -> Result<V, EngineError> {
        let slot = self.slot(key);
        let mut value = lock(&slot);
        if let Some(v) = value.as_ref() {
            return Ok(v.clone());
        }
        match load() {
            Ok(v) => {
                *value = Some(v.clone());
                Ok(v)
            }
            Err(e) => {
                drop(value);
                let mut slots = lock(&self.slots);
                if slots.peek(key).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                    slots.pop(key);
                }
                Err(e)
            }
        }
    }

    fn len(&self) -> usize {
        lock(&self.slots).len()
    }
}

pub struct ModelCache {
    backend: Arc<dyn Backend>,
    pipelines: SlotCache<(TaskKind, String), Arc<dyn Pipeline>>,
    tokenizers: SlotCache<String, Arc<dyn Tokenizer>>,
}

impl ModelCache {
    /// `capacity` bounds each of the two caches; zero is treated as one.
    pub fn new(backend: Arc<dyn Backend>, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            pipelines: SlotCache::new("pipeline", cap),
            tokenizers: SlotCache::new("tokenizer", cap),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Return the pipeline for `(task, model)`, loading and warming it up on a miss.
    pub fn pipeline(&self, task: TaskKind, model: &str) -> Result<Arc<dyn Pipeline>, EngineError> {
        self.pipelines.get_or_load(&(task, model.to_string()), || {
            info!(%task, model, backend = self.backend.name(), "loading pipeline");
            let pipeline = self.backend.load(task, model)?;
            if let Err(e) = pipeline.generate(WARM_UP_PROMPT, &GenerationParams::warm_up()) {
                debug!(%task, model, error = %e, "warm-up failed");
            }
            Ok(pipeline)
        })
    }

    /// Return the tokenizer for `model`, loading it on a miss.
    pub fn tokenizer(&self, model: &str) -> Result<Arc<dyn Tokenizer>, EngineError> {
        self.tokenizers.get_or_load(&model.to_string(), || {
            debug!(model, "loading tokenizer");
            self.backend.tokenizer(model)
        })
    }

    /// Run one generation call and extract its text.
    pub fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, EngineError> {
        let pipeline = self.pipeline(request.task, request.model)?;
        let response = pipeline.generate(request.prompt, request.params)?;
        Ok(response.text())
    }

    /// Number of pipelines currently held.
    pub fn loaded_pipelines(&self) -> usize {
        self.pipelines.len()
    }
}
