use anyhow::{anyhow, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::traits::Generator;
use super::types::{Generation, GenerationRequest};
use crate::cache::ResponseCache;

/// Outcome slot shared between the caller that runs a generation and the
/// callers waiting on it
#[derive(Default)]
struct InFlight {
    outcome: Mutex<Option<std::result::Result<Generation, String>>>,
    ready: Condvar,
}

impl InFlight {
    fn complete(&self, outcome: std::result::Result<Generation, String>) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
        }
        self.ready.notify_all();
    }

    fn wait(&self) -> std::result::Result<Generation, String> {
        let mut slot = self.outcome.lock();
        while slot.is_none() {
            self.ready.wait(&mut slot);
        }
        slot.clone().unwrap_or_else(|| Err("in-flight generation vanished".to_string()))
    }
}

/// Unregisters a flight and releases waiters even if the leader unwinds
struct FlightGuard<'a> {
    flights: &'a Mutex<HashMap<String, Arc<InFlight>>>,
    key: String,
    flight: Arc<InFlight>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flights.lock().remove(&self.key);
        self.flight.complete(Err("in-flight generation aborted".to_string()));
    }
}

/// Wraps a [`Generator`] with the response cache
///
/// Misses call through and store the result; generation errors are never
/// cached. With single-flight enabled, concurrent callers for the same
/// fingerprint wait for one in-flight call instead of each paying for it.
pub struct CachedGenerator<G> {
    cache: Arc<ResponseCache>,
    inner: G,
    flights: Option<Mutex<HashMap<String, Arc<InFlight>>>>,
}

impl<G: Generator> CachedGenerator<G> {
    pub fn new(cache: Arc<ResponseCache>, inner: G) -> Self {
        Self {
            cache,
            inner,
            flights: None,
        }
    }

    /// Enable or disable single-flight deduplication
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.flights = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Serve from cache, or generate and store
    pub fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        if let Some(text) = self.cache.get(
            &request.prompt,
            &request.system_prompt,
            &request.model,
            request.temperature,
        ) {
            return Ok(Generation::from_cache(text));
        }

        match &self.flights {
            Some(flights) => self.generate_single_flight(flights, request),
            None => self.generate_and_store(request),
        }
    }

    fn generate_and_store(&self, request: &GenerationRequest) -> Result<Generation> {
        let generation = self.inner.generate(request)?;
        self.cache.set(
            &request.prompt,
            &request.system_prompt,
            &request.model,
            request.temperature,
            &generation.text,
            generation.tokens_used,
        );
        Ok(generation)
    }

    fn generate_single_flight(
        &self,
        flights: &Mutex<HashMap<String, Arc<InFlight>>>,
        request: &GenerationRequest,
    ) -> Result<Generation> {
        let key = request.fingerprint();

        let (flight, leader) = {
            let mut map = flights.lock();
            match map.get(&key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(InFlight::default());
                    map.insert(key.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            debug!("Waiting on in-flight generation {}...", &key[..8]);
            return flight.wait().map_err(|e| anyhow!(e));
        }

        let guard = FlightGuard {
            flights,
            key,
            flight: Arc::clone(&flight),
        };

        let result = self.generate_and_store(request);
        flight.complete(match &result {
            Ok(generation) => Ok(generation.clone()),
            Err(e) => Err(format!("{:#}", e)),
        });
        drop(guard);

        result
    }
}

impl<G: Generator> Generator for CachedGenerator<G> {
    fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        CachedGenerator::generate(self, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::generation::MockGenerator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open_cache(dir: &TempDir) -> Arc<ResponseCache> {
        let config = CacheConfig {
            cache_directory: dir.path().join("cache"),
            ..Default::default()
        };
        Arc::new(ResponseCache::new(&config).unwrap())
    }

    #[test]
    fn test_second_call_is_served_from_cache() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir);

        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(Generation::new("drafted", 120)));

        let generator = CachedGenerator::new(Arc::clone(&cache), mock);
        let request = GenerationRequest::new("p", "s", "m", 0.7);

        let first = generator.generate(&request).unwrap();
        assert!(!first.cached);
        assert_eq!(first.tokens_used, 120);

        let second = generator.generate(&request).unwrap();
        assert!(second.cached);
        assert_eq!(second.text, "drafted");

        let counters = cache.counters();
        assert_eq!(counters.misses, 1);
        assert_eq!(counters.hits, 1);
        assert_eq!(counters.total_tokens_saved, 120);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir);

        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .times(2)
            .returning(|_| Err(anyhow!("rate limited")));

        let generator = CachedGenerator::new(Arc::clone(&cache), mock);
        let request = GenerationRequest::new("p", "", "m", 0.7);

        assert!(generator.generate(&request).is_err());
        assert!(generator.generate(&request).is_err());
        assert_eq!(cache.counters().saves, 0);
    }

    #[test]
    fn test_single_flight_shares_one_call() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir);
        let calls = AtomicUsize::new(0);

        let slow = |_: &GenerationRequest| -> Result<Generation> {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            Ok(Generation::new("shared", 10))
        };
        let generator = CachedGenerator::new(cache, slow).with_single_flight(true);
        let request = GenerationRequest::new("p", "", "m", 0.2);
        let barrier = Barrier::new(4);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    barrier.wait();
                    let generation = generator.generate(&request).unwrap();
                    assert_eq!(generation.text, "shared");
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_flight_propagates_errors_to_waiters() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(&temp_dir);

        let failing = |_: &GenerationRequest| -> Result<Generation> {
            std::thread::sleep(Duration::from_millis(100));
            Err(anyhow!("upstream unavailable"))
        };
        let generator = CachedGenerator::new(cache, failing).with_single_flight(true);
        let request = GenerationRequest::new("p", "", "m", 0.2);
        let barrier = Barrier::new(3);

        std::thread::scope(|scope| {
            for _ in 0..3 {
                scope.spawn(|| {
                    barrier.wait();
                    let err = generator.generate(&request).unwrap_err();
                    assert!(err.to_string().contains("upstream unavailable"));
                });
            }
        });

        // Nothing left registered once the flight finishes
        assert!(generator.flights.as_ref().unwrap().lock().is_empty());
    }
}
