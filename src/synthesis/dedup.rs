/*!
 * In-flight synthesis deduplication.
 *
 * Concurrent callers asking for the same fingerprint share one synthesis
 * future instead of each hitting the synthesizer. The map is keyed per
 * fingerprint, so unrelated requests never wait on each other. When the
 * last waiter for a fingerprint goes away, its entry is dropped; if the
 * synthesis had not finished yet, dropping it cancels the request.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use parking_lot::Mutex;

use crate::errors::SynthesisError;
use crate::synthesis::{Fingerprint, SynthesisOutput, SynthesisRequest, Synthesizer};

type SharedSynthesis = Shared<BoxFuture<'static, Result<Arc<SynthesisOutput>, SynthesisError>>>;

struct InFlight {
    generation: u64,
    future: SharedSynthesis,
    waiters: usize,
}

type InFlightMap = Mutex<HashMap<Fingerprint, InFlight>>;

/// Releases one waiter slot when a caller finishes or is dropped
struct WaiterGuard<'a> {
    in_flight: &'a InFlightMap,
    fingerprint: &'a Fingerprint,
    generation: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        let mut map = self.in_flight.lock();
        let finished = match map.get_mut(self.fingerprint) {
            Some(entry) if entry.generation == self.generation => {
                entry.waiters = entry.waiters.saturating_sub(1);
                entry.waiters == 0
            }
            _ => false,
        };
        if finished {
            map.remove(self.fingerprint);
        }
    }
}

/// Deduplicating front for a synthesizer
#[derive(Clone)]
pub struct SynthesisDeduplicator {
    synthesizer: Arc<dyn Synthesizer>,
    in_flight: Arc<InFlightMap>,
    next_generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for SynthesisDeduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisDeduplicator")
            .field("synthesizer", &self.synthesizer)
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

impl SynthesisDeduplicator {
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            synthesizer,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn synthesizer(&self) -> &Arc<dyn Synthesizer> {
        &self.synthesizer
    }

    /// Number of fingerprints currently being synthesized
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Synthesize `request`, joining an in-flight synthesis of the same fingerprint
    pub async fn synthesize(
        &self,
        fingerprint: &Fingerprint,
        request: &SynthesisRequest,
    ) -> Result<Arc<SynthesisOutput>, SynthesisError> {
        let (generation, future) = {
            let mut map = self.in_flight.lock();
            match map.get_mut(fingerprint) {
                Some(entry) => {
                    entry.waiters += 1;
                    debug!("Joining in-flight synthesis {}", fingerprint.short());
                    (entry.generation, entry.future.clone())
                }
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let synthesizer = Arc::clone(&self.synthesizer);
                    let request = request.clone();
                    let future = async move { synthesizer.synthesize(&request).await.map(Arc::new) }
                        .boxed()
                        .shared();
                    map.insert(
                        fingerprint.clone(),
                        InFlight {
                            generation,
                            future: future.clone(),
                            waiters: 1,
                        },
                    );
                    debug!(
                        "Starting synthesis {} with {}",
                        fingerprint.short(),
                        self.synthesizer.name()
                    );
                    (generation, future)
                }
            }
        };

        let _guard = WaiterGuard {
            in_flight: &self.in_flight,
            fingerprint,
            generation,
        };
        future.await
    }
}
