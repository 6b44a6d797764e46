//! Process-wide probe counters.
//!
//! The store is a fixed table of segment slots. A slot is written once,
//! under the allocation lock, and read without locking afterwards; probe
//! hits address segments by index and never take a lock or allocate.

use super::block::{ProbeId, SegmentId};
use crate::result::{BytecovError, BytecovResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Default number of segment slots
pub const DEFAULT_SEGMENT_CAPACITY: usize = 65_536;

/// A class by name and content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassIdentity {
    /// Internal class name
    pub name: String,
    /// First 8 bytes of the SHA-256 of the original class bytes
    pub digest: u64,
}

impl ClassIdentity {
    /// Identity from an already computed digest
    #[must_use]
    pub fn new(name: impl Into<String>, digest: u64) -> Self {
        Self {
            name: name.into(),
            digest,
        }
    }

    /// Identity of `bytes` loaded under `name`
    #[must_use]
    pub fn of(name: impl Into<String>, bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash[..8]);
        Self::new(name, u64::from_be_bytes(prefix))
    }
}

impl fmt::Display for ClassIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:016x}", self.name, self.digest)
    }
}

/// Counters of one class, one per probe
#[derive(Debug)]
pub struct CounterSegment {
    id: SegmentId,
    identity: ClassIdentity,
    counters: Box<[AtomicU64]>,
}

impl CounterSegment {
    fn new(id: SegmentId, identity: ClassIdentity, probes: usize) -> Self {
        Self {
            id,
            identity,
            counters: (0..probes).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Slot of this segment in the store
    #[must_use]
    pub const fn id(&self) -> SegmentId {
        self.id
    }

    /// Class the counters belong to
    #[must_use]
    pub const fn identity(&self) -> &ClassIdentity {
        &self.identity
    }

    /// Number of counters, one per probe
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the segment holds no counters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Count one hit; out-of-range probes are ignored
    #[inline]
    pub fn increment(&self, probe: ProbeId) {
        self.increment_index(probe.index());
    }

    #[inline]
    fn increment_index(&self, index: usize) {
        if let Some(counter) = self.counters.get(index) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current count of `probe`; zero when out of range
    #[must_use]
    pub fn get(&self, probe: ProbeId) -> u64 {
        self.counters
            .get(probe.index())
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Copy of every counter
    #[must_use]
    pub fn snapshot(&self) -> Vec<u64> {
        self.counters.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in self.counters.iter() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Counters of one segment at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    pub id: SegmentId,
    pub identity: ClassIdentity,
    /// Indexed by probe
    pub counts: Vec<u64>,
}

/// Best-effort copy of the whole store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// In allocation order
    pub segments: Vec<SegmentSnapshot>,
}

impl CounterSnapshot {
    /// Counts recorded for `identity`, if a segment exists
    #[must_use]
    pub fn counts(&self, identity: &ClassIdentity) -> Option<&[u64]> {
        self.segments
            .iter()
            .find(|s| &s.identity == identity)
            .map(|s| s.counts.as_slice())
    }
}

/// Concurrent table of counter segments
#[derive(Debug)]
pub struct CounterStore {
    slots: Box<[OnceLock<Arc<CounterSegment>>]>,
    allocated: AtomicUsize,
    index: Mutex<HashMap<ClassIdentity, SegmentId>>,
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore {
    /// Store with [`DEFAULT_SEGMENT_CAPACITY`] slots
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SEGMENT_CAPACITY)
    }

    /// Store with room for `segments` classes
    #[must_use]
    pub fn with_capacity(segments: usize) -> Self {
        Self {
            slots: (0..segments).map(|_| OnceLock::new()).collect(),
            allocated: AtomicUsize::new(0),
            index: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide store
    pub fn global() -> &'static Arc<Self> {
        static GLOBAL: OnceLock<Arc<CounterStore>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::new()))
    }

    /// Number of segment slots
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Segment for `identity`, created on first request.
    ///
    /// Repeated calls return the same segment. Asking for a different
    /// probe count than the existing segment holds is an error.
    /// Segments are never released, so allocate only once the rewritten
    /// class is known to encode.
    pub fn allocate(&self, identity: &ClassIdentity, probes: usize) -> BytecovResult<Arc<CounterSegment>> {
        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(segment) = index.get(identity).and_then(|id| self.segment(*id)) {
            if segment.len() != probes {
                return Err(BytecovError::SegmentMismatch {
                    class: identity.to_string(),
                    existing: segment.len(),
                    requested: probes,
                });
            }
            return Ok(segment);
        }

        let slot = self.allocated.load(Ordering::Acquire);
        if slot >= self.slots.len() {
            return Err(BytecovError::capacity("counter segments", slot + 1, self.slots.len()));
        }
        let id = SegmentId::new(slot as u32);
        let segment = Arc::new(CounterSegment::new(id, identity.clone(), probes));
        let stored = Arc::clone(self.slots[slot].get_or_init(|| Arc::clone(&segment)));
        self.allocated.store(slot + 1, Ordering::Release);
        index.insert(identity.clone(), id);
        tracing::trace!(class = %identity, segment = slot, probes, "allocated counter segment");
        Ok(stored)
    }

    /// Hot-path entry used by the probe bridge
    #[inline]
    pub fn hit(&self, segment: u32, probe: u32) {
        if let Some(segment) = self.slots.get(segment as usize).and_then(OnceLock::get) {
            segment.increment_index(probe as usize);
        }
    }

    /// Segment in slot `id`, if allocated
    #[must_use]
    pub fn segment(&self, id: SegmentId) -> Option<Arc<CounterSegment>> {
        self.slots.get(id.index()).and_then(OnceLock::get).cloned()
    }

    /// Number of allocated segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// Whether no segment was allocated yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocated_segments(&self) -> impl Iterator<Item = &Arc<CounterSegment>> {
        self.slots[..self.len()].iter().filter_map(OnceLock::get)
    }

    /// Copy every segment; concurrent hits may or may not be included
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            segments: self
                .allocated_segments()
                .map(|segment| SegmentSnapshot {
                    id: segment.id(),
                    identity: segment.identity().clone(),
                    counts: segment.snapshot(),
                })
                .collect(),
        }
    }

    /// Zero every counter; segments stay allocated
    pub fn reset(&self) {
        for segment in self.allocated_segments() {
            segment.reset();
        }
    }
}
