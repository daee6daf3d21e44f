use crate::{prtls::Particles, slice::SliceParameters};
use npy_derive::Serializable;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type RecordId = usize;

#[derive(Serializable, Debug, Clone, Copy, PartialEq)]
pub struct PhotonEvent {
    pub photon_energy: f64, // eV
    pub at_element: i64,
    pub at_turn: i64,
    pub particle_id: i64,
    pub particle_delta: f64,
}

// Many particles append through the same reference.
pub trait RadiationRecord: Sync {
    fn append(&self, event: PhotonEvent) -> bool;
}

pub struct SynchrotronRadiationRecord {
    capacity: usize,
    events: Mutex<Vec<PhotonEvent>>,
    dropped: AtomicUsize,
}

impl SynchrotronRadiationRecord {
    pub fn with_capacity(capacity: usize) -> SynchrotronRadiationRecord {
        SynchrotronRadiationRecord {
            capacity,
            events: Mutex::new(Vec::with_capacity(capacity)),
            dropped: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PhotonEvent>> {
        // a panicking appender cannot leave the Vec half-written
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_recorded(&self) -> usize {
        self.lock().len()
    }

    pub fn num_dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> Vec<PhotonEvent> {
        self.lock().clone()
    }

    pub fn total_energy(&self) -> f64 {
        self.lock().iter().map(|e| e.photon_energy).sum()
    }
}

impl RadiationRecord for SynchrotronRadiationRecord {
    fn append(&self, event: PhotonEvent) -> bool {
        let mut events = self.lock();
        if events.len() < self.capacity {
            events.push(event);
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

pub trait RecordResolver: Sync {
    fn resolve<'r>(
        &'r self,
        params: &SliceParameters,
        particles: &Particles,
    ) -> Option<&'r dyn RadiationRecord>;
}

impl<R: RecordResolver + ?Sized> RecordResolver for &R {
    fn resolve<'r>(
        &'r self,
        params: &SliceParameters,
        particles: &Particles,
    ) -> Option<&'r dyn RadiationRecord> {
        (**self).resolve(params, particles)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecords;

impl RecordResolver for NoRecords {
    fn resolve<'r>(&'r self, _: &SliceParameters, _: &Particles) -> Option<&'r dyn RadiationRecord> {
        None
    }
}

#[derive(Default)]
pub struct RecordRegistry {
    records: HashMap<RecordId, Arc<SynchrotronRadiationRecord>>,
}

impl RecordRegistry {
    pub fn new() -> RecordRegistry {
        RecordRegistry::default()
    }

    pub fn start_internal_logging(
        &mut self,
        id: RecordId,
        capacity: usize,
    ) -> Arc<SynchrotronRadiationRecord> {
        let record = Arc::new(SynchrotronRadiationRecord::with_capacity(capacity));
        self.records.insert(id, Arc::clone(&record));
        record
    }

    pub fn stop_internal_logging(&mut self, id: RecordId) -> Option<Arc<SynchrotronRadiationRecord>> {
        self.records.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordId, &Arc<SynchrotronRadiationRecord>)> {
        self.records.iter()
    }
}

impl RecordResolver for RecordRegistry {
    fn resolve<'r>(
        &'r self,
        params: &SliceParameters,
        particles: &Particles,
    ) -> Option<&'r dyn RadiationRecord> {
        if particles.is_empty() {
            return None;
        }
        let id = params.record_id?;
        let record: &SynchrotronRadiationRecord = self.records.get(&id)?;
        Some(record)
    }
}
