use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use log::trace;

use crate::enums::{Interpolation, Orientation};
use crate::interpolator::Interpolator;
use crate::volume::{MprSlice, Volume};

pub const DEFAULT_CAPACITY: usize = 64;

/// Identity of a computed slice. Positions are normalized the way the slicer
/// resolves them, so requests producing the same output share a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SliceKey {
    orientation: Orientation,
    position_bits: u64,
    interpolation: Interpolation,
}

impl SliceKey {
    pub fn new(
        volume: &Volume,
        orientation: Orientation,
        position: f64,
        interpolation: Interpolation,
    ) -> Self {
        let clamped = Interpolator::clamp_index(position, volume.axis_len(orientation));
        let (position, interpolation) = match (orientation, interpolation) {
            (Orientation::Axial, _) | (_, Interpolation::Nearest) => {
                (clamped.round(), Interpolation::Nearest)
            }
            // A whole index needs no blending.
            (_, Interpolation::Linear) if clamped.fract() == 0.0 => {
                (clamped, Interpolation::Nearest)
            }
            _ => (clamped, interpolation),
        };
        Self {
            orientation,
            position_bits: position.to_bits(),
            interpolation,
        }
    }
}

/// Bounded cache of recent MPR slices of one volume.
///
/// No lock is held while a slice is computed. Two threads missing on the same
/// key both compute it and the later insert wins; the results are identical.
pub struct SliceCache {
    volume: Arc<Volume>,
    entries: DashMap<SliceKey, (u64, Arc<MprSlice>)>,
    capacity: usize,
    clock: AtomicU64,
}

impl SliceCache {
    pub fn new(volume: Arc<Volume>, capacity: usize) -> Self {
        Self {
            volume,
            entries: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        }
    }

    pub fn volume(&self) -> &Arc<Volume> {
        &self.volume
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(
        &self,
        orientation: Orientation,
        position: f64,
        interpolation: Interpolation,
    ) -> Arc<MprSlice> {
        let key = SliceKey::new(&self.volume, orientation, position, interpolation);
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.0 = self.tick();
            return entry.1.clone();
        }

        trace!("slice cache miss for {:?}", key);
        let slice = Arc::new(
            self.volume
                .slice(orientation, f64::from_bits(key.position_bits), key.interpolation),
        );
        self.evict_if_full();
        self.entries.insert(key, (self.tick(), slice.clone()));
        slice
    }

    fn evict_if_full(&self) {
        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().0)
                .map(|entry| *entry.key());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
