// src/analysis/trail_buffer.rs
//
// Bounded, decaying position history per tracked point. Entries are kept
// oldest first; every push or age step ages existing entries by one frame.
// Eviction is FIFO on capacity, and by age once an entry is older than the
// point's max age.

use crate::types::{PointId, TrailConfig, Vec2};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailEntry {
    pub position: Vec2,
    /// Frames since this position was pushed.
    pub age: u32,
}

#[derive(Debug, Clone)]
struct PointTrail {
    entries: VecDeque<TrailEntry>,
    capacity: usize,
    max_age: u32,
}

impl PointTrail {
    fn new(capacity: usize, max_age: u32) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            max_age,
        }
    }

    fn is_disabled(&self) -> bool {
        self.capacity == 0 || self.max_age == 0
    }

    fn age(&mut self) {
        for e in self.entries.iter_mut() {
            e.age = e.age.saturating_add(1);
        }
        while self
            .entries
            .front()
            .map_or(false, |e| e.age > self.max_age)
        {
            self.entries.pop_front();
        }
    }

    fn push(&mut self, position: Vec2) {
        if self.is_disabled() {
            return;
        }
        self.age();
        self.entries.push_back(TrailEntry { position, age: 0 });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrailBuffer {
    trails: BTreeMap<PointId, PointTrail>,
}

impl TrailBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TrailConfig) -> Self {
        let mut buffer = Self::new();
        for id in &config.points {
            let (capacity, max_age) = config.limits_for(*id);
            buffer.track(*id, capacity, max_age);
        }
        buffer
    }

    /// Start tracking a point. Zero capacity or zero max age disables it.
    pub fn track(&mut self, id: PointId, capacity: usize, max_age: u32) {
        self.trails.insert(id, PointTrail::new(capacity, max_age));
    }

    pub fn is_tracked(&self, id: PointId) -> bool {
        self.trails.contains_key(&id)
    }

    pub fn tracked_points(&self) -> impl Iterator<Item = PointId> + '_ {
        self.trails.keys().copied()
    }

    /// Append `position` with age 0. Untracked points are ignored.
    pub fn push(&mut self, id: PointId, position: Vec2) {
        if let Some(trail) = self.trails.get_mut(&id) {
            trail.push(position);
        }
    }

    /// Age the point's entries without appending (point not seen this frame).
    pub fn age_only(&mut self, id: PointId) {
        if let Some(trail) = self.trails.get_mut(&id) {
            trail.age();
        }
    }

    /// Oldest first.
    pub fn snapshot(&self, id: PointId) -> Vec<TrailEntry> {
        self.trails
            .get(&id)
            .map(|t| t.entries.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, id: PointId) -> usize {
        self.trails.get(&id).map_or(0, |t| t.entries.len())
    }

    pub fn max_age(&self, id: PointId) -> u32 {
        self.trails.get(&id).map_or(0, |t| t.max_age)
    }

    pub fn clear(&mut self) {
        for trail in self.trails.values_mut() {
            trail.entries.clear();
        }
    }
}
