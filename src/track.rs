//! Time-ordered keyframe container.
//!
//! Invariants held by every method:
//! - keyframes are sorted ascending by time; equal times keep insertion order
//! - `revision` strictly increases on every call that changes content
//!
//! Tracks hold at most a few hundred entries, so lookups are linear.

use serde::{Deserialize, Serialize};

use crate::keyframe::{clamp_time, Keyframe, KeyframeId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track<P> {
    keyframes: Vec<Keyframe<P>>,
    #[serde(skip)]
    revision: u64,
}

impl<P> Default for Track<P> {
    fn default() -> Self {
        Self {
            keyframes: Vec::new(),
            revision: 0,
        }
    }
}

impl<P> Track<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn keyframes(&self) -> &[Keyframe<P>] {
        &self.keyframes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyframe<P>> {
        self.keyframes.iter()
    }

    pub fn get(&self, id: KeyframeId) -> Option<&Keyframe<P>> {
        self.keyframes.iter().find(|k| k.id == id)
    }

    pub fn first(&self) -> Option<&Keyframe<P>> {
        self.keyframes.first()
    }

    pub fn last(&self) -> Option<&Keyframe<P>> {
        self.keyframes.last()
    }

    /// Keyframes scheduled exactly at `tick`, in track order.
    pub fn at_tick(&self, tick: u64) -> impl Iterator<Item = &Keyframe<P>> {
        let start = self.keyframes.partition_point(|k| k.time < tick);
        self.keyframes[start..]
            .iter()
            .take_while(move |k| k.time == tick)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert after every keyframe whose time is `<=` the new one's.
    pub fn insert(&mut self, keyframe: Keyframe<P>) {
        let pos = self.keyframes.partition_point(|k| k.time <= keyframe.time);
        self.keyframes.insert(pos, keyframe);
        self.bump();
    }

    /// Move a keyframe to `new_time` (clamped to 0). Returns `false` if the
    /// id is unknown, in which case nothing changes.
    pub fn move_keyframe(&mut self, id: KeyframeId, new_time: i64) -> bool {
        let Some(idx) = self.keyframes.iter().position(|k| k.id == id) else {
            return false;
        };
        let mut keyframe = self.keyframes.remove(idx);
        keyframe.time = clamp_time(new_time);
        let pos = self.keyframes.partition_point(|k| k.time <= keyframe.time);
        self.keyframes.insert(pos, keyframe);
        self.bump();
        true
    }

    /// Mutate a payload in place. Time is not editable here; use
    /// [`Track::move_keyframe`].
    pub fn update<F>(&mut self, id: KeyframeId, f: F) -> bool
    where
        F: FnOnce(&mut P),
    {
        match self.keyframes.iter_mut().find(|k| k.id == id) {
            Some(k) => {
                f(&mut k.payload);
                self.bump();
                true
            }
            None => false,
        }
    }

    pub fn remove_keyframe(&mut self, id: KeyframeId) -> Option<Keyframe<P>> {
        let idx = self.keyframes.iter().position(|k| k.id == id)?;
        let removed = self.keyframes.remove(idx);
        self.bump();
        Some(removed)
    }

    pub fn clear(&mut self) {
        if self.keyframes.is_empty() {
            return;
        }
        self.keyframes.clear();
        self.bump();
    }

    /// Restore the sort invariant after deserialization. Stable, so equal
    /// times keep their stored order.
    pub fn normalize(&mut self) {
        if !self.keyframes.is_sorted_by_key(|k| k.time) {
            self.keyframes.sort_by_key(|k| k.time);
            self.bump();
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

impl<P: Clone> Track<P> {
    /// Owned copy of the keyframe list; sessions iterate this, never the live track.
    pub fn snapshot(&self) -> Vec<Keyframe<P>> {
        self.keyframes.clone()
    }
}
