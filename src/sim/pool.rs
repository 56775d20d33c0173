//! Fixed-capacity bullet pool with oldest-first eviction
//!
//! The backing array is allocated once. Its first `live_count` entries are
//! the live bullets and form a binary min-heap keyed by spawn time, so the
//! oldest live bullet always sits at index 0. Entries past the live prefix
//! are retired slot records waiting to be reused.
//!
//! Slot records move around the array during heap maintenance; each record
//! keeps a fixed `key` and `index_of` tracks where that key currently lives.

use std::sync::Arc;

use glam::Vec2;

use super::bullet::{Bullet, BulletHandle, BulletState, BulletStyle, CustomData};
use super::path::BulletPath;

/// Result of an admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub handle: BulletHandle,
    /// Oldest live bullet that was overwritten because the pool was full
    pub evicted: Option<BulletHandle>,
}

/// Everything a newly admitted bullet starts with
#[derive(Debug, Clone)]
pub struct BulletInit {
    pub position: Vec2,
    pub facing: f32,
    pub path: Arc<BulletPath>,
    pub style: Option<Arc<BulletStyle>>,
    pub custom_data: CustomData,
}

#[derive(Debug)]
pub struct BulletPool {
    bullets: Vec<Bullet>,
    /// key -> current array index
    index_of: Vec<usize>,
    live_count: usize,
}

impl BulletPool {
    pub fn new(capacity: usize) -> Self {
        let bullets: Vec<Bullet> = (0..capacity).map(|key| Bullet::vacant(key as u32)).collect();
        let index_of = (0..capacity).collect();
        Self {
            bullets,
            index_of,
            live_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bullets.len()
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn is_full(&self) -> bool {
        self.live_count == self.bullets.len()
    }

    /// Live prefix, in heap order
    pub fn live(&self) -> &[Bullet] {
        &self.bullets[..self.live_count]
    }

    /// Live prefix for in-place updates. Spawn times must not be changed
    /// through this.
    pub(crate) fn live_mut(&mut self) -> &mut [Bullet] {
        &mut self.bullets[..self.live_count]
    }

    /// Oldest live bullet
    pub fn oldest(&self) -> Option<&Bullet> {
        self.live().first()
    }

    fn index_of_handle(&self, handle: BulletHandle) -> Option<usize> {
        let index = *self.index_of.get(handle.key as usize)?;
        (index < self.live_count && self.bullets[index].generation == handle.generation)
            .then_some(index)
    }

    /// Live bullet for a handle; `None` once the bullet was retired or evicted
    pub fn get(&self, handle: BulletHandle) -> Option<&Bullet> {
        self.index_of_handle(handle).map(|i| &self.bullets[i])
    }

    pub(crate) fn get_mut(&mut self, handle: BulletHandle) -> Option<&mut Bullet> {
        self.index_of_handle(handle).map(|i| &mut self.bullets[i])
    }

    /// Place a new bullet. Appends while there is room, otherwise overwrites
    /// the heap root (the oldest live bullet). `None` only for a
    /// zero-capacity pool.
    pub fn admit(&mut self, now_ms: u64, init: BulletInit) -> Option<Admission> {
        if self.bullets.is_empty() {
            return None;
        }

        let (index, evicted) = if self.live_count < self.bullets.len() {
            self.live_count += 1;
            (self.live_count - 1, None)
        } else {
            (0, Some(self.bullets[0].handle()))
        };

        let bullet = &mut self.bullets[index];
        bullet.generation = bullet.generation.wrapping_add(1);
        bullet.state = BulletState::Live;
        bullet.spawn_time_ms = now_ms;
        bullet.path_time_ms = now_ms;
        bullet.position = init.position;
        bullet.facing = init.facing;
        bullet.path = Some(init.path);
        bullet.style = init.style;
        bullet.custom_data = init.custom_data;
        let handle = bullet.handle();

        if evicted.is_some() {
            self.sift_down(index);
        } else {
            self.sift_up(index);
        }

        Some(Admission { handle, evicted })
    }

    /// Remove the live bullet at `index`: swap it past the live prefix and
    /// repair the heap around the hole.
    pub fn retire(&mut self, index: usize) {
        debug_assert!(index < self.live_count, "retire outside the live prefix");
        if index >= self.live_count {
            return;
        }
        let last = self.live_count - 1;
        self.swap(index, last);
        self.live_count -= 1;
        if index < self.live_count && !self.sift_down(index) {
            self.sift_up(index);
        }
    }

    /// Retire every non-live bullet in the live prefix, calling `finalize`
    /// on each one first. Returns how many were retired.
    ///
    /// Scans from the back; a retirement can pull a not-yet-visited bullet
    /// into the current index, so the index is rechecked until it holds a
    /// live bullet.
    pub fn compact(&mut self, mut finalize: impl FnMut(&mut Bullet)) -> usize {
        let mut retired = 0;
        let mut i = self.live_count;
        while i > 0 {
            i -= 1;
            while i < self.live_count && self.bullets[i].is_popped() {
                finalize(&mut self.bullets[i]);
                self.retire(i);
                retired += 1;
            }
        }
        retired
    }

    /// Drop every live bullet without finalizing (pool rebuild)
    pub fn reset(&mut self) {
        for bullet in &mut self.bullets[..self.live_count] {
            bullet.state = BulletState::Uninitialized;
            bullet.path = None;
            bullet.style = None;
            bullet.custom_data.clear();
        }
        self.live_count = 0;
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.bullets.swap(a, b);
        self.index_of[self.bullets[a].key as usize] = a;
        self.index_of[self.bullets[b].key as usize] = b;
    }

    #[inline]
    fn spawn_time(&self, index: usize) -> u64 {
        self.bullets[index].spawn_time_ms
    }

    /// Push `index` down until neither child is older. Returns whether it moved.
    fn sift_down(&mut self, mut index: usize) -> bool {
        let start = index;
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;
            if left < self.live_count && self.spawn_time(left) < self.spawn_time(smallest) {
                smallest = left;
            }
            if right < self.live_count && self.spawn_time(right) < self.spawn_time(smallest) {
                smallest = right;
            }
            if smallest == index {
                return index != start;
            }
            self.swap(index, smallest);
            index = smallest;
        }
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.spawn_time(parent) <= self.spawn_time(index) {
                return;
            }
            self.swap(index, parent);
            index = parent;
        }
    }

    /// Whether the live prefix is a valid min-heap by spawn time and the key
    /// table matches the array
    pub fn check_heap(&self) -> bool {
        let heap_ok = (1..self.live_count).all(|i| self.spawn_time((i - 1) / 2) <= self.spawn_time(i));
        let index_ok = self
            .bullets
            .iter()
            .enumerate()
            .all(|(i, b)| self.index_of[b.key as usize] == i);
        heap_ok && index_ok
    }
}
