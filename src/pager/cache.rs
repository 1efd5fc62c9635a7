//! Buffer pool: frames with pin counts and an O(1) LRU of unpinned frames.
//!
//! Design:
//! - HashMap<block_id, Frame> stores block content, pin count, dirty flag and
//!   doubly-linked pointers (prev/next by block_id).
//! - Only frames with pins == 0 are linked into the LRU list; head = MRU, tail = LRU.
//! - pin() detaches a frame from the list; the last unpin() attaches it at head.
//! - make_room() evicts the tail and hands a dirty victim back to the caller for
//!   write-back. When every frame is pinned there is nothing to evict.

use std::collections::HashMap;

pub(crate) struct FramePool {
    cap: usize,
    block_size: usize,
    map: HashMap<u32, Frame>,
    head: Option<u32>, // Most-recently released
    tail: Option<u32>, // Least-recently released
}

struct Frame {
    data: Vec<u8>,
    pins: u32,
    dirty: bool,
    prev: Option<u32>,
    next: Option<u32>,
}

/// Вытесненный кадр, который нужно записать на диск.
pub(crate) struct Evicted {
    pub id: u32,
    pub data: Vec<u8>,
}

impl FramePool {
    pub(crate) fn new(cap: usize, block_size: usize) -> Self {
        Self {
            cap: cap.max(1),
            block_size,
            map: HashMap::with_capacity(cap.max(1)),
            head: None,
            tail: None,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.cap
    }

    /// Закрепить уже загруженный кадр. false: кадра нет в пуле (miss).
    pub(crate) fn pin(&mut self, id: u32) -> bool {
        let was_unpinned = match self.map.get(&id) {
            Some(f) => f.pins == 0,
            None => return false,
        };
        if was_unpinned {
            self.detach(id);
        }
        if let Some(f) = self.map.get_mut(&id) {
            f.pins += 1;
        }
        true
    }

    /// Освободить место под один кадр.
    /// Err(()): все кадры закреплены. Ok(Some): вытеснен грязный кадр.
    pub(crate) fn make_room(&mut self) -> Result<Option<Evicted>, ()> {
        if self.map.len() < self.cap {
            return Ok(None);
        }
        let victim = self.tail.ok_or(())?;
        self.detach(victim);
        let frame = match self.map.remove(&victim) {
            Some(f) => f,
            None => return Ok(None),
        };
        crate::metrics::record_eviction();
        if frame.dirty {
            Ok(Some(Evicted {
                id: victim,
                data: frame.data,
            }))
        } else {
            Ok(None)
        }
    }

    /// Вставить закреплённый кадр (место должно быть освобождено make_room()).
    pub(crate) fn insert_pinned(&mut self, id: u32, data: Vec<u8>, dirty: bool) {
        debug_assert_eq!(data.len(), self.block_size);
        self.map.insert(
            id,
            Frame {
                data,
                pins: 1,
                dirty,
                prev: None,
                next: None,
            },
        );
    }

    /// Открепить кадр. false: кадр не был закреплён (release без fetch).
    pub(crate) fn unpin(&mut self, id: u32) -> bool {
        let now_free = match self.map.get_mut(&id) {
            Some(f) if f.pins > 0 => {
                f.pins -= 1;
                f.pins == 0
            }
            _ => return false,
        };
        if now_free {
            self.attach_front(id);
        }
        true
    }

    pub(crate) fn mark_dirty(&mut self, id: u32) {
        if let Some(f) = self.map.get_mut(&id) {
            f.dirty = true;
        }
    }

    /// Данные доступны только пока кадр закреплён.
    pub(crate) fn data(&self, id: u32) -> Option<&[u8]> {
        self.map
            .get(&id)
            .filter(|f| f.pins > 0)
            .map(|f| f.data.as_slice())
    }

    pub(crate) fn data_mut(&mut self, id: u32) -> Option<&mut [u8]> {
        self.map
            .get_mut(&id)
            .filter(|f| f.pins > 0)
            .map(|f| f.data.as_mut_slice())
    }

    pub(crate) fn pinned_count(&self) -> usize {
        self.map.values().filter(|f| f.pins > 0).count()
    }

    /// Обойти грязные кадры (по возрастанию id) и снять с них флаг dirty при успехе f.
    pub(crate) fn flush_dirty<E, F>(&mut self, mut f: F) -> Result<usize, E>
    where
        F: FnMut(u32, &[u8]) -> Result<(), E>,
    {
        let mut ids: Vec<u32> = self
            .map
            .iter()
            .filter(|(_, fr)| fr.dirty)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        for id in &ids {
            if let Some(fr) = self.map.get_mut(id) {
                f(*id, &fr.data)?;
                fr.dirty = false;
            }
        }
        Ok(ids.len())
    }

    // ---------------- internal helpers ----------------

    fn detach(&mut self, id: u32) {
        let (prev, next) = match self.map.get(&id) {
            Some(e) => (e.prev, e.next),
            None => return,
        };

        if self.head == Some(id) {
            self.head = next;
        }
        if self.tail == Some(id) {
            self.tail = prev;
        }

        if let Some(p) = prev {
            if let Some(pe) = self.map.get_mut(&p) {
                pe.next = next;
            }
        }
        if let Some(n) = next {
            if let Some(ne) = self.map.get_mut(&n) {
                ne.prev = prev;
            }
        }

        if let Some(e) = self.map.get_mut(&id) {
            e.prev = None;
            e.next = None;
        }
    }

    fn attach_front(&mut self, id: u32) {
        if self.head == Some(id) {
            return;
        }

        if let Some(e) = self.map.get_mut(&id) {
            e.prev = None;
            e.next = self.head;
        }

        if let Some(old_head) = self.head {
            if let Some(he) = self.map.get_mut(&old_head) {
                he.prev = Some(id);
            }
        }

        self.head = Some(id);

        if self.tail.is_none() {
            self.tail = Some(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bs: usize, fill: u8) -> Vec<u8> {
        vec![fill; bs]
    }

    #[test]
    fn evicts_least_recently_released() {
        let mut p = FramePool::new(2, 8);
        assert!(p.make_room().unwrap().is_none());
        p.insert_pinned(1, frame(8, 1), false);
        assert!(p.make_room().unwrap().is_none());
        p.insert_pinned(2, frame(8, 2), true);

        // оба закреплены: вытеснять нечего
        assert!(p.make_room().is_err());

        assert!(p.unpin(2));
        assert!(p.unpin(1));
        // LRU = 2 (освобождён раньше), он грязный → возвращается на запись
        let ev = p.make_room().unwrap().expect("dirty victim");
        assert_eq!(ev.id, 2);
        assert_eq!(ev.data, frame(8, 2));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn pin_removes_frame_from_lru() {
        let mut p = FramePool::new(1, 4);
        p.insert_pinned(5, frame(4, 0), false);
        assert!(p.unpin(5));
        assert!(p.pin(5));
        assert!(p.make_room().is_err());
        assert_eq!(p.pinned_count(), 1);
        assert!(p.unpin(5));
        assert!(!p.unpin(5), "release without fetch must be reported");
        assert!(p.data(5).is_none(), "unpinned frame data is not accessible");
    }

    #[test]
    fn flush_clears_dirty_flags() {
        let mut p = FramePool::new(4, 4);
        p.insert_pinned(3, frame(4, 3), true);
        p.insert_pinned(1, frame(4, 1), true);
        p.insert_pinned(2, frame(4, 2), false);
        let mut seen = Vec::new();
        let n = p
            .flush_dirty::<(), _>(|id, _| {
                seen.push(id);
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(seen, vec![1, 3]);
        let n = p.flush_dirty::<(), _>(|_, _| Ok(())).unwrap();
        assert_eq!(n, 0);
    }
}
