//! pager/mem: in-memory block store с той же семантикой, что у Pager.
//!
//! - fetch копирует блок в кадр; изменения попадают в "файл" только если кадр был
//!   помечен mark_modified до последнего release (как вытеснение у Pager).
//! - fail_after(n): после n успешных fetch/allocate все следующие падают со StorageFault.
//!   Нужен тестам, проверяющим, что ошибки не оставляют закреплённых блоков.

use anyhow::Result;
use std::collections::HashMap;

use crate::error::HashFileError;

use super::{BlockRef, BlockStore};

#[derive(Debug)]
struct MemFrame {
    data: Vec<u8>,
    pins: u32,
    dirty: bool,
}

#[derive(Debug)]
pub struct MemStore {
    block_size: usize,
    blocks: Vec<Vec<u8>>,
    frames: HashMap<u32, MemFrame>,
    ops_left: Option<usize>,
    fetches: u64,
    closed: bool,
}

impl MemStore {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            blocks: Vec::new(),
            frames: HashMap::new(),
            ops_left: None,
            fetches: 0,
            closed: false,
        }
    }

    /// Разрешить ещё `ops` успешных fetch/allocate, затем отказывать.
    pub fn fail_after(&mut self, ops: usize) {
        self.ops_left = Some(ops);
    }

    pub fn clear_faults(&mut self) {
        self.ops_left = None;
    }

    /// Сколько раз вызывался fetch_block (включая неуспешные).
    pub fn fetch_calls(&self) -> u64 {
        self.fetches
    }

    /// Снова открыть "файл" после close() (данные сохраняются).
    pub fn reopen(&mut self) {
        self.closed = false;
    }

    /// Сырые байты блока в обход кадров (для тестов формата).
    pub fn raw_block(&self, id: u32) -> Option<&[u8]> {
        self.blocks.get(id as usize).map(|b| b.as_slice())
    }

    fn take_op(&mut self, what: &str) -> Result<()> {
        if self.closed {
            return Err(HashFileError::storage("memory store is closed").into());
        }
        if let Some(left) = self.ops_left.as_mut() {
            if *left == 0 {
                return Err(HashFileError::storage(format!("injected fault on {}", what)).into());
            }
            *left -= 1;
        }
        Ok(())
    }
}

impl BlockStore for MemStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> Result<u32> {
        Ok(self.blocks.len() as u32)
    }

    fn allocate_block(&mut self) -> Result<BlockRef> {
        self.take_op("allocate")?;
        let id = self.blocks.len() as u32;
        self.blocks.push(vec![0u8; self.block_size]);
        self.frames.insert(
            id,
            MemFrame {
                data: vec![0u8; self.block_size],
                pins: 1,
                dirty: true,
            },
        );
        Ok(BlockRef::new(id))
    }

    fn fetch_block(&mut self, id: u32) -> Result<BlockRef> {
        self.fetches += 1;
        self.take_op("fetch")?;
        if id as usize >= self.blocks.len() {
            return Err(HashFileError::storage(format!(
                "block {} out of range (block_count={})",
                id,
                self.blocks.len()
            ))
            .into());
        }
        let stored = &self.blocks[id as usize];
        self.frames
            .entry(id)
            .or_insert_with(|| MemFrame {
                data: stored.clone(),
                pins: 0,
                dirty: false,
            })
            .pins += 1;
        Ok(BlockRef::new(id))
    }

    fn release_block(&mut self, block: BlockRef) -> Result<()> {
        let id = block.id();
        let last = match self.frames.get_mut(&id) {
            Some(f) if f.pins > 0 => {
                f.pins -= 1;
                f.pins == 0
            }
            _ => {
                return Err(HashFileError::storage(format!(
                    "release of block {} that is not pinned",
                    id
                ))
                .into())
            }
        };
        if last {
            if let Some(f) = self.frames.remove(&id) {
                if f.dirty {
                    self.blocks[id as usize] = f.data;
                }
            }
        }
        Ok(())
    }

    fn mark_modified(&mut self, block: &BlockRef) {
        if let Some(f) = self.frames.get_mut(&block.id()) {
            f.dirty = true;
        }
    }

    fn data(&self, block: &BlockRef) -> Result<&[u8]> {
        self.frames
            .get(&block.id())
            .map(|f| f.data.as_slice())
            .ok_or_else(|| HashFileError::storage(format!("block {} is not pinned", block.id())).into())
    }

    fn data_mut(&mut self, block: &BlockRef) -> Result<&mut [u8]> {
        let id = block.id();
        self.frames
            .get_mut(&id)
            .map(|f| f.data.as_mut_slice())
            .ok_or_else(|| HashFileError::storage(format!("block {} is not pinned", id)).into())
    }

    fn pinned_blocks(&self) -> usize {
        self.frames.len()
    }

    fn close(&mut self) -> Result<()> {
        let pinned = self.frames.len();
        self.closed = true;
        if pinned > 0 {
            return Err(HashFileError::storage(format!(
                "{} block(s) still pinned when closing memory store",
                pinned
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmarked_changes_are_discarded() {
        let mut s = MemStore::new(16);
        let b = s.allocate_block().unwrap();
        s.data_mut(&b).unwrap()[0] = 1;
        s.release_block(b).unwrap();

        let b = s.fetch_block(0).unwrap();
        s.data_mut(&b).unwrap()[0] = 2; // без mark_modified
        s.release_block(b).unwrap();
        assert_eq!(s.raw_block(0).unwrap()[0], 1);

        let b = s.fetch_block(0).unwrap();
        s.data_mut(&b).unwrap()[0] = 3;
        s.mark_modified(&b);
        s.release_block(b).unwrap();
        assert_eq!(s.raw_block(0).unwrap()[0], 3);
    }

    #[test]
    fn injected_faults_and_double_release() {
        let mut s = MemStore::new(16);
        s.fail_after(1);
        let b = s.allocate_block().unwrap();
        s.release_block(b).unwrap();
        assert!(s.fetch_block(0).is_err());
        s.clear_faults();

        let b = s.fetch_block(0).unwrap();
        let again = BlockRef::new(b.id());
        s.release_block(b).unwrap();
        assert!(s.release_block(again).is_err());
        assert_eq!(s.pinned_blocks(), 0);
        s.close().unwrap();
        assert!(s.fetch_block(0).is_err());
    }
}
