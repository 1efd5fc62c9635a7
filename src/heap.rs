//! heap. Неупорядоченный heap file, цепочка data-блоков с полными записями.
//!
//! - блок 0: заголовок (HeapHeader), data-блоки 1.. связаны next от first к last;
//! - вставка всегда в last; когда он полон, новый блок дописывается в хвост,
//!   и только после этого старый last получает ссылку на него;
//! - поиск по ключу: линейный обход цепочки, собственного индекса у heap нет.

use anyhow::Result;
use log::{debug, info, warn};
use std::ops::ControlFlow;
use std::path::Path;

use crate::block::{append_item, for_each_item, init_data_block, set_next, BlockTrailer};
use crate::chain::{check_data_block, walk_chain, Lookup, RecordBlocks};
use crate::config::StoreConfig;
use crate::consts::{HEADER_BLOCK, NO_BLOCK, RECORD_SIZE};
use crate::error::HashFileError;
use crate::meta::{HeapHeader, Layout};
use crate::pager::{init_block, read_block, try_update_block, update_block, BlockStore, Pager};
use crate::record::Record;

/// Открытая сессия heap file. close() поглощает handle.
pub struct HeapFile<S: BlockStore = Pager> {
    store: S,
    header: HeapHeader,
}

impl HeapFile<Pager> {
    /// Создать файл: заголовок в блоке 0, data-блоков нет.
    pub fn create(path: &Path, cfg: &StoreConfig) -> Result<()> {
        // геометрию проверяем до того, как файл появится на диске
        Layout::for_item(cfg.block_size as usize, RECORD_SIZE)?;
        Pager::create(path, cfg)?;
        let heap = Self::create_in(Pager::open(path, cfg)?)?;
        heap.close()
    }

    pub fn open(path: &Path, cfg: &StoreConfig) -> Result<Self> {
        Self::open_in(Pager::open(path, cfg)?)
    }
}

impl<S: BlockStore> HeapFile<S> {
    /// Разметить пустой store как heap file и вернуть открытую сессию.
    pub fn create_in(mut store: S) -> Result<Self> {
        let layout = Layout::for_item(store.block_size(), RECORD_SIZE)?;
        if store.block_count()? != 0 {
            return Err(HashFileError::storage("cannot create a heap file in a non-empty store").into());
        }
        let header = HeapHeader::new(layout);
        init_block(&mut store, |id, b| {
            debug_assert_eq!(id, HEADER_BLOCK);
            header.encode(b);
            Ok(())
        })?;
        info!(
            "heap: created ({} records/block, block_size={})",
            layout.records_per_block, layout.block_size
        );
        Ok(Self { store, header })
    }

    /// Прочитать блок 0; WrongFileKind, если это не heap file.
    pub fn open_in(mut store: S) -> Result<Self> {
        let blocks = store.block_count()?;
        if blocks == 0 {
            return Err(HashFileError::corrupt(HEADER_BLOCK, "file has no header block").into());
        }
        let header = read_block(&mut store, HEADER_BLOCK, |b| HeapHeader::decode(b, RECORD_SIZE))?;
        if header.first_block != NO_BLOCK {
            check_data_block(header.first_block, blocks)?;
            check_data_block(header.last_block, blocks)?;
        }
        info!(
            "heap: opened ({} records in {} data blocks)",
            header.record_count,
            blocks - 1
        );
        Ok(Self { store, header })
    }

    /// Записать заголовок целиком в блок 0.
    pub fn flush(&mut self) -> Result<()> {
        let header = &self.header;
        update_block(&mut self.store, HEADER_BLOCK, |b| {
            header.encode(b);
            Ok(())
        })
    }

    /// flush + закрытие store; store закрывается даже при ошибке flush.
    pub fn close(mut self) -> Result<()> {
        let flushed = self.flush();
        let closed = self.store.close();
        flushed?;
        closed
    }

    /// Отдать store без закрытия (заголовок предварительно сбрасывается).
    pub fn into_store(mut self) -> Result<S> {
        self.flush()?;
        Ok(self.store)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn header(&self) -> &HeapHeader {
        &self.header
    }

    pub fn records_per_block(&self) -> u32 {
        self.header.layout.records_per_block
    }

    pub fn first_block(&self) -> Option<u32> {
        Some(self.header.first_block).filter(|&b| b != NO_BLOCK)
    }

    pub fn last_block(&self) -> Option<u32> {
        Some(self.header.last_block).filter(|&b| b != NO_BLOCK)
    }

    pub fn record_count(&self) -> u32 {
        self.header.record_count
    }

    /// Data-блоки: всё, кроме заголовка.
    pub fn data_blocks(&self) -> Result<u32> {
        Ok(self.store.block_count()?.saturating_sub(1))
    }

    /// Дописать запись; возвращает id блока, куда она попала.
    pub fn insert(&mut self, rec: &Record) -> Result<u32> {
        let cap = self.header.layout.records_per_block;
        let id = match self.last_block() {
            None => {
                let (id, _) = self.new_tail_block(rec, cap)?;
                self.header.first_block = id;
                self.header.last_block = id;
                id
            }
            Some(last) => {
                let placed = try_update_block(&mut self.store, last, |b| {
                    let t = BlockTrailer::read_for(b, last, RECORD_SIZE)?;
                    if !t.has_room() {
                        return Ok(false);
                    }
                    append_item(b, last, rec)?;
                    Ok(true)
                })?;
                if placed {
                    last
                } else {
                    let (id, _) = self.new_tail_block(rec, cap)?;
                    // прямая ссылка появляется только после того, как новый блок записан
                    update_block(&mut self.store, last, |b| set_next(b, last, id))?;
                    self.header.last_block = id;
                    debug!("heap: block {} full, tail is now {}", last, id);
                    id
                }
            }
        };
        self.header.record_count += 1;
        Ok(id)
    }

    fn new_tail_block(&mut self, rec: &Record, cap: u32) -> Result<(u32, u32)> {
        init_block(&mut self.store, |id, b| {
            init_data_block::<Record>(b, cap, NO_BLOCK);
            append_item(b, id, rec)
        })
    }

    /// Линейный поиск первой записи с ключом `key`.
    /// blocks_read: порядковый номер (с 1) блока с совпадением или длина всей цепочки.
    pub fn scan_by_key(&mut self, key: i32) -> Result<Lookup> {
        let first = match self.first_block() {
            Some(b) => b,
            None => {
                warn!("heap: scan for key {} on an empty heap file", key);
                return Ok(Lookup::default());
            }
        };
        let mut found = None;
        let blocks_read = walk_chain(&mut self.store, first, |id, _, b| {
            for_each_item::<Record, _>(b, id, |r| {
                if found.is_none() && r.id == key {
                    found = Some(r);
                }
            })?;
            Ok(if found.is_some() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })?;
        Ok(Lookup {
            records: found.into_iter().collect(),
            blocks_read,
        })
    }

    /// Полный обход в порядке цепочки: f(id блока, запись).
    pub fn for_each_record<F>(&mut self, mut f: F) -> Result<u32>
    where
        F: FnMut(u32, &Record),
    {
        let first = match self.first_block() {
            Some(b) => b,
            None => return Ok(0),
        };
        walk_chain(&mut self.store, first, |id, _, b| {
            for_each_item::<Record, _>(b, id, |r| f(id, &r))?;
            Ok(ControlFlow::Continue(()))
        })
    }
}

impl<S: BlockStore> RecordBlocks for HeapFile<S> {
    fn records_in_block(&mut self, block_id: u32, f: &mut dyn FnMut(&Record)) -> Result<()> {
        check_data_block(block_id, self.store.block_count()?)?;
        read_block(&mut self.store, block_id, |b| {
            for_each_item::<Record, _>(b, block_id, |r| f(&r))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::MemStore;

    fn rec(id: i32, name: &str) -> Record {
        Record::new(id, name, "Papadopoulos", "Patra").unwrap()
    }

    #[test]
    fn fills_blocks_in_order() {
        let mut h = HeapFile::create_in(MemStore::new(256)).unwrap();
        assert_eq!(h.records_per_block(), 3);
        assert_eq!(h.last_block(), None);

        let placed: Vec<u32> = (1..=7).map(|k| h.insert(&rec(k, "a")).unwrap()).collect();
        assert_eq!(placed, vec![1, 1, 1, 2, 2, 2, 3]);
        assert_eq!(h.first_block(), Some(1));
        assert_eq!(h.last_block(), Some(3));
        assert_eq!(h.data_blocks().unwrap(), 3);
        assert_eq!(h.record_count(), 7);

        let r = h.scan_by_key(5).unwrap();
        assert_eq!(r.first().map(|r| r.id), Some(5));
        assert_eq!(r.blocks_read, 2);

        let miss = h.scan_by_key(42).unwrap();
        assert!(!miss.found());
        assert_eq!(miss.blocks_read, 3);
        assert_eq!(h.store().pinned_blocks(), 0);
    }

    #[test]
    fn empty_scan_and_reopen() {
        let mut h = HeapFile::create_in(MemStore::new(256)).unwrap();
        assert_eq!(h.scan_by_key(1).unwrap(), Lookup::default());
        h.insert(&rec(9, "x")).unwrap();
        let store = h.into_store().unwrap();

        let mut h = HeapFile::open_in(store).unwrap();
        assert_eq!(h.record_count(), 1);
        let mut seen = Vec::new();
        h.for_each_record(|b, r| seen.push((b, r.id))).unwrap();
        assert_eq!(seen, vec![(1, 9)]);
    }

    #[test]
    fn foreign_block_reads() {
        let mut h = HeapFile::create_in(MemStore::new(256)).unwrap();
        h.insert(&rec(1, "a")).unwrap();
        h.insert(&rec(2, "b")).unwrap();
        let mut ids = Vec::new();
        h.records_in_block(1, &mut |r| ids.push(r.id)).unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert!(h.records_in_block(0, &mut |_| {}).is_err());
        assert!(h.records_in_block(7, &mut |_| {}).is_err());
    }
}
