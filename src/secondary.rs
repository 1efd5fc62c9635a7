//! secondary: вторичный статический хеш-индекс по текстовому атрибуту записи.
//!
//! Элементы: (значение, id блока основного файла), а не полные записи.
//! Пара (значение, блок) хранится в бакете не более одного раза: поиск разрешает
//! каждую пару чтением блока основного файла, и дубликат пары вернул бы записи дважды.
//!
//! Ссылка на блок не проверяется при вставке: индекс не владеет основным файлом.

use anyhow::Result;
use log::debug;
use std::ops::ControlFlow;
use std::path::Path;

use crate::block::for_each_item;
use crate::chain::{Lookup, RecordBlocks};
use crate::config::StoreConfig;
use crate::error::FileKind;
use crate::hash::bucket_of_str;
use crate::pager::{BlockStore, Pager};
use crate::record::{Attribute, FixedText, IndexEntry, Record};
use crate::stats::HashStatistics;
use crate::table::BucketTable;

/// Результат вставки во вторичный индекс.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { block_id: u32 },
    /// Такая пара (значение, блок) уже есть в бакете.
    Duplicate,
}

pub struct SecondaryIndex<S: BlockStore = Pager> {
    table: BucketTable<S>,
}

impl SecondaryIndex<Pager> {
    pub fn create(
        path: &Path,
        bucket_count: u32,
        source: &str,
        attribute: Attribute,
        cfg: &StoreConfig,
    ) -> Result<()> {
        BucketTable::<Pager>::plan::<IndexEntry>(cfg.block_size as usize, bucket_count, source)?;
        Pager::create(path, cfg)?;
        let idx = Self::create_in(Pager::open(path, cfg)?, bucket_count, source, attribute)?;
        idx.close()
    }

    pub fn open(path: &Path, cfg: &StoreConfig) -> Result<Self> {
        Self::open_in(Pager::open(path, cfg)?)
    }
}

impl<S: BlockStore> SecondaryIndex<S> {
    pub fn create_in(store: S, bucket_count: u32, source: &str, attribute: Attribute) -> Result<Self> {
        let table = BucketTable::create::<IndexEntry>(
            store,
            FileKind::SecondaryHash,
            Some(attribute),
            source,
            bucket_count,
        )?;
        Ok(Self { table })
    }

    pub fn open_in(store: S) -> Result<Self> {
        Ok(Self {
            table: BucketTable::open::<IndexEntry>(store, FileKind::SecondaryHash)?,
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.table.flush()
    }

    pub fn close(self) -> Result<()> {
        self.table.close()
    }

    pub fn into_store(mut self) -> Result<S> {
        self.table.flush()?;
        Ok(self.table.into_store())
    }

    pub fn store(&self) -> &S {
        self.table.store()
    }

    pub fn store_mut(&mut self) -> &mut S {
        self.table.store_mut()
    }

    pub fn bucket_count(&self) -> u32 {
        self.table.bucket_count()
    }

    pub fn entries_per_block(&self) -> u32 {
        self.table.header().layout.records_per_block
    }

    pub fn source(&self) -> &str {
        &self.table.header().source
    }

    /// Атрибут, по которому построен индекс (сохранён в заголовке).
    pub fn attribute(&self) -> Attribute {
        self.table.header().attribute.unwrap_or_default()
    }

    pub fn bucket_of(&self, value: &FixedText) -> u32 {
        let header = self.table.header();
        bucket_of_str(header.hash_kind, value.as_bytes(), header.bucket_count())
    }

    pub fn bucket_head(&self, bucket: u32) -> Option<u32> {
        self.table.header().heads().get(bucket as usize).copied()
    }

    /// Проиндексировать запись, лежащую в блоке `primary_block_id` основного файла.
    pub fn insert(&mut self, rec: &Record, primary_block_id: u32) -> Result<InsertOutcome> {
        let entry = IndexEntry {
            value: *rec.attribute(self.attribute()),
            primary_block_id,
        };
        self.insert_entry(&entry)
    }

    /// Вставка пары; перед записью просматривается вся цепочка бакета.
    pub fn insert_entry(&mut self, entry: &IndexEntry) -> Result<InsertOutcome> {
        let bucket = self.bucket_of(&entry.value);
        let mut present = false;
        self.table.walk_bucket(bucket, |id, _, b| {
            for_each_item::<IndexEntry, _>(b, id, |e| present |= e == *entry)?;
            Ok(if present {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })?;
        if present {
            debug!(
                "secondary: ('{}', block {}) already indexed",
                entry.value, entry.primary_block_id
            );
            return Ok(InsertOutcome::Duplicate);
        }
        let block_id = self.table.append(bucket, entry)?;
        debug!(
            "secondary: '{}' -> bucket {} block {} (primary block {})",
            entry.value, bucket, block_id, entry.primary_block_id
        );
        Ok(InsertOutcome::Inserted { block_id })
    }

    /// Все записи основного файла, у которых атрибут равен `value`.
    ///
    /// Обходится вся цепочка бакета; каждый найденный блок основного файла читается
    /// один раз и просматривается целиком, потому что в одном блоке может быть
    /// несколько записей с этим значением. blocks_read: число прочитанных блоков
    /// основного файла.
    pub fn get_all_entries<P>(&mut self, primary: &mut P, value: &str) -> Result<Lookup>
    where
        P: RecordBlocks + ?Sized,
    {
        let attr = self.attribute();
        let target = match FixedText::new(attr.field_name(), value) {
            Ok(t) => t,
            Err(e) => {
                // такое значение не может лежать в поле записи
                debug!("secondary: '{}' can never match: {:#}", value, e);
                return Ok(Lookup::default());
            }
        };
        let bucket = self.bucket_of(&target);

        let mut blocks = Vec::new();
        self.table.walk_bucket(bucket, |id, _, b| {
            for_each_item::<IndexEntry, _>(b, id, |e| {
                if e.value == target {
                    blocks.push(e.primary_block_id);
                }
            })?;
            Ok(ControlFlow::Continue(()))
        })?;

        let mut out = Lookup::default();
        for block_id in blocks {
            primary.records_in_block(block_id, &mut |r| {
                if *r.attribute(attr) == target {
                    out.records.push(*r);
                }
            })?;
            out.blocks_read += 1;
        }
        Ok(out)
    }

    pub fn statistics(&mut self) -> Result<HashStatistics> {
        HashStatistics::collect(&mut self.table)
    }

    pub fn chain_blocks(&mut self, bucket: u32) -> Result<Vec<u32>> {
        self.table.chain_blocks(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapFile;
    use crate::pager::MemStore;

    fn rec(id: i32, name: &str) -> Record {
        Record::new(id, name, "Kosta", "Larisa").unwrap()
    }

    #[test]
    fn duplicate_pair_is_stored_once() {
        let mut heap = HeapFile::create_in(MemStore::new(256)).unwrap();
        let mut idx = SecondaryIndex::create_in(MemStore::new(256), 3, "heap", Attribute::Name).unwrap();

        let r = rec(1, "Eleni");
        let b = heap.insert(&r).unwrap();
        assert!(matches!(idx.insert(&r, b).unwrap(), InsertOutcome::Inserted { .. }));
        assert_eq!(idx.insert(&r, b).unwrap(), InsertOutcome::Duplicate);

        // вторая запись с тем же именем в том же блоке: пара та же
        let r2 = rec(2, "Eleni");
        let b2 = heap.insert(&r2).unwrap();
        assert_eq!(b2, b);
        assert_eq!(idx.insert(&r2, b2).unwrap(), InsertOutcome::Duplicate);

        let found = idx.get_all_entries(&mut heap, "Eleni").unwrap();
        assert_eq!(found.records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(found.blocks_read, 1);
        assert_eq!(idx.store().pinned_blocks(), 0);
        assert_eq!(heap.store().pinned_blocks(), 0);
    }

    #[test]
    fn duplicate_found_in_older_overflow_block() {
        let mut idx = SecondaryIndex::create_in(MemStore::new(128), 1, "heap", Attribute::City).unwrap();
        // (128 - 12) / 24 = 4 элемента в блоке
        assert_eq!(idx.entries_per_block(), 4);
        let city = FixedText::new("city", "Chania").unwrap();
        for b in 1..=5 {
            let e = IndexEntry { value: city, primary_block_id: b };
            assert!(matches!(idx.insert_entry(&e).unwrap(), InsertOutcome::Inserted { .. }));
        }
        assert_eq!(idx.chain_blocks(0).unwrap().len(), 2);
        // пара из хвостового (старого) блока цепочки
        let e = IndexEntry { value: city, primary_block_id: 2 };
        assert_eq!(idx.insert_entry(&e).unwrap(), InsertOutcome::Duplicate);
    }

    #[test]
    fn attribute_is_persisted() {
        let idx = SecondaryIndex::create_in(MemStore::new(256), 2, "heap", Attribute::Surname).unwrap();
        let idx = SecondaryIndex::open_in(idx.into_store().unwrap()).unwrap();
        assert_eq!(idx.attribute(), Attribute::Surname);
        assert_eq!(idx.source(), "heap");
    }

    #[test]
    fn unstorable_value_finds_nothing() {
        let mut heap = HeapFile::create_in(MemStore::new(256)).unwrap();
        let mut idx = SecondaryIndex::create_in(MemStore::new(256), 2, "heap", Attribute::Name).unwrap();
        let r = rec(1, "Konstantina");
        let b = heap.insert(&r).unwrap();
        idx.insert(&r, b).unwrap();
        for value in ["Konstantinopoulou-Papa", "Konstantina\0"] {
            let fetched = idx.store().fetch_calls();
            let found = idx.get_all_entries(&mut heap, value).unwrap();
            assert!(!found.found(), "{:?}", value);
            assert_eq!(found.blocks_read, 0);
            assert_eq!(idx.store().fetch_calls(), fetched);
        }
        let none = idx.get_all_entries(&mut heap, "Nobody").unwrap();
        assert!(!none.found());
        assert_eq!(none.blocks_read, 0);
    }
}
