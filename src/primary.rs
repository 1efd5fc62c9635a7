//! primary: первичный статический хеш-индекс по ключу записи (id).
//!
//! Бакет = id mod B (евклидов остаток). Блоки бакета хранят полные записи;
//! переполнение: новый блок-голова (см. table.rs).

use anyhow::Result;
use log::debug;
use std::ops::ControlFlow;
use std::path::Path;

use crate::block::for_each_item;
use crate::chain::{check_data_block, Lookup, RecordBlocks};
use crate::config::StoreConfig;
use crate::error::FileKind;
use crate::hash::bucket_of_key;
use crate::pager::{read_block, BlockStore, Pager};
use crate::record::Record;
use crate::stats::HashStatistics;
use crate::table::BucketTable;

pub struct PrimaryIndex<S: BlockStore = Pager> {
    table: BucketTable<S>,
}

impl PrimaryIndex<Pager> {
    /// Создать индекс на `bucket_count` бакетов над heap file `source` (только имя).
    pub fn create(path: &Path, bucket_count: u32, source: &str, cfg: &StoreConfig) -> Result<()> {
        BucketTable::<Pager>::plan::<Record>(cfg.block_size as usize, bucket_count, source)?;
        Pager::create(path, cfg)?;
        let idx = Self::create_in(Pager::open(path, cfg)?, bucket_count, source)?;
        idx.close()
    }

    pub fn open(path: &Path, cfg: &StoreConfig) -> Result<Self> {
        Self::open_in(Pager::open(path, cfg)?)
    }
}

impl<S: BlockStore> PrimaryIndex<S> {
    pub fn create_in(store: S, bucket_count: u32, source: &str) -> Result<Self> {
        let table = BucketTable::create::<Record>(store, FileKind::PrimaryHash, None, source, bucket_count)?;
        Ok(Self { table })
    }

    pub fn open_in(store: S) -> Result<Self> {
        Ok(Self {
            table: BucketTable::open::<Record>(store, FileKind::PrimaryHash)?,
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

    pub fn records_per_block(&self) -> u32 {
        self.table.header().layout.records_per_block
    }

    /// Имя heap file, над которым построен индекс.
    pub fn source(&self) -> &str {
        &self.table.header().source
    }

    pub fn bucket_of(&self, key: i32) -> u32 {
        bucket_of_key(key, self.bucket_count())
    }

    /// Текущая голова цепочки бакета (None для бакета вне диапазона).
    pub fn bucket_head(&self, bucket: u32) -> Option<u32> {
        self.table.header().heads().get(bucket as usize).copied()
    }

    /// Вставка в бакет ключа; возвращает id блока, где оказалась запись.
    pub fn insert(&mut self, rec: &Record) -> Result<u32> {
        let bucket = self.bucket_of(rec.id);
        let id = self.table.append(bucket, rec)?;
        debug!("primary: key {} -> bucket {} block {}", rec.id, bucket, id);
        Ok(id)
    }

    /// Поиск по ключу: обход цепочки останавливается на первом блоке, где есть совпадения;
    /// возвращаются все совпадения этого блока.
    pub fn lookup(&mut self, key: i32) -> Result<Lookup> {
        self.scan_bucket(key, true)
    }

    /// Все записи с ключом во всей цепочке бакета (ключ не обязан быть уникальным).
    pub fn get_all_entries(&mut self, key: i32) -> Result<Lookup> {
        self.scan_bucket(key, false)
    }

    fn scan_bucket(&mut self, key: i32, stop_at_first_block: bool) -> Result<Lookup> {
        let bucket = self.bucket_of(key);
        let mut records = Vec::new();
        let blocks_read = self.table.walk_bucket(bucket, |id, _, b| {
            let before = records.len();
            for_each_item::<Record, _>(b, id, |r| {
                if r.id == key {
                    records.push(r);
                }
            })?;
            if stop_at_first_block && records.len() > before {
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(Lookup {
            records,
            blocks_read,
        })
    }

    pub fn statistics(&mut self) -> Result<HashStatistics> {
        HashStatistics::collect(&mut self.table)
    }

    /// Ids блоков цепочки бакета от головы к хвосту.
    pub fn chain_blocks(&mut self, bucket: u32) -> Result<Vec<u32>> {
        self.table.chain_blocks(bucket)
    }
}

impl<S: BlockStore> RecordBlocks for PrimaryIndex<S> {
    fn records_in_block(&mut self, block_id: u32, f: &mut dyn FnMut(&Record)) -> Result<()> {
        let store = self.table.store_mut();
        check_data_block(block_id, store.block_count()?)?;
        read_block(store, block_id, |b| {
            for_each_item::<Record, _>(b, block_id, |r| f(&r))?;
            Ok(())
        })
    }
}
