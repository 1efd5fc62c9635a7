//! stats: отчёт по цепочкам бакетов хеш-файла (primary или secondary).
//!
//! Только чтение: каждый блок цепочки fetch → trailer → release, ничего не помечается
//! изменённым. JSON-вид: через serde (hashfile stats --json).

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::ops::ControlFlow;
use std::path::Path;

use crate::block::SlotItem;
use crate::config::StoreConfig;
use crate::consts::HEADER_BLOCK;
use crate::error::{FileKind, HashFileError};
use crate::meta::peek_kind;
use crate::pager::{read_block, BlockStore, Pager};
use crate::record::{IndexEntry, Record};
use crate::table::BucketTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    pub bucket: u32,
    /// Блоков в цепочке (>= 1).
    pub blocks: u32,
    pub entries: u32,
}

impl BucketStats {
    #[inline]
    pub fn overflow_blocks(&self) -> u32 {
        self.blocks.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HashStatistics {
    pub kind: String,
    pub file_blocks: u32,
    pub bucket_count: u32,
    pub entries_per_block: u32,
    pub total_blocks: u32,
    pub total_entries: u64,
    pub avg_entries_per_bucket: f64,
    pub min_entries_per_bucket: u32,
    pub max_entries_per_bucket: u32,
    pub avg_blocks_per_bucket: f64,
    pub overflowing_buckets: u32,
    pub buckets: Vec<BucketStats>,
}

impl HashStatistics {
    /// Пройти все цепочки таблицы и свести итоги.
    pub fn collect<S: BlockStore>(table: &mut BucketTable<S>) -> Result<Self> {
        let kind = table.header().kind;
        let entries_per_block = table.header().layout.records_per_block;
        let file_blocks = table.store().block_count()?;

        let mut buckets = Vec::with_capacity(table.bucket_count() as usize);
        for bucket in 0..table.bucket_count() {
            let mut entries = 0u32;
            let blocks = table.walk_bucket(bucket, |_, t, _| {
                entries += t.occupied;
                Ok(ControlFlow::Continue(()))
            })?;
            buckets.push(BucketStats {
                bucket,
                blocks,
                entries,
            });
        }
        Ok(Self::aggregate(kind, file_blocks, entries_per_block, buckets))
    }

    fn aggregate(kind: FileKind, file_blocks: u32, entries_per_block: u32, buckets: Vec<BucketStats>) -> Self {
        let n = buckets.len().max(1) as f64;
        let total_blocks: u32 = buckets.iter().map(|b| b.blocks).sum();
        let total_entries: u64 = buckets.iter().map(|b| b.entries as u64).sum();
        Self {
            kind: kind.to_string(),
            file_blocks,
            bucket_count: buckets.len() as u32,
            entries_per_block,
            total_blocks,
            total_entries,
            avg_entries_per_bucket: total_entries as f64 / n,
            min_entries_per_bucket: buckets.iter().map(|b| b.entries).min().unwrap_or(0),
            max_entries_per_bucket: buckets.iter().map(|b| b.entries).max().unwrap_or(0),
            avg_blocks_per_bucket: total_blocks as f64 / n,
            overflowing_buckets: buckets.iter().filter(|b| b.blocks > 1).count() as u32,
            buckets,
        }
    }

    /// Бакеты, чья цепочка длиннее одного блока.
    pub fn overflowing(&self) -> impl Iterator<Item = &BucketStats> {
        self.buckets.iter().filter(|b| b.blocks > 1)
    }
}

impl fmt::Display for HashStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} buckets, {} entries/block)", self.kind, self.bucket_count, self.entries_per_block)?;
        writeln!(f, "1. Blocks in the file: {}", self.file_blocks)?;
        writeln!(f, "2. Total number of entries: {}", self.total_entries)?;
        writeln!(f, "   avg entries per bucket: {:.2}", self.avg_entries_per_bucket)?;
        writeln!(f, "   min entries per bucket: {}", self.min_entries_per_bucket)?;
        writeln!(f, "   max entries per bucket: {}", self.max_entries_per_bucket)?;
        writeln!(f, "3. Average number of blocks per bucket: {:.2}", self.avg_blocks_per_bucket)?;
        write!(f, "4. Buckets with overflow blocks: {}", self.overflowing_buckets)?;
        for b in self.overflowing() {
            write!(f, "\n   bucket {}: {} overflow block(s)", b.bucket, b.overflow_blocks())?;
        }
        Ok(())
    }
}

/// Отчёт по хеш-файлу на диске (тип определяется по заголовку). Заголовок не
/// переписывается: store закрывается напрямую, минуя flush индекса.
pub fn hash_statistics(path: &Path, cfg: &StoreConfig) -> Result<HashStatistics> {
    let mut store = Pager::open(path, cfg)?;
    let kind = match read_block(&mut store, HEADER_BLOCK, peek_kind) {
        Ok(k) => k,
        Err(e) => {
            let _ = store.close();
            return Err(e);
        }
    };
    match kind {
        FileKind::PrimaryHash => report::<Record>(store, kind),
        FileKind::SecondaryHash => report::<IndexEntry>(store, kind),
        FileKind::Heap => {
            let _ = store.close();
            Err(HashFileError::WrongFileKind {
                expected: FileKind::PrimaryHash,
                found: kind.to_string(),
            }
            .into())
        }
    }
}

fn report<T: SlotItem>(store: Pager, kind: FileKind) -> Result<HashStatistics> {
    let mut table = BucketTable::open::<T>(store, kind)?;
    let stats = HashStatistics::collect(&mut table);
    let closed = table.into_store().close();
    let stats = stats?;
    closed?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::MemStore;
    use crate::primary::PrimaryIndex;

    #[test]
    fn aggregates_chains() {
        let mut idx = PrimaryIndex::create_in(MemStore::new(256), 4, "heap").unwrap();
        // бакет 1: 5 записей → 2 блока; бакет 2: 1 запись
        for k in [1, 5, 9, 13, 17, 2] {
            idx.insert(&Record::new(k, "a", "b", "c").unwrap()).unwrap();
        }
        let s = idx.statistics().unwrap();
        assert_eq!(s.bucket_count, 4);
        assert_eq!(s.file_blocks, 6);
        assert_eq!(s.total_blocks, 5);
        assert_eq!(s.total_entries, 6);
        assert_eq!((s.min_entries_per_bucket, s.max_entries_per_bucket), (0, 5));
        assert_eq!(s.overflowing_buckets, 1);
        let over: Vec<_> = s.overflowing().map(|b| (b.bucket, b.overflow_blocks())).collect();
        assert_eq!(over, vec![(1, 1)]);
        assert!((s.avg_entries_per_bucket - 1.5).abs() < 1e-9);
        assert_eq!(idx.store().pinned_blocks(), 0);

        let text = s.to_string();
        assert!(text.contains("Blocks in the file: 6"));
        assert!(text.contains("bucket 1: 1 overflow block(s)"));
    }
}
