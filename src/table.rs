//! table: статическая хеш-таблица из B цепочек блоков; общее ядро primary и secondary индексов.
//!
//! - create: блок 0 под заголовок, затем по одному пустому data-блоку на бакет.
//! - вставка: в голову бакета, если там есть место; иначе новый блок становится головой,
//!   его next указывает на прежнюю голову (обратное сцепление).
//! - заголовок (с массивом голов) живёт в памяти и пишется в блок 0 на flush/close.

use anyhow::Result;
use log::{debug, info};
use std::ops::ControlFlow;

use crate::block::{append_item, init_data_block, BlockTrailer, SlotItem};
use crate::chain::{check_data_block, walk_chain};
use crate::consts::{HEADER_BLOCK, NO_BLOCK, SOURCE_NAME_LEN};
use crate::error::{FileKind, HashFileError};
use crate::geometry::check_bucket_count;
use crate::meta::{HashHeader, Layout};
use crate::pager::{init_block, read_block, try_update_block, update_block, BlockStore};
use crate::record::Attribute;

#[derive(Debug)]
pub struct BucketTable<S: BlockStore> {
    store: S,
    header: HashHeader,
}

impl<S: BlockStore> BucketTable<S> {
    /// Проверки геометрии и имени источника до первой записи в store.
    pub fn plan<T: SlotItem>(block_size: usize, bucket_count: u32, source: &str) -> Result<Layout> {
        let layout = Layout::for_item(block_size, T::SIZE)?;
        check_bucket_count(block_size, bucket_count)?;
        if source.len() > SOURCE_NAME_LEN {
            return Err(HashFileError::FieldTooLong {
                field: "source",
                len: source.len(),
                max: SOURCE_NAME_LEN,
            }
            .into());
        }
        Ok(layout)
    }

    /// Разметить пустой store как хеш-файл. Store должен быть пустым.
    pub fn create<T: SlotItem>(
        mut store: S,
        kind: FileKind,
        attribute: Option<Attribute>,
        source: &str,
        bucket_count: u32,
    ) -> Result<Self> {
        let layout = Self::plan::<T>(store.block_size(), bucket_count, source)?;
        if store.block_count()? != 0 {
            return Err(HashFileError::storage("cannot create a hash file in a non-empty store").into());
        }
        let mut header = HashHeader::new(kind, layout, attribute, source, vec![NO_BLOCK; bucket_count as usize])?;

        let (hdr, ()) = init_block(&mut store, |_, _| Ok(()))?;
        debug_assert_eq!(hdr, HEADER_BLOCK);

        let cap = layout.records_per_block;
        for bucket in 0..bucket_count {
            let (id, ()) = init_block(&mut store, |_, b| {
                init_data_block::<T>(b, cap, NO_BLOCK);
                Ok(())
            })?;
            header.set_head(bucket, id);
        }

        let mut table = Self { store, header };
        table.flush()?;
        info!(
            "{}: created with {} buckets ({} items/block, source '{}')",
            kind, bucket_count, cap, table.header.source
        );
        Ok(table)
    }

    /// Прочитать блок 0 и проверить тип файла, раскладку и головы бакетов.
    pub fn open<T: SlotItem>(mut store: S, expected: FileKind) -> Result<Self> {
        let blocks = store.block_count()?;
        if blocks == 0 {
            return Err(HashFileError::corrupt(HEADER_BLOCK, "file has no header block").into());
        }
        let header = read_block(&mut store, HEADER_BLOCK, |b| {
            HashHeader::decode(b, expected, T::SIZE)
        })?;
        for &head in header.heads() {
            check_data_block(head, blocks)?;
        }
        info!(
            "{}: opened ({} buckets, {} blocks)",
            header.kind,
            header.bucket_count(),
            blocks
        );
        Ok(Self { store, header })
    }

    pub fn header(&self) -> &HashHeader {
        &self.header
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn bucket_count(&self) -> u32 {
        self.header.bucket_count()
    }

    /// Записать заголовок целиком в блок 0.
    pub fn flush(&mut self) -> Result<()> {
        let header = &self.header;
        update_block(&mut self.store, HEADER_BLOCK, |b| {
            header.encode(b);
            Ok(())
        })
    }

    /// flush + закрытие store. Store закрывается даже если flush упал.
    pub fn close(mut self) -> Result<()> {
        let flushed = self.flush();
        let closed = self.store.close();
        flushed?;
        closed
    }

    /// Положить элемент в бакет. Возвращает id блока, где он оказался.
    pub fn append<T: SlotItem>(&mut self, bucket: u32, item: &T) -> Result<u32> {
        let head = self.header.head(bucket)?;
        let placed = try_update_block(&mut self.store, head, |b| {
            let t = BlockTrailer::read_for(b, head, T::SIZE)?;
            if !t.has_room() {
                return Ok(false);
            }
            append_item(b, head, item)?;
            Ok(true)
        })?;
        if placed {
            return Ok(head);
        }
        self.prepend_overflow(bucket, item)
    }

    /// Новый блок с элементом в слоте 0 становится головой бакета, next → прежняя голова.
    /// Единственное место, где меняются голова бакета и связь нового блока.
    fn prepend_overflow<T: SlotItem>(&mut self, bucket: u32, item: &T) -> Result<u32> {
        let old_head = self.header.head(bucket)?;
        let cap = self.header.layout.records_per_block;
        let (id, _) = init_block(&mut self.store, |id, b| {
            init_data_block::<T>(b, cap, old_head);
            append_item(b, id, item)
        })?;
        self.header.set_head(bucket, id);
        debug!(
            "{}: bucket {} overflowed, new head {} -> {}",
            self.header.kind, bucket, id, old_head
        );
        Ok(id)
    }

    /// Обход цепочки бакета от головы; см. chain::walk_chain.
    pub fn walk_bucket<F>(&mut self, bucket: u32, f: F) -> Result<u32>
    where
        F: FnMut(u32, &BlockTrailer, &[u8]) -> Result<ControlFlow<()>>,
    {
        let head = self.header.head(bucket)?;
        walk_chain(&mut self.store, head, f)
    }

    /// Ids блоков цепочки бакета, от головы к хвосту.
    pub fn chain_blocks(&mut self, bucket: u32) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        self.walk_bucket(bucket, |id, _, _| {
            ids.push(id);
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::for_each_item;
    use crate::pager::MemStore;
    use crate::record::Record;

    fn rec(id: i32) -> Record {
        Record::new(id, "n", "s", "c").unwrap()
    }

    #[test]
    fn create_allocates_one_block_per_bucket() {
        let t = BucketTable::create::<Record>(MemStore::new(256), FileKind::PrimaryHash, None, "h", 4)
            .unwrap();
        assert_eq!(t.header().heads(), &[1, 2, 3, 4]);
        assert_eq!(t.store().block_count().unwrap(), 5);
        let t = BucketTable::open::<Record>(t.into_store(), FileKind::PrimaryHash).unwrap();
        assert_eq!(t.bucket_count(), 4);

        let empty = BucketTable::open::<Record>(MemStore::new(256), FileKind::PrimaryHash);
        assert!(empty.is_err(), "empty store has no header");
    }

    #[test]
    fn overflow_prepends_new_head() {
        let mut t =
            BucketTable::create::<Record>(MemStore::new(256), FileKind::PrimaryHash, None, "h", 2).unwrap();
        // ёмкость 3: три вставки в голову, четвёртая в новый блок
        for k in 0..3 {
            assert_eq!(t.append(0, &rec(k)).unwrap(), 1);
        }
        let id = t.append(0, &rec(3)).unwrap();
        assert_eq!(id, 3);
        assert_eq!(t.header().head(0).unwrap(), 3);
        assert_eq!(t.chain_blocks(0).unwrap(), vec![3, 1]);
        assert_eq!(t.chain_blocks(1).unwrap(), vec![2]);

        let mut keys = Vec::new();
        t.walk_bucket(0, |id, _, b| {
            for_each_item::<Record, _>(b, id, |r| keys.push(r.id))?;
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();
        assert_eq!(keys, vec![3, 0, 1, 2]);
        assert_eq!(t.store().pinned_blocks(), 0);
    }

    #[test]
    fn unknown_bucket_is_an_error() {
        let mut t =
            BucketTable::create::<Record>(MemStore::new(256), FileKind::PrimaryHash, None, "h", 4).unwrap();
        for bucket in [4, 9, u32::MAX] {
            let err = t.chain_blocks(bucket).unwrap_err();
            assert!(matches!(HashFileError::of(&err), Some(HashFileError::CapacityConfig(_))));
            assert!(t.append(bucket, &rec(1)).is_err());
        }
        assert_eq!(t.store().block_count().unwrap(), 5, "nothing allocated");
        assert_eq!(t.store().pinned_blocks(), 0);
        assert_eq!(t.chain_blocks(3).unwrap(), vec![4]);
    }

    #[test]
    fn bad_geometry_touches_nothing() {
        let err =
            BucketTable::create::<Record>(MemStore::new(64), FileKind::PrimaryHash, None, "h", 1).unwrap_err();
        assert!(matches!(HashFileError::of(&err), Some(HashFileError::CapacityConfig(_))));
        let err = BucketTable::create::<Record>(MemStore::new(256), FileKind::PrimaryHash, None, "h", 1000)
            .unwrap_err();
        assert!(matches!(HashFileError::of(&err), Some(HashFileError::CapacityConfig(_))));
    }
}
