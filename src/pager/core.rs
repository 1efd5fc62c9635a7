//! pager/core. Дисковый block store, один файл блоков фиксированного размера на структуру.
//!
//! - create(): новый файл с preamble и нулём блоков (ошибка, если файл уже есть).
//! - open(): эксклюзивная advisory-блокировка файла (fs2); вторая сессия получает StorageFault.
//! - блоки живут в buffer pool (cache.rs); вытеснение пишет грязные кадры обратно.
//! - close(): сброс грязных кадров (+ fsync при data_fsync), ошибка при оставшихся pin'ах.

use anyhow::Result;
use fs2::FileExt;
use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::config::{validate_block_size, validate_cache_blocks, StoreConfig};
use crate::consts::PAGER_PREAMBLE_SIZE;
use crate::error::HashFileError;
use crate::metrics::{record_allocate, record_fetch};

use super::cache::FramePool;
use super::io::{block_offset, read_block_at, read_preamble, write_block_at, write_preamble};
use super::{BlockRef, BlockStore};

pub struct Pager {
    pub path: PathBuf,
    file: File,
    block_size: usize,
    block_count: u32,
    pool: FramePool,
    data_fsync: bool,
    closed: bool,
}

impl Pager {
    /// Создать пустой файл блоков (только preamble).
    pub fn create(path: &Path, cfg: &StoreConfig) -> Result<()> {
        cfg.validate()?;
        let mut f = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| HashFileError::io(format!("create {}", path.display()), e))?;
        write_preamble(&mut f, path, cfg.block_size)?;
        if cfg.data_fsync {
            f.sync_all()
                .map_err(|e| HashFileError::io(format!("fsync {}", path.display()), e))?;
        }
        debug!(
            "pager: created {} (block_size={})",
            path.display(),
            cfg.block_size
        );
        Ok(())
    }

    /// Открыть файл блоков. block_size берётся из preamble, а не из cfg.
    pub fn open(path: &Path, cfg: &StoreConfig) -> Result<Self> {
        validate_cache_blocks(cfg.cache_blocks)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| HashFileError::io(format!("open {}", path.display()), e))?;

        file.try_lock_exclusive().map_err(|e| {
            HashFileError::io(
                format!("{} is already open by another session", path.display()),
                e,
            )
        })?;

        let block_size = read_preamble(&mut file, path)?;
        validate_block_size(block_size)
            .map_err(|e| HashFileError::storage(format!("{}: {:#}", path.display(), e)))?;
        let bs = block_size as usize;

        let len = file
            .metadata()
            .map_err(|e| HashFileError::io(format!("stat {}", path.display()), e))?
            .len();
        let body = len.saturating_sub(PAGER_PREAMBLE_SIZE as u64);
        if body % bs as u64 != 0 {
            return Err(HashFileError::storage(format!(
                "{}: length {} is not preamble + whole blocks of {}",
                path.display(),
                len,
                bs
            ))
            .into());
        }
        let block_count = (body / bs as u64) as u32;

        info!(
            "pager: opened {} (block_size={}, blocks={}, frames={})",
            path.display(),
            block_size,
            block_count,
            cfg.cache_blocks
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            block_size: bs,
            block_count,
            pool: FramePool::new(cfg.cache_blocks, bs),
            data_fsync: cfg.data_fsync,
            closed: false,
        })
    }

    /// Кадров в пуле сейчас / максимум.
    pub fn pool_usage(&self) -> (usize, usize) {
        (self.pool.len(), self.pool.capacity())
    }

    // ---------------- internal helpers ----------------

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(HashFileError::storage(format!("{} is closed", self.path.display())).into());
        }
        Ok(())
    }

    /// Освободить кадр под новый блок, записав вытесненный грязный кадр.
    fn make_room(&mut self) -> Result<()> {
        match self.pool.make_room() {
            Ok(Some(ev)) => write_block_at(&mut self.file, self.block_size, ev.id, &ev.data),
            Ok(None) => Ok(()),
            Err(()) => Err(HashFileError::storage(format!(
                "buffer pool exhausted: all {} frames are pinned",
                self.pool.capacity()
            ))
            .into()),
        }
    }

    fn flush_all(&mut self) -> Result<usize> {
        let file = &mut self.file;
        let bs = self.block_size;
        self.pool
            .flush_dirty(|id, data| write_block_at(&mut *file, bs, id, data))
    }
}

impl BlockStore for Pager {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> Result<u32> {
        self.ensure_open()?;
        Ok(self.block_count)
    }

    fn allocate_block(&mut self) -> Result<BlockRef> {
        self.ensure_open()?;
        self.make_room()?;
        let id = self.block_count;
        let need_len = block_offset(self.block_size, id + 1);
        self.file
            .set_len(need_len)
            .map_err(|e| HashFileError::io(format!("extend to block {}", id), e))?;
        self.block_count += 1;
        // Новый блок сразу грязный: на диске он пока только нули от set_len.
        self.pool.insert_pinned(id, vec![0u8; self.block_size], true);
        record_allocate();
        Ok(BlockRef::new(id))
    }

    fn fetch_block(&mut self, id: u32) -> Result<BlockRef> {
        self.ensure_open()?;
        if id >= self.block_count {
            return Err(HashFileError::storage(format!(
                "block {} out of range (block_count={})",
                id, self.block_count
            ))
            .into());
        }
        if self.pool.pin(id) {
            record_fetch(true);
            return Ok(BlockRef::new(id));
        }
        self.make_room()?;
        let mut buf = vec![0u8; self.block_size];
        read_block_at(&mut self.file, self.block_size, id, &mut buf)?;
        self.pool.insert_pinned(id, buf, false);
        record_fetch(false);
        Ok(BlockRef::new(id))
    }

    fn release_block(&mut self, block: BlockRef) -> Result<()> {
        if !self.pool.unpin(block.id()) {
            return Err(HashFileError::storage(format!(
                "release of block {} that is not pinned",
                block.id()
            ))
            .into());
        }
        Ok(())
    }

    fn mark_modified(&mut self, block: &BlockRef) {
        self.pool.mark_dirty(block.id());
    }

    fn data(&self, block: &BlockRef) -> Result<&[u8]> {
        self.pool.data(block.id()).ok_or_else(|| {
            HashFileError::storage(format!("block {} is not pinned", block.id())).into()
        })
    }

    fn data_mut(&mut self, block: &BlockRef) -> Result<&mut [u8]> {
        let id = block.id();
        self.pool
            .data_mut(id)
            .ok_or_else(|| HashFileError::storage(format!("block {} is not pinned", id)).into())
    }

    fn pinned_blocks(&self) -> usize {
        self.pool.pinned_count()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let pinned = self.pool.pinned_count();
        let written = self.flush_all()?;
        if self.data_fsync {
            self.file
                .sync_all()
                .map_err(|e| HashFileError::io(format!("fsync {}", self.path.display()), e))?;
        }
        let _ = self.file.unlock();
        self.closed = true;
        info!(
            "pager: closed {} (blocks={}, written_back={})",
            self.path.display(),
            self.block_count,
            written
        );
        if pinned > 0 {
            return Err(HashFileError::storage(format!(
                "{} block(s) still pinned when closing {}",
                pinned,
                self.path.display()
            ))
            .into());
        }
        Ok(())
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // best-effort: не терять грязные кадры, если close() не был вызван
        match self.flush_all() {
            Ok(n) if n > 0 => warn!(
                "pager: {} dropped without close(), wrote back {} block(s)",
                self.path.display(),
                n
            ),
            Ok(_) => {}
            Err(e) => warn!("pager: {} write-back on drop failed: {:#}", self.path.display(), e),
        }
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::{init_block, read_block, update_block};

    fn unique_path(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("hfdb-{}-{}-{}.blk", prefix, pid, t))
    }

    #[test]
    fn blocks_survive_close_and_reopen() {
        let path = unique_path("pager");
        let cfg = StoreConfig::default().with_block_size(128).with_cache_blocks(2);
        Pager::create(&path, &cfg).unwrap();
        assert!(Pager::create(&path, &cfg).is_err(), "create must not overwrite");

        {
            let mut p = Pager::open(&path, &cfg).unwrap();
            assert_eq!(p.block_count().unwrap(), 0);
            assert_eq!(p.pool_usage(), (0, 2));
            // больше блоков, чем кадров: часть уйдёт через вытеснение
            for i in 0..5u8 {
                let (id, ()) = init_block(&mut p, |_, d| {
                    d[0] = i;
                    d[127] = i;
                    Ok(())
                })
                .unwrap();
                assert_eq!(id, i as u32);
            }
            update_block(&mut p, 1, |d| {
                d[1] = 0xAB;
                Ok(())
            })
            .unwrap();
            assert_eq!(p.pool_usage(), (2, 2));
            p.close().unwrap();
        }

        let mut p = Pager::open(&path, &cfg).unwrap();
        assert_eq!(p.block_size(), 128);
        assert_eq!(p.block_count().unwrap(), 5);
        for i in 0..5u32 {
            let (a, b) = read_block(&mut p, i, |d| Ok((d[0], d[127]))).unwrap();
            assert_eq!((a as u32, b as u32), (i, i));
        }
        assert_eq!(read_block(&mut p, 1, |d| Ok(d[1])).unwrap(), 0xAB);
        assert!(p.fetch_block(5).is_err());
        p.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn second_open_is_rejected() {
        let path = unique_path("lock");
        let cfg = StoreConfig::default();
        Pager::create(&path, &cfg).unwrap();
        let mut first = Pager::open(&path, &cfg).unwrap();
        let err = Pager::open(&path, &cfg).err().expect("second open must fail");
        assert!(HashFileError::of(&err).map(|e| e.is_storage_fault()).unwrap_or(false));
        first.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn exhausted_pool_and_leak_on_close() {
        let path = unique_path("pins");
        let cfg = StoreConfig::default().with_block_size(64).with_cache_blocks(1);
        Pager::create(&path, &cfg).unwrap();
        let mut p = Pager::open(&path, &cfg).unwrap();
        let held = p.allocate_block().unwrap();
        assert!(p.allocate_block().is_err(), "single frame is pinned");
        assert_eq!(p.pinned_blocks(), 1);
        // держим held до close: close сообщает об утечке, но данные сброшены
        assert!(p.close().is_err());
        drop(held);
        let _ = std::fs::remove_file(&path);
    }
}
