//! pager. Block store: контракт BlockStore и его реализации.
//!
//! Подмодули:
//! - core.rs   Pager, дисковый block store (один файл = одна структура), open/create/close.
//! - io.rs     низкоуровневые чтение/запись блоков и preamble файла.
//! - cache.rs  buffer pool, кадры с pin-счётчиками + O(1) LRU незакреплённых кадров.
//! - mem.rs    MemStore, in-memory store с инъекцией отказов (тесты/встраивание).
//!
//! Дисциплина ресурсов: каждый fetch/allocate парный ровно одному release на любом пути
//! выхода. Хелперы read_block/update_block/init_block ниже делают это за вызывающего.

use anyhow::Result;

pub mod cache;
pub mod core;
pub mod io;
pub mod mem;

pub use self::core::Pager;
pub use mem::MemStore;

/// Закреплённый (pinned) блок. Не копируется: release_block() забирает его по значению,
/// поэтому обращение к блоку после release не компилируется.
#[derive(Debug)]
pub struct BlockRef {
    id: u32,
}

impl BlockRef {
    /// Для реализаций BlockStore.
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Контракт block store, через который работают heap file и оба хеш-индекса.
///
/// Открытие/создание файла: конструкторы конкретной реализации (Pager::create/open,
/// MemStore::new); handle файла: сам store.
pub trait BlockStore {
    /// Размер каждого блока файла в байтах.
    fn block_size(&self) -> usize;

    /// Число блоков в файле (включая заголовочный блок 0).
    fn block_count(&self) -> Result<u32>;

    /// Добавить новый обнулённый блок в конец файла; id == block_count() - 1 после вызова.
    /// Блок возвращается закреплённым.
    fn allocate_block(&mut self) -> Result<BlockRef>;

    /// Закрепить блок в памяти. Парный вызов release_block обязателен.
    fn fetch_block(&mut self, id: u32) -> Result<BlockRef>;

    /// Открепить блок. Изменения сохраняются только если до этого был mark_modified.
    fn release_block(&mut self, block: BlockRef) -> Result<()>;

    fn mark_modified(&mut self, block: &BlockRef);

    fn data(&self, block: &BlockRef) -> Result<&[u8]>;

    fn data_mut(&mut self, block: &BlockRef) -> Result<&mut [u8]>;

    /// Сколько блоков сейчас закреплено (0 между операциями ядра).
    fn pinned_blocks(&self) -> usize;

    /// Сбросить изменённые блоки и закрыть файл. Ошибка, если остались закреплённые блоки.
    fn close(&mut self) -> Result<()>;
}

/// fetch → f(&data) → release. Release выполняется и при ошибке f.
pub fn read_block<S, T, F>(store: &mut S, id: u32, f: F) -> Result<T>
where
    S: BlockStore + ?Sized,
    F: FnOnce(&[u8]) -> Result<T>,
{
    let block = store.fetch_block(id)?;
    let out = store.data(&block).and_then(f);
    let released = store.release_block(block);
    let value = out?;
    released?;
    Ok(value)
}

/// fetch → f(&mut data) → mark_modified (только при успехе f) → release.
pub fn update_block<S, T, F>(store: &mut S, id: u32, f: F) -> Result<T>
where
    S: BlockStore + ?Sized,
    F: FnOnce(&mut [u8]) -> Result<T>,
{
    let block = store.fetch_block(id)?;
    let out = store.data_mut(&block).and_then(f);
    if out.is_ok() {
        store.mark_modified(&block);
    }
    let released = store.release_block(block);
    let value = out?;
    released?;
    Ok(value)
}

/// Как update_block, но блок помечается изменённым только если f вернула Ok(true).
pub fn try_update_block<S, F>(store: &mut S, id: u32, f: F) -> Result<bool>
where
    S: BlockStore + ?Sized,
    F: FnOnce(&mut [u8]) -> Result<bool>,
{
    let block = store.fetch_block(id)?;
    let out = store.data_mut(&block).and_then(f);
    if matches!(out, Ok(true)) {
        store.mark_modified(&block);
    }
    let released = store.release_block(block);
    let changed = out?;
    released?;
    Ok(changed)
}

/// allocate → f(new_id, &mut data) → mark_modified → release. Возвращает id нового блока.
pub fn init_block<S, T, F>(store: &mut S, f: F) -> Result<(u32, T)>
where
    S: BlockStore + ?Sized,
    F: FnOnce(u32, &mut [u8]) -> Result<T>,
{
    let block = store.allocate_block()?;
    let id = block.id();
    let out = store.data_mut(&block).and_then(|data| f(id, data));
    if out.is_ok() {
        store.mark_modified(&block);
    }
    let released = store.release_block(block);
    let value = out?;
    released?;
    Ok((id, value))
}
