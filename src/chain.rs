//! chain: обход цепочек data-блоков (heap: first → last, hash: голова бакета → терминатор).
//!
//! Каждый шаг: fetch → callback → release, так что в любой момент закреплён не больше
//! одного блока цепочки. Длина обхода ограничена числом блоков файла: цепочка длиннее
//! файла означает цикл и сообщается как Corrupt.

use anyhow::Result;
use std::ops::ControlFlow;

use crate::block::BlockTrailer;
use crate::consts::HEADER_BLOCK;
use crate::error::HashFileError;
use crate::pager::{read_block, BlockStore};
use crate::record::Record;

/// Результат поиска: найденные записи и число прочитанных блоков.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    pub records: Vec<Record>,
    pub blocks_read: u32,
}

impl Lookup {
    #[inline]
    pub fn found(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }
}

/// Пройти цепочку от `start`. f получает id блока, его trailer и байты блока.
/// Возвращает число посещённых блоков (включая тот, на котором f вернула Break).
pub fn walk_chain<S, F>(store: &mut S, start: u32, mut f: F) -> Result<u32>
where
    S: BlockStore + ?Sized,
    F: FnMut(u32, &BlockTrailer, &[u8]) -> Result<ControlFlow<()>>,
{
    let limit = store.block_count()?;
    let mut cur = start;
    let mut visited = 0u32;
    loop {
        check_data_block(cur, limit)?;
        visited += 1;
        if visited > limit {
            return Err(HashFileError::corrupt(
                cur,
                format!("chain from block {} is longer than the file ({} blocks): cycle", start, limit),
            )
            .into());
        }
        let (next, flow) = read_block(store, cur, |b| {
            let t = BlockTrailer::read(b, cur)?;
            let flow = f(cur, &t, b)?;
            Ok((t.next(), flow))
        })?;
        if flow.is_break() {
            return Ok(visited);
        }
        match next {
            Some(n) => cur = n,
            None => return Ok(visited),
        }
    }
}

/// Ссылка на data-блок должна быть внутри файла и не указывать на заголовок.
pub fn check_data_block(id: u32, block_count: u32) -> Result<()> {
    if id == HEADER_BLOCK || id >= block_count {
        return Err(HashFileError::corrupt(
            id,
            format!("not a data block (file has {} blocks)", block_count),
        )
        .into());
    }
    Ok(())
}

/// Структура, чьи data-блоки хранят полные записи (heap file, primary hash index).
/// Через неё вторичный индекс разрешает ссылку (значение, блок) в записи.
pub trait RecordBlocks {
    /// Отдать все занятые слоты блока `block_id` в порядке вставки.
    fn records_in_block(&mut self, block_id: u32, f: &mut dyn FnMut(&Record)) -> Result<()>;
}
