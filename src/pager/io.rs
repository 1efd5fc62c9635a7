//! pager/io: низкоуровневые операции ввода/вывода:
//! - preamble файла: [magic4="HFPG"][ver u16][reserved u16][block_size u32][reserved u32]
//! - read_block_at / write_block_at: блок id живёт по смещению PREAMBLE + id * block_size
//!
//! Все ошибки ввода-вывода оборачиваются в HashFileError::StorageFault.

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::consts::{PAGER_MAGIC, PAGER_PREAMBLE_SIZE, PAGER_VERSION};
use crate::error::HashFileError;

#[inline]
pub(crate) fn block_offset(block_size: usize, id: u32) -> u64 {
    PAGER_PREAMBLE_SIZE as u64 + (id as u64) * (block_size as u64)
}

pub(crate) fn write_preamble(f: &mut File, path: &Path, block_size: u32) -> Result<()> {
    let mut buf = [0u8; PAGER_PREAMBLE_SIZE];
    buf[0..4].copy_from_slice(PAGER_MAGIC);
    LittleEndian::write_u16(&mut buf[4..6], PAGER_VERSION);
    LittleEndian::write_u32(&mut buf[8..12], block_size);
    f.seek(SeekFrom::Start(0))
        .and_then(|_| f.write_all(&buf))
        .map_err(|e| HashFileError::io(format!("write preamble {}", path.display()), e))?;
    Ok(())
}

/// Прочитать preamble и вернуть block_size.
pub(crate) fn read_preamble(f: &mut File, path: &Path) -> Result<u32> {
    let mut buf = [0u8; PAGER_PREAMBLE_SIZE];
    f.seek(SeekFrom::Start(0))
        .and_then(|_| f.read_exact(&mut buf))
        .map_err(|e| HashFileError::io(format!("read preamble {}", path.display()), e))?;
    if &buf[0..4] != PAGER_MAGIC {
        return Err(HashFileError::storage(format!(
            "bad pager magic in {} (not a block file)",
            path.display()
        ))
        .into());
    }
    let ver = LittleEndian::read_u16(&buf[4..6]);
    if ver != PAGER_VERSION {
        return Err(HashFileError::storage(format!(
            "unsupported pager version {} in {}",
            ver,
            path.display()
        ))
        .into());
    }
    Ok(LittleEndian::read_u32(&buf[8..12]))
}

pub(crate) fn read_block_at(f: &mut File, block_size: usize, id: u32, buf: &mut [u8]) -> Result<()> {
    debug_assert_eq!(buf.len(), block_size);
    let off = block_offset(block_size, id);
    f.seek(SeekFrom::Start(off))
        .and_then(|_| f.read_exact(buf))
        .map_err(|e| HashFileError::io(format!("read block {}", id), e))?;
    Ok(())
}

pub(crate) fn write_block_at(f: &mut File, block_size: usize, id: u32, buf: &[u8]) -> Result<()> {
    debug_assert_eq!(buf.len(), block_size);
    let off = block_offset(block_size, id);
    f.seek(SeekFrom::Start(off))
        .and_then(|_| f.write_all(buf))
        .map_err(|e| HashFileError::io(format!("write block {}", id), e))?;
    crate::metrics::record_write_back();
    Ok(())
}
