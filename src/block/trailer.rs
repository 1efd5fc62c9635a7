//! block/trailer: [capacity u32][occupied u32][next_block u32] в последних 12 байтах блока.

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{BLOCK_TRAILER_LEN, NO_BLOCK};
use crate::error::HashFileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTrailer {
    pub capacity: u32,
    pub occupied: u32,
    pub next_block: u32,
}

#[inline]
fn trailer_offset(block_len: usize) -> usize {
    block_len - BLOCK_TRAILER_LEN
}

impl BlockTrailer {
    /// Пустой блок в конце цепочки.
    pub fn empty(capacity: u32) -> Self {
        Self {
            capacity,
            occupied: 0,
            next_block: NO_BLOCK,
        }
    }

    /// Прочитать и проверить trailer блока `id`.
    pub fn read(block: &[u8], id: u32) -> Result<Self> {
        if block.len() < BLOCK_TRAILER_LEN {
            return Err(HashFileError::corrupt(id, "block shorter than trailer").into());
        }
        let off = trailer_offset(block.len());
        let t = Self {
            capacity: LittleEndian::read_u32(&block[off..off + 4]),
            occupied: LittleEndian::read_u32(&block[off + 4..off + 8]),
            next_block: LittleEndian::read_u32(&block[off + 8..off + 12]),
        };
        if t.capacity == 0 {
            return Err(HashFileError::corrupt(id, "trailer capacity is 0 (not a data block)").into());
        }
        if t.occupied > t.capacity {
            return Err(HashFileError::corrupt(
                id,
                format!("occupied {} > capacity {}", t.occupied, t.capacity),
            )
            .into());
        }
        if t.next_block == id {
            return Err(HashFileError::corrupt(id, "block links to itself").into());
        }
        Ok(t)
    }

    /// То же + capacity слотов размера item_size действительно помещается в блок.
    pub fn read_for(block: &[u8], id: u32, item_size: usize) -> Result<Self> {
        let t = Self::read(block, id)?;
        let need = t.capacity as usize * item_size + BLOCK_TRAILER_LEN;
        if need > block.len() {
            return Err(HashFileError::corrupt(
                id,
                format!(
                    "capacity {} x {} bytes does not fit block of {}",
                    t.capacity,
                    item_size,
                    block.len()
                ),
            )
            .into());
        }
        Ok(t)
    }

    pub fn write(&self, block: &mut [u8]) {
        let off = trailer_offset(block.len());
        LittleEndian::write_u32(&mut block[off..off + 4], self.capacity);
        LittleEndian::write_u32(&mut block[off + 4..off + 8], self.occupied);
        LittleEndian::write_u32(&mut block[off + 8..off + 12], self.next_block);
    }

    #[inline]
    pub fn has_room(&self) -> bool {
        self.occupied < self.capacity
    }

    #[inline]
    pub fn next(&self) -> Option<u32> {
        if self.next_block == NO_BLOCK {
            None
        } else {
            Some(self.next_block)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lives_at_block_tail() {
        let mut b = vec![0u8; 64];
        let t = BlockTrailer {
            capacity: 3,
            occupied: 2,
            next_block: 9,
        };
        t.write(&mut b);
        assert_eq!(&b[52..56], &3u32.to_le_bytes());
        assert_eq!(&b[60..64], &9u32.to_le_bytes());
        assert_eq!(BlockTrailer::read(&b, 1).unwrap(), t);
        assert_eq!(t.next(), Some(9));
        assert!(t.has_room());
    }

    #[test]
    fn rejects_malformed() {
        let mut b = vec![0u8; 64];
        // нулевой блок: не data-блок
        assert!(BlockTrailer::read(&b, 1).is_err());

        BlockTrailer { capacity: 2, occupied: 3, next_block: NO_BLOCK }.write(&mut b);
        assert!(BlockTrailer::read(&b, 1).is_err());

        BlockTrailer { capacity: 1, occupied: 0, next_block: 4 }.write(&mut b);
        assert!(BlockTrailer::read(&b, 4).is_err(), "self link");

        BlockTrailer { capacity: 2, occupied: 0, next_block: NO_BLOCK }.write(&mut b);
        assert!(BlockTrailer::read_for(&b, 1, 26).is_ok());
        assert!(BlockTrailer::read_for(&b, 1, 27).is_err());
    }
}
