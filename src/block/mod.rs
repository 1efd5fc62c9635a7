//! block. Раскладка data-блока: слоты элементов, затем trailer в хвосте блока.
//!
//! [slot 0][slot 1]...[slot capacity-1][padding][capacity u32][occupied u32][next u32]
//!
//! Позиция trailer'а вычисляется из block_size, а не хранится смещением.
//! Все доступы: явные чтения/записи LE по срезу блока.

pub mod slots;
pub mod trailer;

pub use slots::{append_item, for_each_item, init_data_block, item_at, set_next};
pub use trailer::BlockTrailer;

/// Элемент фиксированного размера, хранимый в слотах data-блока
/// (Record в heap/primary, IndexEntry во вторичном индексе).
pub trait SlotItem: Sized {
    const SIZE: usize;

    /// out.len() >= SIZE
    fn encode_into(&self, out: &mut [u8]);

    /// buf.len() >= SIZE
    fn decode_from(buf: &[u8]) -> Self;
}
