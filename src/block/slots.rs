//! block/slots: слоты элементов в начале data-блока (slot i по смещению i * T::SIZE).

use anyhow::Result;

use super::{BlockTrailer, SlotItem};
use crate::error::HashFileError;

/// Разметить свежий блок: пустая область слотов + trailer {capacity, 0, next}.
pub fn init_data_block<T: SlotItem>(block: &mut [u8], capacity: u32, next_block: u32) {
    let slots_end = capacity as usize * T::SIZE;
    block[..slots_end].fill(0);
    BlockTrailer {
        capacity,
        occupied: 0,
        next_block,
    }
    .write(block);
}

/// Записать элемент в слот `occupied` и увеличить occupied. Возвращает номер слота.
/// Вызывающий проверяет has_room() заранее; полный блок здесь означает порчу.
pub fn append_item<T: SlotItem>(block: &mut [u8], id: u32, item: &T) -> Result<u32> {
    let mut t = BlockTrailer::read_for(block, id, T::SIZE)?;
    if !t.has_room() {
        return Err(HashFileError::corrupt(
            id,
            format!("append into full block ({}/{})", t.occupied, t.capacity),
        )
        .into());
    }
    let slot = t.occupied;
    let off = slot as usize * T::SIZE;
    item.encode_into(&mut block[off..off + T::SIZE]);
    t.occupied += 1;
    t.write(block);
    Ok(slot)
}

#[inline]
pub fn item_at<T: SlotItem>(block: &[u8], slot: u32) -> T {
    let off = slot as usize * T::SIZE;
    T::decode_from(&block[off..off + T::SIZE])
}

/// Прочитать trailer и отдать занятые слоты по порядку вставки.
pub fn for_each_item<T, F>(block: &[u8], id: u32, mut f: F) -> Result<BlockTrailer>
where
    T: SlotItem,
    F: FnMut(T),
{
    let t = BlockTrailer::read_for(block, id, T::SIZE)?;
    for slot in 0..t.occupied {
        f(item_at::<T>(block, slot));
    }
    Ok(t)
}

/// Перепривязать next_block существующего data-блока.
pub fn set_next(block: &mut [u8], id: u32, next_block: u32) -> Result<()> {
    let mut t = BlockTrailer::read(block, id)?;
    if next_block == id {
        return Err(HashFileError::corrupt(id, "refusing to link block to itself").into());
    }
    t.next_block = next_block;
    t.write(block);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{BLOCK_TRAILER_LEN, NO_BLOCK, RECORD_SIZE};
    use crate::geometry::capacity;
    use crate::record::Record;

    #[test]
    fn append_until_full() {
        let mut b = vec![0u8; 256];
        let cap = capacity(256, BLOCK_TRAILER_LEN, RECORD_SIZE).unwrap();
        init_data_block::<Record>(&mut b, cap, NO_BLOCK);

        for i in 0..cap {
            let r = Record::new(i as i32, "n", "s", "c").unwrap();
            assert_eq!(append_item(&mut b, 1, &r).unwrap(), i);
        }
        let extra = Record::new(99, "n", "s", "c").unwrap();
        assert!(append_item(&mut b, 1, &extra).is_err());

        let mut ids = Vec::new();
        let t = for_each_item::<Record, _>(&b, 1, |r| ids.push(r.id)).unwrap();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(t.occupied, cap);
        assert!(!t.has_room());
        assert_eq!(item_at::<Record>(&b, 2).id, 2);
    }

    #[test]
    fn relink() {
        let mut b = vec![0u8; 128];
        init_data_block::<Record>(&mut b, 1, NO_BLOCK);
        set_next(&mut b, 3, 7).unwrap();
        assert_eq!(BlockTrailer::read(&b, 3).unwrap().next(), Some(7));
        assert!(set_next(&mut b, 3, 3).is_err());
    }
}
