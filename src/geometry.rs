//! geometry: сколько записей/элементов индекса помещается в блок.
//!
//! Ёмкость считается один раз при создании файла и сохраняется в заголовке;
//! при открытии её не пересчитывают, а сверяют сохранённые размеры с раскладкой сборки.

use anyhow::Result;

use crate::consts::{FILE_HDR_SIZE, SOURCE_NAME_LEN};
use crate::error::HashFileError;

/// floor((block_size - trailer_size) / item_size); None при trailer + item > block.
#[inline]
pub fn capacity(block_size: usize, trailer_size: usize, item_size: usize) -> Option<u32> {
    if item_size == 0 || trailer_size + item_size > block_size {
        return None;
    }
    Some(((block_size - trailer_size) / item_size) as u32)
}

/// То же, но ёмкость 0: ошибка конфигурации на этапе создания.
pub fn require_capacity(block_size: usize, trailer_size: usize, item_size: usize) -> Result<u32> {
    capacity(block_size, trailer_size, item_size).ok_or_else(|| {
        HashFileError::CapacityConfig(format!(
            "block_size {} cannot hold trailer {} + one item of {} bytes",
            block_size, trailer_size, item_size
        ))
        .into()
    })
}

/// Байт заголовка хеш-файла: фиксированная часть + тело + массив голов бакетов.
#[inline]
pub fn hash_header_len(bucket_count: u32) -> usize {
    FILE_HDR_SIZE + hash_body_fixed_len() + 4 * bucket_count as usize
}

/// [bucket_count u32][attribute u8][source_len u8][source; SOURCE_NAME_LEN]
#[inline]
pub(crate) const fn hash_body_fixed_len() -> usize {
    4 + 1 + 1 + SOURCE_NAME_LEN
}

/// Максимум бакетов, чей массив голов помещается в блок 0.
pub fn max_buckets(block_size: usize) -> u32 {
    let fixed = FILE_HDR_SIZE + hash_body_fixed_len();
    if block_size <= fixed {
        return 0;
    }
    ((block_size - fixed) / 4) as u32
}

pub fn check_bucket_count(block_size: usize, bucket_count: u32) -> Result<()> {
    if bucket_count == 0 {
        return Err(HashFileError::CapacityConfig("bucket_count must be > 0".into()).into());
    }
    let max = max_buckets(block_size);
    if bucket_count > max {
        return Err(HashFileError::CapacityConfig(format!(
            "{} buckets need {} header bytes, block_size {} allows at most {} buckets",
            bucket_count,
            hash_header_len(bucket_count),
            block_size,
            max
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{BLOCK_TRAILER_LEN, INDEX_ENTRY_SIZE, RECORD_SIZE};

    #[test]
    fn capacity_formula() {
        assert_eq!(capacity(512, BLOCK_TRAILER_LEN, RECORD_SIZE), Some(7));
        assert_eq!(capacity(256, BLOCK_TRAILER_LEN, RECORD_SIZE), Some(3));
        assert_eq!(capacity(512, BLOCK_TRAILER_LEN, INDEX_ENTRY_SIZE), Some(20));
        // ровно одна запись
        assert_eq!(capacity(76, 12, 64), Some(1));
        assert_eq!(capacity(75, 12, 64), None);
        assert_eq!(capacity(64, 12, 0), None);
    }

    #[test]
    fn zero_capacity_is_config_error() {
        let err = require_capacity(64, BLOCK_TRAILER_LEN, RECORD_SIZE).unwrap_err();
        assert!(matches!(
            HashFileError::of(&err),
            Some(HashFileError::CapacityConfig(_))
        ));
    }

    #[test]
    fn bucket_array_must_fit_header_block() {
        let max = max_buckets(256);
        assert_eq!(max, ((256 - 32 - 38) / 4) as u32);
        assert!(check_bucket_count(256, max).is_ok());
        assert!(check_bucket_count(256, max + 1).is_err());
        assert!(check_bucket_count(256, 0).is_err());
        assert!(hash_header_len(max) <= 256);
    }
}
