//! Общие константы форматов (pager preamble, header block 0, data blocks, records).

// -------- Pager (файл блоков) --------
pub const PAGER_MAGIC: &[u8; 4] = b"HFPG";
pub const PAGER_VERSION: u16 = 1;
/// [magic4][ver u16][reserved u16][block_size u32][reserved u32]
pub const PAGER_PREAMBLE_SIZE: usize = 16;

/// Размер блока по умолчанию (байт).
pub const DEFAULT_BLOCK_SIZE: u32 = 512;
pub const MIN_BLOCK_SIZE: u32 = 64;
pub const MAX_BLOCK_SIZE: u32 = 1 << 20;

/// Кадров в buffer pool по умолчанию.
pub const DEFAULT_CACHE_BLOCKS: usize = 64;

// -------- Block ids --------
/// Терминатор цепочки (и "нет блока" в заголовках).
pub const NO_BLOCK: u32 = u32::MAX;
/// Заголовок файла всегда живёт в блоке 0.
pub const HEADER_BLOCK: u32 = 0;

// -------- Header block 0 --------
pub const FILE_MAGIC: &[u8; 4] = b"HFDB";
pub const FILE_VERSION: u16 = 1;
/// Фиксированная часть заголовка (до тела структуры).
pub const FILE_HDR_SIZE: usize = 32;
/// Максимальная длина имени исходного файла, хранимого в заголовке индекса.
pub const SOURCE_NAME_LEN: usize = 32;

// -------- Data blocks --------
/// [capacity u32][occupied u32][next_block u32] в хвосте каждого data-блока.
pub const BLOCK_TRAILER_LEN: usize = 12;

// -------- Records / index entries --------
/// Длина каждого текстового поля записи (NUL-padded).
pub const FIELD_LEN: usize = 20;
/// [id i32][name 20][surname 20][city 20]
pub const RECORD_SIZE: usize = 4 + 3 * FIELD_LEN;
/// [value 20][primary_block_id u32]
pub const INDEX_ENTRY_SIZE: usize = FIELD_LEN + 4;

// -------- Hashing --------
/// Seed и множитель строкового хеша вторичного индекса.
pub const STRING_HASH_SEED: u32 = 5381;
pub const STRING_HASH_MUL: u32 = 33;
