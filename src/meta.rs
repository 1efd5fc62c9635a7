// src/meta.rs: заголовок файла в блоке 0 (heap / primary hash / secondary hash)
//
// Формат (LE), общая часть FILE_HDR_SIZE = 32:
//   0  MAGIC4 = "HFDB"
//   4  u16 version            = 1
//   6  u16 kind               (1=heap, 2=primary hash, 3=secondary hash)
//   8  u8  is_heap
//   9  u8  is_hash
//  10  u16 hash_kind          (0 для heap, 1 = djb2)
//  12  u32 block_size
//  16  u32 trailer_len        (= BLOCK_TRAILER_LEN этой сборки)
//  20  u32 item_size          (RECORD_SIZE или INDEX_ENTRY_SIZE)
//  24  u32 records_per_block  (ёмкость data-блока, считается один раз при create)
//  28  u32 crc32              (crc32fast по всему заголовку с обнулённым этим полем)
//
// Тело heap (32..48):
//  [header_block u32][first_block u32][last_block u32][record_count u32]
// Тело hash (32..70 + 4B):
//  [bucket_count u32][attribute u8][source_len u8][source 32][bucket_head u32 x B]
//
// Политика:
// - геометрия сохраняется явно; при open сверяется с раскладкой сборки (IncompatibleLayout);
// - flush всегда пишет заголовок целиком, весь блок 0 перезаписывается.

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    BLOCK_TRAILER_LEN, FILE_HDR_SIZE, FILE_MAGIC, FILE_VERSION, HEADER_BLOCK, NO_BLOCK,
    SOURCE_NAME_LEN,
};
use crate::error::{FileKind, HashFileError};
use crate::geometry::{hash_body_fixed_len, hash_header_len, require_capacity};
use crate::hash::HashKind;
use crate::record::Attribute;

const OFF_VERSION: usize = 4;
const OFF_KIND: usize = 6;
const OFF_IS_HEAP: usize = 8;
const OFF_IS_HASH: usize = 9;
const OFF_HASH_KIND: usize = 10;
const OFF_BLOCK_SIZE: usize = 12;
const OFF_TRAILER_LEN: usize = 16;
const OFF_ITEM_SIZE: usize = 20;
const OFF_RPB: usize = 24;
const OFF_CRC: usize = 28;

const HEAP_BODY_LEN: usize = 16;
const OFF_BUCKETS: usize = FILE_HDR_SIZE;
const OFF_ATTR: usize = FILE_HDR_SIZE + 4;
const OFF_SOURCE_LEN: usize = FILE_HDR_SIZE + 5;
const OFF_SOURCE: usize = FILE_HDR_SIZE + 6;
const OFF_HEADS: usize = FILE_HDR_SIZE + hash_body_fixed_len();

// ---- Геометрия, общая для всех файлов ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub block_size: u32,
    pub trailer_len: u32,
    pub item_size: u32,
    pub records_per_block: u32,
}

impl Layout {
    /// Раскладка новой структуры; ёмкость 0: CapacityConfig.
    pub fn for_item(block_size: usize, item_size: usize) -> Result<Self> {
        let cap = require_capacity(block_size, BLOCK_TRAILER_LEN, item_size)?;
        Ok(Self {
            block_size: block_size as u32,
            trailer_len: BLOCK_TRAILER_LEN as u32,
            item_size: item_size as u32,
            records_per_block: cap,
        })
    }

    /// Сверить сохранённую раскладку с тем, что ожидает эта сборка и этот store.
    fn check(&self, store_block_size: usize, item_size: usize) -> Result<()> {
        let mismatch = |what, stored, expected| -> Result<()> {
            Err(HashFileError::IncompatibleLayout {
                what,
                stored,
                expected,
            }
            .into())
        };
        if self.block_size as usize != store_block_size {
            return mismatch("block_size", self.block_size, store_block_size as u32);
        }
        if self.trailer_len as usize != BLOCK_TRAILER_LEN {
            return mismatch("trailer_len", self.trailer_len, BLOCK_TRAILER_LEN as u32);
        }
        if self.item_size as usize != item_size {
            return mismatch("item_size", self.item_size, item_size as u32);
        }
        let fits = self.records_per_block as usize * item_size + BLOCK_TRAILER_LEN;
        if self.records_per_block == 0 || fits > store_block_size {
            return Err(HashFileError::corrupt(
                HEADER_BLOCK,
                format!("records_per_block {} does not fit the block", self.records_per_block),
            )
            .into());
        }
        Ok(())
    }
}

// ---- Heap ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapHeader {
    pub layout: Layout,
    pub header_block: u32,
    pub first_block: u32,
    pub last_block: u32,
    pub record_count: u32,
}

impl HeapHeader {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            header_block: HEADER_BLOCK,
            first_block: NO_BLOCK,
            last_block: NO_BLOCK,
            record_count: 0,
        }
    }

    pub fn encode(&self, block: &mut [u8]) {
        block.fill(0);
        write_common(block, FileKind::Heap, 0, &self.layout);
        let b = &mut block[FILE_HDR_SIZE..];
        LittleEndian::write_u32(&mut b[0..4], self.header_block);
        LittleEndian::write_u32(&mut b[4..8], self.first_block);
        LittleEndian::write_u32(&mut b[8..12], self.last_block);
        LittleEndian::write_u32(&mut b[12..16], self.record_count);
        seal(block, FILE_HDR_SIZE + HEAP_BODY_LEN);
    }

    pub fn decode(block: &[u8], item_size: usize) -> Result<Self> {
        let (kind, layout) = read_common(block, FileKind::Heap)?;
        debug_assert!(kind.is_heap());
        verify_crc(block, FILE_HDR_SIZE + HEAP_BODY_LEN)?;
        layout.check(block.len(), item_size)?;

        let b = &block[FILE_HDR_SIZE..];
        let h = Self {
            layout,
            header_block: LittleEndian::read_u32(&b[0..4]),
            first_block: LittleEndian::read_u32(&b[4..8]),
            last_block: LittleEndian::read_u32(&b[8..12]),
            record_count: LittleEndian::read_u32(&b[12..16]),
        };
        if h.header_block != HEADER_BLOCK {
            return Err(HashFileError::corrupt(
                HEADER_BLOCK,
                format!("header_block = {}", h.header_block),
            )
            .into());
        }
        if (h.first_block == NO_BLOCK) != (h.last_block == NO_BLOCK) {
            return Err(HashFileError::corrupt(
                HEADER_BLOCK,
                "first/last block must be both set or both absent",
            )
            .into());
        }
        Ok(h)
    }
}

// ---- Hash (primary и secondary) ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashHeader {
    pub kind: FileKind,
    pub layout: Layout,
    pub hash_kind: HashKind,
    /// Some только у вторичного индекса.
    pub attribute: Option<Attribute>,
    /// Логическое имя исходного файла (не физическая ссылка).
    pub source: String,
    heads: Box<[u32]>,
}

impl HashHeader {
    pub fn new(
        kind: FileKind,
        layout: Layout,
        attribute: Option<Attribute>,
        source: &str,
        heads: Vec<u32>,
    ) -> Result<Self> {
        debug_assert!(kind.is_hash());
        debug_assert_eq!(kind == FileKind::SecondaryHash, attribute.is_some());
        if source.len() > SOURCE_NAME_LEN {
            return Err(HashFileError::FieldTooLong {
                field: "source",
                len: source.len(),
                max: SOURCE_NAME_LEN,
            }
            .into());
        }
        Ok(Self {
            kind,
            layout,
            hash_kind: crate::hash::HASH_KIND_DEFAULT,
            attribute,
            source: source.to_string(),
            heads: heads.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn bucket_count(&self) -> u32 {
        self.heads.len() as u32
    }

    /// Голова бакета; номер вне [0, bucket_count) - ошибка, а не паника.
    pub fn head(&self, bucket: u32) -> Result<u32> {
        self.heads.get(bucket as usize).copied().ok_or_else(|| {
            HashFileError::CapacityConfig(format!(
                "bucket {} out of range (bucket_count {})",
                bucket,
                self.bucket_count()
            ))
            .into()
        })
    }

    pub fn heads(&self) -> &[u32] {
        &self.heads
    }

    /// Перенаправить голову бакета (только через BucketTable).
    pub(crate) fn set_head(&mut self, bucket: u32, block: u32) {
        self.heads[bucket as usize] = block;
    }

    pub fn encode(&self, block: &mut [u8]) {
        block.fill(0);
        write_common(block, self.kind, self.hash_kind.to_u16(), &self.layout);
        LittleEndian::write_u32(&mut block[OFF_BUCKETS..OFF_BUCKETS + 4], self.bucket_count());
        block[OFF_ATTR] = self.attribute.map(Attribute::to_u8).unwrap_or(0);
        block[OFF_SOURCE_LEN] = self.source.len() as u8;
        block[OFF_SOURCE..OFF_SOURCE + self.source.len()].copy_from_slice(self.source.as_bytes());
        for (i, &h) in self.heads.iter().enumerate() {
            let off = OFF_HEADS + 4 * i;
            LittleEndian::write_u32(&mut block[off..off + 4], h);
        }
        seal(block, hash_header_len(self.bucket_count()));
    }

    pub fn decode(block: &[u8], expected: FileKind, item_size: usize) -> Result<Self> {
        let (kind, layout) = read_common(block, expected)?;
        if block.len() < OFF_HEADS {
            return Err(HashFileError::corrupt(HEADER_BLOCK, "block too small for hash header").into());
        }
        let buckets = LittleEndian::read_u32(&block[OFF_BUCKETS..OFF_BUCKETS + 4]);
        let len = hash_header_len(buckets);
        if buckets == 0 || len > block.len() {
            return Err(HashFileError::corrupt(
                HEADER_BLOCK,
                format!("bucket_count {} does not fit header block", buckets),
            )
            .into());
        }
        verify_crc(block, len)?;
        layout.check(block.len(), item_size)?;

        let hk_code = LittleEndian::read_u16(&block[OFF_HASH_KIND..OFF_HASH_KIND + 2]);
        let hash_kind = HashKind::from_u16(hk_code).ok_or(HashFileError::IncompatibleLayout {
            what: "hash_kind",
            stored: hk_code as u32,
            expected: crate::hash::HASH_KIND_DEFAULT.to_u16() as u32,
        })?;

        let attr_code = block[OFF_ATTR];
        let attribute = match (kind, attr_code) {
            (FileKind::PrimaryHash, 0) => None,
            (FileKind::SecondaryHash, c) => Some(Attribute::from_u8(c).ok_or_else(|| {
                HashFileError::corrupt(HEADER_BLOCK, format!("unknown attribute code {}", c))
            })?),
            (_, c) => {
                return Err(HashFileError::corrupt(
                    HEADER_BLOCK,
                    format!("attribute code {} on {}", c, kind),
                )
                .into())
            }
        };

        let src_len = block[OFF_SOURCE_LEN] as usize;
        if src_len > SOURCE_NAME_LEN {
            return Err(HashFileError::corrupt(HEADER_BLOCK, "source name length out of range").into());
        }
        let source = String::from_utf8_lossy(&block[OFF_SOURCE..OFF_SOURCE + src_len]).into_owned();

        let mut heads = Vec::with_capacity(buckets as usize);
        for i in 0..buckets as usize {
            let off = OFF_HEADS + 4 * i;
            let h = LittleEndian::read_u32(&block[off..off + 4]);
            if h == NO_BLOCK || h == HEADER_BLOCK {
                return Err(HashFileError::corrupt(
                    HEADER_BLOCK,
                    format!("bucket {} has no head block", i),
                )
                .into());
            }
            heads.push(h);
        }

        Ok(Self {
            kind,
            layout,
            hash_kind,
            attribute,
            source,
            heads: heads.into_boxed_slice(),
        })
    }
}

/// Тип файла по блоку 0 без проверки ожиданий (для отчётов по любому хеш-файлу).
pub fn peek_kind(block: &[u8]) -> Result<FileKind> {
    check_magic(block)?;
    let code = LittleEndian::read_u16(&block[OFF_KIND..OFF_KIND + 2]);
    FileKind::from_u16(code)
        .ok_or_else(|| HashFileError::corrupt(HEADER_BLOCK, format!("unknown file kind {}", code)).into())
}

// ---- Внутренние утилиты ----

fn write_common(block: &mut [u8], kind: FileKind, hash_kind: u16, layout: &Layout) {
    block[0..4].copy_from_slice(FILE_MAGIC);
    LittleEndian::write_u16(&mut block[OFF_VERSION..OFF_VERSION + 2], FILE_VERSION);
    LittleEndian::write_u16(&mut block[OFF_KIND..OFF_KIND + 2], kind.to_u16());
    block[OFF_IS_HEAP] = kind.is_heap() as u8;
    block[OFF_IS_HASH] = kind.is_hash() as u8;
    LittleEndian::write_u16(&mut block[OFF_HASH_KIND..OFF_HASH_KIND + 2], hash_kind);
    LittleEndian::write_u32(&mut block[OFF_BLOCK_SIZE..OFF_BLOCK_SIZE + 4], layout.block_size);
    LittleEndian::write_u32(&mut block[OFF_TRAILER_LEN..OFF_TRAILER_LEN + 4], layout.trailer_len);
    LittleEndian::write_u32(&mut block[OFF_ITEM_SIZE..OFF_ITEM_SIZE + 4], layout.item_size);
    LittleEndian::write_u32(&mut block[OFF_RPB..OFF_RPB + 4], layout.records_per_block);
}

fn check_magic(block: &[u8]) -> Result<()> {
    if block.len() < FILE_HDR_SIZE || &block[0..4] != FILE_MAGIC {
        return Err(HashFileError::corrupt(HEADER_BLOCK, "bad header magic").into());
    }
    let ver = LittleEndian::read_u16(&block[OFF_VERSION..OFF_VERSION + 2]);
    if ver != FILE_VERSION {
        return Err(HashFileError::IncompatibleLayout {
            what: "format version",
            stored: ver as u32,
            expected: FILE_VERSION as u32,
        }
        .into());
    }
    Ok(())
}

/// magic/version, флаги is_heap/is_hash против kind, затем ожидаемый тип файла.
fn read_common(block: &[u8], expected: FileKind) -> Result<(FileKind, Layout)> {
    let kind = peek_kind(block)?;
    let is_heap = block[OFF_IS_HEAP] != 0;
    let is_hash = block[OFF_IS_HASH] != 0;
    if is_heap != kind.is_heap() || is_hash != kind.is_hash() {
        return Err(HashFileError::corrupt(
            HEADER_BLOCK,
            format!("flags is_heap={} is_hash={} contradict kind {}", is_heap, is_hash, kind),
        )
        .into());
    }
    if kind != expected {
        return Err(HashFileError::WrongFileKind {
            expected,
            found: kind.to_string(),
        }
        .into());
    }
    let layout = Layout {
        block_size: LittleEndian::read_u32(&block[OFF_BLOCK_SIZE..OFF_BLOCK_SIZE + 4]),
        trailer_len: LittleEndian::read_u32(&block[OFF_TRAILER_LEN..OFF_TRAILER_LEN + 4]),
        item_size: LittleEndian::read_u32(&block[OFF_ITEM_SIZE..OFF_ITEM_SIZE + 4]),
        records_per_block: LittleEndian::read_u32(&block[OFF_RPB..OFF_RPB + 4]),
    };
    Ok((kind, layout))
}

fn header_crc(block: &[u8], len: usize) -> u32 {
    let mut h = crc32fast::Hasher::new();
    h.update(&block[..OFF_CRC]);
    h.update(&[0u8; 4]);
    h.update(&block[OFF_CRC + 4..len]);
    h.finalize()
}

fn seal(block: &mut [u8], len: usize) {
    let crc = header_crc(block, len);
    LittleEndian::write_u32(&mut block[OFF_CRC..OFF_CRC + 4], crc);
}

fn verify_crc(block: &[u8], len: usize) -> Result<()> {
    let stored = LittleEndian::read_u32(&block[OFF_CRC..OFF_CRC + 4]);
    let actual = header_crc(block, len);
    if stored != actual {
        return Err(HashFileError::corrupt(
            HEADER_BLOCK,
            format!("header checksum mismatch (stored {:08x}, actual {:08x})", stored, actual),
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{INDEX_ENTRY_SIZE, RECORD_SIZE};

    #[test]
    fn heap_header_roundtrip_and_crc() {
        let mut h = HeapHeader::new(Layout::for_item(256, RECORD_SIZE).unwrap());
        assert_eq!(h.layout.records_per_block, 3);
        h.first_block = 1;
        h.last_block = 3;
        h.record_count = 7;
        let mut b = vec![0xEEu8; 256];
        h.encode(&mut b);
        assert_eq!(&b[0..4], b"HFDB");
        assert_eq!((b[OFF_IS_HEAP], b[OFF_IS_HASH]), (1, 0));
        assert_eq!(HeapHeader::decode(&b, RECORD_SIZE).unwrap(), h);

        b[44] ^= 1; // record_count
        let err = HeapHeader::decode(&b, RECORD_SIZE).unwrap_err();
        assert!(matches!(HashFileError::of(&err), Some(HashFileError::Corrupt { .. })));
    }

    #[test]
    fn wrong_kind_and_layout() {
        let layout = Layout::for_item(512, INDEX_ENTRY_SIZE).unwrap();
        let h = HashHeader::new(
            FileKind::SecondaryHash,
            layout,
            Some(Attribute::City),
            "people.heap",
            vec![1, 2, 3, 4],
        )
        .unwrap();
        let mut b = vec![0u8; 512];
        h.encode(&mut b);

        let back = HashHeader::decode(&b, FileKind::SecondaryHash, INDEX_ENTRY_SIZE).unwrap();
        assert_eq!(back, h);
        assert_eq!(back.attribute, Some(Attribute::City));
        assert_eq!(peek_kind(&b).unwrap(), FileKind::SecondaryHash);

        let err = HeapHeader::decode(&b, RECORD_SIZE).unwrap_err();
        assert!(matches!(
            HashFileError::of(&err),
            Some(HashFileError::WrongFileKind { expected: FileKind::Heap, .. })
        ));
        let err = HashHeader::decode(&b, FileKind::PrimaryHash, RECORD_SIZE).unwrap_err();
        assert!(matches!(
            HashFileError::of(&err),
            Some(HashFileError::WrongFileKind { .. })
        ));
        let err = HashHeader::decode(&b, FileKind::SecondaryHash, RECORD_SIZE).unwrap_err();
        assert!(matches!(
            HashFileError::of(&err),
            Some(HashFileError::IncompatibleLayout { what: "item_size", .. })
        ));
    }

    #[test]
    fn source_name_is_bounded() {
        let layout = Layout::for_item(512, RECORD_SIZE).unwrap();
        let long = "x".repeat(SOURCE_NAME_LEN + 1);
        assert!(HashHeader::new(FileKind::PrimaryHash, layout, None, &long, vec![1]).is_err());
    }

    #[test]
    fn not_a_header() {
        let b = vec![0u8; 128];
        let err = HeapHeader::decode(&b, RECORD_SIZE).unwrap_err();
        assert!(matches!(HashFileError::of(&err), Some(HashFileError::Corrupt { block: 0, .. })));
    }
}
