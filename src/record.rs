//! record: фиксированная раскладка записи и элемента вторичного индекса.
//!
//! Record (RECORD_SIZE = 64, LE):
//!   [id i32][name 20][surname 20][city 20]
//! IndexEntry (INDEX_ENTRY_SIZE = 24, LE):
//!   [value 20][primary_block_id u32]
//!
//! Текстовые поля хранятся NUL-padded; всё после первого NUL при декодировании
//! обнуляется, поэтому сравнение сырых массивов совпадает со сравнением строк.

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};
use std::borrow::Cow;
use std::fmt;

use crate::block::SlotItem;
use crate::consts::{FIELD_LEN, INDEX_ENTRY_SIZE, RECORD_SIZE};
use crate::error::HashFileError;

/// Текст фиксированной длины FIELD_LEN, дополненный нулями.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedText([u8; FIELD_LEN]);

impl FixedText {
    pub fn new(field: &'static str, s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() > FIELD_LEN {
            return Err(HashFileError::FieldTooLong {
                field,
                len: bytes.len(),
                max: FIELD_LEN,
            }
            .into());
        }
        if bytes.contains(&0) {
            return Err(HashFileError::InvalidText { field }.into());
        }
        let mut raw = [0u8; FIELD_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(raw))
    }

    /// Из сырых байт блока: всё после первого NUL обнуляется.
    pub fn from_raw(buf: &[u8]) -> Self {
        let mut raw = [0u8; FIELD_LEN];
        raw.copy_from_slice(&buf[..FIELD_LEN]);
        if let Some(end) = raw.iter().position(|&b| b == 0) {
            raw[end..].fill(0);
        }
        Self(raw)
    }

    #[inline]
    pub fn raw(&self) -> &[u8; FIELD_LEN] {
        &self.0
    }

    /// Значащие байты (без хвостовых NUL).
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(FIELD_LEN);
        &self.0[..end]
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl fmt::Display for FixedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for FixedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Запись основного файла. Неизменяема после записи; id не обязан быть уникальным.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub id: i32,
    pub name: FixedText,
    pub surname: FixedText,
    pub city: FixedText,
}

impl Record {
    pub fn new(id: i32, name: &str, surname: &str, city: &str) -> Result<Self> {
        Ok(Self {
            id,
            name: FixedText::new("name", name)?,
            surname: FixedText::new("surname", surname)?,
            city: FixedText::new("city", city)?,
        })
    }

    /// Значение текстового атрибута (для вторичного индекса).
    #[inline]
    pub fn attribute(&self, attr: Attribute) -> &FixedText {
        match attr {
            Attribute::Name => &self.name,
            Attribute::Surname => &self.surname,
            Attribute::City => &self.city,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.id, self.name, self.surname, self.city)
    }
}

const OFF_ID: usize = 0;
const OFF_NAME: usize = 4;
const OFF_SURNAME: usize = OFF_NAME + FIELD_LEN;
const OFF_CITY: usize = OFF_SURNAME + FIELD_LEN;

impl SlotItem for Record {
    const SIZE: usize = RECORD_SIZE;

    fn encode_into(&self, out: &mut [u8]) {
        LittleEndian::write_i32(&mut out[OFF_ID..OFF_ID + 4], self.id);
        out[OFF_NAME..OFF_NAME + FIELD_LEN].copy_from_slice(self.name.raw());
        out[OFF_SURNAME..OFF_SURNAME + FIELD_LEN].copy_from_slice(self.surname.raw());
        out[OFF_CITY..OFF_CITY + FIELD_LEN].copy_from_slice(self.city.raw());
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self {
            id: LittleEndian::read_i32(&buf[OFF_ID..OFF_ID + 4]),
            name: FixedText::from_raw(&buf[OFF_NAME..]),
            surname: FixedText::from_raw(&buf[OFF_SURNAME..]),
            city: FixedText::from_raw(&buf[OFF_CITY..]),
        }
    }
}

/// Текстовое поле записи, по которому строится вторичный индекс.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Attribute {
    #[default]
    Name,
    Surname,
    City,
}

impl Attribute {
    pub fn to_u8(self) -> u8 {
        match self {
            Attribute::Name => 1,
            Attribute::Surname => 2,
            Attribute::City => 3,
        }
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Attribute::Name),
            2 => Some(Attribute::Surname),
            3 => Some(Attribute::City),
            _ => None,
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            Attribute::Name => "name",
            Attribute::Surname => "surname",
            Attribute::City => "city",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl std::str::FromStr for Attribute {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Attribute::Name),
            "surname" => Ok(Attribute::Surname),
            "city" => Ok(Attribute::City),
            other => Err(anyhow::anyhow!(
                "unknown attribute '{}' (expected name|surname|city)",
                other
            )),
        }
    }
}

/// Элемент вторичного индекса: значение атрибута + блок основного файла.
/// Блок не валидируется как внешняя ссылка, индекс не владеет основным файлом.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub value: FixedText,
    pub primary_block_id: u32,
}

impl SlotItem for IndexEntry {
    const SIZE: usize = INDEX_ENTRY_SIZE;

    fn encode_into(&self, out: &mut [u8]) {
        out[..FIELD_LEN].copy_from_slice(self.value.raw());
        LittleEndian::write_u32(&mut out[FIELD_LEN..FIELD_LEN + 4], self.primary_block_id);
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self {
            value: FixedText::from_raw(buf),
            primary_block_id: LittleEndian::read_u32(&buf[FIELD_LEN..FIELD_LEN + 4]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_is_fixed() {
        let r = Record::new(-42, "Yannis", "Ioannidis", "Athens").unwrap();
        let mut buf = [0xFFu8; RECORD_SIZE];
        r.encode_into(&mut buf);
        assert_eq!(&buf[0..4], &(-42i32).to_le_bytes());
        assert_eq!(&buf[4..10], b"Yannis");
        assert!(buf[10..24].iter().all(|&b| b == 0), "name is NUL padded");
        assert_eq!(&buf[24..33], b"Ioannidis");
        assert_eq!(&buf[44..50], b"Athens");
        assert_eq!(Record::decode_from(&buf), r);
    }

    #[test]
    fn text_limits() {
        assert!(FixedText::new("name", &"x".repeat(FIELD_LEN)).is_ok());
        let err = FixedText::new("name", &"x".repeat(FIELD_LEN + 1)).unwrap_err();
        assert!(matches!(
            HashFileError::of(&err),
            Some(HashFileError::FieldTooLong { field: "name", .. })
        ));
        let err = Record::new(1, "a", "b\0c", "d").unwrap_err();
        assert!(matches!(
            HashFileError::of(&err),
            Some(HashFileError::InvalidText { field: "surname" })
        ));
    }

    #[test]
    fn garbage_after_nul_is_ignored() {
        let mut raw = [0u8; FIELD_LEN];
        raw[..3].copy_from_slice(b"Ann");
        raw[5] = b'z';
        let t = FixedText::from_raw(&raw);
        assert_eq!(t, FixedText::new("name", "Ann").unwrap());
        assert_eq!(t.as_bytes(), b"Ann");
        assert_eq!(t.to_string(), "Ann");
    }

    #[test]
    fn index_entry_layout() {
        let e = IndexEntry {
            value: FixedText::new("name", "Maria").unwrap(),
            primary_block_id: 0x0102_0304,
        };
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        e.encode_into(&mut buf);
        assert_eq!(&buf[20..24], &[4, 3, 2, 1]);
        assert_eq!(IndexEntry::decode_from(&buf), e);
    }

    #[test]
    fn attribute_selection() {
        let r = Record::new(1, "n", "s", "c").unwrap();
        assert_eq!(r.attribute(Attribute::Surname).as_bytes(), b"s");
        assert_eq!("CITY".parse::<Attribute>().unwrap(), Attribute::City);
        assert!("zip".parse::<Attribute>().is_err());
        for a in [Attribute::Name, Attribute::Surname, Attribute::City] {
            assert_eq!(Attribute::from_u8(a.to_u8()), Some(a));
        }
    }
}
