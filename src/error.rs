//! error: типизированные ошибки ядра.
//!
//! Публичный API возвращает `anyhow::Result`; всё, что поднимает само ядро,
//! кладётся внутрь как `HashFileError`, поэтому вызывающий код может различать
//! виды ошибок через `err.downcast_ref::<HashFileError>()`.

use std::fmt;
use thiserror::Error;

/// Какой структурой является файл (по флагам заголовка в блоке 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Heap,
    PrimaryHash,
    SecondaryHash,
}

impl FileKind {
    pub fn to_u16(self) -> u16 {
        match self {
            FileKind::Heap => 1,
            FileKind::PrimaryHash => 2,
            FileKind::SecondaryHash => 3,
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1 => Some(FileKind::Heap),
            2 => Some(FileKind::PrimaryHash),
            3 => Some(FileKind::SecondaryHash),
            _ => None,
        }
    }

    #[inline]
    pub fn is_heap(self) -> bool {
        matches!(self, FileKind::Heap)
    }

    #[inline]
    pub fn is_hash(self) -> bool {
        !self.is_heap()
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Heap => write!(f, "heap file"),
            FileKind::PrimaryHash => write!(f, "primary hash index"),
            FileKind::SecondaryHash => write!(f, "secondary hash index"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HashFileError {
    /// Любой отказ block store. Операция прерывается, частичные изменения не откатываются.
    #[error("storage fault: {detail}")]
    StorageFault {
        detail: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// open() на файле, чьи флаги заголовка не совпадают с ожидаемой структурой.
    #[error("wrong file kind: expected {expected}, found {found}")]
    WrongFileKind { expected: FileKind, found: String },

    /// Ошибка геометрии на этапе создания (ёмкость 0, массив бакетов не влезает в блок).
    #[error("capacity configuration error: {0}")]
    CapacityConfig(String),

    /// Раскладка, сохранённая в заголовке, не совпадает с раскладкой этой сборки.
    #[error("incompatible layout: {what} stored={stored}, expected={expected}")]
    IncompatibleLayout {
        what: &'static str,
        stored: u32,
        expected: u32,
    },

    /// Блок или заголовок нарушает инварианты формата.
    #[error("corrupt block {block}: {detail}")]
    Corrupt { block: u32, detail: String },

    #[error("field {field} is {len} bytes, max {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("field {field} contains a NUL byte")]
    InvalidText { field: &'static str },
}

impl HashFileError {
    pub fn storage(detail: impl Into<String>) -> Self {
        HashFileError::StorageFault {
            detail: detail.into(),
            source: None,
        }
    }

    pub fn io(detail: impl Into<String>, source: std::io::Error) -> Self {
        HashFileError::StorageFault {
            detail: detail.into(),
            source: Some(source),
        }
    }

    pub fn corrupt(block: u32, detail: impl Into<String>) -> Self {
        HashFileError::Corrupt {
            block,
            detail: detail.into(),
        }
    }

    /// Удобный разбор anyhow-ошибки обратно в типизированную.
    pub fn of(err: &anyhow::Error) -> Option<&HashFileError> {
        err.downcast_ref::<HashFileError>()
    }

    pub fn is_storage_fault(&self) -> bool {
        matches!(self, HashFileError::StorageFault { .. })
    }
}
