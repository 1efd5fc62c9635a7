#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod error;
pub mod config;
pub mod metrics;

// Block store: контракт + Pager (диск) + MemStore (память)
pub mod pager;  // src/pager/{mod,core,io,cache,mem}.rs

// Форматы: записи, data-блоки, заголовок блока 0
pub mod record;
pub mod geometry;
pub mod block;  // src/block/{mod,trailer,slots}.rs
pub mod meta;
pub mod hash;

// Структуры
pub mod chain;
pub mod table;
pub mod heap;
pub mod primary;
pub mod secondary;
pub mod stats;

// Удобные реэкспорты
pub use chain::{Lookup, RecordBlocks};
pub use config::StoreConfig;
pub use error::{FileKind, HashFileError};
pub use heap::HeapFile;
pub use pager::{BlockStore, MemStore, Pager};
pub use primary::PrimaryIndex;
pub use record::{Attribute, FixedText, IndexEntry, Record};
pub use secondary::{InsertOutcome, SecondaryIndex};
pub use stats::{hash_statistics, BucketStats, HashStatistics};
