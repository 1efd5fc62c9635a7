use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use HashFileDB::Attribute;

/// CLI для heap file + хеш-индексов
#[derive(Parser, Debug)]
#[command(name = "hashfile", version, about = "Heap file, primary and secondary hash index CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Куда вставлять: heap обязателен, индексы опциональны.
#[derive(Args, Debug)]
pub struct Targets {
    #[arg(long)]
    pub heap: PathBuf,
    /// Primary hash index (ключ = id)
    #[arg(long)]
    pub primary: Option<PathBuf>,
    /// Secondary index; ссылается на блоки primary, если он задан, иначе на блоки heap
    #[arg(long)]
    pub secondary: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Create an empty heap file
    HeapCreate {
        #[arg(long)]
        path: PathBuf,
        /// Block size (default: HF_BLOCK_SIZE or 512)
        #[arg(long)]
        block_size: Option<u32>,
    },
    /// Create a primary hash index over a heap file
    HashCreate {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = 10)]
        buckets: u32,
        /// Logical name of the indexed heap file
        #[arg(long, default_value = "")]
        source: String,
        #[arg(long)]
        block_size: Option<u32>,
    },
    /// Create a secondary hash index on a text attribute
    ShtCreate {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = 10)]
        buckets: u32,
        #[arg(long, default_value = "")]
        source: String,
        /// name | surname | city
        #[arg(long, default_value = "name")]
        attribute: Attribute,
        #[arg(long)]
        block_size: Option<u32>,
    },
    /// Insert one record
    Insert {
        #[command(flatten)]
        targets: Targets,
        #[arg(long)]
        id: i32,
        #[arg(long)]
        name: String,
        #[arg(long)]
        surname: String,
        #[arg(long)]
        city: String,
    },
    /// Load records from a JSON array: [{"id":1,"name":"..","surname":"..","city":".."}]
    Load {
        #[command(flatten)]
        targets: Targets,
        /// JSON file ("-" = stdin)
        #[arg(long)]
        json: PathBuf,
    },
    /// Find by key: linear scan of a heap file, or lookup in a primary index
    Find {
        #[arg(long, conflicts_with = "primary", required_unless_present = "primary")]
        heap: Option<PathBuf>,
        #[arg(long)]
        primary: Option<PathBuf>,
        #[arg(long)]
        key: i32,
        /// Primary only: walk the whole chain and report every record with the key
        #[arg(long)]
        all: bool,
    },
    /// Find by attribute value through a secondary index
    FindName {
        #[arg(long)]
        secondary: PathBuf,
        /// Primary index the entries point into
        #[arg(long, conflicts_with = "heap", required_unless_present = "heap")]
        primary: Option<PathBuf>,
        /// Heap file the entries point into
        #[arg(long)]
        heap: Option<PathBuf>,
        #[arg(long)]
        value: String,
    },
    /// Bucket chain statistics of a primary or secondary index
    Stats {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
}
