use anyhow::Result;
use std::path::PathBuf;

use HashFileDB::{Attribute, HeapFile, PrimaryIndex, SecondaryIndex, StoreConfig};

fn config(block_size: Option<u32>) -> StoreConfig {
    let cfg = StoreConfig::from_env();
    match block_size {
        Some(bs) => cfg.with_block_size(bs),
        None => cfg,
    }
}

pub fn exec_heap(path: PathBuf, block_size: Option<u32>) -> Result<()> {
    let cfg = config(block_size);
    HeapFile::create(&path, &cfg)?;
    println!("Created heap file {} (block_size={})", path.display(), cfg.block_size);
    Ok(())
}

pub fn exec_primary(path: PathBuf, buckets: u32, source: String, block_size: Option<u32>) -> Result<()> {
    let cfg = config(block_size);
    PrimaryIndex::create(&path, buckets, &source, &cfg)?;
    println!(
        "Created primary hash index {} ({} buckets, block_size={})",
        path.display(),
        buckets,
        cfg.block_size
    );
    Ok(())
}

pub fn exec_secondary(
    path: PathBuf,
    buckets: u32,
    source: String,
    attribute: Attribute,
    block_size: Option<u32>,
) -> Result<()> {
    let cfg = config(block_size);
    SecondaryIndex::create(&path, buckets, &source, attribute, &cfg)?;
    println!(
        "Created secondary hash index {} on '{}' ({} buckets, block_size={})",
        path.display(),
        attribute,
        buckets,
        cfg.block_size
    );
    Ok(())
}
