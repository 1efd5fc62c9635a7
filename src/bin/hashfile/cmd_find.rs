use anyhow::{anyhow, Result};
use std::path::PathBuf;

use HashFileDB::{HeapFile, Lookup, PrimaryIndex, SecondaryIndex, StoreConfig};

fn print_lookup(what: &str, found: &Lookup) {
    if !found.found() {
        println!("NOT FOUND {} (blocks read: {})", what, found.blocks_read);
        return;
    }
    for r in &found.records {
        println!("{}", r);
    }
    println!(
        "FOUND {}: {} record(s), blocks read: {}",
        what,
        found.records.len(),
        found.blocks_read
    );
}

pub fn exec_key(heap: Option<PathBuf>, primary: Option<PathBuf>, key: i32, all: bool) -> Result<()> {
    let cfg = StoreConfig::from_env();
    let what = format!("key {}", key);
    match (heap, primary) {
        (Some(path), None) => {
            let mut h = HeapFile::open(&path, &cfg)?;
            let res = h.scan_by_key(key);
            let closed = h.close();
            print_lookup(&what, &res?);
            closed
        }
        (None, Some(path)) => {
            let mut p = PrimaryIndex::open(&path, &cfg)?;
            let res = if all { p.get_all_entries(key) } else { p.lookup(key) };
            let closed = p.close();
            print_lookup(&what, &res?);
            closed
        }
        _ => Err(anyhow!("exactly one of --heap or --primary is required")),
    }
}

pub fn exec_value(
    secondary: PathBuf,
    primary: Option<PathBuf>,
    heap: Option<PathBuf>,
    value: String,
) -> Result<()> {
    let cfg = StoreConfig::from_env();
    let mut sht = SecondaryIndex::open(&secondary, &cfg)?;
    let what = format!("{} '{}'", sht.attribute(), value);
    let res = match (primary, heap) {
        (Some(path), None) => PrimaryIndex::open(&path, &cfg).and_then(|mut p| {
            let res = sht.get_all_entries(&mut p, &value);
            let closed = p.close();
            let found = res?;
            closed?;
            Ok(found)
        }),
        (None, Some(path)) => HeapFile::open(&path, &cfg).and_then(|mut h| {
            let res = sht.get_all_entries(&mut h, &value);
            let closed = h.close();
            let found = res?;
            closed?;
            Ok(found)
        }),
        _ => Err(anyhow!("exactly one of --primary or --heap is required")),
    };
    let closed = sht.close();
    print_lookup(&what, &res?);
    closed
}
