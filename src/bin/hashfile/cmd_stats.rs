use anyhow::Result;
use std::path::PathBuf;

use HashFileDB::{hash_statistics, StoreConfig};

pub fn exec(path: PathBuf, json: bool) -> Result<()> {
    let cfg = StoreConfig::from_env();
    let stats = hash_statistics(&path, &cfg)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", stats);
    }
    Ok(())
}
