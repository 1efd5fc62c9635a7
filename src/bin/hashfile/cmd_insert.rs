use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;

use HashFileDB::{HeapFile, InsertOutcome, PrimaryIndex, Record, SecondaryIndex, StoreConfig};

use crate::cli::Targets;

#[derive(Debug, Deserialize)]
struct RecordJson {
    id: i32,
    name: String,
    surname: String,
    city: String,
}

/// Открытые файлы одной загрузки. Закрываются все, даже если вставка упала.
struct Session {
    heap: HeapFile,
    primary: Option<PrimaryIndex>,
    secondary: Option<SecondaryIndex>,
}

impl Session {
    fn open(t: &Targets, cfg: &StoreConfig) -> Result<Self> {
        let heap = HeapFile::open(&t.heap, cfg).with_context(|| format!("open heap {}", t.heap.display()))?;
        let primary = match &t.primary {
            Some(p) => Some(PrimaryIndex::open(p, cfg).with_context(|| format!("open primary {}", p.display()))?),
            None => None,
        };
        let secondary = match &t.secondary {
            Some(p) => Some(SecondaryIndex::open(p, cfg).with_context(|| format!("open secondary {}", p.display()))?),
            None => None,
        };
        Ok(Self { heap, primary, secondary })
    }

    fn insert(&mut self, rec: &Record) -> Result<()> {
        let heap_block = self.heap.insert(rec)?;
        let mut target_block = heap_block;
        let mut line = format!("{} -> heap block {}", rec.id, heap_block);
        if let Some(p) = self.primary.as_mut() {
            target_block = p.insert(rec)?;
            line.push_str(&format!(", primary block {}", target_block));
        }
        if let Some(s) = self.secondary.as_mut() {
            match s.insert(rec, target_block)? {
                InsertOutcome::Inserted { block_id } => {
                    line.push_str(&format!(", secondary block {}", block_id))
                }
                InsertOutcome::Duplicate => line.push_str(", secondary entry already present"),
            }
        }
        println!("{}", line);
        Ok(())
    }

    fn close(self) -> Result<()> {
        let heap = self.heap.close();
        let primary = self.primary.map(|p| p.close()).unwrap_or(Ok(()));
        let secondary = self.secondary.map(|s| s.close()).unwrap_or(Ok(()));
        heap?;
        primary?;
        secondary
    }
}

fn run(targets: Targets, records: Vec<Record>) -> Result<()> {
    let cfg = StoreConfig::from_env();
    let mut session = Session::open(&targets, &cfg)?;
    let mut inserted = 0usize;
    let res = records.iter().try_for_each(|r| {
        session.insert(r)?;
        inserted += 1;
        Ok::<(), anyhow::Error>(())
    });
    let closed = session.close();
    res?;
    closed?;
    println!("OK: {} record(s)", inserted);
    Ok(())
}

pub fn exec_one(targets: Targets, id: i32, name: String, surname: String, city: String) -> Result<()> {
    let rec = Record::new(id, &name, &surname, &city)?;
    run(targets, vec![rec])
}

pub fn exec_load(targets: Targets, json: PathBuf) -> Result<()> {
    let text = if json.as_os_str() == "-" {
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s)?;
        s
    } else {
        std::fs::read_to_string(&json).with_context(|| format!("read {}", json.display()))?
    };
    let rows: Vec<RecordJson> = serde_json::from_str(&text).context("parse records JSON")?;
    let records = rows
        .iter()
        .enumerate()
        .map(|(i, r)| Record::new(r.id, &r.name, &r.surname, &r.city).with_context(|| format!("record #{}", i)))
        .collect::<Result<Vec<_>>>()?;
    run(targets, records)
}
