use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use HashFileDB::{
    Attribute, BlockStore, HeapFile, InsertOutcome, PrimaryIndex, Record, SecondaryIndex,
    StoreConfig,
};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("hfdb-{}-{}-{}", prefix, pid, t))
}

const NAMES: [&str; 7] = ["Nikos", "Maria", "Eleni", "Kostas", "Maria", "Sofia", "Petros"];

fn people() -> Vec<Record> {
    (1..=7)
        .map(|k| Record::new(k, NAMES[(k - 1) as usize], "Dimitriou", "Thessaloniki").unwrap())
        .collect()
}

#[test]
fn heap_primary_secondary_scenario() -> Result<()> {
    let root = unique_root("scenario");
    fs::create_dir_all(&root)?;
    // 256 байт → 3 записи в блоке
    let cfg = StoreConfig::default().with_block_size(256).with_cache_blocks(4);

    let heap_path = root.join("people.heap");
    let ht_path = root.join("people.ht");
    let sht_path = root.join("people.sht");

    // 1) heap: 7 записей → блоки 3,3,1
    HeapFile::create(&heap_path, &cfg)?;
    let mut heap_blocks = Vec::new();
    {
        let mut heap = HeapFile::open(&heap_path, &cfg)?;
        assert_eq!(heap.records_per_block(), 3);
        for r in people() {
            heap_blocks.push(heap.insert(&r)?);
        }
        assert_eq!(heap.data_blocks()?, 3);
        assert_eq!(heap.last_block(), Some(3));

        let mut occupancy = [0u32; 4];
        heap.for_each_record(|b, _| occupancy[b as usize] += 1)?;
        assert_eq!(&occupancy[1..], &[3, 3, 1]);
        heap.close()?;
    }

    // 2) primary: 4 бакета, lookup(5) проходит цепочку бакета 1
    PrimaryIndex::create(&ht_path, 4, "people.heap", &cfg)?;
    let mut primary_blocks = Vec::new();
    {
        let mut ht = PrimaryIndex::open(&ht_path, &cfg)?;
        for r in people() {
            primary_blocks.push(ht.insert(&r)?);
        }
        assert_eq!(ht.bucket_of(5), 1);
        let depth = ht.chain_blocks(1)?.len() as u32;
        let found = ht.lookup(5)?;
        assert!(found.found());
        assert_eq!(found.first().map(|r| r.id), Some(5));
        assert_eq!(found.blocks_read, depth);
        ht.close()?;
    }

    // 3) secondary по имени: две "Maria" в разных блоках
    SecondaryIndex::create(&sht_path, 4, "people.ht", Attribute::Name, &cfg)?;
    {
        let mut sht = SecondaryIndex::open(&sht_path, &cfg)?;
        let mut heap = HeapFile::open(&heap_path, &cfg)?;
        for (r, &b) in people().iter().zip(&heap_blocks) {
            assert!(matches!(sht.insert(r, b)?, InsertOutcome::Inserted { .. }));
        }
        assert_ne!(heap_blocks[1], heap_blocks[4], "records 2 and 5 live in different blocks");

        let found = sht.get_all_entries(&mut heap, "Maria")?;
        let mut ids: Vec<i32> = found.records.iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec![2, 5]);
        assert_eq!(found.blocks_read, 2);
        assert_eq!(heap.store().pinned_blocks(), 0);
        heap.close()?;
        sht.close()?;
    }

    // 4) тот же запрос через primary: ключи 2 и 5: бакеты 2 и 1
    let sht2_path = root.join("people-by-ht.sht");
    SecondaryIndex::create(&sht2_path, 4, "people.ht", Attribute::Name, &cfg)?;
    {
        let mut sht = SecondaryIndex::open(&sht2_path, &cfg)?;
        let mut ht = PrimaryIndex::open(&ht_path, &cfg)?;
        for (r, &b) in people().iter().zip(&primary_blocks) {
            sht.insert(r, b)?;
        }
        let found = sht.get_all_entries(&mut ht, "Maria")?;
        assert_eq!(found.records.len(), 2);
        assert_eq!(found.blocks_read, 2);
        let none = sht.get_all_entries(&mut ht, "Zoe")?;
        assert!(!none.found());
        ht.close()?;
        sht.close()?;
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
