use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;

use HashFileDB::metrics;

mod cli;
mod cmd_create;
mod cmd_find;
mod cmd_insert;
mod cmd_stats;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе только предупреждения.
    // Пример: RUST_LOG=debug hashfile insert ...
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    let res = run();
    let m = metrics::snapshot();
    info!(
        "blocks: fetched={} (hit ratio {:.2}), allocated={}, written={}, evicted={}",
        m.blocks_fetched,
        m.cache_hit_ratio(),
        m.blocks_allocated,
        m.blocks_written,
        m.evictions
    );
    if let Err(e) = res {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::HeapCreate { path, block_size } =>
            cmd_create::exec_heap(path, block_size),

        cli::Cmd::HashCreate { path, buckets, source, block_size } =>
            cmd_create::exec_primary(path, buckets, source, block_size),

        cli::Cmd::ShtCreate { path, buckets, source, attribute, block_size } =>
            cmd_create::exec_secondary(path, buckets, source, attribute, block_size),

        cli::Cmd::Insert { targets, id, name, surname, city } =>
            cmd_insert::exec_one(targets, id, name, surname, city),

        cli::Cmd::Load { targets, json } =>
            cmd_insert::exec_load(targets, json),

        cli::Cmd::Find { heap, primary, key, all } =>
            cmd_find::exec_key(heap, primary, key, all),

        cli::Cmd::FindName { secondary, primary, heap, value } =>
            cmd_find::exec_value(secondary, primary, heap, value),

        cli::Cmd::Stats { path, json } =>
            cmd_stats::exec(path, json),
    }
}
