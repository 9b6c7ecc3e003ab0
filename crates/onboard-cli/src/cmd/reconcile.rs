use crate::cmd::open_platform;
use crate::output::print_json;
use std::path::Path;

pub fn run(root: &Path, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let platform = open_platform(root)?;
    let report = platform.reconcile(dry_run)?;

    if json {
        return print_json(&report);
    }

    let verb = if dry_run { "would" } else { "did" };
    println!("Scanned {} records.", report.records_scanned);
    if report.is_clean() {
        println!("Registry and domain cache are consistent.");
        return Ok(());
    }

    for id in &report.registered {
        println!("  {verb} register   {id}");
    }
    for id in &report.updated {
        println!("  {verb} update     {id}");
    }
    for id in &report.orphans_removed {
        println!("  {verb} remove     {id}");
    }
    for id in &report.skipped {
        println!("  skipped      {id} (changed concurrently; run again)");
    }
    for domain in &report.stale_cache_domains {
        println!("  stale cache  {domain} (no created application; evict manually)");
    }
    for domain in &report.uncached_domains {
        println!("  uncached     {domain}");
    }
    Ok(())
}
