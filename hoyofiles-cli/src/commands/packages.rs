//! `packages`: list the archives published for a version.

use hoyofiles::catalog::CatalogArchive;
use hoyofiles::Engine;

use super::common::{format_size, TargetArgs};
use crate::error::CliError;

pub async fn run(
    engine: &Engine,
    target_args: &TargetArgs,
    update_from: Option<&str>,
) -> Result<(), CliError> {
    let target = target_args.resolve(engine).await?;
    let archives = engine.archives(&target, update_from).await?;

    match update_from {
        Some(from) => println!("Update archives for {} from {}", target, from),
        None => println!("Archives for {}", target),
    }
    if archives.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    print_archives(&archives);
    Ok(())
}

fn print_archives(archives: &[CatalogArchive]) {
    let total: u64 = archives.iter().map(|a| a.package.size).sum();
    for archive in archives {
        println!(
            "  {:<13} {:>12}  {}",
            archive.kind.label(),
            format_size(archive.package.size),
            archive.package.display_name()
        );
        if !archive.package.checksum.is_empty() {
            println!("  {:<13} {:>12}  md5 {}", "", "", archive.package.checksum);
        }
    }
    println!();
    println!("  {} archives, {}", archives.len(), format_size(total));
}
