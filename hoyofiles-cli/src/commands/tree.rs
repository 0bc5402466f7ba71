//! `tree`: browse or search the file tree of a version.

use hoyofiles::tree::{FileNode, FileTree};
use hoyofiles::Engine;

use super::common::{format_size, TargetArgs};
use crate::error::CliError;

pub async fn run(
    engine: &Engine,
    target_args: &TargetArgs,
    path: Option<&str>,
    search: Option<&str>,
    diff_from: Option<&str>,
) -> Result<(), CliError> {
    let target = target_args.resolve(engine).await?;
    let tree = engine
        .load_tree(&target, &target_args.locale_selection(), diff_from)
        .await?;

    println!(
        "{}: {} files, {}",
        target,
        tree.file_count(),
        format_size(tree.total_size())
    );
    if let Some(diff) = tree.diff() {
        println!(
            "diff from {}: {} added, {} deleted",
            diff.base_version,
            diff.added.len(),
            diff.deleted.len()
        );
    }
    println!();

    if let Some(keyword) = search {
        let hits = tree.search(keyword);
        for node in &hits {
            print_file(node);
        }
        println!();
        println!("{} matches for \"{}\"", hits.len(), keyword);
        return Ok(());
    }

    let node = match path {
        Some(p) => tree
            .get(p)
            .ok_or_else(|| CliError::Usage(format!("No file or directory named {}", p)))?,
        None => tree.root(),
    };
    print_listing(&tree, node);
    Ok(())
}

fn print_listing(tree: &FileTree, node: &FileNode) {
    if node.is_file() {
        print_file(node);
        return;
    }
    for child in tree.listing(node) {
        if child.is_dir() {
            println!("  {:>12}  {}/", format_size(child.size()), child.name());
        } else {
            println!("  {:>12}  {}", format_size(child.size()), child.name());
        }
    }
}

fn print_file(node: &FileNode) {
    let locale = node
        .locale()
        .map(|l| format!(" [{}]", l.code()))
        .unwrap_or_default();
    let patch = if node.patch().is_some() { " (patched)" } else { "" };
    println!(
        "  {:>12}  {}{}{}",
        format_size(node.size()),
        node.path(),
        locale,
        patch
    );
}
