//! `links`: print download URLs for an external download manager.

use std::path::Path;

use hoyofiles::links::to_clipboard_text;
use hoyofiles::Engine;

use super::common::{FilterArgs, TargetArgs};
use crate::error::CliError;

pub async fn run(
    engine: &Engine,
    target_args: &TargetArgs,
    filter: &FilterArgs,
    archives: bool,
    update_from: Option<&str>,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let target = target_args.resolve(engine).await?;

    let links = if archives || update_from.is_some() {
        let archives = engine.archives(&target, update_from).await?;
        engine.links(archives.as_slice())
    } else {
        let tree = engine
            .load_tree(
                &target,
                &target_args.locale_selection(),
                filter.diff_from.as_deref(),
            )
            .await?;
        let set = engine.plan(&tree, &filter.request())?;
        engine.links(&set)
    };

    let text = to_clipboard_text(&links);
    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", text))?;
            eprintln!("Wrote {} links to {}", links.len(), path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
