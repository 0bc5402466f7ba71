//! `versions`: list published versions of a game.

use hoyofiles::game::GameId;
use hoyofiles::Engine;

use crate::error::CliError;

pub async fn run(engine: &Engine, game: GameId, refresh: bool) -> Result<(), CliError> {
    let catalog = if refresh {
        engine.refresh_catalog(game).await?
    } else {
        engine.catalog(game).await?
    };

    println!("{} ({})", game.display_name(), game.code());
    if catalog.is_empty() {
        println!("  (no published versions)");
        return Ok(());
    }
    for (i, version) in catalog.versions().enumerate() {
        let updates = catalog
            .entry(version.as_str())
            .map(|e| e.update.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        let marker = if i == 0 { " (latest)" } else { "" };
        if updates.is_empty() {
            println!("  {}{}", version, marker);
        } else {
            println!("  {}{}  updates from: {}", version, marker, updates.join(", "));
        }
    }
    Ok(())
}
