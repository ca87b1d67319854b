use {
    anyhow::{Context, Result, bail},
    clap::Subcommand,
    snare_cache::StreamId,
    snare_config::SnareConfig,
};

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show the stored record for an identifier, stale or not.
    Get { id: String },
    /// Delete the stored record for an identifier.
    Purge { id: String },
    /// Count stored records.
    Count,
}

pub async fn handle_cache(config: &SnareConfig, action: CacheAction) -> Result<()> {
    let cache = snare_cache::open_gateway(&config.cache)
        .await
        .context("failed to open stream cache")?;

    match action {
        CacheAction::Get { id } => {
            let id = parse_id(&id)?;
            match cache.get(&id).await? {
                Some(record) => {
                    let out = serde_json::json!({
                        "id": record.id.as_str(),
                        "recorded_at": record.recorded_at.to_rfc3339(),
                        "fresh": record.is_current(cache.epoch()),
                        "source": record.manifest_url,
                        "subtitle": record.subtitle_urls,
                    });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                },
                None => eprintln!("No record for '{id}'."),
            }
        },
        CacheAction::Purge { id } => {
            let id = parse_id(&id)?;
            if cache.purge(&id).await? {
                println!("Purged '{id}'.");
            } else {
                println!("Nothing stored for '{id}'.");
            }
        },
        CacheAction::Count => {
            println!("{} record(s) in {} cache", cache.count().await?, cache.backend());
        },
    }
    Ok(())
}

fn parse_id(raw: &str) -> Result<StreamId> {
    match StreamId::new(raw) {
        Some(id) => Ok(id),
        None => bail!("id must not be empty"),
    }
}
