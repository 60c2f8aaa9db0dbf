use std::time::Duration;

use anyhow::bail;
use tracing::info;

use super::Target;

pub async fn ping(target: &Target) -> anyhow::Result<()> {
    let client = target.client()?;
    if !client.ping().await {
        bail!("BBS at {} is not available", client.base_url());
    }
    println!("✓ {} is available", client.base_url());
    Ok(())
}

pub async fn list(target: &Target) -> anyhow::Result<()> {
    for domain in target.client()?.domains().await? {
        println!("{domain}");
    }
    Ok(())
}

pub async fn upsert(target: &Target, domain: &str, ttl: u64) -> anyhow::Result<()> {
    target
        .client()?
        .upsert_domain(domain, Duration::from_secs(ttl))
        .await?;
    info!(domain, ttl, "domain upserted");
    Ok(())
}
