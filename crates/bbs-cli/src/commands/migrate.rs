use tracing::info;

use super::Target;

pub async fn run(target: &Target) -> anyhow::Result<()> {
    let sql = target.sql()?;
    let db = bbs_sql::open(sql, target.config().retry.policy()).await?;
    db.create_tables().await?;
    info!(driver = %sql.driver, "tables ready");
    Ok(())
}
