//! Domain freshness records.

use async_trait::async_trait;
use bbs_models::{ErrorKind, ModelResult};
use tracing::{debug, info};

use crate::db::DomainDb;
use crate::error::SqlResult;
use crate::helpers::RowLock;
use crate::sql_db::SqlDb;
use crate::tables::{DOMAIN_COLUMNS, DOMAINS};
use crate::{sql_args, sql_attributes};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Expiry for a domain refreshed at `now`; zero TTL never expires.
fn expire_time(now: i64, ttl_secs: u32) -> i64 {
    if ttl_secs == 0 {
        i64::MAX
    } else {
        now.saturating_add(i64::from(ttl_secs) * NANOS_PER_SEC)
    }
}

impl SqlDb {
    async fn unexpired_domains(&self, now: i64) -> SqlResult<Vec<String>> {
        let mut conn = self.db.acquire().await?;
        let rows = self
            .helper
            .query(
                conn.as_mut(),
                DOMAINS,
                &DOMAIN_COLUMNS,
                RowLock::NoLock,
                "expire_time > ?",
                &sql_args![now],
            )
            .await?;
        rows.iter().map(|row| row.string("domain")).collect()
    }
}

#[async_trait]
impl DomainDb for SqlDb {
    async fn domains(&self) -> ModelResult<Vec<String>> {
        let domains = self.classify(self.unexpired_domains(self.now()).await)?;
        debug!(count = domains.len(), "listed domains");
        Ok(domains)
    }

    async fn upsert_domain(&self, domain: &str, ttl_secs: u32) -> ModelResult<()> {
        info!(domain, ttl_secs, "upserting domain");
        let expires = expire_time(self.now(), ttl_secs);
        let upserted = self
            .transact(|tx| {
                let this = self.clone();
                let domain = domain.to_string();
                Box::pin(async move {
                    this.helper
                        .upsert(
                            tx,
                            DOMAINS,
                            &sql_attributes! { "domain" => domain.as_str(), "expire_time" => expires },
                            "domain = ?",
                            &sql_args![domain.as_str()],
                        )
                        .await?;
                    Ok(())
                })
            })
            .await;

        match upserted {
            Err(err) if err.is(ErrorKind::ResourceExists) => {
                debug!(domain, "domain inserted concurrently, refreshing expiry");
                self.transact(|tx| {
                    let this = self.clone();
                    let domain = domain.to_string();
                    Box::pin(async move {
                        this.helper
                            .update(
                                tx,
                                DOMAINS,
                                &sql_attributes! { "expire_time" => expires },
                                "domain = ?",
                                &sql_args![domain.as_str()],
                            )
                            .await?;
                        Ok(())
                    })
                })
                .await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bbs_models::RetryPolicy;

    use super::*;
    use crate::error::DriverError;
    use crate::flavor::Flavor;
    use crate::helpers::SqlHelper;
    use crate::queryable::{SqlRow, SqlValue};
    use crate::testing::{FakeClock, FakeDb, Reply};

    fn test_db(fake: &FakeDb) -> SqlDb {
        SqlDb::new(
            Arc::new(fake.clone()),
            SqlHelper::new(Flavor::Postgres, RetryPolicy::immediate(3)),
        )
        .with_clock(Arc::new(FakeClock(1_000)))
    }

    #[tokio::test]
    async fn test_domains_filters_expired() {
        let fake = FakeDb::new();
        fake.push(Reply::Rows(vec![
            SqlRow::from_pairs([("domain", SqlValue::from("jims-domain"))]),
            SqlRow::from_pairs([("domain", SqlValue::from("amelias-domain"))]),
        ]));
        let db = test_db(&fake);

        let domains = db.domains().await.unwrap();

        assert_eq!(domains, vec!["jims-domain", "amelias-domain"]);
        let log = fake.log();
        assert_eq!(log[0].0, "SELECT domains.domain FROM domains WHERE expire_time > $1");
        assert_eq!(log[0].1, sql_args![1_000i64]);
    }

    #[tokio::test]
    async fn test_upsert_inserts_new_domain() {
        let fake = FakeDb::new();
        fake.push(Reply::Affected(0));
        fake.push(Reply::Affected(1));
        let db = test_db(&fake);

        db.upsert_domain("my-domain", 5).await.unwrap();

        let log = fake.log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].0, "INSERT INTO domains (domain, expire_time) VALUES ($1, $2)");
        assert_eq!(log[1].1, sql_args!["my-domain", 1_000 + 5 * NANOS_PER_SEC]);
        assert_eq!(fake.commits(), 1);
    }

    #[tokio::test]
    async fn test_upsert_concurrent_insert_refreshes_expiry() {
        let fake = FakeDb::new();
        fake.push(Reply::Affected(0));
        fake.push(Reply::Fail(DriverError::database("23505", "duplicate key value")));
        fake.push(Reply::Affected(1));
        let db = test_db(&fake);

        db.upsert_domain("my-domain", 5).await.unwrap();

        let log = fake.log();
        assert_eq!(log.len(), 3);
        assert!(log[1].0.starts_with("INSERT INTO domains"));
        assert_eq!(log[2].0, "UPDATE domains SET expire_time = $1 WHERE domain = $2");
        assert_eq!(log[2].1, sql_args![1_000 + 5 * NANOS_PER_SEC, "my-domain"]);
        assert_eq!(fake.rollbacks(), 1);
        assert_eq!(fake.commits(), 1);
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        assert_eq!(expire_time(42, 0), i64::MAX);
        assert_eq!(expire_time(i64::MAX - 1, 10), i64::MAX);
    }
}
