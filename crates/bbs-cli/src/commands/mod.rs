pub mod domains;
pub mod events;
pub mod lrps;
pub mod migrate;

use std::path::Path;

use anyhow::{Context, bail};
use bbs_client::BbsClient;
use bbs_models::BbsConfig;
use bbs_models::config::SqlConfig;

/// Where commands send their requests: `--url`, or the config file.
pub struct Target {
    url: Option<String>,
    config: BbsConfig,
}

impl Target {
    pub fn load(url: Option<String>, config: Option<&Path>) -> anyhow::Result<Self> {
        let config = match config {
            Some(path) => BbsConfig::from_file(path)?,
            None => BbsConfig::default(),
        };
        Ok(Self { url, config })
    }

    pub fn url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.config.client.as_ref().map(|client| client.url.as_str()))
    }

    pub fn client(&self) -> anyhow::Result<BbsClient> {
        let retry = self.config.retry.policy();
        let client = match (&self.url, &self.config.client) {
            (Some(url), Some(client)) => BbsClient::new(url)?
                .with_retry(retry)
                .with_timeout(client.request_timeout()),
            (Some(url), None) => BbsClient::new(url)?.with_retry(retry),
            (None, Some(client)) => BbsClient::from_config(client, retry)?,
            (None, None) => bail!("no BBS url: pass --url or set [client].url in --config"),
        };
        Ok(client)
    }

    pub fn sql(&self) -> anyhow::Result<&SqlConfig> {
        self.config
            .sql
            .as_ref()
            .context("no [sql] section in the config file")
    }

    pub fn config(&self) -> &BbsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_url_flag_overrides_config() {
        let file = config_file("[client]\nurl = \"http://from-config:8889\"\n");
        let target = Target::load(Some("http://from-flag:8889".into()), Some(file.path())).unwrap();
        assert_eq!(target.url(), Some("http://from-flag:8889"));
        assert_eq!(target.client().unwrap().base_url(), "http://from-flag:8889");
    }

    #[test]
    fn test_url_from_config() {
        let file = config_file("[client]\nurl = \"http://from-config:8889\"\n");
        let target = Target::load(None, Some(file.path())).unwrap();
        assert_eq!(target.client().unwrap().base_url(), "http://from-config:8889");
    }

    #[test]
    fn test_missing_url_is_an_error() {
        let target = Target::load(None, None).unwrap();
        assert!(target.url().is_none());
        assert!(target.client().is_err());
        assert!(target.sql().is_err());
    }

    #[test]
    fn test_unsupported_driver_rejected_at_load() {
        let file = config_file("[sql]\ndriver = \"sqlite\"\ndata_source = \"x\"\n");
        assert!(Target::load(None, Some(file.path())).is_err());
    }
}
