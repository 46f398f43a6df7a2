//! Identity of the job a volume is cached for
//!
//! Gathered once by the CLI (flags, environment, runner config file and
//! instance metadata) and passed to the cache as a plain value.

use crate::cloud::Tag;
use crate::config::imds;
use crate::error::{WarmvolError, WarmvolResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Repository, branch and instance a job runs for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobContext {
    /// `owner/name`
    pub repository: String,

    /// Full git ref, e.g. `refs/heads/feature/x`
    pub branch_ref: String,

    /// Branch whose cache is reused when the job's own branch has none
    pub default_branch: Option<String>,

    /// Extra tags that partition the cache
    pub custom_tags: Vec<Tag>,

    pub instance_id: String,

    pub availability_zone: String,
}

impl JobContext {
    /// Check that everything a cloud call needs is present
    pub fn validate(&self) -> WarmvolResult<()> {
        self.validate_lineage()?;
        require(&self.instance_id, "instance id (WARMVOL_INSTANCE_ID)")?;
        require(
            &self.availability_zone,
            "availability zone (WARMVOL_AVAILABILITY_ZONE)",
        )
    }

    /// Check the fields that make up the cache key
    pub fn validate_lineage(&self) -> WarmvolResult<()> {
        require(&self.repository, "repository (GITHUB_REPOSITORY)")?;
        require(&self.branch_ref, "branch ref (GITHUB_REF)")
    }

    /// Region of the job's availability zone (`us-east-1a` -> `us-east-1`)
    pub fn region(&self) -> Option<&str> {
        let zone = self.availability_zone.as_str();
        let region = zone.strip_suffix(|c: char| c.is_ascii_lowercase())?;
        region
            .ends_with(|c: char| c.is_ascii_digit())
            .then_some(region)
    }

    /// Add or replace a custom tag
    pub fn set_tag(&mut self, tag: Tag) {
        self.custom_tags.retain(|t| t.key != tag.key);
        self.custom_tags.push(tag);
    }

    /// Take the default branch and custom tags from a runner config.
    ///
    /// Values already set on the job win; custom tags from the file come
    /// first so explicit tags with the same key replace them.
    pub fn merge_runner_config(&mut self, runner: RunnerConfig) {
        if self.default_branch.is_none() {
            self.default_branch = runner.default_branch.filter(|b| !b.is_empty());
        }

        let explicit = std::mem::replace(&mut self.custom_tags, runner.custom_tags);
        for tag in explicit {
            self.set_tag(tag);
        }
    }

    /// Fill a missing instance id or availability zone from instance metadata
    pub async fn fill_instance_identity(&mut self, endpoint: &str) -> WarmvolResult<()> {
        if !self.instance_id.is_empty() && !self.availability_zone.is_empty() {
            return Ok(());
        }

        debug!("Looking up instance identity from {}", endpoint);
        let identity = imds::instance_identity(endpoint).await?;
        if self.instance_id.is_empty() {
            self.instance_id = identity.instance_id;
        }
        if self.availability_zone.is_empty() {
            self.availability_zone = identity.availability_zone;
        }
        Ok(())
    }
}

fn require(value: &str, name: &'static str) -> WarmvolResult<()> {
    if value.trim().is_empty() {
        return Err(WarmvolError::ConfigMissing(name));
    }
    Ok(())
}

/// Runner-provided job settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    pub default_branch: Option<String>,
    pub custom_tags: Vec<Tag>,
}

impl RunnerConfig {
    /// Read a runner config JSON file
    pub async fn load(path: &Path) -> WarmvolResult<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            WarmvolError::io(format!("reading runner config {}", path.display()), e)
        })?;

        serde_json::from_str(&content).map_err(|e| WarmvolError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job() -> JobContext {
        JobContext {
            repository: "acme/api".to_string(),
            branch_ref: "refs/heads/main".to_string(),
            default_branch: None,
            custom_tags: vec![],
            instance_id: "i-0123".to_string(),
            availability_zone: "us-east-1a".to_string(),
        }
    }

    #[test]
    fn validate_reports_first_missing_field() {
        assert!(job().validate().is_ok());

        let mut missing_repo = job();
        missing_repo.repository.clear();
        let err = missing_repo.validate().unwrap_err();
        assert!(err.to_string().contains("GITHUB_REPOSITORY"));

        let mut missing_zone = job();
        missing_zone.availability_zone = "  ".to_string();
        assert!(matches!(
            missing_zone.validate(),
            Err(WarmvolError::ConfigMissing(_))
        ));
    }

    #[test]
    fn explicit_values_win_over_runner_config() {
        let mut ctx = job();
        ctx.default_branch = Some("develop".to_string());
        ctx.custom_tags = vec![Tag::new("arch", "arm64")];

        ctx.merge_runner_config(RunnerConfig {
            default_branch: Some("main".to_string()),
            custom_tags: vec![Tag::new("arch", "x64"), Tag::new("team", "infra")],
        });

        assert_eq!(ctx.default_branch.as_deref(), Some("develop"));
        assert_eq!(
            ctx.custom_tags,
            vec![Tag::new("team", "infra"), Tag::new("arch", "arm64")]
        );
    }

    #[test]
    fn region_derived_from_zone() {
        assert_eq!(job().region(), Some("us-east-1"));

        let mut ctx = job();
        ctx.availability_zone = "eu-central-1".to_string();
        assert_eq!(ctx.region(), None);
        ctx.availability_zone.clear();
        assert_eq!(ctx.region(), None);
    }

    #[test]
    fn lineage_check_ignores_instance_identity() {
        let mut ctx = job();
        ctx.instance_id.clear();
        ctx.availability_zone.clear();
        assert!(ctx.validate_lineage().is_ok());

        ctx.branch_ref.clear();
        assert!(ctx.validate_lineage().unwrap_err().to_string().contains("GITHUB_REF"));
    }

    #[tokio::test]
    async fn runner_config_file_loads() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"defaultBranch": "main", "customTags": [{"key": "team", "value": "infra"}], "extra": 1}"#,
        )
        .unwrap();

        let runner = RunnerConfig::load(&path).await.unwrap();
        assert_eq!(runner.default_branch.as_deref(), Some("main"));
        assert_eq!(runner.custom_tags, vec![Tag::new("team", "infra")]);
    }

    #[tokio::test]
    async fn identity_lookup_skipped_when_known() {
        let mut ctx = job();
        // Would fail if it tried to reach the endpoint
        ctx.fill_instance_identity("http://127.0.0.1:9").await.unwrap();
        assert_eq!(ctx.instance_id, "i-0123");
    }
}
