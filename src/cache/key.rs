//! Cache keys and generated resource names

use crate::cloud::{SnapshotFilter, SnapshotState, Tag};
use crate::config::JobContext;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeSet;

/// Tag keys used on volumes and snapshots
pub mod tags {
    /// `{format_version}-{branch_ref}`
    pub const BRANCH: &str = "warmvol-snapshot-branch";
    /// Repository the cache belongs to
    pub const REPOSITORY: &str = "warmvol-snapshot-repository";
    /// Human-readable name, never used for lookup
    pub const NAME: &str = "Name";
    /// Set when one job caches several mount points
    pub const MOUNT_POINT: &str = "warmvol-mount-point";
}

/// Longest ref fragment embedded in a resource name
const MAX_REF_LEN: usize = 40;

/// Identity of a branch-scoped cache lineage
#[derive(Debug, Clone)]
pub struct CacheKey {
    pub format_version: String,
    pub branch_ref: String,
    pub repository: String,
    pub custom_tags: Vec<Tag>,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.format_version == other.format_version
            && self.branch_ref == other.branch_ref
            && self.repository == other.repository
            && self.custom_tags.iter().collect::<BTreeSet<_>>()
                == other.custom_tags.iter().collect::<BTreeSet<_>>()
    }
}

impl Eq for CacheKey {}

impl CacheKey {
    /// Key of the job's own branch
    pub fn for_job(job: &JobContext, format_version: &str) -> Self {
        Self {
            format_version: format_version.to_string(),
            branch_ref: job.branch_ref.clone(),
            repository: job.repository.clone(),
            custom_tags: job.custom_tags.clone(),
        }
    }

    /// Key of the job's default branch, if one is configured
    pub fn for_default_branch(job: &JobContext, format_version: &str) -> Option<Self> {
        let branch = job.default_branch.as_deref()?;
        Some(Self {
            branch_ref: normalize_branch(branch),
            ..Self::for_job(job, format_version)
        })
    }

    /// Value of the branch tag
    pub fn branch_tag(&self) -> String {
        format!("{}-{}", self.format_version, self.branch_ref)
    }

    /// Tags identifying this lineage (no `Name`)
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags = vec![
            Tag::new(tags::BRANCH, self.branch_tag()),
            Tag::new(tags::REPOSITORY, &self.repository),
        ];
        tags.extend(self.custom_tags.iter().cloned());
        tags
    }

    /// Tags for a created resource: the lineage plus its name
    pub fn tags_with_name(&self, name: &str) -> Vec<Tag> {
        let mut tags = self.tags();
        tags.push(Tag::new(tags::NAME, name));
        tags
    }

    /// Whether `resource_tags` (ignoring `Name`) are exactly this key's tags.
    ///
    /// Tag filters only check that the key's tags are present, so a snapshot
    /// carrying one extra tag belongs to another lineage and must not match.
    pub fn matches(&self, resource_tags: &[Tag]) -> bool {
        let own: BTreeSet<Tag> = self.tags().into_iter().collect();
        let other: BTreeSet<&Tag> = resource_tags
            .iter()
            .filter(|t| t.key != tags::NAME)
            .collect();
        other.len() == own.len() && other.iter().all(|t| own.contains(*t))
    }

    /// Query for completed snapshots of this lineage
    pub fn completed_filter(&self) -> SnapshotFilter {
        SnapshotFilter {
            tags: self.tags(),
            state: Some(SnapshotState::Completed),
        }
    }

    /// Branch ref safe for resource names
    pub fn sanitized_ref(&self) -> String {
        sanitize_ref(&self.branch_ref)
    }
}

/// `main` becomes `refs/heads/main`; full refs are kept
pub fn normalize_branch(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{}", branch)
    }
}

/// Strip `refs/heads/`, replace path separators and cap the length
pub fn sanitize_ref(branch_ref: &str) -> String {
    branch_ref
        .strip_prefix("refs/heads/")
        .unwrap_or(branch_ref)
        .replace('/', "-")
        .chars()
        .take(MAX_REF_LEN)
        .collect()
}

/// Names of the resources one run creates, fixed at the start of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub volume: String,
    pub snapshot: String,
    pub description: String,
}

impl ResourceNames {
    pub fn new(prefix: &str, key: &CacheKey, now: DateTime<Utc>) -> Self {
        let branch = key.sanitized_ref();
        let stamp = now.format("%Y%m%d-%H%M%S");
        Self {
            volume: format!("{}-volume-{}-{}", prefix, branch, stamp),
            snapshot: format!("{}-snapshot-{}-{}", prefix, branch, stamp),
            description: format!(
                "Snapshot for branch {} taken at {}",
                key.branch_ref,
                now.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(branch: &str, custom: Vec<Tag>) -> CacheKey {
        CacheKey {
            format_version: "v1".to_string(),
            branch_ref: branch.to_string(),
            repository: "acme/api".to_string(),
            custom_tags: custom,
        }
    }

    #[test]
    fn equality_ignores_custom_tag_order() {
        let a = key(
            "refs/heads/main",
            vec![Tag::new("arch", "arm64"), Tag::new("team", "infra")],
        );
        let b = key(
            "refs/heads/main",
            vec![Tag::new("team", "infra"), Tag::new("arch", "arm64")],
        );
        assert_eq!(a, b);
        assert_ne!(a, key("refs/heads/main", vec![Tag::new("arch", "arm64")]));
        assert_ne!(a.clone(), CacheKey { format_version: "v2".to_string(), ..a });
    }

    #[test]
    fn lookup_tags() {
        let k = key("refs/heads/main", vec![Tag::new("team", "infra")]);
        assert_eq!(
            k.tags(),
            vec![
                Tag::new(tags::BRANCH, "v1-refs/heads/main"),
                Tag::new(tags::REPOSITORY, "acme/api"),
                Tag::new("team", "infra"),
            ]
        );
        assert!(!k.completed_filter().tags.iter().any(|t| t.key == tags::NAME));
        assert_eq!(k.completed_filter().state, Some(SnapshotState::Completed));
        assert_eq!(k.tags_with_name("n").last(), Some(&Tag::new("Name", "n")));
    }

    #[test]
    fn matches_exact_tag_set_only() {
        let k = key("refs/heads/main", vec![Tag::new("team", "infra")]);

        let mut reordered = k.tags_with_name("warmvol-snapshot-main");
        reordered.reverse();
        assert!(k.matches(&reordered));

        let mut extra = k.tags();
        extra.push(Tag::new(tags::MOUNT_POINT, "/var/cache/apt"));
        assert!(!k.matches(&extra));

        let missing = key("refs/heads/main", vec![]).tags();
        assert!(!k.matches(&missing));
    }

    #[test]
    fn default_branch_key_is_normalized() {
        let job = JobContext {
            repository: "acme/api".to_string(),
            branch_ref: "refs/heads/feature/x".to_string(),
            default_branch: Some("main".to_string()),
            ..JobContext::default()
        };
        let fallback = CacheKey::for_default_branch(&job, "v1").unwrap();
        assert_eq!(fallback.branch_ref, "refs/heads/main");
        assert_eq!(fallback.repository, "acme/api");

        let no_default = JobContext {
            default_branch: None,
            ..job
        };
        assert!(CacheKey::for_default_branch(&no_default, "v1").is_none());
        assert_eq!(normalize_branch("refs/tags/v1"), "refs/tags/v1");
    }

    #[test]
    fn sanitize_ref_strips_and_caps() {
        assert_eq!(sanitize_ref("refs/heads/feature/x"), "feature-x");
        assert_eq!(sanitize_ref("refs/pull/12/merge"), "refs-pull-12-merge");
        let long = format!("refs/heads/{}", "a".repeat(60));
        assert_eq!(sanitize_ref(&long).len(), 40);
    }

    #[test]
    fn resource_names() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 14, 5, 9).unwrap();
        let names = ResourceNames::new("warmvol", &key("refs/heads/feature/x", vec![]), now);

        assert_eq!(names.volume, "warmvol-volume-feature-x-20250301-140509");
        assert_eq!(names.snapshot, "warmvol-snapshot-feature-x-20250301-140509");
        assert_eq!(
            names.description,
            "Snapshot for branch refs/heads/feature/x taken at 2025-03-01T14:05:09Z"
        );
    }
}
