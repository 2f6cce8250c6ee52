//! Tag classification and release inference.
//!
//! Every release contributes its tags to a global table. A build's tags are
//! bucketed by [`TagType`] against that table, and the release owning a
//! build is inferred from which releases' tag sets the build's tags hit.
//!
//! Two releases may share a literal tag name. Inference resolves such
//! collisions deterministically:
//!
//! 1. the preferred release (the one under edit) wins if it owns any tag;
//! 2. tags owned by a single release are decisive; if decisive tags point
//!    at more than one release the answer is ambiguous (`None`);
//! 3. with only shared tags, the most recently created owner wins, ties
//!    going to the greatest release name.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use update_gate_state::{DomainStore, Release, StoreResult};

use crate::context::Mode;

/// The role a tag plays for its release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Candidate,
    Testing,
    Stable,
    PendingTesting,
    PendingStable,
    Override,
}

impl TagType {
    pub const ALL: [TagType; 6] = [
        TagType::Candidate,
        TagType::Testing,
        TagType::Stable,
        TagType::PendingTesting,
        TagType::PendingStable,
        TagType::Override,
    ];

    /// Name of the submission field carrying this tag, e.g. `candidate_tag`.
    pub fn field_name(&self) -> &'static str {
        match self {
            TagType::Candidate => "candidate_tag",
            TagType::Testing => "testing_tag",
            TagType::Stable => "stable_tag",
            TagType::PendingTesting => "pending_testing_tag",
            TagType::PendingStable => "pending_stable_tag",
            TagType::Override => "override_tag",
        }
    }

    /// The tag of this type on `release`; empty when the release has none.
    pub fn tag_of<'r>(&self, release: &'r Release) -> &'r str {
        match self {
            TagType::Candidate => &release.candidate_tag,
            TagType::Testing => &release.testing_tag,
            TagType::Stable => &release.stable_tag,
            TagType::PendingTesting => &release.pending_testing_tag,
            TagType::PendingStable => &release.pending_stable_tag,
            TagType::Override => &release.override_tag,
        }
    }
}

/// Snapshot of every release's tags.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    releases: Vec<Release>,
    by_type: BTreeMap<TagType, Vec<String>>,
    /// tag name → indices into `releases`
    owners: HashMap<String, Vec<usize>>,
    /// tag name → types it is used as, across all releases
    types: HashMap<String, BTreeSet<TagType>>,
}

impl TagTable {
    pub async fn load(store: &dyn DomainStore) -> StoreResult<Self> {
        Ok(Self::from_releases(store.releases().await?))
    }

    pub fn from_releases(releases: Vec<Release>) -> Self {
        let mut table = TagTable::default();
        for (idx, release) in releases.iter().enumerate() {
            for ty in TagType::ALL {
                let tag = ty.tag_of(release);
                if tag.is_empty() {
                    continue;
                }
                table.by_type.entry(ty).or_default().push(tag.to_string());
                let owners = table.owners.entry(tag.to_string()).or_default();
                if !owners.contains(&idx) {
                    owners.push(idx);
                }
                table.types.entry(tag.to_string()).or_default().insert(ty);
            }
        }
        table.releases = releases;
        table
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    /// Every known tag of type `ty`, across releases.
    pub fn tags_of_type(&self, ty: TagType) -> &[String] {
        self.by_type.get(&ty).map(Vec::as_slice).unwrap_or_default()
    }

    /// Bucket `tags` by type. Unknown tags are dropped; a tag used as
    /// different types by different releases lands in every bucket.
    pub fn classify<S: AsRef<str>>(&self, tags: &[S]) -> BTreeMap<TagType, Vec<String>> {
        let mut buckets: BTreeMap<TagType, Vec<String>> = BTreeMap::new();
        for tag in tags {
            let tag = tag.as_ref();
            if let Some(types) = self.types.get(tag) {
                for ty in types {
                    let bucket = buckets.entry(*ty).or_default();
                    if !bucket.iter().any(|t| t == tag) {
                        bucket.push(tag.to_string());
                    }
                }
            }
        }
        buckets
    }

    /// Infer the single release owning `tags`.
    pub fn infer_release<S: AsRef<str>>(
        &self,
        tags: &[S],
        preferred: Option<&Release>,
    ) -> Option<Release> {
        let owner_lists: Vec<&Vec<usize>> = tags
            .iter()
            .filter_map(|t| self.owners.get(t.as_ref()))
            .collect();
        if owner_lists.is_empty() {
            return None;
        }

        if let Some(preferred) = preferred {
            let owned_by_preferred = owner_lists
                .iter()
                .flat_map(|owners| owners.iter())
                .any(|idx| self.releases[*idx].name == preferred.name);
            if owned_by_preferred {
                return self.releases.iter().find(|r| r.name == preferred.name).cloned();
            }
        }

        let decisive: BTreeSet<usize> = owner_lists
            .iter()
            .filter(|owners| owners.len() == 1)
            .map(|owners| owners[0])
            .collect();
        match decisive.len() {
            0 => {}
            1 => return decisive.first().map(|idx| self.releases[*idx].clone()),
            _ => return None,
        }

        owner_lists
            .iter()
            .flat_map(|owners| owners.iter())
            .map(|idx| &self.releases[*idx])
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.name.cmp(&b.name))
            })
            .cloned()
    }

    /// Tags a submitted build may carry.
    ///
    /// New submissions need a candidate tag (of `release` when given, of
    /// any release otherwise). Edits accept the candidate or testing tag of
    /// the release under edit.
    pub fn valid_tags_for(&self, mode: &Mode, release: Option<&Release>) -> BTreeSet<String> {
        let wanted: &[TagType] = match mode {
            Mode::New => &[TagType::Candidate],
            Mode::Edit(_) => &[TagType::Candidate, TagType::Testing],
        };
        match release {
            Some(release) => wanted
                .iter()
                .map(|ty| ty.tag_of(release))
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            None => wanted
                .iter()
                .flat_map(|ty| self.tags_of_type(*ty).iter().cloned())
                .collect(),
        }
    }
}
