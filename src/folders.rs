// folders.rs - Partition flows into folder groups for the sidebar

use crate::model::{FlowRecord, FolderRecord};
use icu_collator::options::{CollatorOptions, Strength};
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identity of a sidebar group. `Default` holds flows with no (or an
/// unresolvable) folder, so a real folder whose id is "default" never collides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum GroupKey {
    Default,
    Folder(String),
}

impl GroupKey {
    pub fn folder_id(&self) -> Option<&str> {
        match self {
            GroupKey::Default => None,
            GroupKey::Folder(id) => Some(id),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Default => write!(f, "<default>"),
            GroupKey::Folder(id) => write!(f, "{}", id),
        }
    }
}

/// One folder (or the default pseudo-folder) and the flows assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderGroup {
    pub key: GroupKey,
    pub folder: Option<FolderRecord>,
    pub flows: Vec<FlowRecord>,
    pub initially_expanded: bool,
}

/// Result of one partition pass. Rebuilt on every render, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderPartition {
    pub default_group: FolderGroup,
    pub ordered_groups: Vec<FolderGroup>,
    /// Group holding the current flow; `None` means no group is forced open.
    pub expanded_group: Option<GroupKey>,
}

impl FolderPartition {
    /// All groups in render order: default first, then folders by name.
    pub fn groups(&self) -> impl Iterator<Item = &FolderGroup> {
        std::iter::once(&self.default_group).chain(self.ordered_groups.iter())
    }

    pub fn group(&self, key: &GroupKey) -> Option<&FolderGroup> {
        self.groups().find(|g| &g.key == key)
    }

    /// Key of the group a flow landed in.
    pub fn group_of(&self, flow_id: &str) -> Option<&GroupKey> {
        self.groups()
            .find(|g| g.flows.iter().any(|f| f.id == flow_id))
            .map(|g| &g.key)
    }

    pub fn flow_count(&self) -> usize {
        self.groups().map(|g| g.flows.len()).sum()
    }
}

/// Group flows by folder, order folders by display name and work out which
/// group holds `current_flow_id`.
///
/// Every flow lands in exactly one group. A flow whose folder reference is
/// missing or points at an unknown folder goes to the default group. Folders
/// without flows still produce (empty) groups.
pub fn partition(
    flows: &[FlowRecord],
    folders: &[FolderRecord],
    current_flow_id: Option<&str>,
) -> FolderPartition {
    let known: HashSet<&str> = folders.iter().map(|f| f.id.as_str()).collect();

    let mut buckets: HashMap<GroupKey, Vec<FlowRecord>> = HashMap::new();
    for flow in flows {
        let key = resolve_group_key(flow, &known);
        buckets.entry(key).or_default().push(flow.clone());
    }

    let expanded_group = current_flow_id
        .and_then(|id| flows.iter().find(|f| f.id == id))
        .map(|flow| resolve_group_key(flow, &known));

    let mut ordered_groups: Vec<FolderGroup> = folders
        .iter()
        .map(|folder| {
            let key = GroupKey::Folder(folder.id.clone());
            FolderGroup {
                flows: buckets.remove(&key).unwrap_or_default(),
                initially_expanded: expanded_group.as_ref() == Some(&key),
                folder: Some(folder.clone()),
                key,
            }
        })
        .collect();
    // sort_by is stable: equal names keep source order
    let order = NameOrder::new();
    ordered_groups.sort_by(|a, b| {
        order.compare(
            a.folder.as_ref().map(|f| f.display_name.as_str()).unwrap_or(""),
            b.folder.as_ref().map(|f| f.display_name.as_str()).unwrap_or(""),
        )
    });

    let default_group = FolderGroup {
        key: GroupKey::Default,
        folder: None,
        flows: buckets.remove(&GroupKey::Default).unwrap_or_default(),
        initially_expanded: expanded_group == Some(GroupKey::Default),
    };

    FolderPartition {
        default_group,
        ordered_groups,
        expanded_group,
    }
}

fn resolve_group_key(flow: &FlowRecord, known: &HashSet<&str>) -> GroupKey {
    match flow.folder_id.as_deref() {
        Some(id) if known.contains(id) => GroupKey::Folder(id.to_string()),
        Some(id) => {
            tracing::debug!(flow = %flow.id, folder = %id, "unknown folder, using default group");
            GroupKey::Default
        }
        None => GroupKey::Default,
    }
}

/// Locale-aware ordering of display names: root-locale collation at
/// tertiary strength, so case and accents only break ties.
pub struct NameOrder {
    collator: Option<CollatorBorrowed<'static>>,
}

impl NameOrder {
    pub fn new() -> Self {
        let mut options = CollatorOptions::default();
        options.strength = Some(Strength::Tertiary);
        let collator = match Collator::try_new(CollatorPreferences::default(), options) {
            Ok(collator) => Some(collator),
            Err(e) => {
                tracing::warn!(error = %e, "collation data unavailable, ordering by code point");
                None
            }
        };
        NameOrder { collator }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match &self.collator {
            Some(collator) => collator.compare(a, b),
            None => a.cmp(b),
        }
    }
}

impl Default for NameOrder {
    fn default() -> Self {
        NameOrder::new()
    }
}

/// One-off comparison; `partition` reuses a single `NameOrder` instead.
pub fn compare_display_names(a: &str, b: &str) -> Ordering {
    NameOrder::new().compare(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(id: &str, folder: Option<&str>) -> FlowRecord {
        FlowRecord::new(id, folder, &format!("Flow {}", id))
    }

    fn folder(id: &str, name: &str) -> FolderRecord {
        FolderRecord::new(id, name)
    }

    fn ids(group: &FolderGroup) -> Vec<&str> {
        group.flows.iter().map(|f| f.id.as_str()).collect()
    }

    fn names(p: &FolderPartition) -> Vec<&str> {
        p.ordered_groups
            .iter()
            .map(|g| g.folder.as_ref().unwrap().display_name.as_str())
            .collect()
    }

    #[test]
    fn test_single_unassigned_flow() {
        let p = partition(&[flow("f1", None)], &[], None);
        assert_eq!(ids(&p.default_group), vec!["f1"]);
        assert!(p.ordered_groups.is_empty());
        assert_eq!(p.expanded_group, None);
        assert!(!p.default_group.initially_expanded);
    }

    #[test]
    fn test_current_flow_expands_its_folder() {
        let p = partition(&[flow("f1", Some("A"))], &[folder("A", "Sales")], Some("f1"));
        assert!(p.default_group.flows.is_empty());
        assert_eq!(ids(&p.ordered_groups[0]), vec!["f1"]);
        assert_eq!(p.expanded_group, Some(GroupKey::Folder("A".to_string())));
        assert!(p.ordered_groups[0].initially_expanded);
        assert!(!p.default_group.initially_expanded);
    }

    #[test]
    fn test_folders_sorted_by_name() {
        let p = partition(&[], &[folder("B", "zeta"), folder("A", "alpha")], None);
        assert_eq!(names(&p), vec!["alpha", "zeta"]);
        let keys: Vec<GroupKey> = p.groups().map(|g| g.key.clone()).collect();
        assert_eq!(keys[0], GroupKey::Default);
    }

    #[test]
    fn test_sort_ignores_case_and_is_stable() {
        let p = partition(
            &[],
            &[
                folder("1", "beta"),
                folder("2", "Alpha"),
                folder("3", "same"),
                folder("4", "apple"),
                folder("5", "same"),
            ],
            None,
        );
        assert_eq!(names(&p), vec!["Alpha", "apple", "beta", "same", "same"]);
        let same_ids: Vec<&str> = p.ordered_groups[3..]
            .iter()
            .map(|g| g.folder.as_ref().unwrap().id.as_str())
            .collect();
        assert_eq!(same_ids, vec!["3", "5"]);
    }

    #[test]
    fn test_lowercase_before_uppercase_on_tie() {
        assert_eq!(compare_display_names("a", "A"), Ordering::Less);
        assert_eq!(compare_display_names("B", "a"), Ordering::Greater);
        assert_eq!(compare_display_names("abc", "abd"), Ordering::Less);
        assert_eq!(compare_display_names("ab", "abc"), Ordering::Less);
    }

    #[test]
    fn test_accents_and_punctuation_follow_collation() {
        let p = partition(
            &[],
            &[
                folder("1", "zeta"),
                folder("2", "Émile"),
                folder("3", "~tilde"),
                folder("4", "alpha"),
            ],
            None,
        );
        assert_eq!(names(&p), vec!["~tilde", "alpha", "Émile", "zeta"]);
        assert_eq!(compare_display_names("resume", "résumé"), Ordering::Less);
        assert_eq!(compare_display_names("résumé", "Resume"), Ordering::Greater);
    }

    #[test]
    fn test_orphan_goes_to_default() {
        let p = partition(
            &[flow("f1", Some("X")), flow("f2", Some("A"))],
            &[folder("A", "Sales")],
            Some("f1"),
        );
        assert_eq!(ids(&p.default_group), vec!["f1"]);
        assert_eq!(ids(&p.ordered_groups[0]), vec!["f2"]);
        assert_eq!(p.expanded_group, Some(GroupKey::Default));
        assert!(p.default_group.initially_expanded);
    }

    #[test]
    fn test_folder_named_default_does_not_collide() {
        let p = partition(
            &[flow("f1", Some("default")), flow("f2", None)],
            &[folder("default", "Default folder")],
            None,
        );
        assert_eq!(ids(&p.default_group), vec!["f2"]);
        assert_eq!(ids(&p.ordered_groups[0]), vec!["f1"]);
    }

    #[test]
    fn test_empty_folder_kept_and_collapsed() {
        let p = partition(&[flow("f1", None)], &[folder("A", "Empty")], Some("f1"));
        assert_eq!(p.ordered_groups.len(), 1);
        assert!(p.ordered_groups[0].flows.is_empty());
        assert!(!p.ordered_groups[0].initially_expanded);
    }

    #[test]
    fn test_unmatched_current_flow_forces_nothing() {
        let p = partition(
            &[flow("f1", Some("A"))],
            &[folder("A", "Sales")],
            Some("missing"),
        );
        assert_eq!(p.expanded_group, None);
        assert!(p.groups().all(|g| !g.initially_expanded));
    }

    #[test]
    fn test_every_flow_appears_exactly_once() {
        let flows = vec![
            flow("f1", None),
            flow("f2", Some("A")),
            flow("f3", Some("B")),
            flow("f4", Some("gone")),
            flow("f5", Some("A")),
        ];
        let folders = vec![folder("A", "a"), folder("B", "b"), folder("C", "c")];
        let p = partition(&flows, &folders, Some("f3"));

        let mut seen: Vec<&str> = p.groups().flat_map(|g| ids(g)).collect();
        seen.sort();
        assert_eq!(seen, vec!["f1", "f2", "f3", "f4", "f5"]);
        assert_eq!(p.flow_count(), flows.len());
        assert_eq!(p.groups().filter(|g| g.initially_expanded).count(), 1);
        assert_eq!(p.group_of("f3"), Some(&GroupKey::Folder("B".to_string())));
        let b = p.group(&GroupKey::Folder("B".to_string())).unwrap();
        assert_eq!(ids(b), vec!["f3"]);
        assert_eq!(ids(p.group(&GroupKey::Default).unwrap()), vec!["f1", "f4"]);
        assert!(p.group(&GroupKey::Folder("gone".to_string())).is_none());
    }

    #[test]
    fn test_flows_keep_source_order_within_group() {
        let p = partition(
            &[flow("f3", Some("A")), flow("f1", Some("A")), flow("f2", Some("A"))],
            &[folder("A", "Sales")],
            None,
        );
        assert_eq!(ids(&p.ordered_groups[0]), vec!["f3", "f1", "f2"]);
    }

    #[test]
    fn test_repeated_partition_is_deterministic() {
        let folders = vec![folder("1", "b"), folder("2", "a"), folder("3", "B")];
        let first = partition(&[], &folders, None);
        let second = partition(&[], &folders, None);
        assert_eq!(first, second);
    }
}
