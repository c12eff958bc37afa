//! Flat node list -> rooted mind-map tree
//!
//! The AI generation step (and the document store on load) hands us an
//! unordered list of `{id, label, parentId?}` records. This module turns it
//! into exactly one rooted tree, tolerating the usual garbage in that list:
//! empty ids or labels, duplicate ids, parents that don't exist, nodes that
//! name themselves as parent, and parent cycles.
//!
//! The build runs in two passes over the input:
//! 1. Accept every record with a non-empty id and label (first id wins) and
//!    pick the root through [`ROOT_RULES`].
//! 2. Link each accepted record under its parent in input order. The root is
//!    never linked under anything, which is what keeps `A -> B -> A` finite.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Deepest tree the service will store or render. Building itself has no limit.
pub const MAX_DEPTH: usize = 1_000;

/// One record of the flat list returned by the generator.
///
/// Fields default to empty/absent so that half-formed AI output still makes
/// it to the builder, which then decides what to keep. `null` reads as absent
/// and numbers are stringified (`7` and `"7"` are the same id).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatNode {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
    #[serde(
        rename = "parentId",
        default,
        deserialize_with = "lenient_parent",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_to_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_parent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_to_string(Value::deserialize(deserializer)?))
}

impl FlatNode {
    pub fn root(id: &str, label: &str) -> Self {
        Self { id: id.to_string(), label: label.to_string(), parent_id: None }
    }

    pub fn child(id: &str, label: &str, parent_id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            parent_id: Some(parent_id.to_string()),
        }
    }

    /// Parent id if present and non-empty
    fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|p| !p.is_empty())
    }
}

/// A node of the reconstructed tree. Children keep first-seen input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Total number of nodes in this subtree, including `self`
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Number of levels below and including `self` (a leaf has depth 1)
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.children.iter().map(|c| (c, level + 1)));
        }
        deepest
    }

    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        self.iter().find(|n| n.id == id)
    }

    /// Pre-order iterator over the subtree
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }
}

// Unlinks children onto a heap stack so dropping a long chain can't overflow
impl Drop for TreeNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

pub struct PreOrder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

// ============================================================================
// Root selection
// ============================================================================

/// Which fallback tier picked the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootRule {
    /// First accepted node with an absent or empty `parentId`.
    NoParent,
    /// First accepted node whose `parentId` names no accepted node.
    UnresolvedParent,
    /// First accepted node in input order, whatever its parent says.
    /// Only reached when every accepted node points at another accepted
    /// node, i.e. the input is one or more parent cycles.
    FirstInInput,
}

impl RootRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootRule::NoParent => "no-parent",
            RootRule::UnresolvedParent => "unresolved-parent",
            RootRule::FirstInInput => "first-in-input",
        }
    }
}

struct RootRuleEntry {
    rule: RootRule,
    select: fn(&Accepted<'_>) -> Option<usize>,
}

/// Root fallback tiers, tried in order. The first rule that selects a node wins.
const ROOT_RULES: &[RootRuleEntry] = &[
    RootRuleEntry { rule: RootRule::NoParent, select: select_parentless },
    RootRuleEntry { rule: RootRule::UnresolvedParent, select: select_unresolved },
    RootRuleEntry { rule: RootRule::FirstInInput, select: select_first },
];

fn select_parentless(acc: &Accepted<'_>) -> Option<usize> {
    acc.nodes.iter().position(|n| n.parent().is_none())
}

fn select_unresolved(acc: &Accepted<'_>) -> Option<usize> {
    acc.nodes.iter().position(|n| !acc.resolves(n))
}

fn select_first(acc: &Accepted<'_>) -> Option<usize> {
    if acc.nodes.is_empty() { None } else { Some(0) }
}

/// Accepted records in input order plus an id -> slot index.
struct Accepted<'a> {
    nodes: Vec<&'a FlatNode>,
    /// Position of each accepted node in the original input
    positions: Vec<usize>,
    slots: HashMap<&'a str, usize>,
}

impl<'a> Accepted<'a> {
    fn resolves(&self, node: &FlatNode) -> bool {
        node.parent().is_some_and(|p| self.slots.contains_key(p))
    }
}

// ============================================================================
// Build report
// ============================================================================

/// Why a record was dropped from, or repaired in, the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueReason {
    /// Empty `id`: the record is dropped.
    MissingId,
    /// Empty `label`: the record is dropped.
    MissingLabel,
    /// An earlier record already used this id: the record is ignored.
    DuplicateId,
    /// `parentId == id`: the node is never linked under itself.
    SelfParent,
    /// `parentId` names no accepted node.
    DanglingParent,
    /// The root's own `parentId` resolved but was ignored to keep the tree acyclic.
    RootParentIgnored,
    /// Accepted, but not reachable from the chosen root.
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildIssue {
    /// Position of the record in the input list
    pub index: usize,
    pub id: String,
    pub reason: IssueReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub root_rule: Option<RootRule>,
    /// Records that passed the id/label/duplicate filter
    pub accepted: usize,
    /// Nodes in the final tree
    pub reachable: usize,
    pub issues: Vec<BuildIssue>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, reason: IssueReason) -> usize {
        self.issues.iter().filter(|i| i.reason == reason).count()
    }

    fn push(&mut self, index: usize, id: &str, reason: IssueReason) {
        self.issues.push(BuildIssue { index, id: id.to_string(), reason });
    }
}

/// Tree plus the diagnostics gathered while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyBuild {
    pub root: Option<TreeNode>,
    pub report: BuildReport,
}

// ============================================================================
// Builder
// ============================================================================

/// Build the mind-map tree from a flat node list.
///
/// Returns `None` when the input is empty or holds no record with both an
/// id and a label. Malformed records are dropped or repaired, never errored.
pub fn build_hierarchy(nodes: &[FlatNode]) -> Option<TreeNode> {
    build_hierarchy_with_report(nodes).root
}

/// Same as [`build_hierarchy`], but also reports every dropped or repaired record.
pub fn build_hierarchy_with_report(nodes: &[FlatNode]) -> HierarchyBuild {
    let mut report = BuildReport::default();

    // Pass 1: accept records, first id wins
    let mut accepted = Accepted {
        nodes: Vec::with_capacity(nodes.len()),
        positions: Vec::with_capacity(nodes.len()),
        slots: HashMap::with_capacity(nodes.len()),
    };
    for (index, node) in nodes.iter().enumerate() {
        if node.id.is_empty() {
            report.push(index, &node.id, IssueReason::MissingId);
            continue;
        }
        if node.label.is_empty() {
            report.push(index, &node.id, IssueReason::MissingLabel);
            continue;
        }
        if accepted.slots.contains_key(node.id.as_str()) {
            report.push(index, &node.id, IssueReason::DuplicateId);
            continue;
        }
        accepted.slots.insert(node.id.as_str(), accepted.nodes.len());
        accepted.nodes.push(node);
        accepted.positions.push(index);
    }
    report.accepted = accepted.nodes.len();

    let Some((root, rule)) = ROOT_RULES
        .iter()
        .find_map(|entry| (entry.select)(&accepted).map(|slot| (slot, entry.rule)))
    else {
        report.issues.sort_by_key(|i| i.index);
        return HierarchyBuild { root: None, report };
    };
    report.root_rule = Some(rule);

    // Pass 2: link children in input order
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); accepted.nodes.len()];
    for (slot, node) in accepted.nodes.iter().enumerate() {
        let index = accepted.positions[slot];
        let Some(parent) = node.parent() else { continue };

        if parent == node.id {
            report.push(index, &node.id, IssueReason::SelfParent);
            continue;
        }
        match accepted.slots.get(parent) {
            Some(_) if slot == root => {
                report.push(index, &node.id, IssueReason::RootParentIgnored);
            }
            Some(&parent_slot) => children[parent_slot].push(slot),
            None => report.push(index, &node.id, IssueReason::DanglingParent),
        }
    }

    let mut visited = vec![false; accepted.nodes.len()];
    let Some(tree) = assemble(root, &accepted.nodes, &children, &mut visited) else {
        return HierarchyBuild { root: None, report };
    };

    for (slot, seen) in visited.iter().enumerate() {
        if !seen {
            let node = accepted.nodes[slot];
            report.push(accepted.positions[slot], &node.id, IssueReason::Unreachable);
        }
    }
    report.reachable = visited.iter().filter(|v| **v).count();
    report.issues.sort_by_key(|i| i.index);

    if !report.is_clean() {
        tracing::debug!(
            root = %tree.id,
            rule = rule.as_str(),
            accepted = report.accepted,
            reachable = report.reachable,
            issues = report.issues.len(),
            "Built hierarchy with repairs"
        );
    }

    HierarchyBuild { root: Some(tree), report }
}

/// Materialize the tree reachable from `root`, marking `visited` as it goes.
///
/// Slots are ordered pre-order with an explicit stack, then built in reverse
/// so every child exists before its parent takes ownership of it.
fn assemble(
    root: usize,
    nodes: &[&FlatNode],
    children: &[Vec<usize>],
    visited: &mut [bool],
) -> Option<TreeNode> {
    let mut order = Vec::new();
    let mut kept: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut stack = vec![root];
    visited[root] = true;

    while let Some(slot) = stack.pop() {
        order.push(slot);
        for &child in &children[slot] {
            if !visited[child] {
                visited[child] = true;
                kept[slot].push(child);
            }
        }
        stack.extend(kept[slot].iter().rev());
    }

    let mut built: Vec<Option<TreeNode>> = (0..nodes.len()).map(|_| None).collect();
    for &slot in order.iter().rev() {
        let node = nodes[slot];
        let kids = kept[slot].iter().filter_map(|&c| built[c].take()).collect();
        built[slot] = Some(TreeNode {
            id: node.id.clone(),
            label: node.label.clone(),
            parent_id: node.parent_id.clone(),
            children: kids,
        });
    }

    built[root].take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ids(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn node(id: &str, label: &str, parent: Option<&str>) -> FlatNode {
        FlatNode {
            id: id.to_string(),
            label: label.to_string(),
            parent_id: parent.map(str::to_string),
        }
    }

    #[test]
    fn test_simple_root_with_two_children() {
        let nodes = vec![
            FlatNode::root("a", "Root"),
            FlatNode::child("b", "Child1", "a"),
            FlatNode::child("c", "Child2", "a"),
        ];
        let root = build_hierarchy(&nodes).unwrap();
        assert_eq!(root.id, "a");
        assert_eq!(root.label, "Root");
        assert_eq!(ids(&root.children), vec!["b", "c"]);
        assert!(root.children.iter().all(|c| c.children.is_empty()));
    }

    #[test]
    fn test_empty_input_returns_none() {
        assert!(build_hierarchy(&[]).is_none());
    }

    #[test]
    fn test_all_invalid_returns_none() {
        let nodes = vec![node("", "No id", None), node("x", "", None)];
        let build = build_hierarchy_with_report(&nodes);
        assert!(build.root.is_none());
        assert_eq!(build.report.root_rule, None);
        assert_eq!(build.report.count(IssueReason::MissingId), 1);
        assert_eq!(build.report.count(IssueReason::MissingLabel), 1);
    }

    #[test]
    fn test_single_orphan_becomes_root() {
        let nodes = vec![FlatNode::child("x", "Orphan", "missing")];
        let build = build_hierarchy_with_report(&nodes);
        let root = build.root.unwrap();
        assert_eq!(root.id, "x");
        assert_eq!(root.node_count(), 1);
        assert_eq!(root.parent_id.as_deref(), Some("missing"));
        assert_eq!(build.report.root_rule, Some(RootRule::UnresolvedParent));
        assert_eq!(build.report.count(IssueReason::DanglingParent), 1);
    }

    #[test]
    fn test_duplicate_id_first_wins() {
        let nodes = vec![FlatNode::root("a", "First"), FlatNode::root("a", "Second")];
        let build = build_hierarchy_with_report(&nodes);
        let root = build.root.unwrap();
        assert_eq!(root.label, "First");
        assert_eq!(root.node_count(), 1);
        assert_eq!(build.report.issues, vec![BuildIssue {
            index: 1,
            id: "a".to_string(),
            reason: IssueReason::DuplicateId,
        }]);
    }

    #[test]
    fn test_duplicate_id_does_not_link_twice() {
        let nodes = vec![
            FlatNode::root("r", "Root"),
            FlatNode::child("p", "P", "r"),
            FlatNode::child("c", "C", "r"),
            FlatNode::child("c", "C again", "p"),
        ];
        let root = build_hierarchy(&nodes).unwrap();
        assert_eq!(ids(&root.children), vec!["p", "c"]);
        assert!(root.children[0].children.is_empty());
        assert_eq!(root.node_count(), 3);
    }

    #[test]
    fn test_two_node_cycle_terminates() {
        let nodes = vec![FlatNode::child("A", "A", "B"), FlatNode::child("B", "B", "A")];
        let build = build_hierarchy_with_report(&nodes);
        let root = build.root.unwrap();

        assert_eq!(build.report.root_rule, Some(RootRule::FirstInInput));
        assert_eq!(root.id, "A");
        assert_eq!(ids(&root.children), vec!["B"]);
        assert!(root.children[0].children.is_empty());
        assert_eq!(root.node_count(), 2);
        assert_eq!(build.report.count(IssueReason::RootParentIgnored), 1);
    }

    #[test]
    fn test_longer_cycle_terminates() {
        let nodes = vec![
            FlatNode::child("a", "A", "c"),
            FlatNode::child("b", "B", "a"),
            FlatNode::child("c", "C", "b"),
        ];
        let root = build_hierarchy(&nodes).unwrap();
        let order: Vec<&str> = root.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_beside_real_root_is_unreachable() {
        let nodes = vec![
            FlatNode::root("r", "Root"),
            FlatNode::child("x", "X", "y"),
            FlatNode::child("y", "Y", "x"),
        ];
        let build = build_hierarchy_with_report(&nodes);
        assert_eq!(build.root.unwrap().node_count(), 1);
        assert_eq!(build.report.count(IssueReason::Unreachable), 2);
        assert_eq!(build.report.reachable, 1);
    }

    #[test]
    fn test_self_parent_is_not_linked() {
        let nodes = vec![FlatNode::root("r", "Root"), FlatNode::child("s", "Selfish", "s")];
        let build = build_hierarchy_with_report(&nodes);
        let root = build.root.unwrap();
        assert!(root.children.is_empty());
        assert_eq!(build.report.count(IssueReason::SelfParent), 1);
        assert_eq!(build.report.count(IssueReason::Unreachable), 1);
    }

    #[test]
    fn test_lone_self_parent_still_yields_root() {
        let nodes = vec![FlatNode::child("s", "Selfish", "s")];
        let root = build_hierarchy(&nodes).unwrap();
        assert_eq!(root.id, "s");
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_no_parent_rule_beats_earlier_orphan() {
        let nodes = vec![
            FlatNode::child("orphan", "Orphan", "ghost"),
            FlatNode::root("top", "Top"),
            FlatNode::child("leaf", "Leaf", "top"),
        ];
        let build = build_hierarchy_with_report(&nodes);
        let root = build.root.unwrap();
        assert_eq!(root.id, "top");
        assert_eq!(build.report.root_rule, Some(RootRule::NoParent));
        assert_eq!(ids(&root.children), vec!["leaf"]);
    }

    #[test]
    fn test_first_parentless_node_wins() {
        let nodes = vec![
            FlatNode::root("one", "One"),
            FlatNode::root("two", "Two"),
            FlatNode::child("kid", "Kid", "two"),
        ];
        let build = build_hierarchy_with_report(&nodes);
        let root = build.root.unwrap();
        assert_eq!(root.id, "one");
        assert!(root.children.is_empty());
        assert_eq!(build.report.count(IssueReason::Unreachable), 2);
    }

    #[test]
    fn test_empty_parent_id_counts_as_absent() {
        let nodes = vec![
            FlatNode::child("child", "Child", "root"),
            node("root", "Root", Some("")),
        ];
        let build = build_hierarchy_with_report(&nodes);
        let root = build.root.unwrap();
        assert_eq!(root.id, "root");
        assert_eq!(build.report.root_rule, Some(RootRule::NoParent));
        assert_eq!(ids(&root.children), vec!["child"]);
    }

    #[test]
    fn test_children_before_parent_in_input() {
        let nodes = vec![
            FlatNode::child("g", "Grandchild", "c"),
            FlatNode::child("c", "Child", "r"),
            FlatNode::root("r", "Root"),
            FlatNode::child("d", "Child 2", "r"),
        ];
        let root = build_hierarchy(&nodes).unwrap();
        assert_eq!(root.id, "r");
        assert_eq!(ids(&root.children), vec!["c", "d"]);
        assert_eq!(ids(&root.children[0].children), vec!["g"]);
        assert_eq!(root.depth(), 3);
    }

    #[test]
    fn test_invalid_records_are_skipped_for_linking() {
        let nodes = vec![
            FlatNode::root("r", "Root"),
            node("p", "", Some("r")),
            FlatNode::child("c", "Child", "p"),
        ];
        let build = build_hierarchy_with_report(&nodes);
        let root = build.root.unwrap();
        assert!(root.children.is_empty());
        assert_eq!(build.report.count(IssueReason::MissingLabel), 1);
        assert_eq!(build.report.count(IssueReason::DanglingParent), 1);
    }

    #[test]
    fn test_reachable_ids_are_unique() {
        let nodes = vec![
            FlatNode::root("r", "Root"),
            FlatNode::child("a", "A", "r"),
            FlatNode::child("a", "A2", "r"),
            FlatNode::child("b", "B", "a"),
            FlatNode::child("b", "B2", "r"),
            FlatNode::child("r", "Root again", "b"),
        ];
        let root = build_hierarchy(&nodes).unwrap();
        let mut seen = HashSet::new();
        for n in root.iter() {
            assert!(seen.insert(n.id.clone()), "duplicate id {}", n.id);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_report_is_clean_for_well_formed_input() {
        let nodes = vec![
            FlatNode::root("r", "Root"),
            FlatNode::child("a", "A", "r"),
            FlatNode::child("b", "B", "a"),
        ];
        let build = build_hierarchy_with_report(&nodes);
        assert!(build.report.is_clean());
        assert_eq!(build.report.accepted, 3);
        assert_eq!(build.report.reachable, 3);
    }

    #[test]
    fn test_flat_node_deserializes_missing_fields() {
        let parsed: Vec<FlatNode> =
            serde_json::from_str(r#"[{"id":"a","label":"A"},{"label":"no id","parentId":"a"}]"#).unwrap();
        assert_eq!(parsed[0].parent_id, None);
        assert_eq!(parsed[1].id, "");
        let root = build_hierarchy(&parsed).unwrap();
        assert_eq!(root.node_count(), 1);
    }

    #[test]
    fn test_flat_node_tolerates_null_and_numeric_fields() {
        let parsed: Vec<FlatNode> = serde_json::from_str(
            r#"[{"id":"r","label":"Root"},
                {"id":"b","label":null,"parentId":"r"},
                {"id":7,"label":"Seven","parentId":"r"},
                {"id":"c","label":"C","parentId":7},
                {"id":null,"label":"no id","parentId":null}]"#,
        )
        .unwrap();
        assert_eq!(parsed[1].label, "");
        assert_eq!(parsed[2].id, "7");
        assert_eq!(parsed[3].parent_id.as_deref(), Some("7"));
        assert_eq!(parsed[4].parent_id, None);

        let build = build_hierarchy_with_report(&parsed);
        let root = build.root.unwrap();
        assert_eq!(ids(&root.children), vec!["7"]);
        assert_eq!(ids(&root.children[0].children), vec!["c"]);
        assert_eq!(build.report.count(IssueReason::MissingLabel), 1);
        assert_eq!(build.report.count(IssueReason::MissingId), 1);
    }

    #[test]
    fn test_deep_chain_builds_without_recursion() {
        let depth = 10_000;
        let mut nodes = vec![FlatNode::root("n0", "Level 0")];
        for i in 1..depth {
            nodes.push(FlatNode::child(&format!("n{}", i), &format!("Level {}", i), &format!("n{}", i - 1)));
        }

        let build = build_hierarchy_with_report(&nodes);
        assert!(build.report.is_clean());
        let root = build.root.unwrap();
        assert_eq!(root.node_count(), depth);
        assert_eq!(root.depth(), depth);
        assert!(root.depth() > MAX_DEPTH);
        assert_eq!(root.iter().last().map(|n| n.id.as_str()), Some("n9999"));
        drop(root);
    }

    #[test]
    fn test_depth_counts_longest_branch() {
        let nodes = vec![
            FlatNode::root("r", "Root"),
            FlatNode::child("a", "A", "r"),
            FlatNode::child("b", "B", "r"),
            FlatNode::child("b1", "B1", "b"),
            FlatNode::child("b2", "B2", "b1"),
        ];
        let root = build_hierarchy(&nodes).unwrap();
        assert_eq!(root.depth(), 4);
        assert_eq!(root.children[0].depth(), 1);
    }

    #[test]
    fn test_tree_node_find_and_iter() {
        let nodes = vec![
            FlatNode::root("r", "Root"),
            FlatNode::child("a", "A", "r"),
            FlatNode::child("b", "B", "r"),
            FlatNode::child("a1", "A1", "a"),
        ];
        let root = build_hierarchy(&nodes).unwrap();
        let order: Vec<&str> = root.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["r", "a", "a1", "b"]);
        assert_eq!(root.find("a1").map(|n| n.label.as_str()), Some("A1"));
        assert!(root.find("zzz").is_none());
    }
}
