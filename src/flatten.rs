//! Depth-first linearization of a mind-map tree for tabular export

use crate::hierarchy::TreeNode;
use serde::{Deserialize, Serialize};

/// One row of the flattened tree. Column order matches the CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRow {
    pub level: usize,
    pub id: String,
    pub label: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<String>,
}

/// Pre-order walk from `root` (level 0). Children are visited in stored
/// order, each one level deeper than its parent. One row per node.
pub fn flatten(root: &TreeNode) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    let mut stack = vec![(root, 0usize)];

    while let Some((node, level)) = stack.pop() {
        rows.push(FlatRow {
            level,
            id: node.id.clone(),
            label: node.label.clone(),
            parent_id: node.parent_id.clone(),
        });
        for child in node.children.iter().rev() {
            stack.push((child, level + 1));
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{build_hierarchy, FlatNode};
    use std::collections::HashMap;

    /// Deterministic pseudo-random flat lists, including junk records
    fn synthetic_inputs() -> Vec<Vec<FlatNode>> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state % bound
        };

        (0..60)
            .map(|_| {
                let len = next(25) as usize;
                (0..len)
                    .map(|_| {
                        let id = match next(10) {
                            0 => String::new(),
                            n => format!("n{}", next(12) + n),
                        };
                        let label = if next(9) == 0 { String::new() } else { format!("L{}", next(100)) };
                        let parent_id = match next(4) {
                            0 => None,
                            1 => Some(String::new()),
                            _ => Some(format!("n{}", next(24))),
                        };
                        FlatNode { id, label, parent_id }
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_flatten_example() {
        let nodes = vec![
            FlatNode::root("a", "Root"),
            FlatNode::child("b", "Child1", "a"),
            FlatNode::child("c", "Child2", "a"),
        ];
        let rows = flatten(&build_hierarchy(&nodes).unwrap());
        assert_eq!(rows, vec![
            FlatRow { level: 0, id: "a".into(), label: "Root".into(), parent_id: None },
            FlatRow { level: 1, id: "b".into(), label: "Child1".into(), parent_id: Some("a".into()) },
            FlatRow { level: 1, id: "c".into(), label: "Child2".into(), parent_id: Some("a".into()) },
        ]);
    }

    #[test]
    fn test_flatten_is_preorder() {
        let nodes = vec![
            FlatNode::root("r", "R"),
            FlatNode::child("a", "A", "r"),
            FlatNode::child("b", "B", "r"),
            FlatNode::child("a1", "A1", "a"),
            FlatNode::child("a2", "A2", "a"),
            FlatNode::child("a1x", "A1x", "a1"),
        ];
        let rows = flatten(&build_hierarchy(&nodes).unwrap());
        let order: Vec<(&str, usize)> = rows.iter().map(|r| (r.id.as_str(), r.level)).collect();
        assert_eq!(order, vec![("r", 0), ("a", 1), ("a1", 2), ("a1x", 3), ("a2", 2), ("b", 1)]);
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let nodes = vec![FlatNode::root("r", "R"), FlatNode::child("a", "A", "r")];
        let root = build_hierarchy(&nodes).unwrap();
        assert_eq!(flatten(&root), flatten(&root));
    }

    #[test]
    fn test_flatten_deep_chain() {
        let mut nodes = vec![FlatNode::root("n0", "L0")];
        for i in 1..10_000 {
            nodes.push(FlatNode::child(&format!("n{}", i), "L", &format!("n{}", i - 1)));
        }
        let rows = flatten(&build_hierarchy(&nodes).unwrap());
        assert_eq!(rows.len(), 10_000);
        assert_eq!(rows.last().map(|r| r.level), Some(9_999));
    }

    #[test]
    fn test_flatten_carries_dangling_parent_of_root() {
        let nodes = vec![FlatNode::child("x", "Orphan", "missing")];
        let rows = flatten(&build_hierarchy(&nodes).unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level, 0);
        assert_eq!(rows[0].parent_id.as_deref(), Some("missing"));
    }

    #[test]
    fn test_flatten_length_bounded_by_valid_records() {
        for nodes in synthetic_inputs() {
            let Some(root) = build_hierarchy(&nodes) else {
                assert!(nodes.iter().all(|n| n.id.is_empty() || n.label.is_empty()));
                continue;
            };
            let rows = flatten(&root);
            let mut valid_ids: Vec<&str> =
                nodes.iter().filter(|n| !n.id.is_empty() && !n.label.is_empty()).map(|n| n.id.as_str()).collect();
            valid_ids.sort_unstable();
            valid_ids.dedup();
            assert!(rows.len() <= valid_ids.len());
            assert_eq!(rows.len(), root.node_count());
        }
    }

    #[test]
    fn test_flatten_levels_follow_parents() {
        for nodes in synthetic_inputs() {
            let Some(root) = build_hierarchy(&nodes) else { continue };
            let rows = flatten(&root);
            assert_eq!(rows[0].level, 0);
            assert_eq!(rows[0].id, root.id);

            let mut level_of: HashMap<&str, usize> = HashMap::new();
            for row in &rows {
                assert!(level_of.insert(row.id.as_str(), row.level).is_none(), "id repeated");
                if row.level > 0 {
                    let parent = row.parent_id.as_deref().unwrap();
                    assert_eq!(level_of[parent] + 1, row.level);
                }
            }
        }
    }
}
