//! Tidy-tree layout for rendering a mind map
//!
//! Linear-time Reingold–Tilford layout with Walker's improvements as
//! described by Buchheim, Jünger and Leipert. Output matches d3's `tree()`
//! with a fixed node size: siblings sit one breadth unit apart, cousins two,
//! a parent is centered over its first and last child, and every depth level
//! is one depth unit further from the root.
//!
//! After layout the whole tree is translated (never scaled) so that the
//! bounding rectangle of the node boxes starts at `padding` on both axes.

use crate::hierarchy::TreeNode;
use serde::{Deserialize, Serialize};

/// Which axis depth grows along.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Root on the left, children to the right
    #[default]
    Horizontal,
    /// Root on top, children below
    Vertical,
}

/// Box size and spacing constants. Defaults match the web renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_height: f64,
    /// Gap between depth levels
    pub horizontal_spacing: f64,
    /// Gap between neighbouring siblings
    pub vertical_spacing: f64,
    pub padding: f64,
    pub orientation: Orientation,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 176.0,
            node_height: 112.0,
            horizontal_spacing: 90.0,
            vertical_spacing: 40.0,
            padding: 50.0,
            orientation: Orientation::Horizontal,
        }
    }
}

impl LayoutConfig {
    /// Distance between adjacent siblings (breadth axis)
    pub fn breadth_step(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => self.node_height + self.vertical_spacing,
            Orientation::Vertical => self.node_width + self.horizontal_spacing,
        }
    }

    /// Distance between depth levels (depth axis)
    pub fn depth_step(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => self.node_width + self.horizontal_spacing,
            Orientation::Vertical => self.node_height + self.vertical_spacing,
        }
    }
}

/// Node center in screen coordinates (x to the right, y down).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedNode {
    pub id: String,
    pub label: String,
    pub depth: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Parent -> child connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub source_id: String,
    pub target_id: String,
    pub source: Point,
    pub target: Point,
    pub orientation: Orientation,
}

impl Link {
    /// Cubic Bézier path leaving the source and entering the target along
    /// the depth axis (d3 `linkHorizontal` / `linkVertical`).
    pub fn svg_path(&self) -> String {
        let (s, t) = (self.source, self.target);
        match self.orientation {
            Orientation::Horizontal => {
                let mid = (s.x + t.x) / 2.0;
                format!("M{},{}C{},{},{},{},{},{}", s.x, s.y, mid, s.y, mid, t.y, t.x, t.y)
            }
            Orientation::Vertical => {
                let mid = (s.y + t.y) / 2.0;
                format!("M{},{}C{},{},{},{},{},{}", s.x, s.y, s.x, mid, t.x, mid, t.x, t.y)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeLayout {
    /// Pre-order, root first
    pub nodes: Vec<PositionedNode>,
    pub links: Vec<Link>,
    pub width: f64,
    pub height: f64,
}

impl TreeLayout {
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ============================================================================
// Buchheim walk
// ============================================================================

/// Arena copy of the tree with the per-node bookkeeping the walk needs.
/// Field names follow the paper: prelim, modifier, change, shift, thread,
/// ancestor, and the default ancestor kept on the parent.
struct Walk<'a> {
    nodes: Vec<&'a TreeNode>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    /// Position among siblings
    number: Vec<usize>,
    depth: Vec<usize>,
    prelim: Vec<f64>,
    modifier: Vec<f64>,
    change: Vec<f64>,
    shift: Vec<f64>,
    thread: Vec<Option<usize>>,
    ancestor: Vec<usize>,
    default_ancestor: Vec<Option<usize>>,
    /// Final breadth coordinate in breadth units
    breadth: Vec<f64>,
}

impl<'a> Walk<'a> {
    /// Pre-order arena; index 0 is the root.
    fn new(root: &'a TreeNode) -> Self {
        let mut walk = Walk {
            nodes: Vec::new(),
            parent: Vec::new(),
            children: Vec::new(),
            number: Vec::new(),
            depth: Vec::new(),
            prelim: Vec::new(),
            modifier: Vec::new(),
            change: Vec::new(),
            shift: Vec::new(),
            thread: Vec::new(),
            ancestor: Vec::new(),
            default_ancestor: Vec::new(),
            breadth: Vec::new(),
        };

        let mut stack: Vec<(&TreeNode, Option<usize>, usize, usize)> = vec![(root, None, 0, 0)];
        while let Some((node, parent, number, depth)) = stack.pop() {
            let v = walk.nodes.len();
            walk.nodes.push(node);
            walk.parent.push(parent);
            walk.children.push(Vec::with_capacity(node.children.len()));
            walk.number.push(number);
            walk.depth.push(depth);
            walk.ancestor.push(v);
            if let Some(p) = parent {
                walk.children[p].push(v);
            }
            for (i, child) in node.children.iter().enumerate().rev() {
                stack.push((child, Some(v), i, depth + 1));
            }
        }

        let n = walk.nodes.len();
        walk.prelim = vec![0.0; n];
        walk.modifier = vec![0.0; n];
        walk.change = vec![0.0; n];
        walk.shift = vec![0.0; n];
        walk.thread = vec![None; n];
        walk.default_ancestor = vec![None; n];
        walk.breadth = vec![0.0; n];
        walk
    }

    fn run(&mut self) {
        for v in self.post_order() {
            self.first_walk(v);
        }

        // Virtual parent of the root carries modifier = -prelim(root)
        let root_mod = -self.prelim[0];
        for v in 0..self.nodes.len() {
            let parent_mod = match self.parent[v] {
                Some(p) => self.modifier[p],
                None => root_mod,
            };
            self.breadth[v] = self.prelim[v] + parent_mod;
            self.modifier[v] += parent_mod;
        }
    }

    /// Children before parents, siblings left to right
    fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0usize];
        while let Some(v) = stack.pop() {
            order.push(v);
            stack.extend(self.children[v].iter().copied());
        }
        order.reverse();
        order
    }

    fn separation(&self, a: usize, b: usize) -> f64 {
        if self.parent[a] == self.parent[b] { 1.0 } else { 2.0 }
    }

    fn left_sibling(&self, v: usize) -> Option<usize> {
        let p = self.parent[v]?;
        let i = self.number[v];
        (i > 0).then(|| self.children[p][i - 1])
    }

    fn first_sibling(&self, v: usize) -> usize {
        self.parent[v].map_or(v, |p| self.children[p][0])
    }

    fn next_left(&self, v: usize) -> Option<usize> {
        self.children[v].first().copied().or(self.thread[v])
    }

    fn next_right(&self, v: usize) -> Option<usize> {
        self.children[v].last().copied().or(self.thread[v])
    }

    fn first_walk(&mut self, v: usize) {
        let w = self.left_sibling(v);

        if !self.children[v].is_empty() {
            self.execute_shifts(v);
            let first = self.children[v][0];
            let last = *self.children[v].last().unwrap_or(&first);
            let midpoint = (self.prelim[first] + self.prelim[last]) / 2.0;
            match w {
                Some(w) => {
                    self.prelim[v] = self.prelim[w] + self.separation(v, w);
                    self.modifier[v] = self.prelim[v] - midpoint;
                }
                None => self.prelim[v] = midpoint,
            }
        } else if let Some(w) = w {
            self.prelim[v] = self.prelim[w] + self.separation(v, w);
        }

        if let Some(p) = self.parent[v] {
            let current = self.default_ancestor[p].unwrap_or_else(|| self.children[p][0]);
            let next = self.apportion(v, w, current);
            self.default_ancestor[p] = Some(next);
        }
    }

    fn apportion(&mut self, v: usize, w: Option<usize>, mut default_ancestor: usize) -> usize {
        let Some(w) = w else { return default_ancestor };

        // i = inside, o = outside, p = right contour (v's), m = left contour (w's)
        let mut vip = v;
        let mut vop = v;
        let mut vim = w;
        let mut vom = self.first_sibling(v);
        let mut sip = self.modifier[vip];
        let mut sop = self.modifier[vop];
        let mut sim = self.modifier[vim];
        let mut som = self.modifier[vom];

        let mut next_vim = self.next_right(vim);
        let mut next_vip = self.next_left(vip);
        while let (Some(nim), Some(nip)) = (next_vim, next_vip) {
            vim = nim;
            vip = nip;
            // Both contours continue at this depth, so the outer ones do too
            vom = self.next_left(vom).unwrap_or(vom);
            vop = self.next_right(vop).unwrap_or(vop);
            self.ancestor[vop] = v;

            let shift = self.prelim[vim] + sim - self.prelim[vip] - sip + self.separation(vim, vip);
            if shift > 0.0 {
                let anc = self.next_ancestor(vim, v, default_ancestor);
                self.move_subtree(anc, v, shift);
                sip += shift;
                sop += shift;
            }

            sim += self.modifier[vim];
            sip += self.modifier[vip];
            som += self.modifier[vom];
            sop += self.modifier[vop];

            next_vim = self.next_right(vim);
            next_vip = self.next_left(vip);
        }

        if let Some(nim) = next_vim {
            if self.next_right(vop).is_none() {
                self.thread[vop] = Some(nim);
                self.modifier[vop] += sim - sop;
            }
        }
        if let Some(nip) = next_vip {
            if self.next_left(vom).is_none() {
                self.thread[vom] = Some(nip);
                self.modifier[vom] += sip - som;
                default_ancestor = v;
            }
        }

        default_ancestor
    }

    fn next_ancestor(&self, vim: usize, v: usize, default_ancestor: usize) -> usize {
        let a = self.ancestor[vim];
        if self.parent[a] == self.parent[v] { a } else { default_ancestor }
    }

    fn move_subtree(&mut self, wm: usize, wp: usize, shift: f64) {
        let subtrees = (self.number[wp] - self.number[wm]) as f64;
        let change = shift / subtrees;
        self.change[wp] -= change;
        self.shift[wp] += shift;
        self.change[wm] += change;
        self.prelim[wp] += shift;
        self.modifier[wp] += shift;
    }

    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0;
        let mut change = 0.0;
        for i in (0..self.children[v].len()).rev() {
            let w = self.children[v][i];
            self.prelim[w] += shift;
            self.modifier[w] += shift;
            change += self.change[w];
            shift += self.shift[w] + change;
        }
    }
}

/// Lay out `root` as a tidy tree and shift it into padded, non-negative space.
pub fn layout(root: &TreeNode, config: &LayoutConfig) -> TreeLayout {
    let mut walk = Walk::new(root);
    walk.run();

    let breadth_step = config.breadth_step();
    let depth_step = config.depth_step();

    // Screen coordinates before translation
    let raw: Vec<Point> = (0..walk.nodes.len())
        .map(|v| {
            let b = walk.breadth[v] * breadth_step;
            let d = walk.depth[v] as f64 * depth_step;
            match config.orientation {
                Orientation::Horizontal => Point { x: d, y: b },
                Orientation::Vertical => Point { x: b, y: d },
            }
        })
        .collect();

    let half_w = config.node_width / 2.0;
    let half_h = config.node_height / 2.0;
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in &raw {
        min_x = min_x.min(p.x - half_w);
        min_y = min_y.min(p.y - half_h);
        max_x = max_x.max(p.x + half_w);
        max_y = max_y.max(p.y + half_h);
    }

    let offset_x = config.padding - min_x;
    let offset_y = config.padding - min_y;
    let points: Vec<Point> = raw
        .iter()
        .map(|p| Point { x: p.x + offset_x, y: p.y + offset_y })
        .collect();

    let nodes = (0..walk.nodes.len())
        .map(|v| PositionedNode {
            id: walk.nodes[v].id.clone(),
            label: walk.nodes[v].label.clone(),
            depth: walk.depth[v],
            x: points[v].x,
            y: points[v].y,
        })
        .collect();

    let links = (0..walk.nodes.len())
        .filter_map(|v| {
            let p = walk.parent[v]?;
            Some(Link {
                source_id: walk.nodes[p].id.clone(),
                target_id: walk.nodes[v].id.clone(),
                source: points[p],
                target: points[v],
                orientation: config.orientation,
            })
        })
        .collect();

    TreeLayout {
        nodes,
        links,
        width: max_x - min_x + 2.0 * config.padding,
        height: max_y - min_y + 2.0 * config.padding,
    }
}
