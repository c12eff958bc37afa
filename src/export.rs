//! File encoders for a stored map: CSV of the flattened tree, the JSON
//! document itself, and an SVG drawing of the tidy-tree layout.

use crate::db::MindMap;
use crate::error::{CogmapError, Result};
use crate::flatten::{flatten, FlatRow};
use crate::hierarchy::{build_hierarchy, TreeNode};
use crate::layout::{layout, LayoutConfig, TreeLayout};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

pub const CSV_COLUMNS: [&str; 4] = ["level", "id", "label", "parentId"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Svg,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Svg => "svg",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            "svg" => Some(ExportFormat::Svg),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Svg => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

/// An encoded export ready to be written or served
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub body: String,
}

/// Download name: title with spaces replaced, or `mind-map` when untitled.
pub fn file_name(title: &str, format: ExportFormat) -> String {
    let stem = title.trim().replace(' ', "_");
    let stem = if stem.is_empty() { "mind-map".to_string() } else { stem };
    format!("{}.{}", stem, format.extension())
}

/// Encode `map` in `format`. CSV and SVG need a tree; an unbuildable node
/// list is an error there, while JSON always succeeds.
pub fn export_map(map: &MindMap, format: ExportFormat, config: &LayoutConfig) -> Result<ExportedFile> {
    let body = match format {
        ExportFormat::Json => to_json(map)?,
        ExportFormat::Csv => to_csv(&tree_of(map)?),
        ExportFormat::Svg => to_svg(&layout(&tree_of(map)?, config), config),
    };
    Ok(ExportedFile {
        file_name: file_name(&map.title, format),
        mime_type: format.mime_type(),
        body,
    })
}

fn tree_of(map: &MindMap) -> Result<TreeNode> {
    build_hierarchy(&map.nodes).ok_or(CogmapError::Unbuildable)
}

// ============================================================================
// JSON
// ============================================================================

/// The map document as stored (flat `nodes`, not the tree)
pub fn to_json(map: &MindMap) -> Result<String> {
    Ok(serde_json::to_string_pretty(map)?)
}

// ============================================================================
// CSV
// ============================================================================

/// Header plus one row per flattened node, CRLF-terminated
pub fn to_csv(root: &TreeNode) -> String {
    rows_to_csv(&flatten(root))
}

pub fn rows_to_csv(rows: &[FlatRow]) -> String {
    let mut output = CSV_COLUMNS.join(",");
    output.push_str("\r\n");
    for row in rows {
        let fields = [
            row.level.to_string(),
            escape_csv(&row.id),
            escape_csv(&row.label),
            row.parent_id.as_deref().map(escape_csv).unwrap_or_default(),
        ];
        output.push_str(&fields.join(","));
        output.push_str("\r\n");
    }
    output
}

fn escape_csv(s: &str) -> String {
    let needs_quotes = s.contains([',', '"', '\n', '\r'])
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace);
    if needs_quotes {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// ============================================================================
// SVG
// ============================================================================

const LABEL_LINE_CHARS: usize = 22;
const LABEL_MAX_LINES: usize = 4;
const LABEL_LINE_HEIGHT: f64 = 18.0;

/// Standalone SVG with one rounded box per node and one curve per link.
pub fn to_svg(tree: &TreeLayout, config: &LayoutConfig) -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = tree.width,
        h = tree.height
    );
    svg.push_str(r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
    svg.push('\n');

    svg.push_str(r##"<g fill="none" stroke="#94a3b8" stroke-width="2">"##);
    svg.push('\n');
    for link in &tree.links {
        let _ = writeln!(svg, r#"<path d="{}"/>"#, link.svg_path());
    }
    svg.push_str("</g>\n");

    let (w, h) = (config.node_width, config.node_height);
    for node in &tree.nodes {
        let fill = if node.depth == 0 { "#4f46e5" } else { "#eef2ff" };
        let ink = if node.depth == 0 { "#ffffff" } else { "#1e1b4b" };
        let _ = writeln!(svg, r#"<g data-id="{}">"#, html_escape::encode_double_quoted_attribute(&node.id));
        let _ = writeln!(
            svg,
            r##"<rect x="{}" y="{}" width="{}" height="{}" rx="12" fill="{}" stroke="#6366f1"/>"##,
            node.x - w / 2.0,
            node.y - h / 2.0,
            w,
            h,
            fill
        );

        let lines = wrap_label(&node.label);
        let first_y = node.y - LABEL_LINE_HEIGHT * (lines.len() as f64 - 1.0) / 2.0;
        let _ = write!(
            svg,
            r#"<text x="{}" text-anchor="middle" dominant-baseline="middle" font-family="sans-serif" font-size="14" fill="{}">"#,
            node.x, ink
        );
        for (i, line) in lines.iter().enumerate() {
            let _ = write!(
                svg,
                r#"<tspan x="{}" y="{}">{}</tspan>"#,
                node.x,
                first_y + i as f64 * LABEL_LINE_HEIGHT,
                html_escape::encode_text(line)
            );
        }
        svg.push_str("</text>\n</g>\n");
    }

    svg.push_str("</svg>\n");
    svg
}

/// Greedy word wrap; the last line gets an ellipsis when text is cut.
fn wrap_label(label: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in label.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > LABEL_LINE_CHARS {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > LABEL_MAX_LINES {
        lines.truncate(LABEL_MAX_LINES);
        if let Some(last) = lines.last_mut() {
            last.push('…');
        }
    }
    lines
}
