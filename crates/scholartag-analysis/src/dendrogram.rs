//! Dendrogram rendering: a horizontal SVG tree and a plain-text merge listing.

use std::fmt::Write as _;

use crate::cluster::{Dendrogram, Node};

/// Shorten `label` to at most `width` characters, ending in `...` when cut.
pub fn truncate_label(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        return label.to_string();
    }
    if width < 3 {
        return label.chars().take(width).collect();
    }
    let mut out: String = label.chars().take(width - 3).collect();
    out.push_str("...");
    out
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Maximum leaf label length in characters.
    pub label_width: usize,
    /// Vertical distance between leaves, in pixels.
    pub row_height: u32,
    /// Width of the tree area (excluding labels), in pixels.
    pub tree_width: u32,
    /// Approximate advance of one label character, in pixels.
    pub char_width: u32,
    pub title: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            label_width: 40,
            row_height: 18,
            tree_width: 480,
            char_width: 7,
            title: None,
        }
    }
}

const MARGIN: f64 = 20.0;
const AXIS_HEIGHT: f64 = 30.0;

/// Render a horizontal dendrogram: leaves stacked on the left, merge height
/// growing to the right.
pub fn render_svg(tree: &Dendrogram, options: &RenderOptions) -> String {
    let order = tree.leaf_order();
    let labels: Vec<String> = tree
        .labels
        .iter()
        .map(|l| truncate_label(l, options.label_width))
        .collect();

    let label_px = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0) as f64
        * options.char_width as f64;
    let title_px = if options.title.is_some() { 24.0 } else { 0.0 };
    let row = options.row_height as f64;
    let top = MARGIN + title_px;
    let tree_left = MARGIN + label_px + 8.0;
    let tree_width = options.tree_width as f64;
    let width = tree_left + tree_width + MARGIN;
    let height = top + row * order.len().max(1) as f64 + AXIS_HEIGHT + MARGIN;

    let max_height = tree.max_height();
    let x_of = |h: f64| {
        if max_height > 0.0 {
            tree_left + h / max_height * tree_width
        } else {
            tree_left
        }
    };

    let mut leaf_y = vec![0.0; tree.n_leaves()];
    for (slot, &leaf) in order.iter().enumerate() {
        leaf_y[leaf] = top + row * (slot as f64 + 0.5);
    }

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    if let Some(title) = &options.title {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="14" font-weight="bold">{}</text>"#,
            MARGIN,
            MARGIN + 12.0,
            escape_xml(title)
        );
    }

    for &leaf in &order {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end" dominant-baseline="middle">{}</text>"#,
            tree_left - 6.0,
            leaf_y[leaf],
            escape_xml(&labels[leaf])
        );
    }

    // Each merge's (x, y) anchor, filled in merge order.
    let mut anchors: Vec<(f64, f64)> = Vec::with_capacity(tree.merges.len());
    let anchor = |node: Node, anchors: &[(f64, f64)]| match node {
        Node::Leaf(i) => (tree_left, leaf_y[i]),
        Node::Cluster(m) => anchors[m],
    };
    let _ = writeln!(svg, r#"<g stroke="black" stroke-width="1" fill="none">"#);
    for merge in &tree.merges {
        let (lx, ly) = anchor(merge.left, &anchors);
        let (rx, ry) = anchor(merge.right, &anchors);
        let x = x_of(merge.height);
        let _ = writeln!(
            svg,
            r#"<path d="M{lx:.1},{ly:.1}H{x:.1}V{ry:.1}H{rx:.1}"/>"#
        );
        anchors.push((x, (ly + ry) / 2.0));
    }
    let _ = writeln!(svg, "</g>");

    // Height axis along the bottom.
    let axis_y = top + row * order.len().max(1) as f64 + 8.0;
    let _ = writeln!(
        svg,
        r#"<line x1="{:.1}" y1="{axis_y:.1}" x2="{:.1}" y2="{axis_y:.1}" stroke="gray"/>"#,
        tree_left,
        tree_left + tree_width
    );
    for step in 0..=4 {
        let h = max_height * step as f64 / 4.0;
        let x = x_of(h);
        let _ = writeln!(
            svg,
            r#"<line x1="{x:.1}" y1="{axis_y:.1}" x2="{x:.1}" y2="{:.1}" stroke="gray"/>"#,
            axis_y + 4.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{x:.1}" y="{:.1}" text-anchor="middle" font-size="10" fill="gray">{h:.2}</text>"#,
            axis_y + 16.0
        );
        if max_height == 0.0 {
            break;
        }
    }

    svg.push_str("</svg>\n");
    svg
}

/// One line per merge: step, height, size, and the two joined nodes.
///
/// Leaves print as their (truncated) label, earlier merges as `#<step>`.
pub fn render_text(tree: &Dendrogram, label_width: usize) -> String {
    let name = |node: Node| match node {
        Node::Leaf(i) => truncate_label(&tree.labels[i], label_width),
        Node::Cluster(m) => format!("#{}", m + 1),
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:>8}  {:>4}  {:<w$}  {}",
        "step",
        "height",
        "size",
        "left",
        "right",
        w = label_width
    );
    for (i, merge) in tree.merges.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>5}  {:>8.4}  {:>4}  {:<w$}  {}",
            i + 1,
            merge.height,
            merge.size,
            name(merge.left),
            name(merge.right),
            w = label_width
        );
    }
    out
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
