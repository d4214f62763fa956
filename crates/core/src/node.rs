//! The host-supplied content tree.
//!
//! Extraction never talks to a rendering engine directly. The host page (a
//! browser adapter, a PDF text layer, a test fixture) hands the extractor a
//! tree of [`ContentNode`]s carrying the tag name, the direct text runs, and
//! the handful of precomputed geometry facts the heuristics query: hidden,
//! fixed-position, right-floated, horizontal offset. The tree is read-only
//! to the core.
//!
//! # Example
//!
//! ```rust
//! use recito_core::node::ContentNode;
//!
//! let body = ContentNode::new("body")
//!     .child(ContentNode::with_text("h1", "Title"))
//!     .child(ContentNode::with_text("p", "A paragraph of article text."));
//! assert_eq!(body.children.len(), 2);
//! ```

use serde::{Deserialize, Serialize};

/// Precomputed layout facts for one node, supplied by the host.
///
/// These stand in for the CSS/geometry queries the original heuristics make
/// (`:hidden`, `position: fixed`, `float: right`, bounding offset). All of
/// them default to "plainly visible".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layout {
    /// The node is not rendered at all.
    #[serde(default)]
    pub hidden: bool,
    /// The node is fixed-position chrome (toolbars, cookie banners).
    #[serde(default)]
    pub fixed: bool,
    /// The node floats to the right (sidebars, pull quotes).
    #[serde(default)]
    pub float_right: bool,
    /// Horizontal offset of the node's box; negative means off-screen left.
    #[serde(default)]
    pub left_offset: f32,
}

/// One node of the host's visually laid-out content tree.
///
/// `runs` holds the node's *direct* text runs in document order, with the
/// original line structure preserved (blank runs and embedded blank lines
/// mark paragraph boundaries). Child nodes carry their own runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentNode {
    /// Lowercase tag or role name ("p", "div", "h2", ...).
    pub tag: String,
    /// Geometry and visibility facts for this node.
    #[serde(default)]
    pub layout: Layout,
    /// True for anchor nodes that navigate somewhere (`a[href]`).
    #[serde(default)]
    pub link: bool,
    /// Direct text runs owned by this node.
    #[serde(default)]
    pub runs: Vec<String>,
    /// Ordered child nodes. For frame nodes these are the framed body's
    /// children.
    #[serde(default)]
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    /// Creates an empty node with the given tag.
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            layout: Layout::default(),
            link: false,
            runs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates a node with a single text run.
    pub fn with_text(tag: &str, text: &str) -> Self {
        Self::new(tag).text(text)
    }

    /// Appends a direct text run.
    pub fn text(mut self, run: &str) -> Self {
        self.runs.push(run.to_string());
        self
    }

    /// Appends a child node.
    pub fn child(mut self, child: ContentNode) -> Self {
        self.children.push(child);
        self
    }

    /// Marks the node hidden.
    pub fn hidden(mut self) -> Self {
        self.layout.hidden = true;
        self
    }

    /// Marks the node fixed-position.
    pub fn fixed(mut self) -> Self {
        self.layout.fixed = true;
        self
    }

    /// Marks the node right-floated.
    pub fn float_right(mut self) -> Self {
        self.layout.float_right = true;
        self
    }

    /// Sets the node's horizontal offset.
    pub fn left_offset(mut self, offset: f32) -> Self {
        self.layout.left_offset = offset;
        self
    }

    /// Marks the node as a navigating anchor.
    pub fn link(mut self) -> Self {
        self.link = true;
        self
    }

    /// Heading nesting level, 1 through 6, if this is a heading node.
    pub fn heading_level(&self) -> Option<u8> {
        match self.tag.as_str() {
            "h1" => Some(1),
            "h2" => Some(2),
            "h3" => Some(3),
            "h4" => Some(4),
            "h5" => Some(5),
            "h6" => Some(6),
            _ => None,
        }
    }

    /// Total character count of the node's direct text runs, trimmed.
    pub fn direct_text_len(&self) -> usize {
        self.runs.iter().map(|r| r.trim().chars().count()).sum()
    }

    /// The node's visible inner text: direct runs and visible descendant
    /// text joined with line breaks, document order.
    ///
    /// Superscript nodes (footnote markers) are skipped so they never reach
    /// the synthesized speech, matching how the original hides `sup`
    /// elements before reading a block.
    pub fn inner_text(&self) -> String {
        let mut pieces = Vec::new();
        self.collect_text(&mut pieces);
        pieces.join("\n")
    }

    fn collect_text(&self, pieces: &mut Vec<String>) {
        if self.layout.hidden || self.tag == "sup" {
            return;
        }
        for run in &self.runs {
            pieces.push(run.clone());
        }
        for child in &self.children {
            child.collect_text(pieces);
        }
    }
}

/// List and definition containers whose items are read one at a time.
pub const LIST_TAGS: &[&str] = &["ol", "ul", "dl", "dir"];

/// Frame tags; the walk descends into their framed content transparently.
pub const FRAME_TAGS: &[&str] = &["frame", "iframe"];

/// List item tags considered independently-readable children.
pub const LIST_ITEM_TAGS: &[&str] = &["li", "dt", "dd"];

/// Tags pruned before descent: form controls, scripts, struck-out text,
/// media, navigation.
pub const IGNORED_TAGS: &[&str] = &[
    "fieldset", "input", "select", "textarea", "button", "datalist", "output", "audio", "video", "colgroup", "del",
    "dialog", "embed", "label", "map", "menu", "nav", "noframes", "noscript", "object", "ruby", "s", "script",
    "strike", "style",
];

/// Generic containers the walk descends into looking for text blocks.
pub const CONTAINER_TAGS: &[&str] = &[
    "body", "frameset", "form", "div", "span", "header", "footer", "main", "section", "article", "summary", "thead",
    "tfoot", "tbody", "tr", "th", "td",
];

impl ContentNode {
    /// True if this node is a list/definition container.
    pub fn is_list(&self) -> bool {
        LIST_TAGS.contains(&self.tag.as_str())
    }

    /// True if this node is a frame or sub-document.
    pub fn is_frame(&self) -> bool {
        FRAME_TAGS.contains(&self.tag.as_str())
    }

    /// True if this node is a generic container to descend into.
    pub fn is_container(&self) -> bool {
        CONTAINER_TAGS.contains(&self.tag.as_str())
    }

    /// True if this node (and its subtree) is pruned before descent.
    pub fn is_ignored(&self) -> bool {
        IGNORED_TAGS.contains(&self.tag.as_str())
            || (self.tag == "a" && self.link)
            || self.layout.hidden
            || self.layout.fixed
            || self.layout.float_right
            || self.layout.left_offset < 0.0
    }
}
