//! Heuristic text extraction from a content tree.
//!
//! This is the article-versus-boilerplate decision: given a host-supplied
//! [`ContentNode`] tree with no markup contract, pick the nodes that are
//! "the article", reject navigation/ads/footers, and emit an ordered list
//! of speakable strings.
//!
//! The pipeline:
//! 1. A pruned top-down walk collects candidate text blocks (direct text
//!    runs above a length threshold, or list containers with a qualifying
//!    item). Frames are descended transparently; ignored/hidden/floated
//!    nodes are pruned with their subtrees.
//! 2. The first pass favors genuine paragraphs (threshold 100). When the
//!    page turns out to be mostly short fragments, a second pass with a
//!    tiny threshold runs and statistical edge trimming clips long one-off
//!    outlier blocks (menus, copyright blurbs) off the head and tail.
//! 3. Section context is reconstructed by prepending the trail of headings
//!    preceding each retained block.
//! 4. Blocks are rendered: ordered lists numbered, footnote markers
//!    suppressed, multi-item blocks one string per child, plain blocks
//!    split into paragraphs on blank-line runs.
//!
//! The thresholds are empirically tuned values carried over from long use;
//! they are configuration, not derivation.

use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use tracing::debug;

use crate::node::{ContentNode, LIST_ITEM_TAGS};

/// Blank-line runs that separate paragraphs inside one block of text.
static PARA_SPLITTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\s*\r?\n\s*){2,}").unwrap());

/// A word character directly before a line break; such lines get a period
/// so the synthesizer pauses where the layout implied a boundary.
static MISSING_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\w)(\s*?\r?\n)").unwrap());

/// Configuration for text extraction.
///
/// The defaults are the tuned values of the original heuristic; change them
/// only with page corpora in hand.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Minimum direct-text length for a node to qualify as a block on the
    /// first pass.
    pub block_char_threshold: usize,
    /// Threshold for the second pass on fragment-heavy pages.
    pub fallback_char_threshold: usize,
    /// Total captured characters below which the fallback pass runs.
    pub min_total_chars: usize,
    /// Edge blocks longer than mean + sigma * stdev of their neighbors are
    /// trimmed as boilerplate.
    pub outlier_sigma: f64,
    /// How many blocks from each edge the outlier scan examines, and the
    /// size of the neighboring sample window.
    pub edge_window: usize,
    /// Tables wider than this many columns become multi-blocks instead of
    /// containers to descend.
    pub max_table_columns: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            block_char_threshold: 100,
            fallback_char_threshold: 3,
            min_total_chars: 1000,
            outlier_sigma: 2.0,
            edge_window: 10,
            max_table_columns: 3,
        }
    }
}

/// Diagnostic summary of one retained text block.
#[derive(Debug, Clone)]
pub struct BlockOutline {
    /// Tag of the selected node.
    pub tag: String,
    /// Character count of the block's readable text.
    pub chars: usize,
    /// Whether the block emits one string per child item.
    pub multi: bool,
}

/// One entry of the flattened, pruned walk: either a heading available for
/// trail reconstruction or a selected text block.
enum Entry<'a> {
    Heading { level: u8, text: String },
    Block(TextBlock<'a>),
}

/// A node selected as a unit of readable text. Transient; discarded once
/// the page's strings are produced.
struct TextBlock<'a> {
    node: &'a ContentNode,
    multi: bool,
    len: usize,
}

/// Extracts the ordered speakable strings for one page with default
/// configuration.
pub fn extract_texts(root: &ContentNode) -> Vec<String> {
    extract_texts_with_config(root, &ExtractConfig::default())
}

/// Extracts the ordered speakable strings for one page.
///
/// A page producing zero text blocks yields an empty vector; callers read
/// that as "no text here", not as an error.
pub fn extract_texts_with_config(root: &ContentNode, config: &ExtractConfig) -> Vec<String> {
    let start = Instant::now();
    let mut entries = run_pass(root, config.block_char_threshold, config);

    let total: usize = blocks_of(&entries).map(|b| b.len).sum();
    if total < config.min_total_chars {
        // Fragment-heavy page: re-walk with the tiny threshold, then clip
        // statistical outliers off both edges.
        entries = run_pass(root, config.fallback_char_threshold, config);
        trim_edge_outliers(&mut entries, config);
    }

    let texts = render_entries(&entries);
    debug!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        blocks = blocks_of(&entries).count(),
        strings = texts.len(),
        "walked content tree"
    );
    texts
}

/// Diagnostic view of which blocks extraction retained, in order. The
/// transient equivalent of the original's visual block marking.
pub fn extract_outline(root: &ContentNode, config: &ExtractConfig) -> Vec<BlockOutline> {
    let mut entries = run_pass(root, config.block_char_threshold, config);
    let total: usize = blocks_of(&entries).map(|b| b.len).sum();
    if total < config.min_total_chars {
        entries = run_pass(root, config.fallback_char_threshold, config);
        trim_edge_outliers(&mut entries, config);
    }
    blocks_of(&entries)
        .map(|b| BlockOutline { tag: b.node.tag.clone(), chars: b.len, multi: b.multi })
        .collect()
}

fn blocks_of<'a, 'b>(entries: &'b [Entry<'a>]) -> impl Iterator<Item = &'b TextBlock<'a>> {
    entries.iter().filter_map(|e| match e {
        Entry::Block(b) => Some(b),
        Entry::Heading { .. } => None,
    })
}

fn run_pass<'a>(root: &'a ContentNode, threshold: usize, config: &ExtractConfig) -> Vec<Entry<'a>> {
    let mut entries = Vec::new();
    walk(root, threshold, config, &mut entries);
    entries
}

fn walk<'a>(node: &'a ContentNode, threshold: usize, config: &ExtractConfig, out: &mut Vec<Entry<'a>>) {
    if node.is_ignored() {
        return;
    }
    if node.is_frame() {
        for child in &node.children {
            walk(child, threshold, config, out);
        }
        return;
    }
    // Headings are classified before the length test; on the low-threshold
    // fallback pass they would otherwise qualify as text blocks and the
    // trail reconstruction would lose them.
    if let Some(level) = node.heading_level() {
        let text = node.inner_text().trim().to_string();
        if !text.is_empty() {
            out.push(Entry::Heading { level, text });
        }
        return;
    }
    if node.tag == "table" {
        walk_table(node, threshold, config, out);
        return;
    }
    if is_text_block(node, threshold) {
        let multi = node.is_list();
        let len = node.inner_text().trim().chars().count();
        out.push(Entry::Block(TextBlock { node, multi, len }));
        return;
    }
    if node.is_container() {
        for child in &node.children {
            walk(child, threshold, config, out);
        }
    }
}

/// Narrow tables are containers to descend into; wide ones are read as one
/// multi-block, a row at a time, provided any row actually carries text.
fn walk_table<'a>(node: &'a ContentNode, threshold: usize, config: &ExtractConfig, out: &mut Vec<Entry<'a>>) {
    let columns = table_rows(node).map(|row| table_cells(row).count()).max().unwrap_or(0);
    if columns <= config.max_table_columns {
        for child in &node.children {
            walk(child, threshold, config, out);
        }
        return;
    }
    let any_text = table_rows(node)
        .flat_map(table_cells)
        .any(|cell| cell.inner_text().trim().chars().count() >= threshold);
    if any_text {
        let len = node.inner_text().trim().chars().count();
        out.push(Entry::Block(TextBlock { node, multi: true, len }));
    }
}

fn table_rows(table: &ContentNode) -> impl Iterator<Item = &ContentNode> {
    table.children.iter().flat_map(|child| {
        if matches!(child.tag.as_str(), "thead" | "tbody" | "tfoot") {
            child.children.iter().collect::<Vec<_>>()
        } else {
            vec![child]
        }
    })
    .filter(|n| n.tag == "tr")
}

fn table_cells(row: &ContentNode) -> impl Iterator<Item = &ContentNode> {
    row.children.iter().filter(|n| matches!(n.tag.as_str(), "td" | "th"))
}

fn is_text_block(node: &ContentNode, threshold: usize) -> bool {
    if node.direct_text_len() >= threshold {
        return true;
    }
    node.is_list()
        && node.children.iter().any(|child| {
            LIST_ITEM_TAGS.contains(&child.tag.as_str())
                && !child.layout.hidden
                && child.inner_text().trim().chars().count() >= threshold
        })
}

/// Clips boilerplate off the edges of the block list.
///
/// Scanning inward from each edge (at most `edge_window` blocks deep), a
/// block whose length exceeds mean + sigma * stdev of the next
/// `edge_window` blocks is an outlier boundary: everything from that edge
/// up to and including it is dropped. The scan stops at the first outlier
/// it finds, so a long paragraph deep inside the article is never touched.
fn trim_edge_outliers(entries: &mut Vec<Entry<'_>>, config: &ExtractConfig) {
    let lengths: Vec<usize> = blocks_of(entries).map(|b| b.len).collect();
    let n = lengths.len();
    if n < 4 {
        return;
    }

    let head = edge_cut(&lengths, config);
    let mut reversed = lengths.clone();
    reversed.reverse();
    let tail = edge_cut(&reversed, config);
    if head + tail >= n || (head == 0 && tail == 0) {
        return;
    }

    let mut block_pos = 0usize;
    entries.retain(|entry| match entry {
        // A heading inside the clipped head region described boilerplate;
        // it must not end up in the first kept block's trail.
        Entry::Heading { .. } => block_pos >= head,
        Entry::Block(_) => {
            let keep = block_pos >= head && block_pos < n - tail;
            block_pos += 1;
            keep
        }
    });
    debug!(head, tail, kept = n - head - tail, "trimmed edge outliers");
}

/// Index just past the first outlier within the leading edge window, or 0.
fn edge_cut(lengths: &[usize], config: &ExtractConfig) -> usize {
    let n = lengths.len();
    for i in 0..config.edge_window.min(n) {
        let sample_end = (i + 1 + config.edge_window).min(n);
        let sample = &lengths[i + 1..sample_end];
        if sample.len() < 3 {
            break;
        }
        let (mean, stdev) = mean_stdev(sample);
        if lengths[i] as f64 > mean + config.outlier_sigma * stdev {
            return i + 1;
        }
    }
    0
}

fn mean_stdev(values: &[usize]) -> (f64, f64) {
    let count = values.len() as f64;
    let mean = values.iter().sum::<usize>() as f64 / count;
    let variance = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / count;
    (mean, variance.sqrt())
}

/// Renders entries to strings, prepending each block's heading trail.
fn render_entries(entries: &[Entry<'_>]) -> Vec<String> {
    let mut texts = Vec::new();
    let mut prev_block = None;

    for (pos, entry) in entries.iter().enumerate() {
        let Entry::Block(block) = entry else { continue };
        for heading in heading_trail(entries, prev_block, pos) {
            texts.push(heading);
        }
        texts.extend(block_texts(block));
        prev_block = Some(pos);
    }

    texts.retain(|t| !t.trim().is_empty());
    texts
}

/// Walks backward from a block to the previous retained block (or page
/// start), collecting headings whose level strictly decreases as the walk
/// proceeds outward. Returned in document order.
fn heading_trail(entries: &[Entry<'_>], prev_block: Option<usize>, pos: usize) -> Vec<String> {
    let floor = prev_block.map(|p| p + 1).unwrap_or(0);
    let mut trail = Vec::new();
    let mut min_level: Option<u8> = None;

    for entry in entries[floor..pos].iter().rev() {
        if let Entry::Heading { level, text } = entry {
            if min_level.map_or(true, |m| *level < m) {
                trail.push(text.clone());
                min_level = Some(*level);
            }
        }
    }
    trail.reverse();
    trail
}

fn block_texts(block: &TextBlock<'_>) -> Vec<String> {
    let node = block.node;
    if node.is_list() {
        return list_texts(node);
    }
    if node.tag == "table" {
        return table_rows(node)
            .map(|row| {
                table_cells(row)
                    .map(|cell| cell.inner_text().trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect();
    }
    let text = add_missing_punctuation(&node.inner_text());
    PARA_SPLITTER.split(text.trim()).map(|p| p.to_string()).collect()
}

/// One string per visible item; ordered lists get their item numbers read.
fn list_texts(node: &ContentNode) -> Vec<String> {
    let numbered = node.tag == "ol";
    node.children
        .iter()
        .filter(|child| LIST_ITEM_TAGS.contains(&child.tag.as_str()) && !child.layout.hidden)
        .enumerate()
        .map(|(i, child)| {
            let text = child.inner_text().trim().to_string();
            if numbered { format!("{}. {}", i + 1, text) } else { text }
        })
        .collect()
}

/// Gives unterminated lines a period so paragraph splitting and synthesis
/// pause where the layout implied a boundary.
fn add_missing_punctuation(text: &str) -> String {
    MISSING_PUNCTUATION.replace_all(text, "$1.$2").into_owned()
}
