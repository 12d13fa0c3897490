//! Syntax trees and the tree pool.
//!
//! Trees are immutable once built and shared freely: a [`Tree`] is a cheap
//! handle whose clone retains the node and whose drop releases it. The GSS
//! and the finished tree may reference the same subtree simultaneously.
//! The only mutation path is copy-on-write through [`Tree::make_mut`],
//! which duplicates a node exactly when it is shared, the same rule the
//! pool's `make_copy` contract describes.
//!
//! [`TreePool`] is the single construction point. It computes every
//! aggregate (span, error cost, dynamic precedence, first-leaf summary,
//! scan reach) from the children at `make_node` time and tracks the number
//! of live node allocations so teardown can be verified.

use crate::language::{Language, LexMode, StateId, Symbol, STATE_NONE, SYM_ERROR};
use crate::length::{Length, Point};
use smallvec::SmallVec;
use std::cell::Cell;
use std::cmp::Ordering;
use std::rc::Rc;

/// Serialized external-scanner state attached to a token.
pub type ScannerState = SmallVec<[u8; 24]>;

/// Summary of a tree's leftmost leaf, used by the lookahead-reuse test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstLeaf {
    pub symbol: Symbol,
    pub lex_mode: LexMode,
}

/// Counts live node allocations on behalf of a [`TreePool`]. Cloning a
/// node's data (copy-on-write) registers the duplicate; dropping any node
/// unregisters it.
#[derive(Debug)]
struct LiveToken(Rc<Cell<usize>>);

impl LiveToken {
    fn new(counter: &Rc<Cell<usize>>) -> Self {
        counter.set(counter.get() + 1);
        Self(Rc::clone(counter))
    }
}

impl Clone for LiveToken {
    fn clone(&self) -> Self {
        self.0.set(self.0.get() + 1);
        Self(Rc::clone(&self.0))
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TreeData {
    pub(crate) symbol: Symbol,
    pub(crate) parse_state: StateId,
    pub(crate) alias_sequence_id: u16,
    pub(crate) padding: Length,
    pub(crate) size: Length,
    pub(crate) children: SmallVec<[Tree; 4]>,
    pub(crate) visible: bool,
    pub(crate) named: bool,
    pub(crate) extra: bool,
    pub(crate) fragile_left: bool,
    pub(crate) fragile_right: bool,
    pub(crate) has_changes: bool,
    pub(crate) is_missing: bool,
    pub(crate) has_external_tokens: bool,
    pub(crate) error_cost: u32,
    pub(crate) dynamic_precedence: i32,
    pub(crate) bytes_scanned: u32,
    pub(crate) visible_descendant_count: u32,
    pub(crate) first_leaf: FirstLeaf,
    /// First unrecognized character, stored on error leaves.
    pub(crate) lookahead_char: Option<char>,
    pub(crate) external_token_state: Option<ScannerState>,
    _live: LiveToken,
}

/// A shared handle to an immutable syntax tree node.
#[derive(Debug, Clone)]
pub struct Tree(Rc<TreeData>);

impl Tree {
    #[must_use]
    pub fn symbol(&self) -> Symbol {
        self.0.symbol
    }

    #[must_use]
    pub fn parse_state(&self) -> StateId {
        self.0.parse_state
    }

    #[must_use]
    pub fn alias_sequence_id(&self) -> u16 {
        self.0.alias_sequence_id
    }

    #[must_use]
    pub fn padding(&self) -> Length {
        self.0.padding
    }

    #[must_use]
    pub fn size(&self) -> Length {
        self.0.size
    }

    #[must_use]
    pub fn total_size(&self) -> Length {
        self.0.padding + self.0.size
    }

    #[must_use]
    pub fn total_bytes(&self) -> u32 {
        self.total_size().bytes
    }

    #[must_use]
    pub fn children(&self) -> &[Tree] {
        &self.0.children
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.0.children.len()
    }

    #[must_use]
    pub fn visible(&self) -> bool {
        self.0.visible
    }

    #[must_use]
    pub fn named(&self) -> bool {
        self.0.named
    }

    #[must_use]
    pub fn extra(&self) -> bool {
        self.0.extra
    }

    #[must_use]
    pub fn fragile_left(&self) -> bool {
        self.0.fragile_left
    }

    #[must_use]
    pub fn fragile_right(&self) -> bool {
        self.0.fragile_right
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.0.has_changes
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.0.is_missing
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.0.symbol == SYM_ERROR
    }

    #[must_use]
    pub fn has_external_tokens(&self) -> bool {
        self.0.has_external_tokens
    }

    #[must_use]
    pub fn error_cost(&self) -> u32 {
        self.0.error_cost
    }

    #[must_use]
    pub fn dynamic_precedence(&self) -> i32 {
        self.0.dynamic_precedence
    }

    /// How far past this tree's start the lexer inspected while producing
    /// it. Always at least one byte beyond the last token: the margin
    /// captures lookahead-dependent decisions for incremental invalidation.
    #[must_use]
    pub fn bytes_scanned(&self) -> u32 {
        self.0.bytes_scanned
    }

    #[must_use]
    pub fn first_leaf(&self) -> FirstLeaf {
        self.0.first_leaf
    }

    #[must_use]
    pub fn external_token_state(&self) -> Option<&[u8]> {
        self.0.external_token_state.as_deref()
    }

    /// For error leaves, the first character the lexer could not match.
    #[must_use]
    pub fn lookahead_char(&self) -> Option<char> {
        self.0.lookahead_char
    }

    /// The display symbol of the child at `index`: the child's own symbol,
    /// or the alias this node's production assigns to that position.
    #[must_use]
    pub fn child_symbol(&self, index: usize, language: &Language) -> Option<Symbol> {
        let child = self.children().get(index)?;
        if !child.extra() {
            let structural_index = self.children()[..index]
                .iter()
                .filter(|sibling| !sibling.extra())
                .count();
            if let Some(&alias) = language
                .alias_sequence(self.alias_sequence_id())
                .get(structural_index)
            {
                if alias != 0 {
                    return Some(alias);
                }
            }
        }
        Some(child.symbol())
    }

    /// Identity comparison: do the two handles point at the same node?
    #[must_use]
    pub fn ptr_eq(&self, other: &Tree) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn visible_descendant_count(&self) -> u32 {
        self.0.visible_descendant_count
    }

    /// Copy-on-write access: duplicates the node iff it is shared.
    pub(crate) fn make_mut(&mut self) -> &mut TreeData {
        Rc::make_mut(&mut self.0)
    }

    pub(crate) fn set_extra(&mut self, extra: bool) {
        self.make_mut().extra = extra;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.make_mut().visible = visible;
    }

    pub(crate) fn set_parse_state(&mut self, state: StateId) {
        self.make_mut().parse_state = state;
    }

    pub(crate) fn mark_fragile(&mut self) {
        let data = self.make_mut();
        data.fragile_left = true;
        data.fragile_right = true;
    }

    pub(crate) fn add_dynamic_precedence(&mut self, amount: i32) {
        self.make_mut().dynamic_precedence += amount;
    }

    pub(crate) fn set_bytes_scanned(&mut self, bytes_scanned: u32) {
        self.make_mut().bytes_scanned = bytes_scanned;
    }

    pub(crate) fn set_first_leaf_lex_mode(&mut self, lex_mode: LexMode) {
        self.make_mut().first_leaf.lex_mode = lex_mode;
    }

    pub(crate) fn set_external_token_state(&mut self, state: ScannerState) {
        let data = self.make_mut();
        data.has_external_tokens = true;
        data.external_token_state = Some(state);
    }

    /// The rightmost external-token leaf inside this tree, if any.
    pub(crate) fn last_external_token(&self) -> Option<Tree> {
        if !self.has_external_tokens() {
            return None;
        }
        let mut current = self.clone();
        'descend: loop {
            if current.child_count() == 0 {
                return Some(current);
            }
            for child in current.children().iter().rev() {
                if child.has_external_tokens() {
                    current = child.clone();
                    continue 'descend;
                }
            }
            return None;
        }
    }

    /// Structural comparison used to order ambiguous siblings: by symbol,
    /// then child count, then children left to right.
    pub(crate) fn compare(&self, other: &Tree) -> Ordering {
        if self.ptr_eq(other) {
            return Ordering::Equal;
        }
        self.symbol()
            .cmp(&other.symbol())
            .then_with(|| self.child_count().cmp(&other.child_count()))
            .then_with(|| {
                for (a, b) in self.children().iter().zip(other.children()) {
                    let ordering = a.compare(b);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            })
    }
}

/// Compares the serialized scanner state of two optional tokens. A missing
/// token is equivalent to empty state.
pub(crate) fn external_state_eq(a: Option<&Tree>, b: Option<&Tree>) -> bool {
    let state_a = a.and_then(Tree::external_token_state).unwrap_or(&[]);
    let state_b = b.and_then(Tree::external_token_state).unwrap_or(&[]);
    state_a == state_b
}

/// Allocates trees and tracks how many node allocations are live.
#[derive(Debug)]
pub struct TreePool {
    live: Rc<Cell<usize>>,
}

impl Default for TreePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TreePool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: Rc::new(Cell::new(0)),
        }
    }

    /// The number of tree nodes currently alive. Zero once every tree from
    /// this pool has been dropped.
    #[must_use]
    pub fn live_tree_count(&self) -> usize {
        self.live.get()
    }

    fn blank(&self, symbol: Symbol, language: &Language) -> TreeData {
        let metadata = language.symbol_metadata(symbol);
        TreeData {
            symbol,
            parse_state: STATE_NONE,
            alias_sequence_id: 0,
            padding: Length::ZERO,
            size: Length::ZERO,
            children: SmallVec::new(),
            visible: metadata.visible,
            named: metadata.named,
            extra: false,
            fragile_left: false,
            fragile_right: false,
            has_changes: false,
            is_missing: false,
            has_external_tokens: false,
            error_cost: 0,
            dynamic_precedence: 0,
            bytes_scanned: 0,
            visible_descendant_count: 0,
            first_leaf: FirstLeaf {
                symbol,
                lex_mode: LexMode::default(),
            },
            lookahead_char: None,
            external_token_state: None,
            _live: LiveToken::new(&self.live),
        }
    }

    /// Build a token leaf.
    #[must_use]
    pub fn make_leaf(
        &self,
        symbol: Symbol,
        padding: Length,
        size: Length,
        language: &Language,
    ) -> Tree {
        let mut data = self.blank(symbol, language);
        data.padding = padding;
        data.size = size;
        Tree(Rc::new(data))
    }

    /// Build a leaf covering unrecognized input. The leaf itself carries
    /// no cost; the error composite that eventually encloses it charges
    /// the skipped span once.
    #[must_use]
    pub fn make_error(
        &self,
        size: Length,
        padding: Length,
        lookahead_char: Option<char>,
        language: &Language,
    ) -> Tree {
        let mut data = self.blank(SYM_ERROR, language);
        data.padding = padding;
        data.size = size;
        data.fragile_left = true;
        data.fragile_right = true;
        data.lookahead_char = lookahead_char;
        Tree(Rc::new(data))
    }

    /// Build a zero-width leaf standing in for a token the input is
    /// missing.
    #[must_use]
    pub fn make_missing_leaf(&self, symbol: Symbol, language: &Language) -> Tree {
        let mut data = self.blank(symbol, language);
        data.is_missing = true;
        data.error_cost = language.costs.per_missing_tree;
        Tree(Rc::new(data))
    }

    /// Build an interior node, taking ownership of the children and
    /// computing every aggregate from them. When the production carries an
    /// alias sequence, an aliased child's visibility comes from the alias
    /// symbol's metadata rather than its own.
    #[must_use]
    pub fn make_node(
        &self,
        symbol: Symbol,
        children: Vec<Tree>,
        alias_sequence_id: u16,
        language: &Language,
    ) -> Tree {
        let mut data = self.blank(symbol, language);
        data.alias_sequence_id = alias_sequence_id;

        let alias_sequence = language.alias_sequence(alias_sequence_id);
        let mut structural_index = 0;
        let mut offset = 0u32;
        for (i, child) in children.iter().enumerate() {
            if i == 0 {
                data.padding = child.padding();
                data.size = child.size();
                data.fragile_left = child.fragile_left();
                data.first_leaf = child.first_leaf();
            } else {
                data.size += child.total_size();
            }
            data.error_cost += child.error_cost();
            data.dynamic_precedence += child.dynamic_precedence();
            data.has_external_tokens |= child.has_external_tokens();
            data.has_changes |= child.has_changes();
            let mut child_visible = child.visible();
            if !child.extra() {
                if let Some(&alias) = alias_sequence.get(structural_index) {
                    if alias != 0 {
                        child_visible = language.symbol_metadata(alias).visible;
                    }
                }
                structural_index += 1;
            }
            data.visible_descendant_count +=
                child.visible_descendant_count() + u32::from(child_visible);
            let scan_reach = offset + child.bytes_scanned();
            if scan_reach > data.bytes_scanned {
                data.bytes_scanned = scan_reach;
            }
            offset += child.total_bytes();
        }
        if let Some(last) = children.last() {
            data.fragile_right = last.fragile_right();
        }
        if symbol == SYM_ERROR {
            // One per-tree penalty for each visible tree swallowed by the
            // error (at least one), plus the span the error covers.
            let visible_children = children
                .iter()
                .filter(|child| child.visible() && !child.extra())
                .count() as u32;
            data.error_cost += language.costs.per_skipped_tree * visible_children.max(1)
                + data.size.bytes * language.costs.per_skipped_char
                + data.size.extent.row * language.costs.per_skipped_line;
            data.fragile_left = true;
            data.fragile_right = true;
        }
        data.children = SmallVec::from_vec(children);
        Tree(Rc::new(data))
    }

    /// Build a composite error node from the given children.
    #[must_use]
    pub fn make_error_node(&self, children: Vec<Tree>, language: &Language) -> Tree {
        self.make_node(SYM_ERROR, children, 0, language)
    }
}

/// A single text edit, in both byte and row/column coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputEdit {
    pub start_byte: u32,
    pub old_end_byte: u32,
    pub new_end_byte: u32,
    pub start_point: Point,
    pub old_end_point: Point,
    pub new_end_point: Point,
}

/// A finished parse tree, as returned by `Parser::parse`.
///
/// Before reparsing an edited document, apply every edit with
/// [`SyntaxTree::edit`]; that adjusts spans and marks the changed paths so
/// the next parse knows which subtrees it may reuse verbatim.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    root: Tree,
}

impl SyntaxTree {
    pub(crate) fn new(root: Tree) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Tree {
        &self.root
    }

    #[must_use]
    pub fn error_cost(&self) -> u32 {
        self.root.error_cost()
    }

    /// Adjust the tree for an edit to its source text: spans along the
    /// edited path are resized and every overlapping node is marked
    /// changed, including nodes whose lexer lookahead reached into the
    /// edit.
    pub fn edit(&mut self, edit: &InputEdit) {
        let relative = Edit {
            start: Length::new(edit.start_byte, edit.start_point),
            old_end: Length::new(edit.old_end_byte, edit.old_end_point),
            new_end: Length::new(edit.new_end_byte, edit.new_end_point),
        };
        edit_subtree(&mut self.root, relative);
    }
}

/// An edit expressed relative to the start of the subtree it is applied to.
#[derive(Debug, Clone, Copy)]
struct Edit {
    start: Length,
    old_end: Length,
    new_end: Length,
}

fn edit_subtree(tree: &mut Tree, edit: Edit) {
    let padding = tree.padding();
    let size = tree.size();
    let total = padding + size;
    let is_pure_insertion = edit.old_end.bytes == edit.start.bytes;

    let (new_padding, new_size) = if edit.old_end.bytes <= padding.bytes {
        // The edit ends inside the padding: the token content shifts.
        (
            edit.new_end + padding.saturating_sub(edit.old_end),
            size,
        )
    } else if edit.start.bytes < padding.bytes {
        // The edit starts in the padding and reaches into the content; the
        // content now begins where the edit ends.
        (edit.new_end, total.saturating_sub(edit.old_end))
    } else if edit.start.bytes < total.bytes || (edit.start.bytes == total.bytes && is_pure_insertion)
    {
        // The edit is within the content.
        let new_total = edit.new_end + total.saturating_sub(edit.old_end);
        (padding, new_total.saturating_sub(padding))
    } else {
        // Past the content: only reachable through the scan margin, which
        // invalidates without resizing.
        (padding, size)
    };

    let children: Vec<(usize, Edit)> = {
        let mut affected = Vec::new();
        let mut child_start = Length::ZERO;
        for (index, child) in tree.children().iter().enumerate() {
            let child_total = child.total_size();
            if edit.old_end.bytes < child_start.bytes
                || (edit.old_end.bytes == child_start.bytes && !is_pure_insertion)
            {
                break;
            }
            let scan_reach = child_start.bytes + child_total.bytes.max(child.bytes_scanned());
            if edit.start.bytes < scan_reach
                || (is_pure_insertion && edit.start.bytes == child_start.bytes + child_total.bytes)
            {
                affected.push((
                    index,
                    Edit {
                        start: edit.start.saturating_sub(child_start),
                        old_end: edit.old_end.saturating_sub(child_start),
                        new_end: edit.new_end.saturating_sub(child_start),
                    },
                ));
            }
            child_start += child_total;
        }
        affected
    };

    let data = tree.make_mut();
    data.padding = new_padding;
    data.size = new_size;
    data.has_changes = true;
    for (index, child_edit) in children {
        edit_subtree(&mut data.children[index], child_edit);
    }
}
