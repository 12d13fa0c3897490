//! The graph-structured stack.
//!
//! A GLR parse keeps several stack *versions* alive at once. Versions share
//! their history: each head points into a DAG of [`StackNode`]s, where a
//! node records a parse state and every link to it carries the tree that
//! was pushed to reach it. Merging two versions just adds links, so the
//! graph stays bounded under ambiguity; popping walks every distinct path
//! and returns one *slice* per history.
//!
//! Every operation is local to the versions it names; nothing here
//! implicitly touches other versions.

use crate::language::{StateId, Symbol, ERROR_STATE, SYM_ERROR_REPEAT};
use crate::length::Length;
use crate::tree::{external_state_eq, Tree};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Maximum number of links out of a single stack node.
const MAX_LINK_COUNT: usize = 8;
/// Maximum number of concurrent iterators during a pop.
const MAX_ITERATOR_COUNT: usize = 64;

/// Index of a stack version (a head into the graph).
pub type StackVersion = usize;

#[derive(Debug)]
struct StackNode {
    state: StateId,
    position: Length,
    error_cost: u32,
    links: RefCell<SmallVec<[StackLink; 2]>>,
    node_count: Cell<u32>,
    dynamic_precedence: Cell<i32>,
}

#[derive(Debug, Clone)]
struct StackLink {
    node: Rc<StackNode>,
    /// `None` marks a discontinuity pushed during error handling.
    tree: Option<Tree>,
    is_pending: bool,
}

/// How many stack entries a subtree accounts for when measuring progress.
fn subtree_node_count(tree: &Tree) -> u32 {
    let mut count = tree.visible_descendant_count();
    if tree.visible() {
        count += 1;
    }
    if tree.symbol() == SYM_ERROR_REPEAT {
        count += 1;
    }
    count
}

fn node_new(
    previous: Option<Rc<StackNode>>,
    tree: Option<Tree>,
    is_pending: bool,
    state: StateId,
) -> Rc<StackNode> {
    match previous {
        Some(previous) => {
            let mut position = previous.position;
            let mut error_cost = previous.error_cost;
            let mut node_count = previous.node_count.get();
            let mut dynamic_precedence = previous.dynamic_precedence.get();
            if let Some(tree) = &tree {
                error_cost += tree.error_cost();
                position += tree.total_size();
                node_count += subtree_node_count(tree);
                dynamic_precedence += tree.dynamic_precedence();
            }
            Rc::new(StackNode {
                state,
                position,
                error_cost,
                links: RefCell::new(SmallVec::from_iter([StackLink {
                    node: previous,
                    tree,
                    is_pending,
                }])),
                node_count: Cell::new(node_count),
                dynamic_precedence: Cell::new(dynamic_precedence),
            })
        }
        None => Rc::new(StackNode {
            state,
            position: Length::ZERO,
            error_cost: 0,
            links: RefCell::new(SmallVec::new()),
            node_count: Cell::new(0),
            dynamic_precedence: Cell::new(0),
        }),
    }
}

/// Two link trees are equivalent if a merge may fold their edges together.
fn trees_equivalent(left: Option<&Tree>, right: Option<&Tree>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => {
            if left.ptr_eq(right) {
                return true;
            }
            if left.symbol() != right.symbol() {
                return false;
            }
            if left.error_cost() > 0 && right.error_cost() > 0 {
                return true;
            }
            left.padding().bytes == right.padding().bytes
                && left.size().bytes == right.size().bytes
                && left.child_count() == right.child_count()
                && left.extra() == right.extra()
                && external_state_eq(Some(left), Some(right))
        }
        _ => false,
    }
}

fn tree_precedence(tree: Option<&Tree>) -> i32 {
    tree.map_or(0, Tree::dynamic_precedence)
}

/// Add a link to a node, folding it into an equivalent existing link when
/// possible. Recursively merges predecessors that carry the same state,
/// position, and error cost.
fn add_link(node: &Rc<StackNode>, link: StackLink) {
    if Rc::ptr_eq(node, &link.node) {
        return;
    }

    enum Decision {
        Nothing,
        ReplaceTree(usize),
        MergeInto(usize),
        Append,
    }

    let decision = {
        let links = node.links.borrow();
        let mut decision = Decision::Append;
        for (i, existing) in links.iter().enumerate() {
            if !trees_equivalent(existing.tree.as_ref(), link.tree.as_ref()) {
                continue;
            }
            if Rc::ptr_eq(&existing.node, &link.node) {
                decision = if tree_precedence(link.tree.as_ref())
                    > tree_precedence(existing.tree.as_ref())
                {
                    Decision::ReplaceTree(i)
                } else {
                    Decision::Nothing
                };
                break;
            }
            if existing.node.state == link.node.state
                && existing.node.position.bytes == link.node.position.bytes
                && existing.node.error_cost == link.node.error_cost
            {
                decision = Decision::MergeInto(i);
                break;
            }
        }
        decision
    };

    match decision {
        Decision::Nothing => {}
        Decision::ReplaceTree(i) => {
            let mut links = node.links.borrow_mut();
            links[i].tree = link.tree;
            let precedence = links[i].node.dynamic_precedence.get()
                + tree_precedence(links[i].tree.as_ref());
            drop(links);
            node.dynamic_precedence.set(precedence);
        }
        Decision::MergeInto(i) => {
            let (target, source_links) = {
                let links = node.links.borrow();
                (links[i].node.clone(), link.node.links.borrow().clone())
            };
            for source_link in source_links {
                add_link(&target, source_link);
            }
            let mut precedence =
                link.node.dynamic_precedence.get() + tree_precedence(link.tree.as_ref());
            precedence = precedence.max(node.dynamic_precedence.get());
            node.dynamic_precedence.set(precedence);
        }
        Decision::Append => {
            let mut node_count = link.node.node_count.get();
            let mut precedence = link.node.dynamic_precedence.get();
            if let Some(tree) = &link.tree {
                node_count += subtree_node_count(tree);
                precedence += tree.dynamic_precedence();
            }
            {
                let mut links = node.links.borrow_mut();
                if links.len() == MAX_LINK_COUNT {
                    return;
                }
                links.push(link);
            }
            if node_count > node.node_count.get() {
                node.node_count.set(node_count);
            }
            if precedence > node.dynamic_precedence.get() {
                node.dynamic_precedence.set(precedence);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackStatus {
    Active,
    Paused(Symbol),
    Halted,
}

#[derive(Debug)]
struct StackHead {
    node: Rc<StackNode>,
    status: StackStatus,
    last_external_token: Option<Tree>,
    summary: Option<StackSummary>,
    node_count_at_last_error: u32,
}

/// One history popped off a version: the version left at the stopping
/// point, and the trees along the path in push order.
#[derive(Debug)]
pub(crate) struct StackSlice {
    pub version: StackVersion,
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct StackSummaryEntry {
    pub position: Length,
    pub depth: u32,
    pub state: StateId,
}

pub(crate) type StackSummary = Vec<StackSummaryEntry>;

#[derive(Debug, Clone)]
struct StackIter {
    node: Rc<StackNode>,
    trees: Vec<Tree>,
    tree_count: u32,
    is_pending: bool,
}

enum IterAction {
    Continue,
    Stop,
    Pop,
    PopAndStop,
}

#[derive(Debug)]
pub(crate) struct Stack {
    heads: Vec<StackHead>,
    base: Rc<StackNode>,
}

impl Stack {
    pub fn new() -> Self {
        let base = node_new(None, None, false, 1);
        let mut stack = Self {
            heads: Vec::new(),
            base,
        };
        stack.clear();
        stack
    }

    /// Drop every version and start over with a single head at the base.
    pub fn clear(&mut self) {
        self.heads.clear();
        self.heads.push(StackHead {
            node: Rc::clone(&self.base),
            status: StackStatus::Active,
            last_external_token: None,
            summary: None,
            node_count_at_last_error: 0,
        });
    }

    pub fn version_count(&self) -> usize {
        self.heads.len()
    }

    pub fn state(&self, version: StackVersion) -> StateId {
        self.heads[version].node.state
    }

    pub fn position(&self, version: StackVersion) -> Length {
        self.heads[version].node.position
    }

    pub fn error_cost(&self, version: StackVersion) -> u32 {
        self.heads[version].node.error_cost
    }

    pub fn dynamic_precedence(&self, version: StackVersion) -> i32 {
        self.heads[version].node.dynamic_precedence.get()
    }

    pub fn node_count_since_error(&mut self, version: StackVersion) -> u32 {
        let head = &mut self.heads[version];
        let node_count = head.node.node_count.get();
        if node_count < head.node_count_at_last_error {
            head.node_count_at_last_error = node_count;
        }
        node_count - head.node_count_at_last_error
    }

    pub fn last_external_token(&self, version: StackVersion) -> Option<Tree> {
        self.heads[version].last_external_token.clone()
    }

    pub fn set_last_external_token(&mut self, version: StackVersion, token: Option<Tree>) {
        self.heads[version].last_external_token = token;
    }

    pub fn is_active(&self, version: StackVersion) -> bool {
        self.heads[version].status == StackStatus::Active
    }

    pub fn is_paused(&self, version: StackVersion) -> bool {
        matches!(self.heads[version].status, StackStatus::Paused(_))
    }

    pub fn is_halted(&self, version: StackVersion) -> bool {
        self.heads[version].status == StackStatus::Halted
    }

    pub fn halt(&mut self, version: StackVersion) {
        self.heads[version].status = StackStatus::Halted;
    }

    /// Freeze a version at an error boundary, remembering the lookahead
    /// symbol that could not be handled.
    pub fn pause(&mut self, version: StackVersion, lookahead: Symbol) {
        let head = &mut self.heads[version];
        head.status = StackStatus::Paused(lookahead);
        head.node_count_at_last_error = head.node.node_count.get();
    }

    /// Reactivate a paused version, returning the remembered lookahead.
    pub fn resume(&mut self, version: StackVersion) -> Symbol {
        let head = &mut self.heads[version];
        let StackStatus::Paused(lookahead) = head.status else {
            debug_assert!(false, "resumed a version that was not paused");
            return 0;
        };
        head.status = StackStatus::Active;
        lookahead
    }

    /// Append a link to a version. A `None` tree records an error-handling
    /// discontinuity and resets the version's progress baseline.
    pub fn push(
        &mut self,
        version: StackVersion,
        tree: Option<Tree>,
        is_pending: bool,
        state: StateId,
    ) {
        let head = &mut self.heads[version];
        let reset_baseline = tree.is_none();
        let node = node_new(Some(Rc::clone(&head.node)), tree, is_pending, state);
        if reset_baseline {
            head.node_count_at_last_error = node.node_count.get();
        }
        head.node = node;
    }

    /// Pop `count` non-extra entries, returning one slice per distinct
    /// history. Slices from the same resulting version are adjacent.
    pub fn pop_count(&mut self, version: StackVersion, count: u32) -> Vec<StackSlice> {
        self.iterate(version, true, |iter| {
            if iter.tree_count == count {
                IterAction::PopAndStop
            } else {
                IterAction::Continue
            }
        })
    }

    /// Pop the topmost entry only if it was pushed as pending.
    pub fn pop_pending(&mut self, version: StackVersion) -> Vec<StackSlice> {
        let mut slices = self.iterate(version, true, |iter| {
            if iter.tree_count >= 1 {
                if iter.is_pending {
                    IterAction::PopAndStop
                } else {
                    IterAction::Stop
                }
            } else {
                IterAction::Continue
            }
        });
        if !slices.is_empty() {
            self.renumber_version(slices[0].version, version);
            slices[0].version = version;
        }
        slices
    }

    /// Pop everything down to the base of the stack.
    pub fn pop_all(&mut self, version: StackVersion) -> Vec<StackSlice> {
        self.iterate(version, true, |iter| {
            if iter.node.links.borrow().is_empty() {
                IterAction::Pop
            } else {
                IterAction::Continue
            }
        })
    }

    /// Pop a just-pushed error subtree, if the top links carry one.
    pub fn pop_error(&mut self, version: StackVersion) -> Vec<Tree> {
        let has_error = self.heads[version]
            .node
            .links
            .borrow()
            .iter()
            .any(|link| link.tree.as_ref().is_some_and(Tree::is_error));
        if !has_error {
            return Vec::new();
        }
        let mut found_error = false;
        let mut slices = self.iterate(version, true, |iter| {
            if iter.trees.is_empty() {
                IterAction::Continue
            } else if !found_error && iter.trees[0].is_error() {
                found_error = true;
                IterAction::PopAndStop
            } else {
                IterAction::Stop
            }
        });
        if let Some(slice) = slices.pop() {
            debug_assert!(slices.is_empty());
            self.renumber_version(slice.version, version);
            return slice.trees;
        }
        Vec::new()
    }

    /// Record a bounded-depth snapshot of the states reachable from a
    /// version's head, used to find recovery targets.
    pub fn record_summary(&mut self, version: StackVersion, max_depth: u32) {
        let mut summary: StackSummary = Vec::new();
        self.iterate(version, false, |iter| {
            let depth = iter.tree_count;
            if depth > max_depth {
                return IterAction::Stop;
            }
            let state = iter.node.state;
            for entry in summary.iter().rev() {
                if entry.depth < depth {
                    break;
                }
                if entry.depth == depth && entry.state == state {
                    return IterAction::Continue;
                }
            }
            summary.push(StackSummaryEntry {
                position: iter.node.position,
                depth,
                state,
            });
            IterAction::Continue
        });
        self.heads[version].summary = Some(summary);
    }

    pub fn summary(&self, version: StackVersion) -> Option<StackSummary> {
        self.heads[version].summary.clone()
    }

    pub fn remove_version(&mut self, version: StackVersion) {
        self.heads.remove(version);
    }

    /// Move version `v1` into slot `v2` (which must be lower), dropping
    /// whatever `v2` held. A summary already recorded on `v2` is kept if
    /// `v1` has none.
    pub fn renumber_version(&mut self, v1: StackVersion, v2: StackVersion) {
        if v1 == v2 {
            return;
        }
        debug_assert!(v2 < v1 && v1 < self.heads.len());
        let mut source = self.heads.remove(v1);
        let target = &mut self.heads[v2];
        if source.summary.is_none() && target.summary.is_some() {
            source.summary = target.summary.take();
        }
        *target = source;
    }

    pub fn swap_versions(&mut self, v1: StackVersion, v2: StackVersion) {
        self.heads.swap(v1, v2);
    }

    /// Duplicate a version, sharing its history. The copy starts without a
    /// summary.
    pub fn copy_version(&mut self, version: StackVersion) -> StackVersion {
        let head = &self.heads[version];
        let copy = StackHead {
            node: Rc::clone(&head.node),
            status: head.status,
            last_external_token: head.last_external_token.clone(),
            summary: None,
            node_count_at_last_error: head.node_count_at_last_error,
        };
        self.heads.push(copy);
        self.heads.len() - 1
    }

    /// Whether two versions sit at the same state, byte position, error
    /// cost, and external-scanner state.
    pub fn can_merge(&self, v1: StackVersion, v2: StackVersion) -> bool {
        let head1 = &self.heads[v1];
        let head2 = &self.heads[v2];
        head1.status == StackStatus::Active
            && head2.status == StackStatus::Active
            && head1.node.state == head2.node.state
            && head1.node.position.bytes == head2.node.position.bytes
            && head1.node.error_cost == head2.node.error_cost
            && external_state_eq(
                head1.last_external_token.as_ref(),
                head2.last_external_token.as_ref(),
            )
    }

    /// Merge `v2` into `v1` if they are equivalent. Differing pending
    /// trees are kept as parallel edges, so later pops yield both
    /// histories.
    pub fn merge(&mut self, v1: StackVersion, v2: StackVersion) -> bool {
        if !self.can_merge(v1, v2) {
            return false;
        }
        let links: Vec<StackLink> = self.heads[v2].node.links.borrow().to_vec();
        let target = Rc::clone(&self.heads[v1].node);
        for link in links {
            add_link(&target, link);
        }
        if target.state == ERROR_STATE {
            self.heads[v1].node_count_at_last_error = target.node_count.get();
        }
        self.remove_version(v2);
        true
    }

    /// Walk the graph from a version's head, calling `callback` at every
    /// node along every path. `Pop` actions capture the trees walked so
    /// far into slices; `Stop` ends a path.
    fn iterate<F>(
        &mut self,
        version: StackVersion,
        include_trees: bool,
        mut callback: F,
    ) -> Vec<StackSlice>
    where
        F: FnMut(&StackIter) -> IterAction,
    {
        let mut slices: Vec<StackSlice> = Vec::new();
        let mut iterators = vec![StackIter {
            node: Rc::clone(&self.heads[version].node),
            trees: Vec::new(),
            tree_count: 0,
            is_pending: true,
        }];

        while !iterators.is_empty() {
            let mut i = 0;
            let mut size = iterators.len();
            while i < size {
                let action = callback(&iterators[i]);
                let link_count = iterators[i].node.links.borrow().len();
                let should_pop = matches!(action, IterAction::Pop | IterAction::PopAndStop);
                let should_stop =
                    matches!(action, IterAction::Stop | IterAction::PopAndStop) || link_count == 0;

                if should_pop {
                    let mut trees = if should_stop {
                        std::mem::take(&mut iterators[i].trees)
                    } else {
                        iterators[i].trees.clone()
                    };
                    trees.reverse();
                    let node = Rc::clone(&iterators[i].node);
                    self.add_slice(&mut slices, version, &node, trees);
                }

                if should_stop {
                    iterators.remove(i);
                    size -= 1;
                    continue;
                }

                let links: SmallVec<[StackLink; 2]> = iterators[i].node.links.borrow().clone();
                for link in links.iter().skip(1) {
                    if iterators.len() >= MAX_ITERATOR_COUNT {
                        break;
                    }
                    let mut next = iterators[i].clone();
                    advance_iter(&mut next, link, include_trees);
                    iterators.push(next);
                }
                advance_iter(&mut iterators[i], &links[0], include_trees);
                i += 1;
            }
        }

        slices
    }

    /// Attach a popped history to a version whose head is the stopping
    /// node, creating the version if none exists yet. Slices that land on
    /// the same version stay adjacent.
    fn add_slice(
        &mut self,
        slices: &mut Vec<StackSlice>,
        original_version: StackVersion,
        node: &Rc<StackNode>,
        trees: Vec<Tree>,
    ) {
        for i in (0..slices.len()).rev() {
            let version = slices[i].version;
            if Rc::ptr_eq(&self.heads[version].node, node) {
                slices.insert(i + 1, StackSlice { version, trees });
                return;
            }
        }
        let original = &self.heads[original_version];
        let head = StackHead {
            node: Rc::clone(node),
            status: StackStatus::Active,
            last_external_token: original.last_external_token.clone(),
            summary: None,
            node_count_at_last_error: original.node_count_at_last_error,
        };
        self.heads.push(head);
        slices.push(StackSlice {
            version: self.heads.len() - 1,
            trees,
        });
    }
}

fn advance_iter(iter: &mut StackIter, link: &StackLink, include_trees: bool) {
    iter.node = Rc::clone(&link.node);
    match &link.tree {
        Some(tree) => {
            if include_trees {
                iter.trees.push(tree.clone());
            }
            if !tree.extra() {
                iter.tree_count += 1;
                if !link.is_pending {
                    iter.is_pending = false;
                }
            }
        }
        None => {
            iter.tree_count += 1;
            iter.is_pending = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{ErrorCosts, Language, LexMode, SymbolMetadata, LANGUAGE_VERSION};
    use crate::tree::{ScannerState, TreePool};
    use hashbrown::HashMap;

    fn test_language() -> Language {
        Language {
            version: LANGUAGE_VERSION,
            symbol_count: 4,
            token_count: 3,
            state_count: 8,
            alias_sequence_count: 0,
            parse_table: vec![HashMap::default(); 8],
            lex_modes: vec![LexMode::default(); 8],
            external_tokens: vec![Vec::new()],
            lex_fn: |_, _| false,
            keyword_capture_token: None,
            keyword_lex_fn: None,
            external_scanner: None,
            symbol_metadata: vec![
                SymbolMetadata::default(),
                SymbolMetadata {
                    visible: true,
                    named: true,
                    extra: false,
                },
                SymbolMetadata {
                    visible: true,
                    named: true,
                    extra: false,
                },
                SymbolMetadata {
                    visible: true,
                    named: true,
                    extra: false,
                },
            ],
            alias_sequences: vec![Vec::new()],
            costs: ErrorCosts::default(),
        }
    }

    fn leaf(pool: &TreePool, language: &Language, symbol: Symbol, bytes: u32) -> Tree {
        pool.make_leaf(
            symbol,
            Length::ZERO,
            Length::new(bytes, crate::length::Point::new(0, bytes)),
            language,
        )
    }

    #[test]
    fn push_and_pop_round_trip() {
        let language = test_language();
        let pool = TreePool::new();
        let mut stack = Stack::new();
        let a = leaf(&pool, &language, 1, 1);
        let b = leaf(&pool, &language, 2, 1);
        stack.push(0, Some(a.clone()), false, 2);
        stack.push(0, Some(b.clone()), false, 3);
        assert_eq!(stack.state(0), 3);
        assert_eq!(stack.position(0).bytes, 2);

        let slices = stack.pop_count(0, 2);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].trees.len(), 2);
        assert!(slices[0].trees[0].ptr_eq(&a));
        assert!(slices[0].trees[1].ptr_eq(&b));
        assert_eq!(stack.state(slices[0].version), 1);
    }

    #[test]
    fn merged_versions_pop_into_multiple_slices() {
        let language = test_language();
        let pool = TreePool::new();
        let mut stack = Stack::new();
        let shared = leaf(&pool, &language, 1, 1);
        stack.push(0, Some(shared), false, 2);

        // Structurally different interpretations of the same span: one
        // child versus two.
        let forked = stack.copy_version(0);
        let left = pool.make_node(3, vec![leaf(&pool, &language, 1, 1)], 0, &language);
        let mut right = pool.make_node(
            3,
            vec![leaf(&pool, &language, 1, 1), leaf(&pool, &language, 2, 0)],
            0,
            &language,
        );
        right.add_dynamic_precedence(5);
        stack.push(0, Some(left), false, 4);
        stack.push(forked, Some(right), false, 4);

        assert!(stack.can_merge(0, forked));
        assert!(stack.merge(0, forked));
        assert_eq!(stack.version_count(), 1);
        assert_eq!(stack.dynamic_precedence(0), 5);

        let slices = stack.pop_count(0, 1);
        assert_eq!(slices.len(), 2, "both histories survive the merge");
    }

    #[test]
    fn equivalent_links_fold_keeping_the_higher_precedence_tree() {
        let language = test_language();
        let pool = TreePool::new();
        let mut stack = Stack::new();
        let shared = leaf(&pool, &language, 1, 1);
        stack.push(0, Some(shared), false, 2);

        let forked = stack.copy_version(0);
        let left = pool.make_node(3, vec![leaf(&pool, &language, 1, 1)], 0, &language);
        let mut right = pool.make_node(3, vec![leaf(&pool, &language, 1, 1)], 0, &language);
        right.add_dynamic_precedence(5);
        stack.push(0, Some(left), false, 4);
        stack.push(forked, Some(right.clone()), false, 4);

        assert!(stack.merge(0, forked));
        assert_eq!(stack.dynamic_precedence(0), 5);

        let slices = stack.pop_count(0, 1);
        assert_eq!(slices.len(), 1, "equivalent trees collapse to one edge");
        assert!(slices[0].trees[0].ptr_eq(&right));
    }

    #[test]
    fn pause_and_resume_remember_the_lookahead() {
        let mut stack = Stack::new();
        stack.pause(0, 7);
        assert!(stack.is_paused(0));
        assert!(!stack.is_active(0));
        assert_eq!(stack.resume(0), 7);
        assert!(stack.is_active(0));
    }

    #[test]
    fn versions_with_different_external_state_do_not_merge() {
        let language = test_language();
        let pool = TreePool::new();
        let mut stack = Stack::new();
        let token = leaf(&pool, &language, 1, 1);
        stack.push(0, Some(token.clone()), false, 2);
        let forked = stack.copy_version(0);

        let mut external = leaf(&pool, &language, 2, 0);
        external.set_external_token_state(ScannerState::from_slice(&[9]));
        stack.set_last_external_token(forked, Some(external));
        assert!(!stack.can_merge(0, forked));
    }

    #[test]
    fn pop_pending_only_pops_pending_links() {
        let language = test_language();
        let pool = TreePool::new();
        let mut stack = Stack::new();
        let composite = pool.make_node(3, vec![leaf(&pool, &language, 1, 1)], 0, &language);
        stack.push(0, Some(composite), true, 2);
        let slices = stack.pop_pending(0);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].version, 0);

        stack.push(0, Some(leaf(&pool, &language, 1, 1)), false, 2);
        assert!(stack.pop_pending(0).is_empty());
    }

    #[test]
    fn summaries_record_states_by_depth() {
        let language = test_language();
        let pool = TreePool::new();
        let mut stack = Stack::new();
        stack.push(0, Some(leaf(&pool, &language, 1, 1)), false, 2);
        stack.push(0, Some(leaf(&pool, &language, 2, 1)), false, 3);
        stack.record_summary(0, 16);
        let summary = stack.summary(0).unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].state, 3);
        assert_eq!(summary[0].depth, 0);
        assert_eq!(summary[2].state, 1);
        assert_eq!(summary[2].depth, 2);
    }
}
