//! Error recovery and version condensation.
//!
//! Recovery runs in two layers. When a version hits a lookahead with no
//! actions it is paused; on resume, [`Parser::handle_error`] performs every
//! reduction the state allows regardless of lookahead, tries inserting a
//! single missing token, and pushes an error discontinuity. From then on
//! the version explores recovery candidates through [`Parser::recover`]:
//! unwinding to a summarized previous state, closing out at end of input,
//! or skipping the lookahead. Each candidate is priced by the error-cost
//! model and abandoned as soon as a cheaper version exists.
//!
//! [`Parser::condense_stack`] is the pruning pass between rounds: it drops
//! halted versions, compares the rest pairwise, merges or discards the
//! losers, and resumes at most one paused version.

use super::{Parser, MAX_VERSION_COUNT};
use crate::event::ParseEvent;
use crate::language::{
    Language, ParseAction, StateId, Symbol, ERROR_STATE, SYM_END, SYM_ERROR, SYM_ERROR_REPEAT,
};
use crate::lexer::Lexer;
use crate::length::Length;
use crate::stack::StackVersion;
use crate::tree::Tree;
use smallvec::SmallVec;

/// Depth limit for the stack summaries recorded at error discontinuities.
const MAX_SUMMARY_DEPTH: u32 = 16;

/// The facts version comparison runs on.
#[derive(Debug, Clone, Copy)]
struct ErrorStatus {
    cost: u32,
    node_count: u32,
    dynamic_precedence: i32,
    is_in_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorComparison {
    TakeLeft,
    PreferLeft,
    None,
    PreferRight,
    TakeRight,
}

/// Order two versions. `Take*` means the loser should be dropped outright;
/// `Prefer*` keeps both with the winner ranked first. A cost gap only
/// forces a `Take` once it outweighs the winner's progress since the
/// error.
fn compare_versions(a: ErrorStatus, b: ErrorStatus, max_cost_difference: u32) -> ErrorComparison {
    if !a.is_in_error && b.is_in_error {
        return if a.cost < b.cost {
            ErrorComparison::TakeLeft
        } else {
            ErrorComparison::PreferLeft
        };
    }
    if a.is_in_error && !b.is_in_error {
        return if b.cost < a.cost {
            ErrorComparison::TakeRight
        } else {
            ErrorComparison::PreferRight
        };
    }
    if a.cost < b.cost {
        return if (b.cost - a.cost) * (1 + a.node_count) > max_cost_difference {
            ErrorComparison::TakeLeft
        } else {
            ErrorComparison::PreferLeft
        };
    }
    if b.cost < a.cost {
        return if (a.cost - b.cost) * (1 + b.node_count) > max_cost_difference {
            ErrorComparison::TakeRight
        } else {
            ErrorComparison::PreferRight
        };
    }
    if a.dynamic_precedence > b.dynamic_precedence {
        return ErrorComparison::PreferLeft;
    }
    if b.dynamic_precedence > a.dynamic_precedence {
        return ErrorComparison::PreferRight;
    }
    ErrorComparison::None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReduceActionEntry {
    symbol: Symbol,
    count: u16,
    dynamic_precedence: i32,
    alias_sequence_id: u16,
}

impl Parser {
    fn version_status(&mut self, version: StackVersion) -> ErrorStatus {
        let is_paused = self.stack.is_paused(version);
        let mut cost = self.stack.error_cost(version);
        if is_paused {
            cost += self.costs.per_skipped_tree;
        }
        ErrorStatus {
            cost,
            node_count: self.stack.node_count_since_error(version),
            dynamic_precedence: self.stack.dynamic_precedence(version),
            is_in_error: is_paused || self.stack.state(version) == ERROR_STATE,
        }
    }

    /// Whether the finished tree or some other live version already beats
    /// the given cost, making further work on `version` pointless.
    fn better_version_exists(
        &mut self,
        version: StackVersion,
        is_in_error: bool,
        cost: u32,
    ) -> bool {
        if self
            .finished_tree
            .as_ref()
            .is_some_and(|tree| tree.error_cost() <= cost)
        {
            return true;
        }

        let position = self.stack.position(version);
        let status = ErrorStatus {
            cost,
            is_in_error,
            dynamic_precedence: self.stack.dynamic_precedence(version),
            node_count: self.stack.node_count_since_error(version),
        };

        for i in 0..self.stack.version_count() {
            if i == version
                || !self.stack.is_active(i)
                || self.stack.position(i).bytes < position.bytes
            {
                continue;
            }
            let status_i = self.version_status(i);
            match compare_versions(status, status_i, self.costs.max_cost_difference()) {
                ErrorComparison::TakeRight => return true,
                ErrorComparison::PreferRight => {
                    if self.stack.can_merge(i, version) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    /// The between-rounds pruning pass. Returns the minimum error cost
    /// among live versions that are not themselves mid-error, which is the
    /// threshold a finished tree must beat.
    pub(super) fn condense_stack(&mut self, language: &Language) -> u32 {
        let mut made_changes = false;
        let mut min_error_cost = u32::MAX;
        let mut i = 0;
        while i < self.stack.version_count() {
            if self.stack.is_halted(i) {
                self.stack.remove_version(i);
                continue;
            }

            let status_i = self.version_status(i);
            if !status_i.is_in_error && status_i.cost < min_error_cost {
                min_error_cost = status_i.cost;
            }

            let mut reprocess_slot = false;
            let mut j = 0;
            while j < i {
                let status_j = self.version_status(j);
                match compare_versions(status_j, status_i, self.costs.max_cost_difference()) {
                    ErrorComparison::TakeLeft => {
                        made_changes = true;
                        self.stack.remove_version(i);
                        reprocess_slot = true;
                        break;
                    }
                    ErrorComparison::PreferLeft | ErrorComparison::None => {
                        if self.stack.merge(j, i) {
                            made_changes = true;
                            reprocess_slot = true;
                            break;
                        }
                        j += 1;
                    }
                    ErrorComparison::PreferRight => {
                        made_changes = true;
                        if self.stack.merge(j, i) {
                            reprocess_slot = true;
                            break;
                        }
                        self.stack.swap_versions(i, j);
                        j += 1;
                    }
                    ErrorComparison::TakeRight => {
                        made_changes = true;
                        self.stack.remove_version(j);
                        i -= 1;
                    }
                }
            }
            if reprocess_slot {
                continue;
            }
            i += 1;
        }

        while self.stack.version_count() > MAX_VERSION_COUNT {
            self.stack.remove_version(MAX_VERSION_COUNT);
            made_changes = true;
        }

        if self.stack.version_count() > 0 {
            let mut has_unpaused_version = false;
            let mut i = 0;
            while i < self.stack.version_count() {
                if self.stack.is_paused(i) {
                    if !has_unpaused_version && self.accept_count < MAX_VERSION_COUNT {
                        self.emit(ParseEvent::ResumeVersion { version: i });
                        min_error_cost = self.stack.error_cost(i);
                        let lookahead_symbol = self.stack.resume(i);
                        self.handle_error(language, i, lookahead_symbol);
                        has_unpaused_version = true;
                        i += 1;
                    } else {
                        self.stack.remove_version(i);
                    }
                } else {
                    has_unpaused_version = true;
                    i += 1;
                }
            }
        }

        if made_changes {
            self.emit(ParseEvent::Condense);
        }
        min_error_cost
    }

    /// Apply every reduction available from a version's state. With
    /// `SYM_END` as the lookahead the sweep covers all token symbols and
    /// exploratory versions are kept alive; with a concrete lookahead,
    /// versions that cannot go on to shift it are discarded. Returns
    /// whether some resulting state can shift the lookahead.
    fn do_all_potential_reductions(
        &mut self,
        language: &Language,
        starting_version: StackVersion,
        lookahead_symbol: Symbol,
    ) -> bool {
        let initial_version_count = self.stack.version_count();
        let mut can_shift_lookahead_symbol = false;
        let mut version = starting_version;
        let mut iteration = 0;

        loop {
            let version_count = self.stack.version_count();
            if version >= version_count {
                break;
            }

            let mut merged = false;
            for j in initial_version_count..version {
                if self.stack.merge(j, version) {
                    merged = true;
                    break;
                }
            }
            if merged {
                iteration += 1;
                continue;
            }

            let state = self.stack.state(version);
            let mut has_shift_action = false;
            let mut reduce_actions: SmallVec<[ReduceActionEntry; 4]> = SmallVec::new();

            let (first_symbol, end_symbol) = if lookahead_symbol == SYM_END {
                (1, language.token_count as Symbol)
            } else {
                (lookahead_symbol, lookahead_symbol.saturating_add(1))
            };

            for symbol in first_symbol..end_symbol {
                for action in language.actions(state, symbol) {
                    match *action {
                        ParseAction::Shift {
                            is_extra,
                            is_repetition,
                            ..
                        } => {
                            if !is_extra && !is_repetition {
                                has_shift_action = true;
                            }
                        }
                        ParseAction::Recover => {
                            has_shift_action = true;
                        }
                        ParseAction::Reduce {
                            symbol,
                            child_count,
                            dynamic_precedence,
                            alias_sequence_id,
                        } if child_count > 0 => {
                            let entry = ReduceActionEntry {
                                symbol,
                                count: child_count,
                                dynamic_precedence,
                                alias_sequence_id,
                            };
                            if !reduce_actions.contains(&entry) {
                                reduce_actions.push(entry);
                            }
                        }
                        _ => {}
                    }
                }
            }

            for action in &reduce_actions {
                self.reduce(
                    language,
                    version,
                    action.symbol,
                    u32::from(action.count),
                    action.dynamic_precedence,
                    action.alias_sequence_id,
                    true,
                );
            }

            if has_shift_action {
                can_shift_lookahead_symbol = true;
            } else if !reduce_actions.is_empty()
                && iteration < MAX_VERSION_COUNT
                && version_count < self.stack.version_count()
            {
                self.stack.renumber_version(version_count, version);
                iteration += 1;
                continue;
            } else if lookahead_symbol != SYM_END {
                self.stack.remove_version(version);
            }

            iteration += 1;
            version = if version == starting_version {
                version_count
            } else {
                version + 1
            };
        }

        can_shift_lookahead_symbol
    }

    /// The in-parser discontinuity: run on a just-resumed version. Applies
    /// all potential reductions, attempts one missing-token insertion that
    /// would let the real lookahead reduce, then pushes the error sentinel
    /// and records a recovery summary.
    pub(super) fn handle_error(
        &mut self,
        language: &Language,
        version: StackVersion,
        lookahead_symbol: Symbol,
    ) {
        let previous_version_count = self.stack.version_count();
        self.do_all_potential_reductions(language, version, SYM_END);
        let version_count = self.stack.version_count();

        let mut did_insert_missing_token = false;
        let mut v = version;
        while v < version_count {
            if !did_insert_missing_token {
                let state = self.stack.state(v);
                for missing_symbol in 1..language.token_count as Symbol {
                    let state_after_missing = language.next_state(state, missing_symbol);
                    if state_after_missing == ERROR_STATE {
                        continue;
                    }
                    if !language.has_reduce_action(state_after_missing, lookahead_symbol) {
                        continue;
                    }

                    let version_with_missing_tree = self.stack.copy_version(v);
                    let missing_tree = self.tree_pool.make_missing_leaf(missing_symbol, language);
                    self.stack.push(
                        version_with_missing_tree,
                        Some(missing_tree),
                        false,
                        state_after_missing,
                    );
                    if self.do_all_potential_reductions(
                        language,
                        version_with_missing_tree,
                        lookahead_symbol,
                    ) {
                        self.emit(ParseEvent::RecoverWithMissing {
                            symbol: missing_symbol,
                            state: self.stack.state(version_with_missing_tree),
                        });
                        did_insert_missing_token = true;
                        break;
                    }
                }
            }

            self.stack.push(v, None, false, ERROR_STATE);
            v = if v == version {
                previous_version_count
            } else {
                v + 1
            };
        }

        for _ in previous_version_count..version_count {
            let merged = self.stack.merge(version, previous_version_count);
            debug_assert!(merged, "reduction results must merge into the error version");
        }

        self.stack.record_summary(version, MAX_SUMMARY_DEPTH);
    }

    /// Unwind `depth` entries and bundle the popped trees into an extra
    /// error node sitting before `goal_state`. An error subtree already on
    /// top of the stack is folded into the new node.
    fn recover_to_state(
        &mut self,
        language: &Language,
        version: StackVersion,
        depth: u32,
        goal_state: StateId,
    ) -> bool {
        let pop = self.stack.pop_count(version, depth);
        let mut previous_version: Option<StackVersion> = None;

        for slice in pop {
            if previous_version == Some(slice.version) {
                continue;
            }
            if self.stack.state(slice.version) != goal_state {
                self.stack.halt(slice.version);
                continue;
            }

            let mut trees = slice.trees;
            let error_trees = self.stack.pop_error(slice.version);
            if let Some(error_tree) = error_trees.first() {
                debug_assert_eq!(error_trees.len(), 1);
                let children: Vec<Tree> = error_tree.children().to_vec();
                trees.splice(0..0, children);
            }

            let mut trailing_extras = Vec::new();
            while trees.last().is_some_and(Tree::extra) {
                if let Some(extra) = trees.pop() {
                    trailing_extras.push(extra);
                }
            }
            trailing_extras.reverse();

            if !trees.is_empty() {
                let mut error = self.tree_pool.make_error_node(trees, language);
                error.set_extra(true);
                self.stack
                    .push(slice.version, Some(error), false, goal_state);
            }
            for tree in trailing_extras {
                self.stack
                    .push(slice.version, Some(tree), false, goal_state);
            }

            previous_version = Some(slice.version);
        }

        previous_version.is_some()
    }

    /// Cost-driven recovery for a version sitting at an error. Tries
    /// unwinding to a summarized state, closes out at end of input, and
    /// otherwise skips the lookahead into the current error run, with
    /// each step skipped or abandoned when a better version already
    /// exists.
    pub(super) fn recover(
        &mut self,
        language: &Language,
        version: StackVersion,
        mut lookahead: Tree,
    ) {
        let mut did_recover = false;
        let previous_version_count = self.stack.version_count();
        let position = self.stack.position(version);
        let summary = self.stack.summary(version);
        let node_count_since_error = self.stack.node_count_since_error(version);
        let current_error_cost = self.stack.error_cost(version);

        if lookahead.symbol() != SYM_ERROR {
            for entry in summary.unwrap_or_default() {
                if entry.state == ERROR_STATE {
                    continue;
                }
                if entry.position.bytes == position.bytes {
                    continue;
                }
                let mut depth = entry.depth;
                if node_count_since_error > 0 {
                    depth += 1;
                }

                let mut would_merge = false;
                for j in 0..previous_version_count {
                    if self.stack.state(j) == entry.state
                        && self.stack.position(j).bytes == position.bytes
                    {
                        would_merge = true;
                        break;
                    }
                }
                if would_merge {
                    continue;
                }

                let new_cost = current_error_cost
                    + entry.depth * self.costs.per_skipped_tree
                    + (position.bytes - entry.position.bytes) * self.costs.per_skipped_char
                    + (position.extent.row - entry.position.extent.row)
                        * self.costs.per_skipped_line;
                if self.better_version_exists(version, false, new_cost) {
                    break;
                }

                if language.has_actions(entry.state, lookahead.symbol())
                    && self.recover_to_state(language, version, depth, entry.state)
                {
                    did_recover = true;
                    self.emit(ParseEvent::RecoverToPrevious {
                        state: entry.state,
                        depth,
                    });
                    break;
                }
            }
        }

        let mut i = previous_version_count;
        while i < self.stack.version_count() {
            if !self.stack.is_active(i) {
                self.stack.remove_version(i);
            } else {
                i += 1;
            }
        }

        if did_recover && self.stack.version_count() > MAX_VERSION_COUNT {
            self.stack.halt(version);
            return;
        }

        if lookahead.symbol() == SYM_END {
            self.emit(ParseEvent::RecoverEof);
            let root_error = self.tree_pool.make_error_node(Vec::new(), language);
            self.stack.push(version, Some(root_error), false, 1);
            self.accept(language, version, lookahead);
            return;
        }

        let new_cost = current_error_cost
            + self.costs.per_skipped_tree
            + lookahead.total_bytes() * self.costs.per_skipped_char
            + lookahead.total_size().extent.row * self.costs.per_skipped_line;
        if self.better_version_exists(version, false, new_cost) {
            self.stack.halt(version);
            return;
        }

        if let Some(ParseAction::Shift { is_extra: true, .. }) =
            language.actions(1, lookahead.symbol()).last()
        {
            lookahead.set_extra(true);
        }

        self.emit(ParseEvent::SkipToken {
            symbol: lookahead.symbol(),
        });
        let has_external = lookahead.has_external_tokens();
        let external = lookahead.last_external_token();
        let mut error_repeat =
            self.tree_pool
                .make_node(SYM_ERROR_REPEAT, vec![lookahead], 0, language);

        if node_count_since_error > 0 {
            // Fold this skip into the error run already on top of the
            // stack, keeping one merged run per discontinuity.
            let mut pop = self.stack.pop_count(version, 1);
            debug_assert_eq!(pop.len(), 1);
            let popped = pop.drain(..).next();
            if let Some(mut slice) = popped {
                debug_assert_eq!(slice.trees.len(), 1);
                self.stack.renumber_version(slice.version, version);
                slice.trees.push(error_repeat);
                error_repeat =
                    self.tree_pool
                        .make_node(SYM_ERROR_REPEAT, slice.trees, 0, language);
            }
        }

        self.stack
            .push(version, Some(error_repeat), false, ERROR_STATE);
        if has_external {
            self.stack.set_last_external_token(version, external);
        }
    }

    /// Give up entirely: wrap the unconsumed input in an invisible error
    /// leaf under an error root, and accept that. The caller still gets a
    /// tree spanning the whole input.
    pub(super) fn halt_parse(&mut self, language: &Language, lexer: &mut Lexer<'_>) {
        self.emit(ParseEvent::HaltingParse);

        lexer.advance_to_end();
        let remaining_length = lexer.current_position() - self.stack.position(0);

        let mut filler = self
            .tree_pool
            .make_error(remaining_length, Length::ZERO, None, language);
        filler.set_visible(false);
        self.stack.push(0, Some(filler), false, ERROR_STATE);

        let root_error = self.tree_pool.make_error_node(Vec::new(), language);
        self.stack.push(0, Some(root_error), false, ERROR_STATE);

        let eof = self
            .tree_pool
            .make_leaf(SYM_END, Length::ZERO, Length::ZERO, language);
        self.accept(language, 0, eof);
    }
}
