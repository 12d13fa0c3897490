//! The parser driver.
//!
//! [`Parser`] orchestrates everything: it advances each live stack version
//! round-robin, pulling lookahead tokens from the previous tree, the token
//! cache, or the lexer; consults the parse table; forks and merges the GSS
//! on ambiguity; and hands back the finished tree once some version
//! accepts with a lower error cost than every surviving alternative.
//!
//! Error recovery and version condensation live in [`recovery`].

mod recovery;

use crate::event::{ParseEvent, ParseEventHandler};
use crate::input::Input;
use crate::language::{
    ErrorCosts, Language, LanguageError, ParseAction, StateId, Symbol, TableEntry, ERROR_STATE,
    LANGUAGE_VERSION, STATE_NONE, SYM_END, SYM_ERROR, SYM_ERROR_REPEAT,
};
use crate::lexer::Lexer;
use crate::length::Length;
use crate::reusable::ReusableNode;
use crate::stack::{Stack, StackVersion};
use crate::tree::{external_state_eq, SyntaxTree, Tree, TreePool};
use std::cmp::Ordering;
use std::rc::Rc;

/// The most stack versions kept alive at once.
pub const MAX_VERSION_COUNT: usize = 6;

#[derive(Debug, Default)]
struct TokenCache {
    byte_index: u32,
    token: Option<Tree>,
    last_external_token: Option<Tree>,
}

/// An incremental GLR parser instance.
///
/// A parser is configured once with [`Parser::set_language`] and then
/// reused across any number of [`Parser::parse`] calls. It is strictly
/// single-threaded; the GLR "parallelism" is logical, expressed as stack
/// versions advanced in turn.
pub struct Parser {
    language: Option<Rc<Language>>,
    costs: ErrorCosts,
    stack: Stack,
    tree_pool: TreePool,
    reusable_node: ReusableNode,
    token_cache: TokenCache,
    finished_tree: Option<Tree>,
    scanner: Option<Box<dyn crate::language::ExternalScanner>>,
    accept_count: usize,
    in_ambiguity: bool,
    events: Option<Box<dyn ParseEventHandler>>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            language: None,
            costs: ErrorCosts::default(),
            stack: Stack::new(),
            tree_pool: TreePool::new(),
            reusable_node: ReusableNode::default(),
            token_cache: TokenCache::default(),
            finished_tree: None,
            scanner: None,
            accept_count: 0,
            in_ambiguity: false,
            events: None,
        }
    }

    /// Install a compiled grammar. Any previously created external-scanner
    /// payload is destroyed; a new one is created if the grammar has an
    /// external scanner.
    pub fn set_language(&mut self, language: &Rc<Language>) -> Result<(), LanguageError> {
        if language.version != LANGUAGE_VERSION {
            return Err(LanguageError::VersionMismatch {
                found: language.version,
                expected: LANGUAGE_VERSION,
            });
        }
        self.scanner = language
            .external_scanner
            .as_ref()
            .map(|scanner| (scanner.create)());
        self.costs = language.costs;
        self.language = Some(Rc::clone(language));
        self.finished_tree = None;
        self.stack.clear();
        self.set_cached_token(0, None, None);
        Ok(())
    }

    #[must_use]
    pub fn language(&self) -> Option<&Rc<Language>> {
        self.language.as_ref()
    }

    /// Install or remove the event sink.
    pub fn set_event_handler(&mut self, handler: Option<Box<dyn ParseEventHandler>>) {
        self.events = handler;
    }

    /// The pool backing this parser's trees. Its live count drops to zero
    /// once the parser and every tree it produced are gone.
    #[must_use]
    pub fn tree_pool(&self) -> &TreePool {
        &self.tree_pool
    }

    /// Parse `input`, optionally reusing unchanged subtrees of a previous
    /// tree whose edits have been applied with [`SyntaxTree::edit`].
    ///
    /// With `halt_on_error`, the first unrecoverable error stops the parse
    /// and an all-error tree is synthesized; otherwise recovery continues
    /// until some version accepts or every version halts.
    pub fn parse(
        &mut self,
        input: &mut dyn Input,
        previous_tree: Option<&SyntaxTree>,
        halt_on_error: bool,
    ) -> Option<SyntaxTree> {
        let language = Rc::clone(self.language.as_ref()?);
        if previous_tree.is_some() {
            self.emit(ParseEvent::ParseAfterEdit);
        } else {
            self.emit(ParseEvent::NewParse);
        }

        if let Some(scanner) = self.scanner.as_mut() {
            scanner.deserialize(&[]);
        }
        let mut lexer = Lexer::new(input);
        self.stack.clear();
        self.reusable_node = ReusableNode::new(previous_tree.map(|tree| tree.root().clone()));
        self.finished_tree = None;
        self.accept_count = 0;
        self.in_ambiguity = false;
        self.set_cached_token(0, None, None);

        let mut last_position = 0u32;
        loop {
            let mut version = 0;
            let mut round_reusable = self.reusable_node.clone();
            while version < self.stack.version_count() {
                round_reusable = self.reusable_node.clone();
                while self.stack.is_active(version) {
                    self.emit(ParseEvent::Process {
                        version,
                        version_count: self.stack.version_count(),
                        state: self.stack.state(version),
                        position: self.stack.position(version),
                    });
                    self.advance(&language, &mut lexer, version, &mut round_reusable);
                    let position = self.stack.position(version).bytes;
                    if position > last_position || (version > 0 && position == last_position) {
                        last_position = position;
                        break;
                    }
                }
                version += 1;
            }
            self.reusable_node = round_reusable;

            let min_error_cost = self.condense_stack(&language);
            if self
                .finished_tree
                .as_ref()
                .is_some_and(|tree| tree.error_cost() < min_error_cost)
            {
                break;
            }
            if halt_on_error && min_error_cost > 0 {
                self.halt_parse(&language, &mut lexer);
                break;
            }
            self.in_ambiguity = self.stack.version_count() > 1;
            if self.stack.version_count() == 0 {
                break;
            }
        }

        self.stack.clear();
        self.set_cached_token(0, None, None);
        self.reusable_node = ReusableNode::default();
        self.emit(ParseEvent::Done);
        self.finished_tree.take().map(SyntaxTree::new)
    }

    fn emit(&mut self, event: ParseEvent) {
        if let Some(handler) = self.events.as_deref_mut() {
            handler.handle(&event);
        }
    }

    /// One step for one version: fetch a lookahead, apply the table
    /// entry's actions, and either consume input, record reductions and
    /// retry, or fall into recovery.
    fn advance(
        &mut self,
        language: &Language,
        lexer: &mut Lexer<'_>,
        version: StackVersion,
        reusable: &mut ReusableNode,
    ) {
        let mut state = self.stack.state(version);
        let (mut lookahead, mut entry) =
            self.get_lookahead(language, lexer, version, &mut state, reusable);

        loop {
            let mut last_reduction_version: Option<StackVersion> = None;

            for action in &entry.actions {
                match *action {
                    ParseAction::Shift {
                        state: shift_state,
                        is_extra,
                        is_repetition,
                    } => {
                        if is_repetition {
                            continue;
                        }
                        let mut next_state = if is_extra {
                            self.emit(ParseEvent::ShiftExtra);
                            state
                        } else {
                            self.emit(ParseEvent::Shift { state: shift_state });
                            shift_state
                        };
                        if lookahead.child_count() > 0 {
                            self.breakdown_lookahead(&mut lookahead, state, reusable);
                            next_state = language.next_state(state, lookahead.symbol());
                        }
                        let consumed_reusable = reusable
                            .tree()
                            .is_some_and(|tree| tree.ptr_eq(&lookahead));
                        self.shift(version, next_state, lookahead, is_extra);
                        if consumed_reusable {
                            reusable.pop();
                        }
                        return;
                    }
                    ParseAction::Reduce {
                        symbol,
                        child_count,
                        dynamic_precedence,
                        alias_sequence_id,
                    } => {
                        let fragile = entry.actions.len() > 1;
                        self.emit(ParseEvent::Reduce {
                            symbol,
                            child_count,
                        });
                        if let Some(reduced) = self.reduce(
                            language,
                            version,
                            symbol,
                            u32::from(child_count),
                            dynamic_precedence,
                            alias_sequence_id,
                            fragile,
                        ) {
                            last_reduction_version = Some(reduced);
                        }
                    }
                    ParseAction::Accept => {
                        self.emit(ParseEvent::Accept);
                        self.accept(language, version, lookahead);
                        return;
                    }
                    ParseAction::Recover => {
                        while lookahead.child_count() > 0 {
                            self.breakdown_lookahead(&mut lookahead, state, reusable);
                        }
                        let consumed_reusable = reusable
                            .tree()
                            .is_some_and(|tree| tree.ptr_eq(&lookahead));
                        self.recover(language, version, lookahead);
                        if consumed_reusable {
                            reusable.pop();
                        }
                        return;
                    }
                    ParseAction::Error => {}
                }
            }

            if let Some(reduced) = last_reduction_version {
                self.stack.renumber_version(reduced, version);
            } else if state == ERROR_STATE {
                self.recover(language, version, lookahead);
                return;
            } else if !self.breakdown_top_of_stack(language, version) {
                self.emit(ParseEvent::DetectError);
                self.stack.pause(version, lookahead.first_leaf().symbol);
                return;
            }

            state = self.stack.state(version);
            entry = language.table_entry(state, lookahead.first_leaf().symbol);
        }
    }

    /// Fetch the next lookahead for a version, preferring a reusable node
    /// from the previous tree, then the token cache, then a fresh lex.
    fn get_lookahead<'l>(
        &mut self,
        language: &'l Language,
        lexer: &mut Lexer<'_>,
        version: StackVersion,
        state: &mut StateId,
        reusable: &mut ReusableNode,
    ) -> (Tree, &'l TableEntry) {
        let position = self.stack.position(version);
        let last_external_token = self.stack.last_external_token(version);

        while let Some(result) = reusable.tree().cloned() {
            if reusable.byte_index() > position.bytes {
                break;
            }
            if reusable.byte_index() < position.bytes {
                reusable.pop();
                continue;
            }
            if !external_state_eq(
                reusable.last_external_token(),
                last_external_token.as_ref(),
            ) {
                self.emit(ParseEvent::CantReuseNode {
                    symbol: result.symbol(),
                    reason: "different_external_scanner_state",
                });
                reusable.pop();
                continue;
            }

            let reason = if result.has_changes() {
                Some("has_changes")
            } else if result.is_error() || result.symbol() == SYM_ERROR_REPEAT {
                Some("is_error")
            } else if result.is_missing() {
                Some("is_missing")
            } else if result.fragile_left() || result.fragile_right() {
                Some("is_fragile")
            } else if self.in_ambiguity && result.child_count() > 0 {
                Some("in_ambiguity")
            } else {
                None
            };

            if let Some(reason) = reason {
                self.emit(ParseEvent::CantReuseNode {
                    symbol: result.symbol(),
                    reason,
                });
                if !reusable.breakdown() {
                    reusable.pop();
                    self.breakdown_top_of_stack(language, version);
                    *state = self.stack.state(version);
                }
                continue;
            }

            let entry = language.table_entry(*state, result.first_leaf().symbol);
            if !self.can_reuse_first_leaf(language, *state, &result, entry) {
                self.emit(ParseEvent::CantReuseNode {
                    symbol: result.symbol(),
                    reason: "first_leaf_not_reusable",
                });
                *reusable = reusable.after_leaf();
                break;
            }

            self.emit(ParseEvent::ReuseNode {
                symbol: result.symbol(),
            });
            return (result, entry);
        }

        if let Some(token) = self.get_cached_token(position.bytes, last_external_token.as_ref()) {
            let entry = language.table_entry(*state, token.first_leaf().symbol);
            if self.can_reuse_first_leaf(language, *state, &token, entry) {
                return (token, entry);
            }
        }

        let token = self.lex(language, lexer, version, *state);
        self.set_cached_token(position.bytes, last_external_token, Some(token.clone()));
        let entry = language.table_entry(*state, token.symbol());
        (token, entry)
    }

    /// A leaf lexed under one lex mode may be offered to a state with a
    /// different mode only if it is non-empty, external scanning is off,
    /// and the table marks the entry reusable.
    fn can_reuse_first_leaf(
        &self,
        language: &Language,
        state: StateId,
        tree: &Tree,
        entry: &TableEntry,
    ) -> bool {
        let current_lex_mode = language.lex_mode(state);
        let first_leaf = tree.first_leaf();
        if first_leaf.lex_mode == current_lex_mode
            && (Some(first_leaf.symbol) != language.keyword_capture_token
                || tree.parse_state() == state)
        {
            return true;
        }
        if tree.size().bytes == 0 && tree.symbol() != SYM_END {
            return false;
        }
        current_lex_mode.external_lex_state == 0 && entry.is_reusable
    }

    fn get_cached_token(&self, byte_index: u32, last_external_token: Option<&Tree>) -> Option<Tree> {
        let token = self.token_cache.token.as_ref()?;
        if self.token_cache.byte_index == byte_index
            && external_state_eq(
                self.token_cache.last_external_token.as_ref(),
                last_external_token,
            )
        {
            Some(token.clone())
        } else {
            None
        }
    }

    fn set_cached_token(
        &mut self,
        byte_index: u32,
        last_external_token: Option<Tree>,
        token: Option<Tree>,
    ) {
        self.token_cache.byte_index = byte_index;
        self.token_cache.last_external_token = last_external_token;
        self.token_cache.token = token;
    }

    fn restore_external_scanner(&mut self, external_token: Option<&Tree>) {
        if let Some(scanner) = self.scanner.as_mut() {
            let state = external_token
                .and_then(Tree::external_token_state)
                .unwrap_or(&[]);
            scanner.deserialize(state);
        }
    }

    /// Produce one token at the version's position. External tokens take
    /// priority where enabled; on lexical failure the lexer re-runs in the
    /// error mode and finally skips characters into an error token.
    fn lex(
        &mut self,
        language: &Language,
        lexer: &mut Lexer<'_>,
        version: StackVersion,
        parse_state: StateId,
    ) -> Tree {
        let start_position = self.stack.position(version);
        let external_token = self.stack.last_external_token(version);
        let mut lex_mode = language.lex_mode(parse_state);
        let mut external_enabled = lex_mode.external_lex_state != 0;

        let mut found_external_token = false;
        let mut error_mode = parse_state == ERROR_STATE;
        let mut skipped_error = false;
        let mut first_error_character = None;
        let mut error_start_position = Length::ZERO;
        let mut error_end_position = Length::ZERO;
        let mut last_byte_scanned = start_position.bytes;
        lexer.reset(start_position);

        loop {
            let current_position = lexer.current_position();

            if external_enabled {
                if let Some(valid_tokens) = language.enabled_external_tokens(lex_mode.external_lex_state)
                {
                    lexer.start();
                    self.restore_external_scanner(external_token.as_ref());
                    let scanned = match self.scanner.as_mut() {
                        Some(scanner) => scanner.scan(lexer, valid_tokens),
                        None => false,
                    };
                    if scanned {
                        if lexer.token_end().is_none() {
                            lexer.mark_end();
                        }
                        let token_end = lexer.token_end().unwrap_or(current_position);
                        if !error_mode || token_end.bytes > current_position.bytes {
                            found_external_token = true;
                            break;
                        }
                    }
                    if lexer.current_position().bytes > last_byte_scanned {
                        last_byte_scanned = lexer.current_position().bytes;
                    }
                    lexer.reset(current_position);
                }
            }

            lexer.start();
            if (language.lex_fn)(lexer, lex_mode.lex_state) {
                break;
            }

            if !error_mode {
                error_mode = true;
                lex_mode = language.lex_mode(ERROR_STATE);
                external_enabled = lex_mode.external_lex_state != 0;
                if lexer.current_position().bytes > last_byte_scanned {
                    last_byte_scanned = lexer.current_position().bytes;
                }
                lexer.reset(start_position);
                continue;
            }

            if !skipped_error {
                self.emit(ParseEvent::SkipUnrecognizedCharacter);
                skipped_error = true;
                error_start_position = lexer.token_start();
                error_end_position = lexer.token_start();
                first_error_character = lexer.lookahead();
            }

            if lexer.current_position().bytes == error_end_position.bytes {
                if lexer.at_end() {
                    lexer.set_result_symbol(SYM_ERROR);
                    break;
                }
                lexer.advance(false);
            }
            error_end_position = lexer.current_position();
        }

        if lexer.current_position().bytes > last_byte_scanned {
            last_byte_scanned = lexer.current_position().bytes;
        }

        let mut result = if skipped_error {
            let padding = error_start_position - start_position;
            let size = error_end_position - error_start_position;
            self.tree_pool
                .make_error(size, padding, first_error_character, language)
        } else {
            let token_end = lexer.token_end().unwrap_or_else(|| lexer.current_position());
            let mut token_start = lexer.token_start();
            if token_end.bytes < token_start.bytes {
                token_start = token_end;
            }
            let padding = token_start - start_position;
            let size = token_end - token_start;
            let mut symbol = lexer.result_symbol();

            if found_external_token {
                symbol = language
                    .external_scanner
                    .as_ref()
                    .and_then(|scanner| scanner.symbol_map.get(symbol as usize).copied())
                    .unwrap_or(symbol);
            } else if language.keyword_capture_token == Some(symbol) {
                if let Some(keyword_lex_fn) = language.keyword_lex_fn {
                    let end_byte = token_end.bytes;
                    lexer.reset(token_start);
                    lexer.start();
                    if keyword_lex_fn(lexer, 0)
                        && lexer.token_end().map(|end| end.bytes) == Some(end_byte)
                        && language.has_actions(parse_state, lexer.result_symbol())
                    {
                        symbol = lexer.result_symbol();
                    }
                }
            }

            let mut tree = self.tree_pool.make_leaf(symbol, padding, size, language);
            if found_external_token {
                if let Some(scanner) = self.scanner.as_ref() {
                    tree.set_external_token_state(scanner.serialize());
                }
            }
            tree
        };

        result.set_bytes_scanned(last_byte_scanned - start_position.bytes + 1);
        result.set_parse_state(parse_state);
        result.set_first_leaf_lex_mode(lex_mode);
        self.emit(ParseEvent::LexedLookahead {
            symbol: result.symbol(),
            size_bytes: result.size().bytes,
        });
        result
    }

    /// Pick between two candidate trees covering the same span. Returns
    /// `true` when the right tree should replace the left.
    fn select_tree(&mut self, left: Option<&Tree>, right: &Tree) -> bool {
        let Some(left) = left else { return true };
        match right.error_cost().cmp(&left.error_cost()) {
            Ordering::Less => return true,
            Ordering::Greater => return false,
            Ordering::Equal => {}
        }
        match right.dynamic_precedence().cmp(&left.dynamic_precedence()) {
            Ordering::Greater => return true,
            Ordering::Less => return false,
            Ordering::Equal => {}
        }
        if left.error_cost() > 0 {
            return true;
        }
        left.compare(right) == Ordering::Greater
    }

    fn shift(
        &mut self,
        version: StackVersion,
        state: StateId,
        mut lookahead: Tree,
        extra: bool,
    ) {
        if extra != lookahead.extra() {
            lookahead.set_extra(extra);
        }
        let is_pending = lookahead.child_count() > 0;
        let external = if lookahead.has_external_tokens() {
            lookahead.last_external_token()
        } else {
            None
        };
        self.stack.push(version, Some(lookahead), is_pending, state);
        if external.is_some() {
            self.stack.set_last_external_token(version, external);
        }
    }

    /// Collapse the top `count` stack entries of a version into a new
    /// parent node. Pops across merged histories yield several slices;
    /// contiguous slices that land on the same version are folded into a
    /// single parent through [`Parser::select_tree`].
    #[allow(clippy::too_many_arguments)]
    fn reduce(
        &mut self,
        language: &Language,
        version: StackVersion,
        symbol: Symbol,
        count: u32,
        dynamic_precedence: i32,
        alias_sequence_id: u16,
        fragile: bool,
    ) -> Option<StackVersion> {
        let initial_version_count = self.stack.version_count();
        let mut pop = self.stack.pop_count(version, count);
        let slice_count = pop.len();
        let first_version = pop.first().map(|slice| slice.version);

        let mut i = 0;
        while i < pop.len() {
            let slice_version = pop[i].version;
            let mut slice_trees = std::mem::take(&mut pop[i].trees);

            // Trailing extras are not part of the new parent; they get
            // re-pushed above it afterwards.
            let mut child_count = slice_trees.len();
            while child_count > 0 && slice_trees[child_count - 1].extra() {
                child_count -= 1;
            }
            let mut parent = self.tree_pool.make_node(
                symbol,
                slice_trees[..child_count].to_vec(),
                alias_sequence_id,
                language,
            );

            // Histories that diverged from a common state collapse into
            // one version here; keep the best tree among them.
            while i + 1 < pop.len() && pop[i + 1].version == slice_version {
                i += 1;
                let next_trees = std::mem::take(&mut pop[i].trees);
                let mut next_child_count = next_trees.len();
                while next_child_count > 0 && next_trees[next_child_count - 1].extra() {
                    next_child_count -= 1;
                }
                let candidate = self.tree_pool.make_node(
                    symbol,
                    next_trees[..next_child_count].to_vec(),
                    alias_sequence_id,
                    language,
                );
                if self.select_tree(Some(&parent), &candidate) {
                    parent = candidate;
                    slice_trees = next_trees;
                }
            }

            parent.add_dynamic_precedence(dynamic_precedence);

            let state = self.stack.state(slice_version);
            let next_state = language.next_state(state, symbol);
            if fragile || self.in_ambiguity || slice_count > 1 || initial_version_count > 1 {
                parent.mark_fragile();
                parent.set_parse_state(STATE_NONE);
            } else {
                parent.set_parse_state(state);
            }

            let parent_child_count = parent.child_count();
            self.stack
                .push(slice_version, Some(parent), false, next_state);
            for tree in slice_trees.into_iter().skip(parent_child_count) {
                self.stack.push(slice_version, Some(tree), false, next_state);
            }

            if self.stack.version_count() > MAX_VERSION_COUNT {
                for slice in pop.iter().skip(i + 1) {
                    self.stack.halt(slice.version);
                }
                while self.stack.version_count() > slice_version + 1 {
                    self.stack.remove_version(slice_version + 1);
                }
                break;
            }
            i += 1;
        }

        // Merge the newly created versions pairwise where possible.
        let mut i = initial_version_count;
        while i < self.stack.version_count() {
            let mut merged = false;
            let mut j = initial_version_count;
            while j < i {
                if self.stack.merge(j, i) {
                    merged = true;
                    break;
                }
                j += 1;
            }
            if !merged {
                i += 1;
            }
        }

        first_version
    }

    /// Finish a version: wrap the remaining stack contents into a root
    /// node and keep the best finished tree seen so far.
    fn accept(&mut self, language: &Language, version: StackVersion, mut lookahead: Tree) {
        lookahead.set_extra(true);
        debug_assert_eq!(lookahead.symbol(), SYM_END);
        self.stack.push(version, Some(lookahead), false, 1);

        let pop = self.stack.pop_all(version);
        let first_version = pop.first().map(|slice| slice.version);
        for slice in pop {
            let mut trees = slice.trees;
            let mut root = None;
            for j in (0..trees.len()).rev() {
                if !trees[j].extra() {
                    let child = trees[j].clone();
                    let grandchildren: Vec<Tree> = child.children().to_vec();
                    trees.splice(j..=j, grandchildren);
                    root = Some(self.tree_pool.make_node(
                        child.symbol(),
                        trees,
                        child.alias_sequence_id(),
                        language,
                    ));
                    break;
                }
            }
            let Some(root) = root else { continue };
            self.accept_count += 1;

            let existing = self.finished_tree.take();
            if self.select_tree(existing.as_ref(), &root) {
                self.finished_tree = Some(root);
            } else {
                self.finished_tree = existing;
            }
        }

        if let Some(first_version) = first_version {
            self.stack.remove_version(first_version);
        }
        self.stack.halt(version);
    }

    /// Re-shift a pending composite at the top of the stack as its
    /// individual children, exposing the smaller parse states inside it.
    fn breakdown_top_of_stack(&mut self, language: &Language, version: StackVersion) -> bool {
        let mut did_break_down = false;
        let mut pending = false;

        loop {
            let pop = self.stack.pop_pending(version);
            if pop.is_empty() {
                break;
            }

            did_break_down = true;
            pending = false;
            for slice in pop {
                let mut state = self.stack.state(slice.version);
                let Some(parent) = slice.trees.first().cloned() else {
                    continue;
                };

                for child in parent.children() {
                    pending = child.child_count() > 0;
                    if child.symbol() == SYM_ERROR {
                        state = ERROR_STATE;
                    } else if !child.extra() {
                        state = language.next_state(state, child.symbol());
                    }
                    self.stack
                        .push(slice.version, Some(child.clone()), pending, state);
                }
                for tree in slice.trees.iter().skip(1) {
                    self.stack
                        .push(slice.version, Some(tree.clone()), false, state);
                }
                self.emit(ParseEvent::BreakdownTopOfStack {
                    symbol: parent.symbol(),
                });
            }

            if !pending {
                break;
            }
        }

        did_break_down
    }

    /// Descend the reusable cursor until its tree's stored parse state
    /// matches the current state, updating the lookahead to follow.
    fn breakdown_lookahead(
        &mut self,
        lookahead: &mut Tree,
        state: StateId,
        reusable: &mut ReusableNode,
    ) {
        let mut did_break_down = false;
        while reusable
            .tree()
            .is_some_and(|tree| tree.child_count() > 0 && tree.parse_state() != state)
        {
            self.emit(ParseEvent::StateMismatch {
                symbol: reusable.tree().map_or(SYM_ERROR, Tree::symbol),
            });
            reusable.breakdown();
            did_break_down = true;
        }
        if did_break_down {
            if let Some(tree) = reusable.tree() {
                *lookahead = tree.clone();
            }
        }
    }
}
