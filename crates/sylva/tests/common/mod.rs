//! Shared fixtures: hand-compiled language bundles and event helpers.
//!
//! The table compiler is outside this crate, so the tests carry a few
//! small grammars compiled by hand. State `0` is always the error state
//! and row `0` is left empty; state `1` is the start state.

#![allow(dead_code)]

use hashbrown::HashMap;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;
use sylva::{
    ErrorCosts, ExternalScanner, ExternalScannerDef, Language, LexMode, Lexer, ParseAction,
    ParseEvent, ParseEventHandler, Parser, StateId, StringInput, Symbol, SymbolMetadata,
    SyntaxTree, TableEntry, Tree, LANGUAGE_VERSION,
};

pub fn shift(state: StateId) -> ParseAction {
    ParseAction::Shift {
        state,
        is_extra: false,
        is_repetition: false,
    }
}

pub fn reduce(symbol: Symbol, child_count: u16) -> ParseAction {
    reduce_prec(symbol, child_count, 0)
}

pub fn reduce_prec(symbol: Symbol, child_count: u16, dynamic_precedence: i32) -> ParseAction {
    ParseAction::Reduce {
        symbol,
        child_count,
        dynamic_precedence,
        alias_sequence_id: 0,
    }
}

pub fn entry(actions: Vec<ParseAction>) -> TableEntry {
    TableEntry {
        actions,
        is_reusable: true,
        depends_on_lookahead: false,
    }
}

fn visible() -> SymbolMetadata {
    SymbolMetadata {
        visible: true,
        named: true,
        extra: false,
    }
}

fn hidden() -> SymbolMetadata {
    SymbolMetadata::default()
}

type Row = (StateId, Symbol, TableEntry);

fn build_table(
    state_count: usize,
    rows: Vec<Row>,
) -> Vec<HashMap<Symbol, TableEntry, ahash::RandomState>> {
    let mut table: Vec<HashMap<Symbol, TableEntry, ahash::RandomState>> =
        (0..state_count).map(|_| HashMap::default()).collect();
    for (state, symbol, table_entry) in rows {
        table[state as usize].insert(symbol, table_entry);
    }
    table
}

fn skip_blanks(lexer: &mut Lexer<'_>) {
    while matches!(lexer.lookahead(), Some(' ') | Some('\n')) {
        lexer.advance(true);
    }
}

// --- `S -> a b` ------------------------------------------------------------

pub mod seq {
    pub const A: super::Symbol = 1;
    pub const B: super::Symbol = 2;
    pub const S: super::Symbol = 3;
}

fn seq_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    match lexer.lookahead() {
        Some('a') => {
            lexer.advance(false);
            lexer.accept(seq::A);
            true
        }
        Some('b') => {
            lexer.advance(false);
            lexer.accept(seq::B);
            true
        }
        None => {
            lexer.accept(0);
            true
        }
        _ => false,
    }
}

/// `S -> a b`, whitespace skipped as padding.
pub fn seq_language() -> Rc<Language> {
    Rc::new(Language {
        version: LANGUAGE_VERSION,
        symbol_count: 4,
        token_count: 3,
        state_count: 5,
        alias_sequence_count: 0,
        parse_table: build_table(
            5,
            vec![
                (1, seq::A, entry(vec![shift(2)])),
                (1, seq::S, entry(vec![shift(4)])),
                (2, seq::B, entry(vec![shift(3)])),
                (3, 0, entry(vec![reduce(seq::S, 2)])),
                (4, 0, entry(vec![ParseAction::Accept])),
            ],
        ),
        lex_modes: vec![LexMode::default(); 5],
        external_tokens: vec![Vec::new()],
        lex_fn: seq_lex,
        keyword_capture_token: None,
        keyword_lex_fn: None,
        external_scanner: None,
        symbol_metadata: vec![hidden(), visible(), visible(), visible()],
        alias_sequences: vec![Vec::new()],
        costs: ErrorCosts::default(),
    })
}

// --- ambiguous `S -> A | B`, `A -> a`, `B -> a` ----------------------------

pub mod ambig {
    pub const A_TOKEN: super::Symbol = 1;
    pub const NA: super::Symbol = 2;
    pub const NB: super::Symbol = 3;
    pub const S: super::Symbol = 4;
}

fn ambig_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    match lexer.lookahead() {
        Some('a') => {
            lexer.advance(false);
            lexer.accept(ambig::A_TOKEN);
            true
        }
        None => {
            lexer.accept(0);
            true
        }
        _ => false,
    }
}

/// Two productions compete for the same token; `A` carries dynamic
/// precedence 10.
pub fn ambig_language() -> Rc<Language> {
    Rc::new(Language {
        version: LANGUAGE_VERSION,
        symbol_count: 5,
        token_count: 2,
        state_count: 6,
        alias_sequence_count: 0,
        parse_table: build_table(
            6,
            vec![
                (1, ambig::A_TOKEN, entry(vec![shift(2)])),
                (1, ambig::NA, entry(vec![shift(3)])),
                (1, ambig::NB, entry(vec![shift(4)])),
                (1, ambig::S, entry(vec![shift(5)])),
                (
                    2,
                    0,
                    entry(vec![
                        reduce_prec(ambig::NA, 1, 10),
                        reduce_prec(ambig::NB, 1, 0),
                    ]),
                ),
                (3, 0, entry(vec![reduce(ambig::S, 1)])),
                (4, 0, entry(vec![reduce(ambig::S, 1)])),
                (5, 0, entry(vec![ParseAction::Accept])),
            ],
        ),
        lex_modes: vec![LexMode::default(); 6],
        external_tokens: vec![Vec::new()],
        lex_fn: ambig_lex,
        keyword_capture_token: None,
        keyword_lex_fn: None,
        external_scanner: None,
        symbol_metadata: vec![hidden(), visible(), visible(), visible(), visible()],
        alias_sequences: vec![Vec::new()],
        costs: ErrorCosts::default(),
    })
}

// --- `S -> ( E )`, `E -> x` ------------------------------------------------

pub mod paren {
    pub const LPAREN: super::Symbol = 1;
    pub const X: super::Symbol = 2;
    pub const RPAREN: super::Symbol = 3;
    pub const E: super::Symbol = 4;
    pub const S: super::Symbol = 5;
}

fn paren_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    match lexer.lookahead() {
        Some('(') => {
            lexer.advance(false);
            lexer.accept(paren::LPAREN);
            true
        }
        Some('x') => {
            lexer.advance(false);
            lexer.accept(paren::X);
            true
        }
        Some(')') => {
            lexer.advance(false);
            lexer.accept(paren::RPAREN);
            true
        }
        None => {
            lexer.accept(0);
            true
        }
        _ => false,
    }
}

pub fn paren_language() -> Rc<Language> {
    Rc::new(Language {
        version: LANGUAGE_VERSION,
        symbol_count: 6,
        token_count: 4,
        state_count: 7,
        alias_sequence_count: 0,
        parse_table: build_table(
            7,
            vec![
                (1, paren::LPAREN, entry(vec![shift(2)])),
                (1, paren::S, entry(vec![shift(6)])),
                (2, paren::X, entry(vec![shift(3)])),
                (2, paren::E, entry(vec![shift(4)])),
                (3, paren::RPAREN, entry(vec![reduce(paren::E, 1)])),
                (4, paren::RPAREN, entry(vec![shift(5)])),
                (5, 0, entry(vec![reduce(paren::S, 3)])),
                (6, 0, entry(vec![ParseAction::Accept])),
            ],
        ),
        lex_modes: vec![LexMode::default(); 7],
        external_tokens: vec![Vec::new()],
        lex_fn: paren_lex,
        keyword_capture_token: None,
        keyword_lex_fn: None,
        external_scanner: None,
        symbol_metadata: vec![hidden(), visible(), visible(), visible(), visible(), visible()],
        alias_sequences: vec![Vec::new()],
        costs: ErrorCosts::default(),
    })
}

// --- `Call -> id ( Args )`, `Args -> Arg | Args , Arg`, `Arg -> num` -------

pub mod call {
    pub const ID: super::Symbol = 1;
    pub const LPAREN: super::Symbol = 2;
    pub const NUM: super::Symbol = 3;
    pub const COMMA: super::Symbol = 4;
    pub const RPAREN: super::Symbol = 5;
    pub const ARG: super::Symbol = 6;
    pub const ARGS: super::Symbol = 7;
    pub const CALL: super::Symbol = 8;
}

fn call_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    match lexer.lookahead() {
        Some(ch) if ch.is_ascii_lowercase() => {
            while lexer
                .lookahead()
                .is_some_and(|ch| ch.is_ascii_lowercase())
            {
                lexer.advance(false);
            }
            lexer.accept(call::ID);
            true
        }
        Some(ch) if ch.is_ascii_digit() => {
            while lexer.lookahead().is_some_and(|ch| ch.is_ascii_digit()) {
                lexer.advance(false);
            }
            lexer.accept(call::NUM);
            true
        }
        Some('(') => {
            lexer.advance(false);
            lexer.accept(call::LPAREN);
            true
        }
        Some(',') => {
            lexer.advance(false);
            lexer.accept(call::COMMA);
            true
        }
        Some(')') => {
            lexer.advance(false);
            lexer.accept(call::RPAREN);
            true
        }
        None => {
            lexer.accept(0);
            true
        }
        _ => false,
    }
}

pub fn call_language() -> Rc<Language> {
    Rc::new(Language {
        version: LANGUAGE_VERSION,
        symbol_count: 9,
        token_count: 6,
        state_count: 12,
        alias_sequence_count: 0,
        parse_table: build_table(
            12,
            vec![
                (1, call::ID, entry(vec![shift(2)])),
                (1, call::CALL, entry(vec![shift(10)])),
                (2, call::LPAREN, entry(vec![shift(3)])),
                (3, call::NUM, entry(vec![shift(4)])),
                (3, call::ARG, entry(vec![shift(5)])),
                (3, call::ARGS, entry(vec![shift(6)])),
                (4, call::COMMA, entry(vec![reduce(call::ARG, 1)])),
                (4, call::RPAREN, entry(vec![reduce(call::ARG, 1)])),
                (5, call::COMMA, entry(vec![reduce(call::ARGS, 1)])),
                (5, call::RPAREN, entry(vec![reduce(call::ARGS, 1)])),
                (6, call::COMMA, entry(vec![shift(7)])),
                (6, call::RPAREN, entry(vec![shift(9)])),
                (7, call::NUM, entry(vec![shift(8)])),
                (7, call::ARG, entry(vec![shift(11)])),
                (8, call::COMMA, entry(vec![reduce(call::ARG, 1)])),
                (8, call::RPAREN, entry(vec![reduce(call::ARG, 1)])),
                (9, 0, entry(vec![reduce(call::CALL, 4)])),
                (10, 0, entry(vec![ParseAction::Accept])),
                (11, call::COMMA, entry(vec![reduce(call::ARGS, 3)])),
                (11, call::RPAREN, entry(vec![reduce(call::ARGS, 3)])),
            ],
        ),
        lex_modes: vec![LexMode::default(); 12],
        external_tokens: vec![Vec::new()],
        lex_fn: call_lex,
        keyword_capture_token: None,
        keyword_lex_fn: None,
        external_scanner: None,
        symbol_metadata: vec![
            hidden(),
            visible(),
            visible(),
            visible(),
            visible(),
            visible(),
            visible(),
            visible(),
            visible(),
        ],
        alias_sequences: vec![Vec::new()],
        costs: ErrorCosts::default(),
    })
}

// --- external scanner: `S -> word word`, words scanned externally ----------

pub mod ext {
    pub const WORD: super::Symbol = 1;
    pub const S: super::Symbol = 2;
}

fn ext_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    if lexer.at_end() {
        lexer.accept(0);
        return true;
    }
    false
}

/// Scans runs of letters and remembers how many letters it has seen in
/// total; that counter is the serialized scanner state.
#[derive(Default)]
struct WordScanner {
    letters_seen: u8,
}

impl ExternalScanner for WordScanner {
    fn scan(&mut self, lexer: &mut Lexer<'_>, valid_tokens: &[bool]) -> bool {
        if !valid_tokens.first().copied().unwrap_or(false) {
            return false;
        }
        while matches!(lexer.lookahead(), Some(' ') | Some('\n')) {
            lexer.advance(true);
        }
        let mut letters = 0u8;
        while lexer.lookahead().is_some_and(|ch| ch.is_ascii_alphabetic()) {
            lexer.advance(false);
            letters += 1;
        }
        if letters == 0 {
            return false;
        }
        self.letters_seen = self.letters_seen.wrapping_add(letters);
        lexer.accept(0);
        true
    }

    fn serialize(&self) -> SmallVec<[u8; 24]> {
        SmallVec::from_slice(&[self.letters_seen])
    }

    fn deserialize(&mut self, state: &[u8]) {
        self.letters_seen = state.first().copied().unwrap_or(0);
    }
}

pub fn ext_language() -> Rc<Language> {
    Rc::new(Language {
        version: LANGUAGE_VERSION,
        symbol_count: 3,
        token_count: 2,
        state_count: 5,
        alias_sequence_count: 0,
        parse_table: build_table(
            5,
            vec![
                (1, ext::WORD, entry(vec![shift(2)])),
                (1, ext::S, entry(vec![shift(4)])),
                (2, ext::WORD, entry(vec![shift(3)])),
                (3, 0, entry(vec![reduce(ext::S, 2)])),
                (4, 0, entry(vec![ParseAction::Accept])),
            ],
        ),
        lex_modes: vec![
            LexMode {
                lex_state: 0,
                external_lex_state: 1,
            };
            5
        ],
        external_tokens: vec![Vec::new(), vec![true]],
        lex_fn: ext_lex,
        keyword_capture_token: None,
        keyword_lex_fn: None,
        external_scanner: Some(ExternalScannerDef {
            create: || Box::new(WordScanner::default()),
            symbol_map: vec![ext::WORD],
        }),
        symbol_metadata: vec![hidden(), visible(), visible()],
        alias_sequences: vec![Vec::new()],
        costs: ErrorCosts::default(),
    })
}

// --- keyword capture: `S -> if id` -----------------------------------------

pub mod kw {
    pub const IDENT: super::Symbol = 1;
    pub const KW_IF: super::Symbol = 2;
    pub const S: super::Symbol = 3;
}

fn kw_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    skip_blanks(lexer);
    match lexer.lookahead() {
        Some(ch) if ch.is_ascii_lowercase() => {
            while lexer
                .lookahead()
                .is_some_and(|ch| ch.is_ascii_lowercase())
            {
                lexer.advance(false);
            }
            lexer.accept(kw::IDENT);
            true
        }
        None => {
            lexer.accept(0);
            true
        }
        _ => false,
    }
}

fn kw_keyword_lex(lexer: &mut Lexer<'_>, _state: u16) -> bool {
    for expected in ['i', 'f'] {
        if lexer.lookahead() != Some(expected) {
            return false;
        }
        lexer.advance(false);
    }
    lexer.accept(kw::KW_IF);
    true
}

pub fn kw_language() -> Rc<Language> {
    Rc::new(Language {
        version: LANGUAGE_VERSION,
        symbol_count: 4,
        token_count: 3,
        state_count: 5,
        alias_sequence_count: 0,
        parse_table: build_table(
            5,
            vec![
                (1, kw::KW_IF, entry(vec![shift(2)])),
                (1, kw::S, entry(vec![shift(4)])),
                (2, kw::IDENT, entry(vec![shift(3)])),
                (3, 0, entry(vec![reduce(kw::S, 2)])),
                (4, 0, entry(vec![ParseAction::Accept])),
            ],
        ),
        lex_modes: vec![LexMode::default(); 5],
        external_tokens: vec![Vec::new()],
        lex_fn: kw_lex,
        keyword_capture_token: Some(kw::IDENT),
        keyword_lex_fn: Some(kw_keyword_lex),
        external_scanner: None,
        symbol_metadata: vec![hidden(), visible(), visible(), visible()],
        alias_sequences: vec![Vec::new()],
        costs: ErrorCosts::default(),
    })
}

// --- event collection and tree helpers -------------------------------------

#[derive(Clone, Default)]
pub struct EventLog(pub Rc<RefCell<Vec<ParseEvent>>>);

impl EventLog {
    pub fn events(&self) -> Vec<ParseEvent> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn lex_count(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|event| matches!(event, ParseEvent::LexedLookahead { .. }))
            .count()
    }

    pub fn max_version_count(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ParseEvent::Process { version_count, .. } => Some(*version_count),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

pub struct EventCollector(pub EventLog);

impl ParseEventHandler for EventCollector {
    fn handle(&mut self, event: &ParseEvent) {
        self.0 .0.borrow_mut().push(*event);
    }
}

pub fn parser_with_events(language: &Rc<Language>) -> (Parser, EventLog) {
    let mut parser = Parser::new();
    parser.set_language(language).expect("language installs");
    let log = EventLog::default();
    parser.set_event_handler(Some(Box::new(EventCollector(log.clone()))));
    (parser, log)
}

pub fn parse_str(parser: &mut Parser, text: &str) -> SyntaxTree {
    let mut input = StringInput::new(text);
    parser.parse(&mut input, None, false).expect("parse produces a tree")
}

pub fn reparse_str(parser: &mut Parser, text: &str, previous: &SyntaxTree) -> SyntaxTree {
    let mut input = StringInput::new(text);
    parser
        .parse(&mut input, Some(previous), false)
        .expect("reparse produces a tree")
}

/// Structural equality: symbols, spans, and children, ignoring node
/// identity and parse states.
pub fn structurally_equal(a: &Tree, b: &Tree) -> bool {
    a.symbol() == b.symbol()
        && a.padding() == b.padding()
        && a.size() == b.size()
        && a.child_count() == b.child_count()
        && a.children()
            .iter()
            .zip(b.children())
            .all(|(a, b)| structurally_equal(a, b))
}

pub fn collect_internal_nodes(tree: &Tree, out: &mut Vec<Tree>) {
    if tree.child_count() > 0 {
        out.push(tree.clone());
        for child in tree.children() {
            collect_internal_nodes(child, out);
        }
    }
}

pub fn contains_identical_node(tree: &Tree, target: &Tree) -> bool {
    if tree.ptr_eq(target) {
        return true;
    }
    tree.children()
        .iter()
        .any(|child| contains_identical_node(child, target))
}

pub fn find_node(tree: &Tree, predicate: &dyn Fn(&Tree) -> bool) -> Option<Tree> {
    if predicate(tree) {
        return Some(tree.clone());
    }
    for child in tree.children() {
        if let Some(found) = find_node(child, predicate) {
            return Some(found);
        }
    }
    None
}

/// Every node's span must equal the sum of its children's spans.
pub fn assert_child_spans(tree: &Tree) {
    if tree.child_count() == 0 {
        return;
    }
    let mut total = sylva::Length::ZERO;
    for child in tree.children() {
        total += child.total_size();
        assert_child_spans(child);
    }
    assert_eq!(
        total,
        tree.total_size(),
        "children of {:?} must tile the node's span",
        tree.symbol()
    );
}
