//! The compiled-grammar bundle.
//!
//! A [`Language`] is the static output of a parse-table compiler: action
//! tables, lex modes, external-token sets, symbol metadata, and the error
//! cost parameters. The runtime only ever reads it; one `Language` value can
//! back any number of parsers.

use crate::lexer::Lexer;
use hashbrown::HashMap;
use smallvec::SmallVec;
use thiserror::Error;

/// Grammar symbol id. `0` is reserved for end-of-input; the error built-ins
/// live at the top of the id space, outside any grammar's own symbols.
pub type Symbol = u16;

/// Parse state id. `0` is the designated error state.
pub type StateId = u16;

/// The end-of-input symbol.
pub const SYM_END: Symbol = 0;
/// The built-in error symbol, used for unrecognized input and error nodes.
pub const SYM_ERROR: Symbol = u16::MAX - 1;
/// The built-in symbol wrapping runs of skipped tokens during recovery.
pub const SYM_ERROR_REPEAT: Symbol = u16::MAX - 2;

/// The designated error-recovery state.
pub const ERROR_STATE: StateId = 0;
/// Marker for trees whose parse state cannot be trusted.
pub const STATE_NONE: StateId = u16::MAX;

/// The table format version this runtime understands.
pub const LANGUAGE_VERSION: u32 = 1;

/// One action from a parse table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAction {
    /// Sentinel; never present in a live table row.
    Error,
    Shift {
        state: StateId,
        /// Shift without changing state (trivia tokens).
        is_extra: bool,
        /// Internal repetition marker emitted by some table compilers;
        /// skipped by the runtime.
        is_repetition: bool,
    },
    Reduce {
        symbol: Symbol,
        child_count: u16,
        dynamic_precedence: i32,
        alias_sequence_id: u16,
    },
    Accept,
    Recover,
}

/// A parse table entry: the ordered actions for one `(state, symbol)` pair.
/// More than one action means the grammar is locally ambiguous and the
/// parser forks.
#[derive(Debug, Clone, Default)]
pub struct TableEntry {
    pub actions: Vec<ParseAction>,
    /// Whether a token lexed for this entry may be reused in states with a
    /// different lex mode.
    pub is_reusable: bool,
    /// Whether the actions differ depending on the following token.
    pub depends_on_lookahead: bool,
}

static EMPTY_ENTRY: TableEntry = TableEntry {
    actions: Vec::new(),
    is_reusable: false,
    depends_on_lookahead: false,
};

/// The lexing configuration of a parse state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexMode {
    pub lex_state: u16,
    /// Index into the language's external-token sets; `0` disables external
    /// scanning in this state.
    pub external_lex_state: u16,
}

/// Display metadata for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolMetadata {
    pub visible: bool,
    pub named: bool,
    /// Whether the symbol is a trivia token attached outside grammar
    /// structure.
    pub extra: bool,
}

const ERROR_METADATA: SymbolMetadata = SymbolMetadata {
    visible: true,
    named: true,
    extra: false,
};

/// The weights of the error-cost model. Supplied by the table compiler; the
/// runtime treats them as read-only parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorCosts {
    pub per_skipped_char: u32,
    pub per_skipped_line: u32,
    pub per_skipped_tree: u32,
    pub per_missing_tree: u32,
}

impl Default for ErrorCosts {
    fn default() -> Self {
        Self {
            per_skipped_char: 1,
            per_skipped_line: 30,
            per_skipped_tree: 100,
            per_missing_tree: 110,
        }
    }
}

impl ErrorCosts {
    /// The largest cost gap at which two parse paths are still considered
    /// close enough to keep both alive.
    #[must_use]
    pub const fn max_cost_difference(&self) -> u32 {
        16 * self.per_skipped_tree
    }
}

/// A grammar's internal lexing function: given the lex state, either
/// accepts a token through the [`Lexer`] and returns `true`, or returns
/// `false` when nothing matches at the current position.
pub type LexFn = fn(&mut Lexer<'_>, u16) -> bool;

/// A scanner for context-sensitive tokens, plugged in by the grammar.
///
/// Scanner state is opaque to the runtime: it is serialized into token
/// trees so that incremental reparsing can restore the scanner exactly as
/// it was before any token.
pub trait ExternalScanner {
    /// Attempt to scan one token. `valid_tokens` is indexed by external
    /// token id; on success the scanner must have called
    /// [`Lexer::accept`] with the external token id it matched.
    fn scan(&mut self, lexer: &mut Lexer<'_>, valid_tokens: &[bool]) -> bool;

    /// Capture the scanner's state after the token just produced.
    fn serialize(&self) -> SmallVec<[u8; 24]>;

    /// Restore state captured by [`ExternalScanner::serialize`]. An empty
    /// slice means the initial state.
    fn deserialize(&mut self, state: &[u8]);
}

/// The external-scanner half of a language bundle.
pub struct ExternalScannerDef {
    /// Construct a fresh scanner payload. Called by
    /// `Parser::set_language`; the payload lives as long as the parser
    /// keeps the language installed.
    pub create: fn() -> Box<dyn ExternalScanner>,
    /// Maps external token ids to grammar symbols.
    pub symbol_map: Vec<Symbol>,
}

impl std::fmt::Debug for ExternalScannerDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalScannerDef")
            .field("symbol_map", &self.symbol_map)
            .finish_non_exhaustive()
    }
}

/// Errors reported when installing a language into a parser.
#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("incompatible language version {found}, this runtime supports version {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

/// A compiled grammar: everything the runtime needs to parse, and nothing
/// it may write to.
#[derive(Debug)]
pub struct Language {
    pub version: u32,
    pub symbol_count: usize,
    pub token_count: usize,
    pub state_count: usize,
    pub alias_sequence_count: usize,
    /// Action table rows, indexed by state then keyed by symbol. Symbols
    /// with no entry have no actions.
    pub parse_table: Vec<HashMap<Symbol, TableEntry, ahash::RandomState>>,
    /// Lex mode per state; row `0` is the error-recovery mode.
    pub lex_modes: Vec<LexMode>,
    /// Valid external tokens per external lex state, indexed by external
    /// token id. Index `0` must be empty (external scanning disabled).
    pub external_tokens: Vec<Vec<bool>>,
    pub lex_fn: LexFn,
    /// Token that triggers keyword re-lexing, if the grammar uses keyword
    /// extraction.
    pub keyword_capture_token: Option<Symbol>,
    pub keyword_lex_fn: Option<LexFn>,
    pub external_scanner: Option<ExternalScannerDef>,
    pub symbol_metadata: Vec<SymbolMetadata>,
    /// Per-production child renaming tables; id `0` is the empty sequence.
    pub alias_sequences: Vec<Vec<Symbol>>,
    pub costs: ErrorCosts,
}

impl Language {
    /// Look up the table entry for a `(state, symbol)` pair.
    #[must_use]
    pub fn table_entry(&self, state: StateId, symbol: Symbol) -> &TableEntry {
        if symbol == SYM_ERROR || symbol == SYM_ERROR_REPEAT {
            return &EMPTY_ENTRY;
        }
        self.parse_table
            .get(state as usize)
            .and_then(|row| row.get(&symbol))
            .unwrap_or(&EMPTY_ENTRY)
    }

    #[must_use]
    pub fn actions(&self, state: StateId, symbol: Symbol) -> &[ParseAction] {
        &self.table_entry(state, symbol).actions
    }

    #[must_use]
    pub fn has_actions(&self, state: StateId, symbol: Symbol) -> bool {
        self.table_entry(state, symbol)
            .actions
            .last()
            .is_some_and(|action| !matches!(action, ParseAction::Error))
    }

    #[must_use]
    pub fn has_reduce_action(&self, state: StateId, symbol: Symbol) -> bool {
        self.table_entry(state, symbol)
            .actions
            .iter()
            .any(|action| matches!(action, ParseAction::Reduce { .. }))
    }

    /// The state reached by consuming `symbol` in `state`: the target of
    /// the entry's shift action, or the error state when there is none.
    #[must_use]
    pub fn next_state(&self, state: StateId, symbol: Symbol) -> StateId {
        if symbol == SYM_ERROR || symbol == SYM_ERROR_REPEAT {
            return ERROR_STATE;
        }
        let mut result = ERROR_STATE;
        for action in self.actions(state, symbol) {
            if let ParseAction::Shift {
                state: next,
                is_extra,
                ..
            } = action
            {
                result = if *is_extra { state } else { *next };
            }
        }
        result
    }

    #[must_use]
    pub fn lex_mode(&self, state: StateId) -> LexMode {
        self.lex_modes
            .get(state as usize)
            .copied()
            .unwrap_or_default()
    }

    /// The set of external tokens valid in the given external lex state, or
    /// `None` when external scanning is disabled there.
    #[must_use]
    pub fn enabled_external_tokens(&self, external_lex_state: u16) -> Option<&[bool]> {
        if external_lex_state == 0 {
            return None;
        }
        self.external_tokens
            .get(external_lex_state as usize)
            .map(Vec::as_slice)
    }

    #[must_use]
    pub fn symbol_metadata(&self, symbol: Symbol) -> SymbolMetadata {
        match symbol {
            SYM_ERROR => ERROR_METADATA,
            SYM_ERROR_REPEAT => SymbolMetadata::default(),
            _ => self
                .symbol_metadata
                .get(symbol as usize)
                .copied()
                .unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn alias_sequence(&self, alias_sequence_id: u16) -> &[Symbol] {
        if alias_sequence_id == 0 {
            return &[];
        }
        self.alias_sequences
            .get(alias_sequence_id as usize)
            .map_or(&[], Vec::as_slice)
    }
}
