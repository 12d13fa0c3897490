//! The lexing driver.
//!
//! [`Lexer`] owns the cursor into the input: it decodes UTF-8 one character
//! ahead, tracks byte and row/column positions, and records token
//! boundaries. Grammar lex functions and external scanners drive it through
//! [`Lexer::advance`], [`Lexer::mark_end`], and [`Lexer::accept`]; the
//! parser reads the resulting positions back out when it builds leaf trees.

use crate::input::Input;
use crate::length::Length;

/// How far past the requested byte the lexer keeps buffered, so that a
/// UTF-8 sequence never straddles the end of the buffer.
const LOOKAHEAD_BYTES: usize = 4;

pub struct Lexer<'i> {
    input: &'i mut dyn Input,
    buffer: Vec<u8>,
    buffer_start: u32,
    input_ended: bool,
    current_position: Length,
    token_start_position: Length,
    token_end_position: Option<Length>,
    lookahead: Option<char>,
    lookahead_size: u32,
    result_symbol: u16,
}

impl<'i> Lexer<'i> {
    pub fn new(input: &'i mut dyn Input) -> Self {
        let mut lexer = Self {
            input,
            buffer: Vec::new(),
            buffer_start: 0,
            input_ended: false,
            current_position: Length::ZERO,
            token_start_position: Length::ZERO,
            token_end_position: None,
            lookahead: None,
            lookahead_size: 0,
            result_symbol: 0,
        };
        lexer.update_lookahead();
        lexer
    }

    /// Move the cursor to an absolute position and re-read the lookahead.
    pub fn reset(&mut self, position: Length) {
        self.current_position = position;
        self.token_start_position = position;
        self.token_end_position = None;
        self.update_lookahead();
    }

    /// Begin a token at the current position.
    pub fn start(&mut self) {
        self.token_start_position = self.current_position;
        self.token_end_position = None;
        self.result_symbol = 0;
    }

    /// The character at the cursor, or `None` at end of input.
    #[must_use]
    pub fn lookahead(&self) -> Option<char> {
        self.lookahead
    }

    #[must_use]
    pub fn at_end(&self) -> bool {
        self.lookahead.is_none()
    }

    /// Consume the lookahead character. With `skip`, the consumed character
    /// becomes token padding instead of token content.
    pub fn advance(&mut self, skip: bool) {
        let Some(ch) = self.lookahead else { return };
        self.current_position.bytes += self.lookahead_size;
        if ch == '\n' {
            self.current_position.extent.row += 1;
            self.current_position.extent.column = 0;
        } else {
            self.current_position.extent.column += self.lookahead_size;
        }
        if skip {
            self.token_start_position = self.current_position;
        }
        self.update_lookahead();
    }

    /// Record the current position as the end of the token.
    pub fn mark_end(&mut self) {
        self.token_end_position = Some(self.current_position);
    }

    /// Accept a token: set its symbol and mark its end.
    pub fn accept(&mut self, symbol: u16) {
        self.result_symbol = symbol;
        self.mark_end();
    }

    pub(crate) fn set_result_symbol(&mut self, symbol: u16) {
        self.result_symbol = symbol;
    }

    /// Consume the rest of the input, tracking positions.
    pub fn advance_to_end(&mut self) {
        while self.lookahead.is_some() {
            self.advance(false);
        }
    }

    #[must_use]
    pub fn current_position(&self) -> Length {
        self.current_position
    }

    #[must_use]
    pub fn token_start(&self) -> Length {
        self.token_start_position
    }

    #[must_use]
    pub fn token_end(&self) -> Option<Length> {
        self.token_end_position
    }

    #[must_use]
    pub fn result_symbol(&self) -> u16 {
        self.result_symbol
    }

    fn update_lookahead(&mut self) {
        let position = self.current_position.bytes;
        self.ensure_buffered(position);
        let relative = position.saturating_sub(self.buffer_start) as usize;
        let bytes = self.buffer.get(relative..).unwrap_or(&[]);
        let (lookahead, size) = decode_utf8(bytes);
        self.lookahead = lookahead;
        self.lookahead_size = size;
    }

    /// Make sure the buffer holds the bytes at `position` plus enough
    /// trailing bytes to decode one character, unless the input ends first.
    fn ensure_buffered(&mut self, position: u32) {
        let in_range = position >= self.buffer_start
            && (position as usize) < self.buffer_start as usize + self.buffer.len();
        if !in_range && !(self.input_ended && position >= self.buffer_start) {
            let chunk = self.input.read(position);
            self.buffer_start = position;
            self.input_ended = chunk.is_empty();
            self.buffer = chunk.to_vec();
        }
        while !self.input_ended {
            let buffered_past =
                (self.buffer_start as usize + self.buffer.len()).saturating_sub(position as usize);
            if buffered_past >= LOOKAHEAD_BYTES {
                break;
            }
            let next_offset = self.buffer_start as usize + self.buffer.len();
            let chunk = self.input.read(next_offset as u32);
            if chunk.is_empty() {
                self.input_ended = true;
            } else {
                self.buffer.extend_from_slice(chunk);
            }
        }
    }
}

fn decode_utf8(bytes: &[u8]) -> (Option<char>, u32) {
    let Some(&first) = bytes.first() else {
        return (None, 0);
    };
    let len = match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return (Some(char::REPLACEMENT_CHARACTER), 1),
    };
    if bytes.len() < len {
        return (Some(char::REPLACEMENT_CHARACTER), 1);
    }
    match std::str::from_utf8(&bytes[..len]) {
        Ok(text) => match text.chars().next() {
            Some(ch) => (Some(ch), len as u32),
            None => (Some(char::REPLACEMENT_CHARACTER), 1),
        },
        Err(_) => (Some(char::REPLACEMENT_CHARACTER), 1),
    }
}
