//! SQL tokenizer used by every rewrite in this crate.
//!
//! The tokenizer only knows enough SQL to find placeholder marks safely: it skips quoted
//! strings, quoted identifiers and comments so that `?`, `:name`, `$1` or `@p1` inside them
//! are never rewritten. Tokens borrow from the input and always reassemble to it exactly.
//!
//! Malformed input never fails: an unterminated literal or block comment is returned as
//! plain text running to the end of the query.

use crate::style::PlaceholderStyle;

/// The lexical class of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    PlainText,
    QuestionMark,
    DollarNumber,
    ColonWord,
    AtWord,
    QuotedLiteral,
    Comment,
}

/// A typed slice of the input query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    /// The name (or number) after the sigil of a placeholder token.
    pub fn name(&self) -> Option<&'a str> {
        match self.kind {
            TokenKind::ColonWord | TokenKind::AtWord | TokenKind::DollarNumber => {
                Some(&self.text[1..])
            }
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::QuestionMark
                | TokenKind::DollarNumber
                | TokenKind::ColonWord
                | TokenKind::AtWord
        )
    }
}

/// Which lexical forms a dialect treats as placeholders or literals.
///
/// A config must match the rewrite it drives: a rebind into `$N` must notice `?` but not
/// `$N`, or already-rewritten markers would be rewritten again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexerConfig {
    /// `?` is a placeholder.
    pub question: bool,
    /// `$1`, `$2`, ... are placeholders.
    pub dollar_number: bool,
    /// `:name` is a placeholder.
    pub colon_word: bool,
    /// `@name` is a placeholder.
    pub at_word: bool,
    /// Names may contain Unicode letters and digits, not just ASCII.
    pub unicode_names: bool,
    /// `\'` escapes a quote inside string literals (MySQL).
    pub backslash_escapes: bool,
    /// `$tag$ ... $tag$` is a string literal (PostgreSQL).
    pub dollar_quotes: bool,
    /// `#` starts a line comment (MySQL).
    pub hash_comments: bool,
}

impl LexerConfig {
    /// Config for rewriting `?` into `style`'s markers.
    pub fn for_rebind(style: PlaceholderStyle) -> Self {
        Self {
            question: true,
            dollar_quotes: style == PlaceholderStyle::Dollar,
            ..Self::default()
        }
    }

    /// Config for extracting `:name` parameters from a query targeting `style`.
    ///
    /// `?` is never a placeholder here, so literal question marks pass through.
    pub fn for_named(style: PlaceholderStyle) -> Self {
        Self {
            colon_word: true,
            unicode_names: true,
            dollar_quotes: style == PlaceholderStyle::Dollar,
            ..Self::default()
        }
    }

    /// Config noticing only `style`'s own native marker.
    pub fn for_style(style: PlaceholderStyle) -> Self {
        let mut config = Self {
            unicode_names: true,
            dollar_quotes: style == PlaceholderStyle::Dollar,
            ..Self::default()
        };
        match style {
            PlaceholderStyle::Question | PlaceholderStyle::Unknown => config.question = true,
            PlaceholderStyle::Dollar => config.dollar_number = true,
            PlaceholderStyle::Named => config.colon_word = true,
            PlaceholderStyle::At => config.at_word = true,
        }
        config
    }

    pub fn with_unicode_names(mut self, enabled: bool) -> Self {
        self.unicode_names = enabled;
        self
    }

    pub fn with_backslash_escapes(mut self, enabled: bool) -> Self {
        self.backslash_escapes = enabled;
        self
    }

    pub fn with_hash_comments(mut self, enabled: bool) -> Self {
        self.hash_comments = enabled;
        self
    }

    fn is_name_start(&self, c: char) -> bool {
        c == '_' || c.is_ascii_alphabetic() || (self.unicode_names && c.is_alphabetic())
    }

    fn is_name_char(&self, c: char) -> bool {
        c == '_' || c.is_ascii_alphanumeric() || (self.unicode_names && c.is_alphanumeric())
    }
}

/// Lazy token iterator over a SQL string.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    config: LexerConfig,
    /// A token already scanned at `pos` while finishing a plain-text run.
    pending: Option<(TokenKind, usize)>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str, config: LexerConfig) -> Self {
        Self {
            src,
            pos: 0,
            config,
            pending: None,
        }
    }

    fn char_len(&self, at: usize) -> usize {
        self.src[at..].chars().next().map_or(1, char::len_utf8)
    }

    /// Scan a non-plain token starting at `at`.
    ///
    /// A `PlainText` result marks a span that must stay plain (`::`, unterminated literals).
    fn lex_at(&self, at: usize) -> Option<(TokenKind, usize)> {
        let bytes = self.src.as_bytes();
        let next = bytes.get(at + 1).copied();
        match bytes[at] {
            q @ (b'\'' | b'"' | b'`') => Some(self.quoted(at, q)),
            b'-' if next == Some(b'-') => Some((TokenKind::Comment, self.line_end(at))),
            b'#' if self.config.hash_comments => Some((TokenKind::Comment, self.line_end(at))),
            b'/' if next == Some(b'*') => Some(self.block_comment(at)),
            b'?' if self.config.question => Some((TokenKind::QuestionMark, at + 1)),
            b'$' => self.dollar(at),
            b':' if next == Some(b':') => Some((TokenKind::PlainText, at + 2)),
            b':' if self.config.colon_word => self.word(at, TokenKind::ColonWord),
            b'@' if next == Some(b'@') => Some((TokenKind::PlainText, at + 2)),
            b'@' if self.config.at_word => self.word(at, TokenKind::AtWord),
            _ => None,
        }
    }

    fn quoted(&self, at: usize, quote: u8) -> (TokenKind, usize) {
        let bytes = self.src.as_bytes();
        let mut i = at + 1;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'\\' && quote != b'`' && self.config.backslash_escapes {
                i += 2;
                continue;
            }
            if b == quote {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                    continue;
                }
                return (TokenKind::QuotedLiteral, i + 1);
            }
            i += 1;
        }
        (TokenKind::PlainText, self.src.len())
    }

    fn line_end(&self, at: usize) -> usize {
        self.src[at..]
            .find('\n')
            .map_or(self.src.len(), |off| at + off)
    }

    fn block_comment(&self, at: usize) -> (TokenKind, usize) {
        match self.src[at + 2..].find("*/") {
            Some(off) => (TokenKind::Comment, at + 2 + off + 2),
            None => (TokenKind::PlainText, self.src.len()),
        }
    }

    fn dollar(&self, at: usize) -> Option<(TokenKind, usize)> {
        let rest = &self.src.as_bytes()[at + 1..];
        let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            return self
                .config
                .dollar_number
                .then_some((TokenKind::DollarNumber, at + 1 + digits));
        }
        if !self.config.dollar_quotes || self.follows_identifier(at) {
            return None;
        }

        let tag_len = rest
            .iter()
            .enumerate()
            .take_while(|(i, b)| **b == b'_' || b.is_ascii_alphabetic() || (*i > 0 && b.is_ascii_digit()))
            .count();
        if rest.get(tag_len) != Some(&b'$') {
            return None;
        }

        let delim = &self.src[at..at + tag_len + 2];
        let body = at + delim.len();
        match self.src[body..].find(delim) {
            Some(off) => Some((TokenKind::QuotedLiteral, body + off + delim.len())),
            None => Some((TokenKind::PlainText, self.src.len())),
        }
    }

    /// `$` continues an identifier (`a$b$`) when it directly follows one.
    fn follows_identifier(&self, at: usize) -> bool {
        at > 0 && {
            let prev = self.src.as_bytes()[at - 1];
            prev == b'_' || prev == b'$' || prev.is_ascii_alphanumeric() || prev >= 0x80
        }
    }

    /// `:name` / `@name`; names may contain interior dots (`:user.email`).
    fn word(&self, at: usize, kind: TokenKind) -> Option<(TokenKind, usize)> {
        let start = at + 1;
        let rest = &self.src[start..];
        let mut end = start;
        for (i, c) in rest.char_indices() {
            let ok = if end == start {
                self.config.is_name_start(c)
            } else if c == '.' {
                rest[i + 1..]
                    .chars()
                    .next()
                    .is_some_and(|n| self.config.is_name_char(n))
            } else {
                self.config.is_name_char(c)
            };
            if !ok {
                break;
            }
            end = start + i + c.len_utf8();
        }
        (end > start).then_some((kind, end))
    }

    fn plain_run(&mut self, mut end: usize) -> usize {
        while end < self.src.len() {
            match self.lex_at(end) {
                None => end += self.char_len(end),
                Some((TokenKind::PlainText, next)) => end = next,
                Some(tok) => {
                    self.pending = Some(tok);
                    break;
                }
            }
        }
        end
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let start = self.pos;
        if start >= self.src.len() {
            return None;
        }

        let (kind, end) = match self.pending.take().or_else(|| self.lex_at(start)) {
            Some((TokenKind::PlainText, end)) => (TokenKind::PlainText, self.plain_run(end)),
            Some(tok) => tok,
            None => {
                let first = start + self.char_len(start);
                (TokenKind::PlainText, self.plain_run(first))
            }
        };

        self.pos = end;
        Some(Token {
            kind,
            text: &self.src[start..end],
        })
    }
}

/// Tokenize `sql` eagerly.
pub fn tokenize(sql: &str, config: LexerConfig) -> Vec<Token<'_>> {
    Tokenizer::new(sql, config).collect()
}
