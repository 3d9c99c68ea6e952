//! SQL Tokenizing Oracle
//!
//! Dialect-aware lexer behind the SQL detector. The detection rule is
//! structural: lex the query into spans, then check every occurrence of the
//! user input against them. Input confined to a single token (one string
//! literal, one number, one identifier) is data; input straddling token
//! boundaries has altered the query's structure and is an injection.
//!
//! Dialect differences handled here: `#` line comments and backtick
//! identifiers (MySQL), backslash escapes in strings (MySQL), dollar-quoted
//! strings and `$n` parameters (PostgreSQL), and `"` as a string (MySQL) vs.
//! a quoted identifier (everyone else).

use thiserror::Error;

use super::sql::{Detection, SqlDialect, SqlInjectionOracle};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("unterminated string literal at byte {0}")]
    UnterminatedString(usize),
    #[error("unterminated quoted identifier at byte {0}")]
    UnterminatedIdentifier(usize),
    #[error("unterminated block comment at byte {0}")]
    UnterminatedComment(usize),
    #[error("unterminated dollar-quoted string at byte {0}")]
    UnterminatedDollarQuote(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Word,
    Number,
    StringLiteral,
    QuotedIdentifier,
    Parameter,
    Comment,
    Operator,
}

/// A lexed span, in byte offsets into the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub start: usize,
    pub end: usize,
    #[allow(dead_code)]
    pub kind: TokenKind,
}

/// The built-in [`SqlInjectionOracle`]: pure Rust, no external state.
pub struct TokenizingOracle;

impl SqlInjectionOracle for TokenizingOracle {
    fn detect(&self, query: &str, user_input: &str, dialect: SqlDialect) -> Detection {
        if user_input.is_empty() {
            return Detection::NotDetected;
        }
        let tokens = match tokenize(query, dialect) {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::debug!(error = %err, "query did not tokenize");
                return Detection::TokenizeFailure;
            }
        };
        for (start, matched) in query.match_indices(user_input) {
            let end = start + matched.len();
            let spanned = tokens
                .iter()
                .filter(|token| token.start < end && start < token.end)
                .count();
            if spanned > 1 {
                return Detection::Detected;
            }
        }
        Detection::NotDetected
    }
}

pub(crate) fn tokenize(query: &str, dialect: SqlDialect) -> Result<Vec<Token>, TokenizeError> {
    let bytes = query.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let b = bytes[i];

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let kind = if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
            i = line_comment_end(bytes, i);
            TokenKind::Comment
        } else if b == b'#' && dialect == SqlDialect::MySql {
            i = line_comment_end(bytes, i);
            TokenKind::Comment
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            match find_from(bytes, i + 2, b"*/") {
                Some(close) => i = close + 2,
                None => return Err(TokenizeError::UnterminatedComment(start)),
            }
            TokenKind::Comment
        } else if b == b'\'' {
            i = scan_quoted(bytes, i, b'\'', dialect == SqlDialect::MySql)
                .ok_or(TokenizeError::UnterminatedString(start))?;
            TokenKind::StringLiteral
        } else if b == b'"' {
            if dialect == SqlDialect::MySql {
                i = scan_quoted(bytes, i, b'"', true)
                    .ok_or(TokenizeError::UnterminatedString(start))?;
                TokenKind::StringLiteral
            } else {
                i = scan_quoted(bytes, i, b'"', false)
                    .ok_or(TokenizeError::UnterminatedIdentifier(start))?;
                TokenKind::QuotedIdentifier
            }
        } else if b == b'`' && dialect == SqlDialect::MySql {
            i = scan_quoted(bytes, i, b'`', false)
                .ok_or(TokenizeError::UnterminatedIdentifier(start))?;
            TokenKind::QuotedIdentifier
        } else if b == b'$' && dialect == SqlDialect::Postgres {
            if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                TokenKind::Parameter
            } else {
                match scan_dollar_quote(bytes, i) {
                    Some(Ok(end)) => {
                        i = end;
                        TokenKind::StringLiteral
                    }
                    Some(Err(())) => return Err(TokenizeError::UnterminatedDollarQuote(start)),
                    None => {
                        i += 1;
                        TokenKind::Operator
                    }
                }
            }
        } else if b.is_ascii_digit() {
            i = scan_number(bytes, i);
            TokenKind::Number
        } else if is_word_byte(b) {
            while i < bytes.len() && (is_word_byte(bytes[i]) || bytes[i].is_ascii_digit()) {
                i += 1;
            }
            TokenKind::Word
        } else {
            i += operator_len(&bytes[i..]);
            TokenKind::Operator
        };

        tokens.push(Token { start, end: i, kind });
    }
    Ok(tokens)
}

fn line_comment_end(bytes: &[u8], from: usize) -> usize {
    find_from(bytes, from, b"\n").map_or(bytes.len(), |pos| pos + 1)
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

/// Scans a quoted region starting at the opening quote. A doubled quote is an
/// escape in every dialect; backslash escapes are MySQL-only. Returns the
/// index one past the closing quote, or `None` when unterminated.
fn scan_quoted(bytes: &[u8], open: usize, quote: u8, backslash_escapes: bool) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        if backslash_escapes && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// Attempts a PostgreSQL dollar quote (`$tag$ ... $tag$`) at `open`. Returns
/// `None` when the text at `open` is not a dollar-quote opener at all, and
/// `Some(Err(()))` when the opener never closes.
fn scan_dollar_quote(bytes: &[u8], open: usize) -> Option<Result<usize, ()>> {
    let mut tag_end = open + 1;
    while tag_end < bytes.len() && (is_word_byte(bytes[tag_end]) || bytes[tag_end].is_ascii_digit())
    {
        tag_end += 1;
    }
    if bytes.get(tag_end) != Some(&b'$') {
        return None;
    }
    let delimiter = &bytes[open..=tag_end];
    match find_from(bytes, tag_end + 1, delimiter) {
        Some(close) => Some(Ok(close + delimiter.len())),
        None => Some(Err(())),
    }
}

fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    // Hex literal.
    if bytes[i] == b'0' && matches!(bytes.get(i + 1), Some(b'x') | Some(b'X')) {
        i += 2;
        while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
        return i;
    }
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    // Exponent.
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
            j += 1;
        }
        if bytes.get(j).is_some_and(u8::is_ascii_digit) {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn operator_len(rest: &[u8]) -> usize {
    const TWO_BYTE: &[&[u8]] = &[
        b"<=", b">=", b"<>", b"!=", b"||", b"::", b"->", b"=>", b"<<", b">>",
    ];
    if rest.len() >= 2 && TWO_BYTE.contains(&&rest[..2]) {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(query: &str, dialect: SqlDialect) -> Vec<TokenKind> {
        tokenize(query, dialect)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn basic_query_lexes_into_expected_kinds() {
        use TokenKind::*;
        assert_eq!(
            kinds("select id from users where age >= 21", SqlDialect::Generic),
            vec![Word, Word, Word, Word, Word, Word, Operator, Number],
        );
    }

    #[test]
    fn string_escapes_per_dialect() {
        // Doubled quote works everywhere.
        assert_eq!(
            kinds("select 'it''s'", SqlDialect::Generic),
            vec![TokenKind::Word, TokenKind::StringLiteral],
        );
        // Backslash escape only in MySQL.
        assert_eq!(
            kinds(r"select 'it\'s'", SqlDialect::MySql),
            vec![TokenKind::Word, TokenKind::StringLiteral],
        );
        assert!(tokenize(r"select 'it\'s", SqlDialect::MySql).is_err());
    }

    #[test]
    fn mysql_specific_syntax() {
        assert_eq!(
            kinds("select `weird name` # trailing", SqlDialect::MySql),
            vec![TokenKind::Word, TokenKind::QuotedIdentifier, TokenKind::Comment],
        );
        // '#' is a plain operator byte elsewhere.
        assert_eq!(
            kinds("select # x", SqlDialect::Generic),
            vec![TokenKind::Word, TokenKind::Operator, TokenKind::Word],
        );
    }

    #[test]
    fn postgres_dollar_quoting_and_parameters() {
        assert_eq!(
            kinds("select $tag$ anything' -- here $tag$ where a = $1", SqlDialect::Postgres),
            vec![
                TokenKind::Word,
                TokenKind::StringLiteral,
                TokenKind::Word,
                TokenKind::Word,
                TokenKind::Operator,
                TokenKind::Parameter,
            ],
        );
        assert_eq!(
            tokenize("select $tag$ never closed", SqlDialect::Postgres),
            Err(TokenizeError::UnterminatedDollarQuote(7)),
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert_eq!(
            tokenize("select 'open", SqlDialect::Generic),
            Err(TokenizeError::UnterminatedString(7)),
        );
        assert_eq!(
            tokenize("select /* open", SqlDialect::Generic),
            Err(TokenizeError::UnterminatedComment(7)),
        );
    }

    #[test]
    fn oracle_flags_input_spanning_token_boundaries() {
        let oracle = TokenizingOracle;
        assert_eq!(
            oracle.detect(
                "select * from users where name = 'admin' or '1'='1'",
                "' or '1'='1",
                SqlDialect::MySql,
            ),
            Detection::Detected,
        );
        assert_eq!(
            oracle.detect(
                "select * from users where name = 'admin'",
                "admin",
                SqlDialect::MySql,
            ),
            Detection::NotDetected,
        );
    }

    #[test]
    fn oracle_reports_tokenize_failure() {
        let oracle = TokenizingOracle;
        assert_eq!(
            oracle.detect("select 'open", "open", SqlDialect::Generic),
            Detection::TokenizeFailure,
        );
    }
}
