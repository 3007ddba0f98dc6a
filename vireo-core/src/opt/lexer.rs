//! Template lexer.
//!
//! Finds the `${...}` expressions of tagged template literals in function
//! source without parsing it. The lexer keeps a stack of modes:
//!
//! - `Code`: ordinary source. String literals and comments are skipped,
//!   one bracket pair is counted, and a backtick opens a template.
//! - `Template`: template text. Backslash escapes are skipped, `${` opens a
//!   code frame, and a backtick closes the template.
//!
//! An expression ends at the bracket that pops the bottom frame, which is
//! what makes `${ a ? `x${b}` : { c: 1 } }` come out whole.
//!
//! Regex literals are not recognised. A quote inside one (`/'/`) is read as
//! the start of a string; strings end at the next line break at the latest,
//! which keeps the damage local.

use crate::error::OptError;

/// One `${...}` of a tagged template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionRecord {
    /// Byte offset of the `$`.
    pub start: usize,
    /// Byte offset one past the closing `}`, or the source length if the
    /// expression never closes.
    pub end: usize,
    /// The expression text between `${` and `}`.
    pub text: String,
    /// Whether the closing `}` was found.
    pub terminated: bool,
}

/// Result of scanning one source text.
pub(crate) struct Scan {
    pub(crate) records: Vec<ExpressionRecord>,
    /// First unterminated construct; scanning stops there.
    pub(crate) error: Option<OptError>,
}

/// Record every direct expression of every `tag`-tagged template in `src`.
pub(crate) fn scan(src: &str, tag: &str) -> Scan {
    let mut scanner = Scanner {
        src,
        bytes: src.as_bytes(),
        tag,
        records: Vec::new(),
    };
    let error = scanner.code(0, None).err();
    Scan {
        records: scanner.records,
        error,
    }
}

enum Mode {
    Code { open: u8, close: u8, depth: usize },
    Template,
}

enum Step {
    Advance(usize),
    JumpTo(usize),
    Push(Mode, usize),
    Pop,
}

/// Find the `close` byte that balances an `open` already consumed just
/// before `from`. Returns its offset.
pub(crate) fn find_close(src: &str, from: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut stack = vec![Mode::Code {
        open,
        close,
        depth: 0,
    }];
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        let step = match stack.last_mut()? {
            Mode::Template => match (b, next) {
                (b'\\', _) => Step::Advance(2),
                (b'`', _) => Step::Pop,
                (b'$', Some(b'{')) => Step::Push(
                    Mode::Code {
                        open: b'{',
                        close: b'}',
                        depth: 0,
                    },
                    2,
                ),
                _ => Step::Advance(1),
            },
            Mode::Code { open, close, depth } => match (b, next) {
                (b'\'' | b'"', _) => Step::JumpTo(skip_string(bytes, i)?),
                (b'`', _) => Step::Push(Mode::Template, 1),
                (b'/', Some(b'/')) => Step::JumpTo(skip_line_comment(bytes, i)),
                (b'/', Some(b'*')) => Step::JumpTo(skip_block_comment(bytes, i)?),
                _ if b == *close && *depth == 0 => Step::Pop,
                _ if b == *close => {
                    *depth -= 1;
                    Step::Advance(1)
                }
                _ if b == *open => {
                    *depth += 1;
                    Step::Advance(1)
                }
                _ => Step::Advance(1),
            },
        };

        match step {
            Step::Advance(n) => i += n,
            Step::JumpTo(j) => i = j,
            Step::Push(mode, n) => {
                stack.push(mode);
                i += n;
            }
            Step::Pop => {
                stack.pop();
                if stack.is_empty() {
                    return Some(i);
                }
                i += 1;
            }
        }
    }
    None
}

/// Offset just past the string literal starting at `i`.
///
/// A line break also ends the literal. `None` if the source ends first.
fn skip_string(bytes: &[u8], i: usize) -> Option<usize> {
    let quote = bytes[i];
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' => return Some(j),
            b if b == quote => return Some(j + 1),
            _ => j += 1,
        }
    }
    None
}

fn skip_line_comment(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |n| i + n)
}

fn skip_block_comment(bytes: &[u8], i: usize) -> Option<usize> {
    bytes[i + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map(|n| i + 2 + n + 2)
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    tag: &'a str,
    records: Vec<ExpressionRecord>,
}

impl Scanner<'_> {
    /// Scan code from `i`.
    ///
    /// Inside a `${` opened at `opened_at`, stops at the unmatched `}` and
    /// returns its offset; at the top level, runs to the end.
    fn code(&mut self, mut i: usize, opened_at: Option<usize>) -> Result<usize, OptError> {
        let len = self.bytes.len();
        let mut depth = 0usize;

        while i < len {
            let b = self.bytes[i];
            let next = self.bytes.get(i + 1).copied();
            match (b, next) {
                (b'\'' | b'"', _) => {
                    i = skip_string(self.bytes, i).unwrap_or(len);
                    continue;
                }
                (b'/', Some(b'/')) => {
                    i = skip_line_comment(self.bytes, i);
                    continue;
                }
                (b'/', Some(b'*')) => {
                    i = skip_block_comment(self.bytes, i).unwrap_or(len);
                    continue;
                }
                (b'`', _) => {
                    i = self.template(i)?;
                    continue;
                }
                (b'{', _) => depth += 1,
                (b'}', _) if depth == 0 && opened_at.is_some() => return Ok(i),
                (b'}', _) => depth = depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }

        match opened_at {
            Some(offset) => Err(OptError::UnterminatedExpression { offset }),
            None => Ok(len),
        }
    }

    /// Scan the template whose opening backtick is at `open`. Returns the
    /// offset just past its closing backtick.
    fn template(&mut self, open: usize) -> Result<usize, OptError> {
        let tagged = self.is_tagged(open);
        let len = self.bytes.len();
        let mut i = open + 1;

        while i < len {
            match (self.bytes[i], self.bytes.get(i + 1).copied()) {
                (b'\\', _) => i += 2,
                (b'`', _) => return Ok(i + 1),
                (b'$', Some(b'{')) if tagged => {
                    let Some(close) = find_close(self.src, i + 2, b'{', b'}') else {
                        self.records.push(ExpressionRecord {
                            start: i,
                            end: len,
                            text: self.src[i + 2..].to_owned(),
                            terminated: false,
                        });
                        return Err(OptError::UnterminatedExpression { offset: i });
                    };
                    self.records.push(ExpressionRecord {
                        start: i,
                        end: close + 1,
                        text: self.src[i + 2..close].to_owned(),
                        terminated: true,
                    });
                    i = close + 1;
                }
                (b'$', Some(b'{')) => {
                    // Plain template: its expressions may hold tagged ones.
                    i = self.code(i + 2, Some(i))? + 1;
                }
                _ => i += 1,
            }
        }
        Err(OptError::UnterminatedTemplate { offset: open })
    }

    /// Whether the backtick at `i` directly follows the tag identifier.
    fn is_tagged(&self, i: usize) -> bool {
        let tag = self.tag;
        if tag.is_empty() || !self.src[..i].ends_with(tag) {
            return false;
        }
        let start = i - tag.len();
        start == 0 || !is_ident_byte(self.bytes[start - 1])
    }
}
