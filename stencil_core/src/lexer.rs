use std::ops::Range;

use logos::Logos;
use snailquote::unescape;

/// Opening delimiter of an inline statement.
pub const OPEN_DELIMITER: &str = "$<";
/// Closing delimiter of an inline statement.
pub const CLOSE_DELIMITER: &str = ">$";

/// Raw tokens produced by logos for the body of a single statement.
#[derive(Logos, Debug, PartialEq)]
enum RawToken {
	#[regex(r"[ \t\r\n]+")]
	Whitespace,
	#[regex(r#""([^"\\]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\]|\\.)*'")]
	SingleQuotedString,
	#[regex(r#"[^ \t\r\n"']+"#)]
	Word,
}

/// A command found between `$<` and `>$`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
	/// The first word of the statement body. Empty for a blank statement.
	pub command: String,
	/// Every word after the command, in order.
	pub args: Vec<String>,
	/// Byte range of the whole statement, delimiters included.
	pub span: Range<usize>,
}

impl Statement {
	/// The original statement text, delimiters included.
	pub fn text<'a>(&self, source: &'a str) -> &'a str {
		&source[self.span.clone()]
	}
}

/// Lazy left-to-right scan over every statement in a source string.
///
/// Matching is non-greedy and non-overlapping: each `$<` pairs with the
/// nearest following `>$` on the same line. A `$<` without a close before the
/// end of its line stays literal text and scanning resumes right after it.
/// Call [`scan`] again to restart from the beginning.
#[derive(Debug, Clone)]
pub struct StatementScanner<'a> {
	source: &'a str,
	cursor: usize,
}

impl Iterator for StatementScanner<'_> {
	type Item = Statement;

	fn next(&mut self) -> Option<Self::Item> {
		let bytes = self.source.as_bytes();

		loop {
			if self.cursor >= bytes.len() {
				return None;
			}

			let Some(open_offset) = memstr(&bytes[self.cursor..], OPEN_DELIMITER.as_bytes())
			else {
				self.cursor = bytes.len();
				return None;
			};
			let abs_open = self.cursor + open_offset;
			let after_open = abs_open + OPEN_DELIMITER.len();
			let line_end = bytes[after_open..]
				.iter()
				.position(|byte| *byte == b'\n')
				.map_or(bytes.len(), |offset| after_open + offset);

			// No close on the same line: this `$<` is literal text.
			let Some(close_offset) =
				memstr(&bytes[after_open..line_end], CLOSE_DELIMITER.as_bytes())
			else {
				self.cursor = after_open;
				continue;
			};
			let abs_close = after_open + close_offset;
			let end = abs_close + CLOSE_DELIMITER.len();
			self.cursor = end;

			let mut words = split_words(&self.source[after_open..abs_close]).into_iter();
			let command = words.next().unwrap_or_default();

			return Some(Statement {
				command,
				args: words.collect(),
				span: abs_open..end,
			});
		}
	}
}

/// Scan `source` for statements.
pub fn scan(source: &str) -> StatementScanner<'_> {
	StatementScanner { source, cursor: 0 }
}

/// Split a statement body into words. Quoted strings are unescaped and glued
/// to any adjacent unquoted text, so `"about us"` is a single word.
fn split_words(body: &str) -> Vec<String> {
	let mut words = Vec::new();
	let mut current: Option<String> = None;

	for (token, span) in RawToken::lexer(body).spanned() {
		let slice = &body[span];

		match token {
			Ok(RawToken::Whitespace) => {
				words.extend(current.take());
			}
			Ok(RawToken::DoubleQuotedString | RawToken::SingleQuotedString) => {
				let inner = &slice[1..slice.len() - 1];
				let value = if inner.contains('\\') {
					unescape(inner).unwrap_or_else(|_| slice.to_string())
				} else {
					inner.to_string()
				};
				current.get_or_insert_with(String::new).push_str(&value);
			}
			// Stray quotes are kept as literal characters.
			Ok(RawToken::Word) | Err(()) => {
				current.get_or_insert_with(String::new).push_str(slice);
			}
		}
	}

	words.extend(current);
	words
}

pub fn memstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack
		.windows(needle.len())
		.position(|window| window == needle)
}
