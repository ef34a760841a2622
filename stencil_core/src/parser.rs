use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use super::StencilError;
use super::StencilResult;
use crate::lexer::Statement;
use crate::lexer::scan;

/// Name of the implicit section that holds a whole document body.
pub const ANONYMOUS_SECTION: &str = ".";

/// Declares the parent template.
pub const INHERIT_COMMAND: &str = "inherit";
/// Opens a named section. `def` is accepted as a synonym.
pub const FILL_COMMAND: &str = "fill";
/// Synonym of [`FILL_COMMAND`].
pub const DEF_COMMAND: &str = "def";

/// Section name to raw or resolved section text.
pub type Sections = BTreeMap<String, String>;

/// A template document read from disk (or anywhere else a
/// [`DocumentSource`](crate::DocumentSource) reads from).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
	pub path: PathBuf,
	pub text: String,
}

impl Document {
	pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			text: text.into(),
		}
	}
}

/// Options that change how strictly documents are segmented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
	/// Reject `fill` / `def` commands that appear before an `inherit`
	/// command. When `false` such documents are accepted as content-only
	/// templates.
	pub strict_fill: bool,
}

/// The structural split of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmented {
	/// Parent template, already joined onto the description root.
	pub parent: Option<PathBuf>,
	/// Raw section text with every structural statement excised. Any other
	/// statement is left in place for the resolver.
	pub sections: Sections,
}

/// A section that has been opened but not yet closed.
struct OpenSection {
	name: String,
	text: String,
}

/// Split a document into its parent reference and named sections.
///
/// `inherit` and `fill` / `def` statements are consumed here and removed from
/// the text. Sections run from the end of their opening statement up to the
/// next section statement or the end of the document. A repeated section name
/// replaces the earlier capture. When the document opens no section at all,
/// the whole excised body is bound to [`ANONYMOUS_SECTION`].
pub fn segment(
	document: &Document,
	root: &Path,
	options: &EngineOptions,
) -> StencilResult<Segmented> {
	let source = document.text.as_str();
	let mut parent: Option<PathBuf> = None;
	let mut sections = Sections::new();
	let mut body = String::with_capacity(source.len());
	let mut open: Option<OpenSection> = None;
	let mut opened_any = false;
	let mut cursor = 0;

	for statement in scan(source) {
		let is_section = matches!(statement.command.as_str(), FILL_COMMAND | DEF_COMMAND);
		if !is_section && statement.command != INHERIT_COMMAND {
			continue;
		}

		let single_arg = expect_single_argument(&statement, &document.path)?;

		let preceding = &source[cursor..statement.span.start];
		body.push_str(preceding);
		if let Some(section) = open.as_mut() {
			section.text.push_str(preceding);
		}
		cursor = statement.span.end;

		if is_section {
			if options.strict_fill && parent.is_none() {
				return Err(StencilError::FillWithoutParent {
					name: single_arg.to_string(),
					path: document.path.clone(),
				});
			}

			if let Some(section) = open.take() {
				sections.insert(section.name, section.text);
			}

			open = Some(OpenSection {
				name: single_arg.to_string(),
				text: String::new(),
			});
			opened_any = true;
		} else {
			if parent.is_some() {
				return Err(StencilError::DuplicateInherit {
					path: document.path.clone(),
				});
			}

			parent = Some(root.join(single_arg));
		}
	}

	let rest = &source[cursor..];
	body.push_str(rest);
	if let Some(mut section) = open.take() {
		section.text.push_str(rest);
		sections.insert(section.name, section.text);
	}

	// A root document renders its full body even when it also declares
	// sections of its own.
	if !opened_any || parent.is_none() {
		sections.insert(ANONYMOUS_SECTION.to_string(), body);
	}

	tracing::trace!(
		path = %document.path.display(),
		parent = ?parent,
		sections = sections.len(),
		"segmented document"
	);

	Ok(Segmented { parent, sections })
}

fn expect_single_argument<'a>(statement: &'a Statement, path: &Path) -> StencilResult<&'a str> {
	match statement.args.as_slice() {
		[arg] => Ok(arg.as_str()),
		args => {
			Err(StencilError::InvalidArguments {
				command: statement.command.clone(),
				expected: 1,
				got: args.len(),
				path: path.to_path_buf(),
			})
		}
	}
}
