use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::ANONYMOUS_SECTION;
use crate::Document;
use crate::DocumentSource;
use crate::EngineOptions;
use crate::Scope;
use crate::Sections;
use crate::StencilError;
use crate::StencilResult;
use crate::WarningKind;
use crate::lexer::scan;
use crate::parser::segment;

/// Substitutes the text bound to its single argument.
pub const SLOT_COMMAND: &str = "slot";

/// A content problem found while resolving a section. The statement that
/// caused it is kept verbatim in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateWarning {
	/// Template file containing the statement.
	pub file: PathBuf,
	/// Section the statement was found in.
	pub section: String,
	/// The unresolved statement text, delimiters included.
	pub statement: String,
	pub kind: WarningKind,
}

impl fmt::Display for TemplateWarning {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} in `{}` (section `{}`): {}",
			self.kind,
			self.file.display(),
			self.section,
			self.statement
		)
	}
}

/// Sections with every substitution applied, plus what went wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
	pub sections: Sections,
	pub warnings: Vec<TemplateWarning>,
}

/// Resolve the remaining statements of every section against `scope`.
pub fn resolve(sections: &Sections, scope: &Scope, file: &Path) -> Resolved {
	let mut resolved = Resolved::default();

	for (name, text) in sections {
		let output = resolve_text(text, scope, file, name, &mut resolved.warnings);
		resolved.sections.insert(name.clone(), output);
	}

	resolved
}

/// Replace each statement in `text` in a single pass. Substituted text is
/// never scanned again, so a slot bound to `$<slot x>$` stays literal.
pub fn resolve_text(
	text: &str,
	scope: &Scope,
	file: &Path,
	section: &str,
	warnings: &mut Vec<TemplateWarning>,
) -> String {
	let mut output = String::with_capacity(text.len());
	let mut cursor = 0;

	for statement in scan(text) {
		output.push_str(&text[cursor..statement.span.start]);
		cursor = statement.span.end;
		let original = statement.text(text);

		let failure = match (statement.command.as_str(), statement.args.as_slice()) {
			(SLOT_COMMAND, [name]) => {
				if let Some(value) = scope.get(name) {
					output.push_str(value);
					continue;
				}
				WarningKind::MissingVariable { name: name.clone() }
			}
			(SLOT_COMMAND, args) => {
				WarningKind::InvalidArguments {
					command: SLOT_COMMAND.to_string(),
					expected: 1,
					got: args.len(),
				}
			}
			(command, _) => {
				WarningKind::UnknownCommand {
					command: command.to_string(),
				}
			}
		};

		output.push_str(original);
		warnings.push(TemplateWarning {
			file: file.to_path_buf(),
			section: section.to_string(),
			statement: original.to_string(),
			kind: failure,
		});
	}

	output.push_str(&text[cursor..]);
	output
}

/// The final text of one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
	pub text: String,
	/// Every document read, from the entry to the root template.
	pub chain: Vec<PathBuf>,
	pub warnings: Vec<TemplateWarning>,
}

impl Rendered {
	pub fn has_warnings(&self) -> bool {
		!self.warnings.is_empty()
	}
}

/// Walks an inheritance chain from an entry document up to its root
/// template, threading the scope from each level into the next.
#[derive(Debug, Clone)]
pub struct ChainWalker<S> {
	source: S,
	root: PathBuf,
	options: EngineOptions,
}

impl<S: DocumentSource> ChainWalker<S> {
	/// `root` is the description directory that `inherit` paths are joined
	/// onto.
	pub fn new(source: S, root: impl Into<PathBuf>) -> Self {
		Self {
			source,
			root: root.into(),
			options: EngineOptions::default(),
		}
	}

	#[must_use]
	pub fn with_options(mut self, options: EngineOptions) -> Self {
		self.options = options;
		self
	}

	/// Resolve `entry` and every ancestor it inherits from.
	///
	/// Each document is segmented and its sections are resolved against the
	/// scope built so far. The resolved sections are then merged into the
	/// scope handed to the parent. The anonymous section of the parentless
	/// root document is the result; anonymous sections of intermediate
	/// documents only feed the scope.
	pub fn build(&self, entry: &Path, globals: &Scope) -> StencilResult<Rendered> {
		let mut scope = globals.clone();
		let mut path = entry.to_path_buf();
		let mut visited = HashSet::new();
		let mut chain = Vec::new();
		let mut warnings = Vec::new();

		loop {
			let document = self.load(&path, &mut visited, &mut chain)?;
			let segmented = segment(&document, &self.root, &self.options)?;
			let mut resolved = resolve(&segmented.sections, &scope, &document.path);
			warnings.append(&mut resolved.warnings);

			let Some(parent) = segmented.parent else {
				let text = resolved
					.sections
					.remove(ANONYMOUS_SECTION)
					.unwrap_or_default();

				return Ok(Rendered {
					text,
					chain,
					warnings,
				});
			};

			tracing::debug!(
				from = %document.path.display(),
				to = %parent.display(),
				bound = resolved.sections.len(),
				"following inherit"
			);
			scope = scope.extend(resolved.sections);
			path = parent;
		}
	}

	/// The inheritance chain of `entry` without resolving any content.
	pub fn chain(&self, entry: &Path) -> StencilResult<Vec<PathBuf>> {
		let mut path = entry.to_path_buf();
		let mut visited = HashSet::new();
		let mut chain = Vec::new();

		loop {
			let document = self.load(&path, &mut visited, &mut chain)?;
			match segment(&document, &self.root, &self.options)?.parent {
				Some(parent) => path = parent,
				None => return Ok(chain),
			}
		}
	}

	fn load(
		&self,
		path: &Path,
		visited: &mut HashSet<PathBuf>,
		chain: &mut Vec<PathBuf>,
	) -> StencilResult<Document> {
		if !visited.insert(self.source.canonical(path)) {
			return Err(StencilError::InheritCycle {
				path: path.to_path_buf(),
				chain: chain.clone(),
			});
		}
		chain.push(path.to_path_buf());

		let text = self
			.source
			.read(path)
			.map_err(|e| StencilError::SourceRead {
				path: path.to_path_buf(),
				reason: e.to_string(),
			})?;

		Ok(Document::new(path, text))
	}
}
