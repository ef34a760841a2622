use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::StencilError;
use crate::StencilResult;

/// Mode token that marks an entry as a template.
pub const TEMPLATE_MODE: &str = "$";
/// Separator between the three manifest fields.
pub const FIELD_SEPARATOR: char = '>';
/// Prefix of a comment line.
pub const COMMENT_PREFIX: char = '#';

/// How a manifest entry turns its input into output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
	/// Resolve the input through its inheritance chain.
	Template,
	/// Copy the input bytes unchanged.
	Copy,
}

impl EntryMode {
	fn from_token(token: &str) -> Self {
		if token == TEMPLATE_MODE {
			Self::Template
		} else {
			Self::Copy
		}
	}
}

impl fmt::Display for EntryMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Template => f.pad("template"),
			Self::Copy => f.pad("copy"),
		}
	}
}

/// One `input > mode > output` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
	/// Input path, relative to the description directory.
	pub input: PathBuf,
	pub mode: EntryMode,
	/// Output path, relative to the output directory.
	pub output: PathBuf,
	/// 1-indexed line number in the manifest.
	pub line: usize,
}

/// A line that looked like an entry but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedManifestLine {
	/// 1-indexed line number.
	pub line: usize,
	pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
	pub entries: Vec<ManifestEntry>,
	/// Non-empty, non-comment lines that were skipped.
	pub skipped: Vec<MalformedManifestLine>,
}

impl Manifest {
	/// Parse manifest text. Blank lines and `#` comments are ignored. Lines
	/// that do not split into exactly three non-empty fields are recorded
	/// in [`Manifest::skipped`] and otherwise ignored.
	pub fn parse(content: &str) -> Self {
		let mut manifest = Self::default();

		for (index, raw) in content.lines().enumerate() {
			let line = index + 1;
			let trimmed = raw.trim();

			if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
				continue;
			}

			let fields: Vec<&str> = trimmed.split(FIELD_SEPARATOR).map(str::trim).collect();
			let [input, mode, output] = fields.as_slice() else {
				tracing::debug!(line, content = trimmed, "skipping malformed manifest line");
				manifest.skipped.push(MalformedManifestLine {
					line,
					content: trimmed.to_string(),
				});
				continue;
			};

			if input.is_empty() || mode.is_empty() || output.is_empty() {
				tracing::debug!(line, content = trimmed, "skipping manifest line with an empty field");
				manifest.skipped.push(MalformedManifestLine {
					line,
					content: trimmed.to_string(),
				});
				continue;
			}

			manifest.entries.push(ManifestEntry {
				input: PathBuf::from(input),
				mode: EntryMode::from_token(mode),
				output: PathBuf::from(output),
				line,
			});
		}

		manifest
	}

	/// Read and parse the manifest at `path`.
	pub fn load(path: &Path) -> StencilResult<Self> {
		let content = std::fs::read_to_string(path).map_err(|e| {
			StencilError::ManifestRead {
				path: path.to_path_buf(),
				reason: e.to_string(),
			}
		})?;

		Ok(Self::parse(&content))
	}
}
