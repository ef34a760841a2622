use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum StencilError {
	#[error(transparent)]
	#[diagnostic(code(stencil::io_error))]
	Io(#[from] std::io::Error),

	#[error("more than one `inherit` command in `{path}`")]
	#[diagnostic(
		code(stencil::duplicate_inherit),
		help("a template can inherit from a single parent, remove the extra `$<inherit ...>$`")
	)]
	DuplicateInherit { path: PathBuf },

	#[error("section `{name}` in `{path}` is filled before any `inherit` command")]
	#[diagnostic(
		code(stencil::fill_without_parent),
		help("add `$<inherit parent.html>$` above the first `fill`, or disable `strict_fill`")
	)]
	FillWithoutParent { name: String, path: PathBuf },

	#[error("`{command}` in `{path}` expects {expected} argument(s), got {got}")]
	#[diagnostic(code(stencil::invalid_arguments))]
	InvalidArguments {
		command: String,
		expected: usize,
		got: usize,
		path: PathBuf,
	},

	#[error("inheritance cycle detected at `{path}` (chain: {})", display_chain(.chain))]
	#[diagnostic(
		code(stencil::inherit_cycle),
		help("a template cannot inherit from itself or from one of its descendants")
	)]
	InheritCycle { path: PathBuf, chain: Vec<PathBuf> },

	#[error("failed to read template source `{path}`: {reason}")]
	#[diagnostic(code(stencil::source_read))]
	SourceRead { path: PathBuf, reason: String },

	#[error("failed to read manifest `{path}`: {reason}")]
	#[diagnostic(
		code(stencil::manifest_read),
		help("every build needs a manifest, set `manifest` in stencil.toml if it lives elsewhere")
	)]
	ManifestRead { path: PathBuf, reason: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(stencil::config_parse),
		help("check that stencil.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("failed to load globals file `{path}`: {reason}")]
	#[diagnostic(code(stencil::globals_file))]
	GlobalsFile { path: String, reason: String },

	#[error("unsupported globals file format: `{0}`")]
	#[diagnostic(
		code(stencil::unsupported_format),
		help("supported formats: json, toml, yaml, yml, kdl, ini")
	)]
	UnsupportedGlobalsFormat(String),

	#[error("invalid watch ignore pattern `{pattern}`: {reason}")]
	#[diagnostic(code(stencil::invalid_glob))]
	InvalidGlob { pattern: String, reason: String },

	#[error("failed to write `{path}`: {reason}")]
	#[diagnostic(code(stencil::output_write))]
	OutputWrite { path: PathBuf, reason: String },

	#[error("refusing to prune `{output}` because it contains `{protected}`")]
	#[diagnostic(
		code(stencil::unsafe_prune),
		help("point `output` at a directory outside the project sources, or disable `prune`")
	)]
	UnsafePrune { output: PathBuf, protected: PathBuf },

	#[error("build worker failed: {0}")]
	#[diagnostic(code(stencil::worker))]
	Worker(String),
}

/// Content problems that never stop a build. The offending statement is left
/// in the output untouched and one of these is reported alongside it.
#[derive(Debug, Clone, Diagnostic, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum WarningKind {
	#[error("slot `{name}` is not bound in scope")]
	#[diagnostic(
		code(stencil::missing_variable),
		help("fill `{name}` in a descendant template or add it to the globals")
	)]
	MissingVariable { name: String },

	#[error("unknown command `{command}`")]
	#[diagnostic(code(stencil::unknown_command), help("available commands: slot"))]
	UnknownCommand { command: String },

	#[error("`{command}` expects {expected} argument(s), got {got}")]
	#[diagnostic(code(stencil::invalid_arguments))]
	InvalidArguments {
		command: String,
		expected: usize,
		got: usize,
	},
}

fn display_chain(chain: &[PathBuf]) -> String {
	chain
		.iter()
		.map(|path| format!("`{}`", path.display()))
		.collect::<Vec<_>>()
		.join(" -> ")
}

pub type StencilResult<T> = Result<T, StencilError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
