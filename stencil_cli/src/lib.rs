use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use globset::GlobSet;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Build a static site from plain text templates.",
	long_about = "stencil builds a static site from a manifest of templates.\n\nEach manifest \
	              line maps a source document to an output path:\n  index.html > $ > \
	              index.html\n  logo.png   > = > static/logo.png\n\nTemplates inherit from a \
	              parent with `$<inherit base.html>$`, fill named sections with `$<fill \
	              title>$`, and read them back with `$<slot title>$`.\n\nQuick start:\n  \
	              stencil build        Build the site once\n  stencil watch        Rebuild on \
	              every change\n  stencil check        Verify the output directory is up to \
	              date\n  stencil list         Show manifest entries and their chains"
)]
pub struct StencilCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output and debug logging.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Commands {
	/// Build every manifest entry into the output directory.
	///
	/// Template entries (mode `$`) are resolved through their inheritance
	/// chain, every other entry is copied verbatim. A failing entry is
	/// reported and the remaining entries are still built.
	Build {
		/// Resolve everything and list the files that would change without
		/// writing them.
		#[arg(long, default_value_t = false)]
		dry_run: bool,

		/// Rebuild whenever a file in the description directory changes.
		#[arg(long, default_value_t = false)]
		watch: bool,

		/// Exit with a non-zero status when any template warning is
		/// reported (missing slots, unknown commands).
		#[arg(long, default_value_t = false)]
		deny_warnings: bool,
	},
	/// Build once, then rebuild whenever the description directory changes.
	///
	/// Shorthand for `stencil build --watch`.
	Watch,
	/// Check that the output directory matches what a build would produce.
	///
	/// Exits with a non-zero status code when any output is missing or out of
	/// date. Nothing is written.
	Check {
		/// Show a unified diff for each stale text output.
		#[arg(long, default_value_t = false)]
		diff: bool,
	},
	/// List manifest entries with their mode and inheritance chain.
	List,
}

/// Drops change events that only touch ignored paths or the output
/// directory.
pub struct WatchFilter {
	/// Root the `[watch] ignore` globs are relative to.
	pub description_dir: PathBuf,
	pub output_dir: PathBuf,
	pub ignore: GlobSet,
}

impl WatchFilter {
	/// Whether `event` should trigger a rebuild.
	pub fn is_relevant(&self, event: &notify::Event) -> bool {
		matches!(
			event.kind,
			notify::EventKind::Modify(_) | notify::EventKind::Create(_) | notify::EventKind::Remove(_)
		) && event.paths.iter().any(|path| !self.ignores(path))
	}

	pub fn ignores(&self, path: &Path) -> bool {
		if path.starts_with(&self.output_dir) {
			return true;
		}

		let relative = path.strip_prefix(&self.description_dir).unwrap_or(path);
		self.ignore.is_match(relative)
	}
}
