use std::collections::BTreeSet;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::ChainWalker;
use crate::FsSource;
use crate::Scope;
use crate::StencilConfig;
use crate::StencilError;
use crate::StencilResult;
use crate::TemplateWarning;
use crate::manifest::EntryMode;
use crate::manifest::MalformedManifestLine;
use crate::manifest::Manifest;
use crate::manifest::ManifestEntry;
use crate::source::normalize_path;

/// Everything a build needs, loaded once and shared read-only by every
/// worker.
#[derive(Debug)]
pub struct SiteContext {
	/// Project root that the config paths are relative to.
	pub root: PathBuf,
	pub config: StencilConfig,
	pub manifest: Manifest,
	/// Global variables, the base layer of every entry's scope.
	pub globals: Scope,
}

impl SiteContext {
	pub fn description_dir(&self) -> PathBuf {
		self.config.description_dir(&self.root)
	}

	pub fn output_dir(&self) -> PathBuf {
		self.config.output_dir(&self.root)
	}

	pub fn input_path(&self, entry: &ManifestEntry) -> PathBuf {
		self.description_dir().join(&entry.input)
	}

	pub fn output_path(&self, entry: &ManifestEntry) -> PathBuf {
		self.output_dir().join(&entry.output)
	}

	pub fn walker(&self) -> ChainWalker<FsSource> {
		ChainWalker::new(FsSource, self.description_dir()).with_options(self.config.engine_options())
	}
}

/// Load the config, manifest and globals for the project at `root`. Any
/// failure here is fatal for the whole build.
pub fn load_site(root: &Path) -> StencilResult<SiteContext> {
	let config = StencilConfig::load_or_default(root)?;
	let manifest = Manifest::load(&config.manifest_path(root))?;
	let globals = config.load_globals(root)?;

	tracing::debug!(
		root = %root.display(),
		entries = manifest.entries.len(),
		skipped = manifest.skipped.len(),
		globals = globals.len(),
		"loaded site"
	);

	Ok(SiteContext {
		root: root.to_path_buf(),
		config,
		manifest,
		globals,
	})
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
	/// Write every changed output to disk.
	Write,
	/// Resolve everything but leave the output directory untouched.
	DryRun,
}

/// The resolved output of one manifest entry.
#[derive(Debug, Clone)]
pub struct Artifact {
	pub entry: ManifestEntry,
	/// Absolute output path.
	pub output: PathBuf,
	pub contents: Vec<u8>,
	/// What was on disk before this build, if anything.
	pub previous: Option<Vec<u8>>,
	/// Documents read to produce this artifact, leaf first.
	pub chain: Vec<PathBuf>,
	pub warnings: Vec<TemplateWarning>,
}

impl Artifact {
	/// Whether the output differs from what was on disk before the build.
	pub fn is_changed(&self) -> bool {
		self.previous.as_deref() != Some(self.contents.as_slice())
	}
}

/// An entry whose chain could not be resolved or written.
#[derive(Debug)]
pub struct EntryFailure {
	pub entry: ManifestEntry,
	pub error: StencilError,
}

/// Result of building every manifest entry.
#[derive(Debug, Default)]
pub struct BuildReport {
	/// Artifacts in manifest order.
	pub artifacts: Vec<Artifact>,
	/// Entries that failed, in manifest order. Other entries still built.
	pub failures: Vec<EntryFailure>,
	/// Manifest lines that were skipped.
	pub skipped: Vec<MalformedManifestLine>,
	/// Stale files removed from the output directory.
	pub pruned: Vec<PathBuf>,
}

impl BuildReport {
	/// Returns true if every entry was built.
	pub fn is_ok(&self) -> bool {
		self.failures.is_empty()
	}

	pub fn has_warnings(&self) -> bool {
		self.artifacts.iter().any(|a| !a.warnings.is_empty())
	}

	pub fn warnings(&self) -> impl Iterator<Item = &TemplateWarning> {
		self.artifacts.iter().flat_map(|a| a.warnings.iter())
	}

	pub fn changed(&self) -> impl Iterator<Item = &Artifact> {
		self.artifacts.iter().filter(|a| a.is_changed())
	}
}

/// Build every manifest entry concurrently.
///
/// Each entry is resolved and written on a blocking worker; at most
/// `config.jobs()` entries are in flight at once. The report is returned only
/// after every worker has finished, so a returned report means every write
/// has landed.
pub async fn build_site(ctx: Arc<SiteContext>, mode: BuildMode) -> BuildReport {
	let semaphore = Arc::new(Semaphore::new(ctx.config.jobs()));
	let mut workers = JoinSet::new();
	let mut pending: BTreeSet<usize> = BTreeSet::new();

	for index in 0..ctx.manifest.entries.len() {
		let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
			break;
		};
		let ctx = Arc::clone(&ctx);
		pending.insert(index);

		workers.spawn_blocking(move || {
			let _permit = permit;
			let entry = &ctx.manifest.entries[index];
			(index, render_entry(&ctx, entry, mode))
		});
	}

	let mut results: Vec<(usize, StencilResult<Artifact>)> = Vec::with_capacity(pending.len());
	while let Some(joined) = workers.join_next().await {
		match joined {
			Ok((index, result)) => {
				pending.remove(&index);
				results.push((index, result));
			}
			Err(e) => tracing::error!(error = %e, "build worker did not finish"),
		}
	}

	for index in pending {
		results.push((
			index,
			Err(StencilError::Worker(
				"worker stopped before finishing the entry".to_string(),
			)),
		));
	}
	results.sort_by_key(|(index, _)| *index);

	let mut report = BuildReport {
		skipped: ctx.manifest.skipped.clone(),
		..BuildReport::default()
	};

	for (index, result) in results {
		match result {
			Ok(artifact) => report.artifacts.push(artifact),
			Err(error) => {
				let entry = ctx.manifest.entries[index].clone();
				tracing::debug!(input = %entry.input.display(), %error, "entry failed");
				report.failures.push(EntryFailure { entry, error });
			}
		}
	}

	if mode == BuildMode::Write && ctx.config.prune {
		match prune_outputs(&ctx) {
			Ok(pruned) => report.pruned = pruned,
			Err(e) => tracing::error!(error = %e, "failed to prune output directory"),
		}
	}

	tracing::info!(
		built = report.artifacts.len(),
		changed = report.changed().count(),
		failed = report.failures.len(),
		"site build finished"
	);

	report
}

/// Resolve a single entry and, in write mode, persist it.
pub fn render_entry(
	ctx: &SiteContext,
	entry: &ManifestEntry,
	mode: BuildMode,
) -> StencilResult<Artifact> {
	let input = ctx.input_path(entry);
	let output = ctx.output_path(entry);

	let (contents, chain, warnings) = match entry.mode {
		EntryMode::Template => {
			let rendered = ctx.walker().build(&input, &ctx.globals)?;
			(rendered.text.into_bytes(), rendered.chain, rendered.warnings)
		}
		EntryMode::Copy => {
			let bytes = std::fs::read(&input).map_err(|e| {
				StencilError::SourceRead {
					path: input.clone(),
					reason: e.to_string(),
				}
			})?;
			(bytes, vec![input.clone()], Vec::new())
		}
	};

	for warning in &warnings {
		tracing::debug!(%warning, "template warning");
	}

	let artifact = Artifact {
		entry: entry.clone(),
		previous: std::fs::read(&output).ok(),
		output,
		contents,
		chain,
		warnings,
	};

	if mode == BuildMode::Write && artifact.is_changed() {
		write_output(&artifact.output, &artifact.contents)?;
		tracing::debug!(output = %artifact.output.display(), "wrote output");
	}

	Ok(artifact)
}

/// Write `contents` to `path`, creating parent directories as needed. The
/// file is written to a sibling temp file first and renamed into place.
pub fn write_output(path: &Path, contents: &[u8]) -> StencilResult<()> {
	let write_error = |e: std::io::Error| {
		StencilError::OutputWrite {
			path: path.to_path_buf(),
			reason: e.to_string(),
		}
	};

	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).map_err(write_error)?;
	}

	let file_name = path
		.file_name()
		.map_or_else(|| "output".into(), |name| name.to_string_lossy());
	let temp_path = path.with_file_name(format!(
		".{file_name}.tmp-{}-{}",
		std::process::id(),
		std::time::SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_or(0, |duration| duration.as_nanos())
	));

	std::fs::write(&temp_path, contents).map_err(write_error)?;
	if let Err(e) = std::fs::rename(&temp_path, path) {
		let _ = std::fs::remove_file(&temp_path);
		return Err(write_error(e));
	}

	Ok(())
}

/// Remove files from the output directory that no manifest entry produces.
/// Outputs of failed entries are kept. Nothing is removed when the output
/// directory is, or contains, the project root or the description directory.
pub fn prune_outputs(ctx: &SiteContext) -> StencilResult<Vec<PathBuf>> {
	let output_dir = ctx.output_dir();
	if !output_dir.is_dir() {
		return Ok(Vec::new());
	}

	let output = resolved_path(&output_dir);
	for protected in [ctx.root.clone(), ctx.description_dir()] {
		if resolved_path(&protected).starts_with(&output) {
			return Err(StencilError::UnsafePrune {
				output: output_dir,
				protected,
			});
		}
	}

	let expected: HashSet<PathBuf> = ctx
		.manifest
		.entries
		.iter()
		.map(|entry| normalize_path(&ctx.output_path(entry)))
		.collect();

	let mut pruned = Vec::new();
	let walker = ignore::WalkBuilder::new(&output_dir)
		.standard_filters(false)
		.build();

	for dent in walker {
		let dent = match dent {
			Ok(dent) => dent,
			Err(e) => {
				tracing::warn!(error = %e, "skipping unreadable output path");
				continue;
			}
		};

		if !dent.file_type().is_some_and(|kind| kind.is_file()) {
			continue;
		}

		let path = dent.path();
		if expected.contains(&normalize_path(path)) {
			continue;
		}

		std::fs::remove_file(path)?;
		tracing::debug!(path = %path.display(), "pruned stale output");
		pruned.push(path.to_path_buf());
	}

	pruned.sort();
	Ok(pruned)
}

fn resolved_path(path: &Path) -> PathBuf {
	std::fs::canonicalize(path).unwrap_or_else(|_| normalize_path(path))
}
