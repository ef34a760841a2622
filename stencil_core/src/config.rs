use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::EngineOptions;
use crate::Scope;
use crate::StencilError;
use crate::StencilResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["stencil.toml", ".stencil.toml", ".config/stencil.toml"];

pub const DEFAULT_DESCRIPTION_DIR: &str = "site-description";
pub const DEFAULT_OUTPUT_DIR: &str = "site";
pub const DEFAULT_MANIFEST: &str = "out.txt";
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Globals file entry. A plain path picks the format from its extension:
///
/// ```toml
/// globals = "globals.toml"
/// ```
///
/// A typed entry names the format explicitly:
///
/// ```toml
/// globals = { path = "site-vars", format = "json" }
/// ```
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
#[non_exhaustive]
pub enum GlobalsSource {
	Path(PathBuf),
	Typed(TypedGlobalsSource),
}

impl GlobalsSource {
	pub fn path(&self) -> &Path {
		match self {
			Self::Path(path) => path.as_path(),
			Self::Typed(typed) => typed.path.as_path(),
		}
	}

	/// Explicit format override, or the lowercased file extension.
	pub fn format(&self) -> String {
		match self {
			Self::Path(path) => {
				path.extension()
					.and_then(|e| e.to_str())
					.unwrap_or("")
					.to_ascii_lowercase()
			}
			Self::Typed(typed) => typed.format.trim().to_ascii_lowercase(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct TypedGlobalsSource {
	pub path: PathBuf,
	pub format: String,
}

/// Configuration loaded from a `stencil.toml` file. Every key is optional.
///
/// ```toml
/// description = "site-description"
/// output = "site"
/// manifest = "out.txt"
/// globals = "globals.toml"
/// jobs = 4
/// strict_fill = false
/// prune = false
///
/// [variables]
/// year = "2026"
///
/// [watch]
/// debounce_ms = 200
/// ignore = ["**/*.swp", "**/.#*"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StencilConfig {
	/// Directory holding the manifest and every template. `inherit` paths
	/// are relative to it.
	#[serde(default = "default_description")]
	pub description: PathBuf,
	/// Directory that manifest output paths are relative to.
	#[serde(default = "default_output")]
	pub output: PathBuf,
	/// Manifest file, relative to the description directory.
	#[serde(default = "default_manifest")]
	pub manifest: PathBuf,
	/// Optional structured file providing the global variables, relative to
	/// the description directory.
	#[serde(default)]
	pub globals: Option<GlobalsSource>,
	/// Inline global variables. These override values from `globals`.
	#[serde(default)]
	pub variables: BTreeMap<String, String>,
	/// Maximum number of entries resolved at the same time. Defaults to the
	/// available parallelism. Oversized values are capped by
	/// [`StencilConfig::jobs`].
	#[serde(default)]
	pub jobs: Option<NonZeroUsize>,
	/// Reject `fill` before `inherit`.
	#[serde(default)]
	pub strict_fill: bool,
	/// Remove files from the output directory that no manifest entry
	/// produced.
	#[serde(default)]
	pub prune: bool,
	#[serde(default)]
	pub watch: WatchConfig,
}

impl Default for StencilConfig {
	fn default() -> Self {
		Self {
			description: default_description(),
			output: default_output(),
			manifest: default_manifest(),
			globals: None,
			variables: BTreeMap::new(),
			jobs: None,
			strict_fill: false,
			prune: false,
			watch: WatchConfig::default(),
		}
	}
}

/// Settings for `stencil build --watch`.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
	/// Quiet period after the last change event before a rebuild starts.
	#[serde(default = "default_debounce_ms")]
	pub debounce_ms: u64,
	/// Glob patterns, relative to the description directory, whose changes
	/// never trigger a rebuild.
	#[serde(default)]
	pub ignore: Vec<String>,
}

impl Default for WatchConfig {
	fn default() -> Self {
		Self {
			debounce_ms: DEFAULT_DEBOUNCE_MS,
			ignore: Vec::new(),
		}
	}
}

impl WatchConfig {
	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	pub fn ignore_set(&self) -> StencilResult<GlobSet> {
		let mut builder = GlobSetBuilder::new();
		for pattern in &self.ignore {
			let glob = Glob::new(pattern).map_err(|e| {
				StencilError::InvalidGlob {
					pattern: pattern.clone(),
					reason: e.to_string(),
				}
			})?;
			builder.add(glob);
		}

		builder.build().map_err(|e| {
			StencilError::InvalidGlob {
				pattern: self.ignore.join(", "),
				reason: e.to_string(),
			}
		})
	}
}

fn default_description() -> PathBuf {
	PathBuf::from(DEFAULT_DESCRIPTION_DIR)
}

fn default_output() -> PathBuf {
	PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_manifest() -> PathBuf {
	PathBuf::from(DEFAULT_MANIFEST)
}

fn default_debounce_ms() -> u64 {
	DEFAULT_DEBOUNCE_MS
}

impl StencilConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is no config file.
	pub fn load(root: &Path) -> StencilResult<Option<StencilConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config: StencilConfig =
			toml::from_str(&content).map_err(|e| StencilError::ConfigParse(e.to_string()))?;

		Ok(Some(config))
	}

	/// Load the config at `root`, falling back to the defaults.
	pub fn load_or_default(root: &Path) -> StencilResult<StencilConfig> {
		Ok(Self::load(root)?.unwrap_or_default())
	}

	pub fn description_dir(&self, root: &Path) -> PathBuf {
		root.join(&self.description)
	}

	pub fn output_dir(&self, root: &Path) -> PathBuf {
		root.join(&self.output)
	}

	pub fn manifest_path(&self, root: &Path) -> PathBuf {
		self.description_dir(root).join(&self.manifest)
	}

	pub fn engine_options(&self) -> EngineOptions {
		EngineOptions {
			strict_fill: self.strict_fill,
		}
	}

	/// Worker bound for a build, never more than a semaphore can hold.
	pub fn jobs(&self) -> usize {
		self.jobs
			.or_else(|| std::thread::available_parallelism().ok())
			.map_or(1, NonZeroUsize::get)
			.min(Semaphore::MAX_PERMITS)
	}

	/// Build the global scope: the flattened globals file overlaid with the
	/// inline `[variables]` table.
	pub fn load_globals(&self, root: &Path) -> StencilResult<Scope> {
		let mut scope = Scope::new();

		if let Some(source) = &self.globals {
			let abs_path = self.description_dir(root).join(source.path());
			let path_display = source.path().display().to_string();
			let content =
				std::fs::read_to_string(&abs_path).map_err(|e| StencilError::GlobalsFile {
					path: path_display.clone(),
					reason: e.to_string(),
				})?;
			let value = parse_globals_file(&content, &source.format(), &path_display)?;
			scope = scope.extend(flatten_globals(&value));
		}

		Ok(scope.extend(self.variables.clone()))
	}
}

/// Parse a globals file's content into a `serde_json::Value` based on its
/// format.
pub fn parse_globals_file(
	content: &str,
	format: &str,
	path_display: &str,
) -> StencilResult<serde_json::Value> {
	let globals_error = |reason: String| {
		StencilError::GlobalsFile {
			path: path_display.to_string(),
			reason,
		}
	};

	match format {
		"json" => serde_json::from_str(content).map_err(|e| globals_error(e.to_string())),
		"toml" => {
			let toml_value: toml::Value =
				toml::from_str(content).map_err(|e| globals_error(e.to_string()))?;
			Ok(toml_to_json(toml_value))
		}
		"yaml" | "yml" => serde_yaml_ng::from_str(content).map_err(|e| globals_error(e.to_string())),
		"kdl" => {
			let doc: kdl::KdlDocument = content
				.parse()
				.map_err(|e: kdl::KdlError| globals_error(e.to_string()))?;
			Ok(kdl_document_to_value(&doc))
		}
		"ini" => serde_ini::from_str(content).map_err(|e| globals_error(e.to_string())),
		other => Err(StencilError::UnsupportedGlobalsFormat(other.to_string())),
	}
}

/// Flatten structured globals into slot names. Nested keys are joined with
/// `.` and array items use their index, so `{ "site": { "title": "x" } }`
/// binds `site.title`.
pub fn flatten_globals(value: &serde_json::Value) -> BTreeMap<String, String> {
	let mut flat = BTreeMap::new();
	flatten_into(value, None, &mut flat);
	flat
}

fn flatten_into(value: &serde_json::Value, prefix: Option<&str>, flat: &mut BTreeMap<String, String>) {
	let key = |name: &str| {
		match prefix {
			Some(prefix) => format!("{prefix}.{name}"),
			None => name.to_string(),
		}
	};

	match value {
		serde_json::Value::Object(map) => {
			for (name, child) in map {
				flatten_into(child, Some(&key(name)), flat);
			}
		}
		serde_json::Value::Array(items) => {
			for (index, child) in items.iter().enumerate() {
				flatten_into(child, Some(&key(&index.to_string())), flat);
			}
		}
		scalar => {
			let Some(prefix) = prefix else {
				return;
			};
			let text = match scalar {
				serde_json::Value::String(s) => s.clone(),
				serde_json::Value::Null => String::new(),
				other => other.to_string(),
			};
			flat.insert(prefix.to_string(), text);
		}
	}
}

/// Convert a `toml::Value` to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
	match value {
		toml::Value::String(s) => serde_json::Value::String(s),
		toml::Value::Integer(i) => serde_json::Value::from(i),
		toml::Value::Float(f) => {
			serde_json::Number::from_f64(f)
				.map_or_else(|| serde_json::Value::String(f.to_string()), serde_json::Value::Number)
		}
		toml::Value::Boolean(b) => serde_json::Value::Bool(b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect()),
		toml::Value::Table(table) => {
			serde_json::Value::Object(
				table
					.into_iter()
					.map(|(k, v)| (k, toml_to_json(v)))
					.collect(),
			)
		}
	}
}

/// Convert a KDL document to a `serde_json::Value`.
fn kdl_document_to_value(doc: &kdl::KdlDocument) -> serde_json::Value {
	let mut map = serde_json::Map::new();

	for node in doc.nodes() {
		map.insert(node.name().to_string(), kdl_node_to_value(node));
	}

	serde_json::Value::Object(map)
}

/// Convert a KDL node to a `serde_json::Value`.
fn kdl_node_to_value(node: &kdl::KdlNode) -> serde_json::Value {
	// Children turn the node into an object.
	if let Some(children) = node.children() {
		return kdl_document_to_value(children);
	}

	let entries: Vec<&kdl::KdlEntry> = node.entries().iter().collect();

	if entries.is_empty() {
		return serde_json::Value::Null;
	}

	if entries.len() == 1 && entries[0].name().is_none() {
		return kdl_entry_value_to_json(entries[0].value());
	}

	if entries.iter().all(|e| e.name().is_some()) {
		let mut map = serde_json::Map::new();
		for entry in &entries {
			if let Some(name) = entry.name() {
				map.insert(name.to_string(), kdl_entry_value_to_json(entry.value()));
			}
		}
		return serde_json::Value::Object(map);
	}

	serde_json::Value::Array(
		entries
			.iter()
			.map(|e| kdl_entry_value_to_json(e.value()))
			.collect(),
	)
}

fn kdl_entry_value_to_json(value: &kdl::KdlValue) -> serde_json::Value {
	match value {
		kdl::KdlValue::String(s) => serde_json::Value::String(s.clone()),
		kdl::KdlValue::Integer(i) => serde_json::Value::String(i.to_string()),
		kdl::KdlValue::Float(f) => serde_json::Value::String(f.to_string()),
		kdl::KdlValue::Bool(b) => serde_json::Value::Bool(*b),
		kdl::KdlValue::Null => serde_json::Value::Null,
	}
}
