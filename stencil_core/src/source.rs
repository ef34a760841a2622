use std::collections::HashMap;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// Where the chain walker reads template documents from.
pub trait DocumentSource {
	/// Read the full text of the document at `path`.
	fn read(&self, path: &Path) -> io::Result<String>;

	/// The identity used to detect inheritance cycles. Two paths naming the
	/// same document must map to the same value.
	fn canonical(&self, path: &Path) -> PathBuf {
		normalize_path(path)
	}
}

/// Reads documents from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl DocumentSource for FsSource {
	fn read(&self, path: &Path) -> io::Result<String> {
		std::fs::read_to_string(path)
	}

	fn canonical(&self, path: &Path) -> PathBuf {
		std::fs::canonicalize(path).unwrap_or_else(|_| normalize_path(path))
	}
}

/// Documents held in memory, keyed by their normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
	documents: HashMap<PathBuf, String>,
}

impl MemorySource {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
		self.insert(path, text);
		self
	}

	pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
		self.documents
			.insert(normalize_path(path.as_ref()), text.into());
	}
}

impl DocumentSource for MemorySource {
	fn read(&self, path: &Path) -> io::Result<String> {
		self.documents
			.get(&normalize_path(path))
			.cloned()
			.ok_or_else(|| {
				io::Error::new(
					io::ErrorKind::NotFound,
					format!("no document at `{}`", path.display()),
				)
			})
	}
}

impl<S: DocumentSource + ?Sized> DocumentSource for &S {
	fn read(&self, path: &Path) -> io::Result<String> {
		(**self).read(path)
	}

	fn canonical(&self, path: &Path) -> PathBuf {
		(**self).canonical(path)
	}
}

/// Lexically resolve `.` and `..` components without touching the
/// filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
	let mut normalized = PathBuf::new();

	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				match normalized.components().next_back() {
					Some(Component::Normal(_)) => {
						normalized.pop();
					}
					Some(Component::RootDir | Component::Prefix(_)) => {}
					_ => normalized.push(".."),
				}
			}
			other => normalized.push(other.as_os_str()),
		}
	}

	normalized
}
