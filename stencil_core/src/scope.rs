use std::collections::BTreeMap;

use derive_more::Deref;

/// Fully resolved text keyed by variable or section name.
///
/// A scope only ever grows. [`Scope::extend`] consumes the current value and
/// returns the next one, so each level of an inheritance chain hands a new
/// scope to its parent instead of mutating a shared map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct Scope(BTreeMap<String, String>);

impl Scope {
	pub fn new() -> Self {
		Self::default()
	}

	/// Bind every `(name, text)` pair on top of the current bindings. Later
	/// bindings replace earlier ones with the same name.
	#[must_use]
	pub fn extend<I, K, V>(mut self, bindings: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.0.extend(
			bindings
				.into_iter()
				.map(|(name, text)| (name.into(), text.into())),
		);
		self
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Scope {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self::new().extend(iter)
	}
}
