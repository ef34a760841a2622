use std::path::Path;

use crate::Document;
use crate::MemorySource;
use crate::Sections;

pub fn document(text: &str) -> Document {
	Document::new("page.html", text)
}

pub fn sections(pairs: &[(&str, &str)]) -> Sections {
	pairs
		.iter()
		.map(|(name, text)| ((*name).to_string(), (*text).to_string()))
		.collect()
}

/// `base.html` <- `page.html` <- `index.html`.
pub fn three_level_source() -> MemorySource {
	MemorySource::new()
		.with(
			"base.html",
			"<title>$<slot title>$</title><body>$<slot body>$</body>",
		)
		.with(
			"page.html",
			"$<inherit base.html>$$<fill body>$<main>$<slot content>$</main>",
		)
		.with(
			"index.html",
			"$<inherit page.html>$\n$<fill title>$Home$<fill content>$Hello",
		)
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) -> std::io::Result<()> {
	for (path, content) in files {
		let path = root.join(path);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, content)?;
	}

	Ok(())
}

/// A small site with two templates, a copied file and an entry whose source
/// is missing.
pub fn sample_site(root: &Path) -> std::io::Result<()> {
	write_files(
		root,
		&[
			(
				"site-description/out.txt",
				"# pages\nindex.html > $ > index.html\nabout.html > $ > pages/about.html\nlogo.txt \
				 > copy > static/logo.txt\nmissing.html > $ > missing.html\n",
			),
			(
				"site-description/base.html",
				"<title>$<slot title>$</title>$<slot body>$",
			),
			(
				"site-description/index.html",
				"$<inherit base.html>$$<fill title>$Home$<fill body>$Welcome",
			),
			(
				"site-description/about.html",
				"$<inherit base.html>$$<fill title>$About$<fill body>$$<slot missing>$",
			),
			("site-description/logo.txt", "LOGO"),
		],
	)
}
