#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn stencil_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("stencil"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
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

/// Two templates sharing `base.html` plus one copied asset.
pub fn simple_site(root: &Path) -> std::io::Result<()> {
	write_files(
		root,
		&[
			(
				"site-description/out.txt",
				"index.html > $ > index.html\nabout.html > $ > pages/about.html\nlogo.txt > = > \
				 static/logo.txt\n",
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
				"$<inherit base.html>$$<fill title>$About$<fill body>$Us",
			),
			("site-description/logo.txt", "LOGO"),
		],
	)
}
