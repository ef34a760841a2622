mod common;

use rstest::rstest;
use stencil_cli::Commands;
use stencil_cli::StencilCli;
use stencil_core::AnyEmptyResult;

#[test]
fn build_writes_every_entry() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::simple_site(tmp.path())?;

	common::stencil_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Built 3 file(s), 3 changed."));

	let site = tmp.path().join("site");
	assert_eq!(
		std::fs::read_to_string(site.join("index.html"))?,
		"<title>Home</title>Welcome"
	);
	assert_eq!(
		std::fs::read_to_string(site.join("pages/about.html"))?,
		"<title>About</title>Us"
	);
	assert_eq!(std::fs::read_to_string(site.join("static/logo.txt"))?, "LOGO");

	Ok(())
}

#[test]
fn second_build_changes_nothing() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::simple_site(tmp.path())?;

	common::stencil_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	common::stencil_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Built 3 file(s), 0 changed."));

	Ok(())
}

#[test]
fn dry_run_writes_nothing() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::simple_site(tmp.path())?;

	common::stencil_cmd()
		.arg("build")
		.arg("--dry-run")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("would write 3 of 3 file(s)"))
		.stdout(predicates::str::contains("index.html"));

	assert!(!tmp.path().join("site").exists());

	Ok(())
}

#[test]
fn missing_slot_is_a_warning_not_a_failure() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::simple_site(tmp.path())?;
	common::write_files(
		tmp.path(),
		&[(
			"site-description/about.html",
			"$<inherit base.html>$$<fill title>$About$<fill body>$$<slot author>$",
		)],
	)?;

	common::stencil_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stderr(predicates::str::contains("warning:"))
		.stderr(predicates::str::contains("$<slot author>$"));

	assert_eq!(
		std::fs::read_to_string(tmp.path().join("site/pages/about.html"))?,
		"<title>About</title>$<slot author>$"
	);

	Ok(())
}

#[test]
fn deny_warnings_fails_the_build() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::simple_site(tmp.path())?;
	common::write_files(
		tmp.path(),
		&[("site-description/index.html", "$<frobnicate>$")],
	)?;

	common::stencil_cmd()
		.arg("build")
		.arg("--deny-warnings")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains("--deny-warnings"));

	Ok(())
}

#[test]
fn failing_entry_does_not_stop_the_others() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::simple_site(tmp.path())?;
	common::write_files(
		tmp.path(),
		&[
			(
				"site-description/out.txt",
				"index.html > $ > index.html\nloop.html > $ > loop.html\n",
			),
			("site-description/loop.html", "$<inherit loop.html>$"),
		],
	)?;

	common::stencil_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains("loop.html"))
		.stderr(predicates::str::contains("1 entry failed to build"));

	assert!(tmp.path().join("site/index.html").is_file());
	assert!(!tmp.path().join("site/loop.html").exists());

	Ok(())
}

#[test]
fn config_file_changes_directories() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_files(
		tmp.path(),
		&[
			(
				"stencil.toml",
				"description = \"src\"\noutput = \"public\"\n\n[variables]\nsite = \"Demo\"\n",
			),
			("src/out.txt", "index.html > $ > index.html\n"),
			("src/index.html", "<h1>$<slot site>$</h1>"),
		],
	)?;

	common::stencil_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	assert_eq!(
		std::fs::read_to_string(tmp.path().join("public/index.html"))?,
		"<h1>Demo</h1>"
	);

	Ok(())
}

#[test]
fn invalid_config_is_fatal() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::simple_site(tmp.path())?;
	common::write_files(tmp.path(), &[("stencil.toml", "jobs = [")])?;

	common::stencil_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2);

	Ok(())
}

#[test]
fn missing_subcommand_is_fatal() {
	common::stencil_cmd()
		.assert()
		.code(2)
		.stderr(predicates::str::contains("No subcommand specified"));
}

#[rstest]
#[case::build(&["stencil", "build"], Commands::Build { dry_run: false, watch: false, deny_warnings: false })]
#[case::build_all_flags(
	&["stencil", "build", "--dry-run", "--watch", "--deny-warnings"],
	Commands::Build { dry_run: true, watch: true, deny_warnings: true }
)]
#[case::watch(&["stencil", "watch", "--path", "site"], Commands::Watch)]
#[case::check_diff(&["stencil", "check", "--diff"], Commands::Check { diff: true })]
#[case::list(&["stencil", "list", "--verbose"], Commands::List)]
fn commands_are_accepted_by_cli_parser(#[case] argv: &[&str], #[case] expected: Commands) {
	use clap::Parser;

	let cli = StencilCli::try_parse_from(argv).unwrap_or_else(|e| panic!("{e}"));
	assert_eq!(cli.command, Some(expected));
}
