use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::mpsc;

use clap::Parser;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use stencil_cli::Commands;
use stencil_cli::StencilCli;
use stencil_cli::WatchFilter;
use stencil_core::AnyResult;
use stencil_core::StencilError;
use stencil_core::TemplateWarning;
use stencil_core::manifest::EntryMode;
use stencil_core::site::BuildMode;
use stencil_core::site::BuildReport;
use stencil_core::site::SiteContext;
use stencil_core::site::build_site;
use stencil_core::site::load_site;
use tracing_subscriber::EnvFilter;

/// Entries failed, outputs are stale, or warnings were denied.
const EXIT_FAILURE: i32 = 1;
/// The build could not start at all.
const EXIT_FATAL: i32 = 2;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = StencilCli::parse();

	// Respect NO_COLOR env var, --no-color flag and terminals without color.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stderr).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_tracing(args.verbose, use_color);

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match args.command {
		Some(Commands::Build {
			dry_run,
			watch,
			deny_warnings,
		}) => run_build(&args, dry_run, watch, deny_warnings),
		Some(Commands::Watch) => run_build(&args, false, true, false),
		Some(Commands::Check { diff }) => run_check(&args, diff),
		Some(Commands::List) => run_list(&args),
		None => {
			eprintln!("No subcommand specified. Run `stencil --help` for usage.");
			process::exit(EXIT_FATAL);
		}
	};

	match result {
		Ok(true) => {}
		Ok(false) => process::exit(EXIT_FAILURE),
		Err(e) => {
			// Render stencil errors through miette for help text and codes.
			match e.downcast::<StencilError>() {
				Ok(stencil_err) => {
					let report: miette::Report = (*stencil_err).into();
					eprintln!("{report:?}");
				}
				Err(e) => {
					eprintln!("{} {e}", colored!("error:", red));
				}
			}
			process::exit(EXIT_FATAL);
		}
	}
}

fn init_tracing(verbose: bool, use_color: bool) {
	let default_filter = if verbose {
		"warn,stencil_core=debug,stencil=debug"
	} else {
		"warn"
	};
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.try_init()
		.ok();
}

fn resolve_root(args: &StencilCli) -> PathBuf {
	let root = args
		.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
	std::fs::canonicalize(&root).unwrap_or(root)
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
}

/// Returns `Ok(false)` when the build completed with failures.
fn run_build(args: &StencilCli, dry_run: bool, watch: bool, deny_warnings: bool) -> AnyResult<bool> {
	let root = resolve_root(args);
	let runtime = runtime()?;
	let ctx = Arc::new(load_site(&root)?);
	let ok = run_build_once(&runtime, &ctx, args, dry_run, deny_warnings);

	if !watch || dry_run {
		return Ok(ok);
	}

	println!("\nWatching for file changes... (press Ctrl+C to stop)");

	let filter = WatchFilter {
		description_dir: ctx.description_dir(),
		output_dir: ctx.output_dir(),
		ignore: ctx.config.watch.ignore_set()?,
	};
	let debounce = ctx.config.watch.debounce();
	let watch_dir = filter.description_dir.clone();
	let (tx, rx) = mpsc::channel();

	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			if let Ok(event) = res {
				if filter.is_relevant(&event) {
					tracing::debug!(paths = ?event.paths, "change detected");
					let _ = tx.send(());
				}
			}
		})?;

	use notify::Watcher;
	watcher.watch(&watch_dir, notify::RecursiveMode::Recursive)?;

	// Rebuilds run one at a time on this thread, so two builds never write
	// the same output concurrently.
	loop {
		rx.recv()?;
		// Debounce: drain events until the directory has been quiet.
		while rx.recv_timeout(debounce).is_ok() {}

		println!("\nFile change detected, rebuilding...");
		match load_site(&root) {
			Ok(ctx) => {
				run_build_once(&runtime, &Arc::new(ctx), args, false, deny_warnings);
			}
			Err(e) => {
				let report: miette::Report = e.into();
				eprintln!("{report:?}");
			}
		}
	}
}

fn run_build_once(
	runtime: &tokio::runtime::Runtime,
	ctx: &Arc<SiteContext>,
	args: &StencilCli,
	dry_run: bool,
	deny_warnings: bool,
) -> bool {
	let mode = if dry_run {
		BuildMode::DryRun
	} else {
		BuildMode::Write
	};
	let mut report = runtime.block_on(build_site(Arc::clone(ctx), mode));

	print_skipped_lines(&report, args.verbose);
	let warnings: Vec<_> = report.warnings().cloned().collect();
	print_template_warnings(&warnings, &ctx.root);

	let changed: Vec<_> = report.changed().map(|a| a.output.clone()).collect();
	if dry_run {
		println!(
			"Dry run: would write {} of {} file(s):",
			changed.len(),
			report.artifacts.len()
		);
		for path in &changed {
			println!("  {}", make_relative(path, &ctx.root));
		}
	} else {
		println!(
			"Built {} file(s), {} changed.",
			report.artifacts.len(),
			changed.len()
		);
		if args.verbose {
			for path in &changed {
				println!("  {}", make_relative(path, &ctx.root));
			}
		}
		for path in &report.pruned {
			println!("  removed {}", make_relative(path, &ctx.root));
		}
	}

	let failed = report.failures.len();
	print_failures(&mut report, &ctx.root);

	if failed > 0 {
		eprintln!(
			"{} {failed} entr{} failed to build",
			colored!("error:", red),
			if failed == 1 { "y" } else { "ies" }
		);
		return false;
	}

	if deny_warnings && !warnings.is_empty() {
		eprintln!(
			"{} {} template warning(s) reported with --deny-warnings",
			colored!("error:", red),
			warnings.len()
		);
		return false;
	}

	true
}

/// Returns `Ok(false)` when any output is stale or any entry failed.
fn run_check(args: &StencilCli, show_diff: bool) -> AnyResult<bool> {
	let root = resolve_root(args);
	let ctx = Arc::new(load_site(&root)?);
	let mut report = runtime()?.block_on(build_site(Arc::clone(&ctx), BuildMode::DryRun));

	let warnings: Vec<_> = report.warnings().cloned().collect();
	print_template_warnings(&warnings, &root);

	let stale: Vec<_> = report.changed().collect();
	for artifact in &stale {
		let rel = make_relative(&artifact.output, &root);
		let state = if artifact.previous.is_some() {
			"out of date"
		} else {
			"missing"
		};
		eprintln!("{} {rel} is {state}", colored!("stale:", yellow));

		if show_diff {
			let current = artifact
				.previous
				.as_deref()
				.map(String::from_utf8_lossy)
				.unwrap_or_default();
			print_diff(&current, &String::from_utf8_lossy(&artifact.contents));
		}
	}

	let stale_count = stale.len();
	let failed = report.failures.len();
	print_failures(&mut report, &root);

	if stale_count == 0 && failed == 0 {
		println!("All outputs are up to date.");
		return Ok(true);
	}

	if stale_count > 0 {
		eprintln!(
			"\n{stale_count} output(s) are out of date. Run `stencil build` to update them."
		);
	}

	Ok(false)
}

fn run_list(args: &StencilCli) -> AnyResult<bool> {
	let root = resolve_root(args);
	let ctx = load_site(&root)?;
	let walker = ctx.walker();
	let description_dir = ctx.description_dir();

	println!("{}", colored!("Manifest entries:", bold));
	for entry in &ctx.manifest.entries {
		println!(
			"  {:>4}  {:<8} {} -> {}",
			entry.line,
			entry.mode,
			entry.input.display(),
			entry.output.display()
		);

		if entry.mode != EntryMode::Template {
			continue;
		}

		match walker.chain(&ctx.input_path(entry)) {
			Ok(chain) => {
				let chain: Vec<_> = chain
					.iter()
					.map(|path| make_relative(path, &description_dir))
					.collect();
				println!("                 chain: {}", chain.join(" -> "));
			}
			Err(e) => {
				println!("                 {} {e}", colored!("error:", red));
			}
		}
	}

	if args.verbose {
		print_skipped_lines_of(&ctx.manifest.skipped);
	}

	Ok(true)
}

fn print_skipped_lines(report: &BuildReport, verbose: bool) {
	if verbose {
		print_skipped_lines_of(&report.skipped);
	}
}

fn print_skipped_lines_of(skipped: &[stencil_core::manifest::MalformedManifestLine]) {
	for line in skipped {
		eprintln!("skipped manifest line {}: {}", line.line, line.content);
	}
}

fn print_template_warnings(warnings: &[TemplateWarning], root: &Path) {
	let mut sorted_warnings: Vec<_> = warnings.iter().collect();
	sorted_warnings.sort_by(|a, b| {
		make_relative(&a.file, root)
			.cmp(&make_relative(&b.file, root))
			.then_with(|| a.section.cmp(&b.section))
	});

	for warning in sorted_warnings {
		let rel = make_relative(&warning.file, root);
		eprintln!(
			"{} {} in {rel} (section `{}`): {}",
			colored!("warning:", yellow),
			warning.kind,
			warning.section,
			warning.statement,
		);
	}
}

/// Print each failed entry with the offending path and a miette report.
fn print_failures(report: &mut BuildReport, root: &Path) {
	for failure in std::mem::take(&mut report.failures) {
		eprintln!(
			"{} {} (manifest line {})",
			colored!("failed:", red),
			make_relative(&failure.entry.input, root),
			failure.entry.line
		);
		let diagnostic: miette::Report = failure.error.into();
		eprintln!("{diagnostic:?}");
	}
}

/// Print a unified diff between two strings, colorized.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("   {change}");
			}
		}
		if change.missing_newline() {
			eprintln!();
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}
