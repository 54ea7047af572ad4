//! url-forge - generate URLs from a pattern and check which ones exist

use clap::Parser;
use std::io::Write;
use std::process;
use std::sync::Arc;
use url_forge::{
    cli::{CheckArgs, Cli, Command, GenerateArgs, MatchArgs, ScanArgs},
    logging,
    run::{self, RunContext},
    GenerationConfig, NullReporter, ProgressReporter, Reporter, Result, RunSummary,
};

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    // Load .env before parsing so environment fallbacks see it
    if let Err(e) = url_forge::init() {
        eprintln!("❌ Failed to initialize: {}", e);
        process::exit(EXIT_FAILURE);
    }

    let cli = Cli::parse();

    if let Err(e) = logging::init(logging::level_from_flags(cli.verbose, cli.debug)) {
        eprintln!("❌ {}", e);
        process::exit(EXIT_FAILURE);
    }

    let reporter: Arc<dyn Reporter> = if cli.no_progress {
        Arc::new(NullReporter)
    } else {
        Arc::new(ProgressReporter::new())
    };

    let result = match cli.command {
        Command::Generate(args) => run_generate(args, reporter).await,
        Command::Check(args) => run_check(args, reporter).await,
        Command::Scan(args) => run_scan(args, reporter).await,
        Command::Match(args) => run_match(args).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(EXIT_INTERRUPTED),
        Err(e) => {
            eprintln!("{}", e.user_message());
            process::exit(EXIT_FAILURE);
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the signal cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// Returns `Ok(false)` when the run was interrupted
async fn run_generate(args: GenerateArgs, reporter: Arc<dyn Reporter>) -> Result<bool> {
    let generation = args.pattern.generation_config(args.interval);
    let limit = generation.limit;
    let ctx = RunContext::new(generation, Default::default()).with_reporter(reporter);

    eprintln!("Count: {}", ctx.search_space()?);
    eprintln!("Range limit: {}", limit);

    let summary = match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = tokio::fs::File::create(path).await.map_err(|e| {
                url_forge::UrlForgeError::io(e.to_string(), Some(path.display().to_string()))
            })?;
            ctx.generate(file, shutdown_signal()).await?
        }
        None => ctx.generate(tokio::io::stdout(), shutdown_signal()).await?,
    };

    if summary.generation_failures > 0 {
        eprintln!("⚠️  Skipped {} candidate(s) that could not be written", summary.generation_failures);
    }
    if let Some(path) = &args.output {
        eprintln!("📄 Generated URLs are saved to: {}", path.display());
    }
    if summary.interrupted {
        eprintln!("\n⚠️  Generation interrupted after {} candidate(s). Partial results saved.", summary.written);
    }
    Ok(!summary.interrupted)
}

async fn run_check(args: CheckArgs, reporter: Arc<dyn Reporter>) -> Result<bool> {
    let urls = run::read_lines(&args.inputs).await?;
    let check = args.probe.check_config(args.interval);
    let ctx = RunContext::new(GenerationConfig::default(), check).with_reporter(reporter);
    let summary = ctx.check(urls, shutdown_signal()).await?;
    print_summary(&summary);
    Ok(!summary.interrupted)
}

async fn run_scan(args: ScanArgs, reporter: Arc<dyn Reporter>) -> Result<bool> {
    let generation = args.pattern.generation_config(args.interval);
    let check = args.probe.check_config(args.interval);
    let ctx = RunContext::new(generation, check).with_reporter(reporter);
    let summary = ctx.scan(shutdown_signal()).await?;
    print_summary(&summary);
    Ok(!summary.interrupted)
}

async fn run_match(args: MatchArgs) -> Result<bool> {
    // Reject a bad pattern before waiting on input
    url_forge::Matcher::new(&args.pattern)?;
    let lines = run::read_lines(&args.inputs).await?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run::match_lines(&args.pattern, lines, args.json, &mut out)?;
    out.flush()?;
    Ok(true)
}

/// Display the final counters and where results were written
fn print_summary(summary: &RunSummary) {
    let metrics = &summary.metrics;
    println!();
    println!("📈 Summary:");
    println!("   ✅ Responded: {}", metrics.succeeded);
    println!("   🌐 Network errors: {}", metrics.network_failures);
    if metrics.unexpected_failures > 0 {
        println!("   ⚠️  Unknown errors: {}", metrics.unexpected_failures);
    }
    if metrics.generation_failures > 0 {
        println!("   ⚠️  Skipped candidates: {}", metrics.generation_failures);
    }
    println!("   📊 Total checked: {}", metrics.completed);
    println!("   ⏱️  Total time: {:.2}s", summary.elapsed.as_secs_f32());
    if summary.interrupted {
        println!("   🛑 Interrupted before completion");
    }
    println!("Saved log at: {}", summary.log_path.display());
    if let Some(root) = &summary.archive_root {
        println!(
            "Saved contents at: {} ({} archived, {} failed)",
            root.display(),
            metrics.archived,
            metrics.archive_failures
        );
    }
}
