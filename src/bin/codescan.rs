use clap::{Parser, Subcommand};
use codescan::controller::{AcquisitionController, ScanEvent, SessionState};
use codescan::decoder::{LocalDecoder, StrategyChain};
use codescan::error::ConfigError;
use codescan::models::ProductRange;
use codescan::reconcile::ProductReport;
use codescan::source::ReplaySource;
use codescan::store::{AddOutcome, CodeStore, MemoryCodeStore};
use codescan::tools::{load_frame, read_code_list};
use codescan::{ScanConfig, ScanError, ScanMode};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Largest range the CLI will expand into missing codes
const MAX_EXPECTED_CODES: u64 = 1_000_000;

#[derive(Parser)]
#[command(name = "codescan", version, about = "Optical code acquisition tools")]
struct Cli {
    /// YAML config; environment overrides still apply
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the native decoder and the fallback chain on one image
    Decode {
        #[arg(long)]
        image: PathBuf,
    },
    /// Replay a directory of frames through a scanning session
    Scan {
        #[arg(long)]
        frames: PathBuf,
        #[arg(long)]
        product: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Compare a list of codes against a range
    Reconcile {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// File with one code per line, or `-` for stdin
        #[arg(long)]
        codes: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codescan=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Command::Decode { image } => decode_cmd(&config, &image).await,
            Command::Scan {
                frames,
                product,
                start,
                end,
                seconds,
            } => match checked_range(start, end) {
                Ok(range) => scan_cmd(config, &frames, product, range, seconds).await,
                Err(err) => Err(err),
            },
            Command::Reconcile {
                start,
                end,
                codes,
                json,
            } => checked_range(start, end).and_then(|range| reconcile_cmd(&range, &codes, json)),
        },
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn checked_range(start: String, end: String) -> Result<ProductRange, ScanError> {
    let range = ProductRange::new(start, end);
    if let Some(parsed) = range.parse() {
        if parsed.len() > MAX_EXPECTED_CODES {
            return Err(ScanError::Config(ConfigError::Invalid(format!(
                "range {}..{} expects {} codes (limit {MAX_EXPECTED_CODES})",
                range.start,
                range.end,
                parsed.len()
            ))));
        }
    }
    Ok(range)
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig, ScanError> {
    let config = match path {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::from_env()?,
    };
    Ok(config)
}

async fn decode_cmd(config: &ScanConfig, image: &Path) -> Result<(), ScanError> {
    let frame = load_frame(image, 0)?;
    println!("Image: {} ({}x{})", image.display(), frame.width(), frame.height());

    let chain = StrategyChain::from_config(config);
    let outcome = chain.decode_cycle(&LocalDecoder::native(), &frame).await;
    for attempt in &outcome.attempts {
        println!(
            "  {:<14} {}",
            attempt.strategy.as_str(),
            attempt.result.as_deref().unwrap_or("-")
        );
    }
    match outcome.hit {
        Some(hit) => println!("Code: {} (raw: {}, via {})", hit.cleaned, hit.raw_text, hit.source),
        None => println!("No code found"),
    }
    Ok(())
}

async fn scan_cmd(
    config: ScanConfig,
    frames: &Path,
    product: String,
    range: ProductRange,
    seconds: u64,
) -> Result<(), ScanError> {
    let source = ReplaySource::from_dir(frames);
    println!("Replaying {} frames from {}", source.len(), frames.display());

    let single_shot = config.mode == ScanMode::SingleShot;
    let store = Arc::new(MemoryCodeStore::new());
    store.add_product(product.clone());
    let chain = Arc::new(StrategyChain::from_config(&config));
    let (controller, mut events) = AcquisitionController::new(
        config,
        Box::new(source),
        Arc::new(LocalDecoder::native()),
        chain,
        store.clone(),
        product.clone(),
    );
    controller.start().await?;

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(ScanEvent::Candidate(candidate)) => {
                    match store.add_code(&product, &candidate.cleaned).await? {
                        AddOutcome::Accepted => println!("+ {} ({})", candidate.cleaned, candidate.source),
                        AddOutcome::Restored => println!("+ {} restored", candidate.cleaned),
                        AddOutcome::Rejected(reason) => println!("! {} rejected: {reason:?}", candidate.cleaned),
                    }
                    if single_shot {
                        controller.resume().await?;
                    }
                }
                Some(ScanEvent::Notice { kind, message }) => println!("! {kind:?}: {message}"),
                Some(ScanEvent::StateChanged(SessionState::Terminated)) | None => break,
                Some(ScanEvent::StateChanged(_)) => {}
            },
        }
    }
    controller.close().await;

    let codes = store.existing_codes(&product).await?;
    print_report(&ProductReport::build(product, &codes, Some(&range), 0));
    Ok(())
}

fn reconcile_cmd(range: &ProductRange, codes: &Path, json: bool) -> Result<(), ScanError> {
    let contents = read_input(codes).map_err(|err| {
        ScanError::Config(ConfigError::Io {
            path: codes.to_path_buf(),
            source: err,
        })
    })?;
    let codes = read_code_list(&contents);
    let report = ProductReport::build("cli", &codes, Some(range), 0);

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => eprintln!("failed to serialize report: {err}"),
        }
    } else {
        print_report(&report);
    }
    Ok(())
}

fn read_input(path: &Path) -> std::io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
    }
}

fn print_report(report: &ProductReport) {
    if !report.range_configured {
        println!("Range not configured; nothing to reconcile");
        return;
    }
    println!(
        "Codes: {} stored, {} valid of {} expected ({}% complete)",
        report.total_codes,
        report.valid,
        report.expected,
        report.completion_rate()
    );
    println!("Missing ({}): {}", report.result.missing_codes.len(), report.result.missing_codes.join(", "));
    println!("Excess ({}): {}", report.result.excess_codes.len(), report.result.excess_codes.join(", "));
}
