use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vision_prep::config::{self, Config};
use vision_prep::imaging::NormalizeOptions;
use vision_prep::{output, process};

fn version_string() -> &'static str {
    if env!("ON_RELEASE_TAG") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    match env!("GIT_HASH") {
        "" => "dev@unknown",
        hash => &*Box::leak(format!("dev@{hash}").into_boxed_str()),
    }
}

#[derive(Parser)]
#[command(name = "vision-prep")]
#[command(about = "Normalize images for vision-language model APIs")]
#[command(long_about = "\
Normalize images for vision-language model APIs

Every image is decoded, scaled so its long side fits the cap, checked for
real transparency, and re-encoded: JPEG by default, PNG when transparency
must be kept. JPEG quality is stepped down until the output fits the byte
cap or the quality floor is reached.

Inputs may be files or directories (walked recursively for jpg, jpeg, png,
webp and gif). Outputs land in the output directory as <name>.jpg or
<name>.png, next to a report.json describing every file.

Settings come from stock defaults, then vision-prep.toml in the working
directory (or --config), then command-line flags.

Run 'vision-prep gen-config' to generate a documented vision-prep.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./vision-prep.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log normalization decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Per-run overrides for the `[normalize]` config section.
#[derive(clap::Args, Clone, Default)]
struct OptionArgs {
    /// Hard cap on the longer edge, in pixels
    #[arg(long)]
    max_long_side: Option<u32>,
    /// Floor the shorter edge is raised toward, in pixels
    #[arg(long)]
    target_min_short_side: Option<u32>,
    /// Soft cap on the encoded size, in bytes
    #[arg(long)]
    max_bytes: Option<usize>,
    /// First JPEG quality, 0.0-1.0
    #[arg(long)]
    initial_quality: Option<f32>,
    /// Lowest JPEG quality, 0.0-1.0
    #[arg(long)]
    min_quality: Option<f32>,
    /// Quality decrement per pass
    #[arg(long)]
    quality_step: Option<f32>,
    /// Always flatten to JPEG, even when transparency is found
    #[arg(long)]
    no_preserve_transparency: bool,
}

impl OptionArgs {
    fn apply(&self, mut options: NormalizeOptions) -> NormalizeOptions {
        if let Some(v) = self.max_long_side {
            options.max_long_side = v;
        }
        if let Some(v) = self.target_min_short_side {
            options.target_min_short_side = v;
        }
        if let Some(v) = self.max_bytes {
            options.max_bytes = v;
        }
        if let Some(v) = self.initial_quality {
            options.initial_quality = v;
        }
        if let Some(v) = self.min_quality {
            options.min_quality = v;
        }
        if let Some(v) = self.quality_step {
            options.quality_step = v;
        }
        if self.no_preserve_transparency {
            options.preserve_transparent_format = false;
        }
        options
    }
}

#[derive(Subcommand)]
enum Command {
    /// Normalize images into the output directory
    Normalize {
        /// Image files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "normalized")]
        output: PathBuf,

        /// Disable the cache and re-encode every image
        #[arg(long)]
        no_cache: bool,

        #[command(flatten)]
        options: OptionArgs,
    },
    /// Decode images and show planned geometry and format, without encoding
    Check {
        /// Image files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print a stock vision-prep.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Normalize {
            inputs,
            output: output_dir,
            no_cache,
            options,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let options = options.apply(config.normalize);
            init_thread_pool(&config.processing);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result =
                process::normalize_paths(&inputs, &output_dir, &options, !no_cache, Some(tx));
            printer.join().map_err(|_| "output thread panicked")?;
            let result = result?;
            output::print_batch_summary(&result, &output_dir);
            if !result.report.failures.is_empty() {
                std::process::exit(1);
            }
        }
        Command::Check { inputs, options } => {
            let config = load_config(cli.config.as_deref())?;
            let options = options.apply(config.normalize);
            config::validate_options(&options)?;
            init_thread_pool(&config.processing);
            let outcomes = process::check_paths(&inputs, &options)?;
            output::print_check_output(&outcomes);
            if outcomes.iter().any(|o| o.result.is_err()) {
                std::process::exit(1);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    match path {
        Some(p) => config::load_config_file(p),
        None => config::load_config(Path::new(".")),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Never exceeds the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
