use clap::{Parser, Subcommand};
use inkpress::report::BuildReport;
use inkpress::site::Site;
use inkpress::{config, output, serve, writer};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inkpress")]
#[command(about = "Static site generator for a single-author blog")]
#[command(long_about = "\
Static site generator for a single-author blog

Every run rebuilds the whole site from the base directory:

  my-site/
  ├── config.toml                  # Optional, see 'inkpress gen-config'
  ├── Posts/
  │   ├── 2021-03-04-first-light.md  # YYYY-MM-DD-slug.md, optional YAML front matter
  │   └── 2022/2022-01-10-later.md   # Subdirectories are fine
  ├── Resources/
  │   ├── css/base.css             # Inlined into every page
  │   ├── css/navigation.css       # Inlined into pages with navigation
  │   ├── md/about.md              # The about page
  │   └── img/...                  # Copied when a page links to it
  └── Site/                        # Output

Set RUST_LOG (e.g. RUST_LOG=inkpress=debug) for detailed logs.")]
#[command(version)]
struct Cli {
    /// Site base directory
    #[arg(long, default_value = ".", global = true)]
    base: PathBuf,

    /// Log every page and filter step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the site into the output directory (default)
    Build {
        /// Also write a JSON report of resources, errors and conflicts
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Build, then serve the output directory until ENTER is pressed
    Run {
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Load config, posts and pages and list them without rendering
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.unwrap_or(Command::Build { report: None }) {
        Command::Build { report } => {
            build(&cli.base, report.as_deref())?;
        }
        Command::Run { port } => {
            let output_dir = build(&cli.base, None)?;
            serve::serve(&output_dir, port)?;
        }
        Command::Check => {
            println!("==> Checking {}", cli.base.display());
            let (site, _config) = Site::load(&cli.base)?;
            output::print_check_output(site.pages(), site.filters());
            println!("==> Site is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Generate and write the site; returns the output directory.
fn build(base: &Path, report: Option<&Path>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let (site, config) = Site::load(base)?;
    let output_dir = config.paths.output_dir(base);

    println!("==> Building {} pages", site.pages().len());
    let result = site.generate()?;
    let written = writer::write_resources(&result.resources, &output_dir);
    output::print_build_output(&result, &written, &output_dir);

    if let Some(path) = report {
        BuildReport::from_output(&result).write(path)?;
        println!("==> Report: {}", path.display());
    }
    if !result.is_clean() || !written.failures.is_empty() {
        eprintln!(
            "==> Finished with {} page errors, {} conflicts, {} write failures",
            result.page_errors.len(),
            result.conflicts.len(),
            written.failures.len()
        );
    }
    Ok(output_dir)
}

/// `RUST_LOG` wins; otherwise `warn`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
