use clap::{Args, Parser, Subcommand, ValueEnum};
use collide_check::config::{DEFAULT_BASE_URL, DEFAULT_LOAD_WORKERS, DEFAULT_TIMEOUT};
use collide_check::suites::{self, Fixtures, Suite};
use collide_check::{Checker, HarnessConfig, LoadProbe, render_json, render_report};
use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "collide-check")]
#[command(about = "Contract checks for the collide content and comment APIs")]
struct Cli {
    /// Base URL of the collide service
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Print response bodies for every case
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the checks and print a report
    Run {
        #[arg(long, value_enum, default_value_t = SuiteArg::All)]
        suite: SuiteArg,
        /// Concurrent workers for the load probe
        #[arg(long, default_value_t = DEFAULT_LOAD_WORKERS)]
        workers: usize,
        /// Skip the concurrent load probe
        #[arg(long)]
        no_load: bool,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        #[command(flatten)]
        fixtures: FixtureArgs,
    },
    /// List the cases a suite would run
    List {
        #[arg(long, value_enum, default_value_t = SuiteArg::All)]
        suite: SuiteArg,
        #[command(flatten)]
        fixtures: FixtureArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SuiteArg {
    All,
    Content,
    Comments,
}

impl From<SuiteArg> for Suite {
    fn from(suite: SuiteArg) -> Self {
        match suite {
            SuiteArg::All => Suite::All,
            SuiteArg::Content => Suite::Content,
            SuiteArg::Comments => Suite::Comments,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Args)]
struct FixtureArgs {
    /// Existing content to read
    #[arg(long)]
    content_id: Option<i64>,
    /// Author for created comments
    #[arg(long)]
    user_id: Option<i64>,
    /// Target for listed and created comments
    #[arg(long)]
    target_id: Option<i64>,
}

impl FixtureArgs {
    fn fixtures(&self) -> Fixtures {
        let defaults = Fixtures::default();
        Fixtures {
            content_id: self.content_id.unwrap_or(defaults.content_id),
            user_id: self.user_id.unwrap_or(defaults.user_id),
            target_id: self.target_id.unwrap_or(defaults.target_id),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("collide_check=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    ExitCode::from(exit_status(execute(cli).await))
}

/// 0 when every check held, 1 when some did not, 2 when the run never started
fn exit_status(outcome: Result<u8, Box<dyn Error>>) -> u8 {
    match outcome {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Run aborted");
            eprintln!("error: {err}");
            2
        }
    }
}

async fn execute(cli: Cli) -> Result<u8, Box<dyn Error>> {
    match cli.command {
        Commands::Run {
            suite,
            workers,
            no_load,
            format,
            fixtures,
        } => {
            let config = HarnessConfig::new(&cli.base_url)?
                .with_timeout(Duration::from_secs(cli.timeout_secs))?
                .with_load_workers(workers);
            let suite = Suite::from(suite);
            let fixtures = fixtures.fixtures();
            let cases = suite.cases(&fixtures)?;

            let checker = Checker::new(&config)?;
            let mut report = checker.run(&cases).await;

            if !no_load && suite.includes_load() {
                let target = suites::load_target(&fixtures)?;
                let probe = LoadProbe::new(&checker);
                report.load = Some(probe.run(&target, config.load_workers).await);
            }

            match format {
                Format::Text => print!("{}", render_report(&report, cli.verbose)),
                Format::Json => println!("{}", render_json(&report)?),
            }

            Ok(report.exit_code())
        }
        Commands::List { suite, fixtures } => {
            let cases = Suite::from(suite).cases(&fixtures.fixtures())?;
            for case in &cases {
                println!("{}", case.name);
                println!("    {}", case.describe_request());
                println!("    expects {}", case.expectation.describe());
            }
            println!("{} cases", cases.len());
            Ok(0)
        }
    }
}
