use cadence::app_dirs::AppDirs;
use cadence::assess::{assess, Assessment, ThresholdsProfile};
use cadence::clock::{ManualClock, SharedClock, SystemClock};
use cadence::compare::{compare, Profile};
use cadence::config::{Config, ConfigStore, FileConfigStore, TechniqueSet, VarianceMode};
use cadence::engine::Engine;
use cadence::error::CadenceError;
use cadence::export::{read_delays, timestamped_path};
use cadence::runtime::{FixedTicker, Runner, Trigger};
use cadence::stats::AggregatedStats;
use cadence::tracker::HumanTracker;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::{
    error::Error,
    io::{self, BufRead},
    path::{Path, PathBuf},
    sync::{atomic::Ordering, Arc},
    thread,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

const IDLE_TICK_MS: u64 = 20;
const DISPLAY_PERIOD_MS: u64 = 1_000;

/// human-like interval generator with variance feedback and conformance scoring
#[derive(Parser, Debug)]
#[clap(version, about)]
pub struct Cli {
    /// config file to use instead of the per-user one
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct EngineArgs {
    /// operating mode (defaults to the configured one)
    #[clap(short = 'm', long, value_enum)]
    mode: Option<VarianceMode>,

    /// technique set (defaults to the configured one)
    #[clap(short = 't', long, value_enum)]
    techniques: Option<TechniqueSet>,

    /// seed for a reproducible stream
    #[clap(short = 's', long)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate N intervals on a virtual clock and score them
    Simulate {
        #[clap(flatten)]
        engine: EngineArgs,

        /// number of intervals to generate
        #[clap(short = 'n', long, default_value_t = 500)]
        count: usize,

        /// write the generated intervals as CSV
        #[clap(long)]
        csv: Option<PathBuf>,

        /// print the report as JSON
        #[clap(long)]
        json: bool,
    },
    /// run the real-time loop for a number of seconds (no input injection)
    Run {
        #[clap(flatten)]
        engine: EngineArgs,

        /// seconds to keep the trigger held
        #[clap(long, default_value_t = 10)]
        secs: u64,

        /// export the session CSV into the export directory
        #[clap(long)]
        export: bool,
    },
    /// record a human baseline: press Enter for every click, end with EOF
    Train {
        /// label stored with the recording
        #[clap(long, default_value = "normal")]
        kind: String,

        /// write the recorded delays as CSV
        #[clap(long)]
        csv: Option<PathBuf>,
    },
    /// compare a generated CSV against a human baseline CSV
    Compare {
        human: PathBuf,
        generated: PathBuf,

        /// print the comparison as JSON
        #[clap(long)]
        json: bool,
    },
    /// show or change stored preferences
    #[clap(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    Set {
        #[clap(long, value_enum)]
        mode: Option<VarianceMode>,
        #[clap(long, value_enum)]
        techniques: Option<TechniqueSet>,
        #[clap(long)]
        seed: Option<u64>,
        /// forget the stored seed
        #[clap(long, conflicts_with = "seed")]
        clear_seed: bool,
        #[clap(long)]
        export_dir: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    stats: &'a AggregatedStats,
    assessment: &'a Assessment,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadence=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let prefs = store.load();

    match cli.command {
        Command::Simulate {
            engine,
            count,
            csv,
            json,
        } => simulate(&prefs, &engine, count, csv, json),
        Command::Run {
            engine,
            secs,
            export,
        } => run(&prefs, &engine, secs, export),
        Command::Train { kind, csv } => train(&prefs, &kind, csv),
        Command::Compare {
            human,
            generated,
            json,
        } => compare_files(human, generated, json),
        Command::Config(cmd) => config(&store, prefs, cmd),
    }
}

fn resolve(prefs: &Config, args: &EngineArgs) -> Config {
    Config {
        mode: args.mode.unwrap_or(prefs.mode),
        technique_set: args.techniques.unwrap_or(prefs.technique_set),
        seed: args.seed.or(prefs.seed),
        export_dir: prefs.export_dir.clone(),
    }
}

fn simulate(
    prefs: &Config,
    args: &EngineArgs,
    count: usize,
    csv: Option<PathBuf>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let prefs = resolve(prefs, args);
    let clock = ManualClock::new();
    let engine = Engine::new(prefs.engine_config(), Arc::new(clock), prefs.seed)?;
    let handle = engine.handle();

    let mut runner = Runner::new(
        engine,
        |_: Duration| {},
        Trigger::new(),
        FixedTicker::new(Duration::from_millis(IDLE_TICK_MS)),
    );
    runner.run_for(count);

    if let Some(path) = csv {
        handle.export_csv(&path)?;
    }

    let needed = runner.engine().config().min_samples.snapshot;
    let stats = handle
        .snapshot_stats()
        .ok_or(CadenceError::InsufficientData {
            what: "session statistics",
            needed,
            have: count,
        })?;
    let assessment = assess(&stats, &ThresholdsProfile::for_mode(prefs.mode));

    if json {
        let report = Report {
            stats: &stats,
            assessment: &assessment,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(prefs.mode, &stats, &assessment);
    }
    Ok(())
}

fn run(prefs: &Config, args: &EngineArgs, secs: u64, export: bool) -> Result<(), Box<dyn Error>> {
    let prefs = resolve(prefs, args);
    let clock: SharedClock = Arc::new(SystemClock::new());
    let engine = Engine::new(prefs.engine_config(), clock, prefs.seed)?;
    let handle = engine.handle();
    let trigger = Trigger::new();

    let mut runner = Runner::new(
        engine,
        |hold: Duration| tracing::trace!(hold_ms = hold.as_millis() as u64, "click"),
        trigger.clone(),
        FixedTicker::new(Duration::from_millis(IDLE_TICK_MS)),
    );
    let shutdown = runner.shutdown_flag();
    let worker = thread::spawn(move || runner.run());

    trigger.set(true);
    let deadline = Instant::now() + Duration::from_secs(secs);
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        if left.is_zero() {
            break;
        }
        thread::sleep(left.min(Duration::from_millis(DISPLAY_PERIOD_MS)));
        match handle.snapshot_stats() {
            Some(s) => println!(
                "{:>5} clicks  rate {:>5.1}/s  var {:>7.0} (recent {:>7.0})  std {:>5.1}ms  bursts {}  outliers {}",
                s.count,
                s.current_rate.unwrap_or(0.0),
                s.variance,
                s.window_variance.unwrap_or(0.0),
                s.std_dev,
                s.counters.bursts,
                s.counters.outliers
            ),
            None => println!("{:>5} clicks  (warming up)", handle.len()),
        }
    }
    trigger.set(false);
    shutdown.store(true, Ordering::SeqCst);
    worker.join().map_err(|_| "runner thread panicked")?;

    if export {
        let dir = prefs.export_dir.clone().unwrap_or_else(AppDirs::export_dir);
        let path = timestamped_path(&dir, "cadence_session", Local::now());
        let rows = handle.export_csv(&path)?;
        println!("exported {rows} rows to {}", path.display());
    }

    match handle.snapshot_stats() {
        Some(stats) => {
            let assessment = assess(&stats, &ThresholdsProfile::for_mode(prefs.mode));
            print_report(prefs.mode, &stats, &assessment);
        }
        None => println!("not enough clicks for statistics ({})", handle.len()),
    }
    Ok(())
}

fn train(prefs: &Config, kind: &str, csv: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let clock: SharedClock = Arc::new(SystemClock::new());
    let mut tracker = HumanTracker::new(clock, prefs.engine_config().min_samples);
    tracker.start(kind);
    eprintln!("recording {kind} clicks: press Enter for each click, Ctrl-D to finish");

    for line in io::stdin().lock().lines() {
        line?;
        tracker.record_click();
    }
    tracker.stop();

    if let Some(path) = csv {
        tracker.export_csv(&path)?;
    }

    match tracker.stats() {
        Some(t) => {
            println!("training type   {}", t.training_type);
            println!("clicks          {}", t.total_clicks);
            println!("kept delays     {}", t.stats.count);
            println!("mean rate       {:.2}/s", t.stats.mean_rate);
            println!("variance        {:.0}", t.stats.variance);
            println!("std dev         {:.1}ms", t.stats.std_dev);
            println!("p10/p50/p90     {:.0}/{:.0}/{:.0}ms", t.stats.p10, t.stats.p50, t.stats.p90);
        }
        None => println!("not enough clicks for statistics ({})", tracker.delays().len()),
    }
    Ok(())
}

fn compare_files(human: PathBuf, generated: PathBuf, json: bool) -> Result<(), Box<dyn Error>> {
    let human = profile_of(&human)?;
    let generated = profile_of(&generated)?;
    let c = compare(human, generated);

    if json {
        println!("{}", serde_json::to_string_pretty(&c)?);
        return Ok(());
    }

    println!("{:<14}{:>12}{:>12}{:>10}", "metric", "human", "generated", "gap");
    println!(
        "{:<14}{:>12.2}{:>12.2}{:>9.1}%",
        "mean rate", c.human.mean_rate, c.generated.mean_rate, c.rate_gap_pct
    );
    println!(
        "{:<14}{:>12.0}{:>12.0}{:>9.1}%",
        "variance", c.human.variance, c.generated.variance, c.variance_gap_pct
    );
    println!(
        "{:<14}{:>12.2}{:>12.2}{:>9.1}%",
        "std dev", c.human.std_dev, c.generated.std_dev, c.std_dev_gap_pct
    );
    println!();
    println!("realism {}/100 ({})", c.realism, c.band);
    println!("  variance match  {}/50", c.variance_points);
    println!("  rate similarity {}/30", c.rate_points);
    println!("  std dev match   {}/20", c.std_dev_points);
    for note in &c.notes {
        println!("  - {note}");
    }
    Ok(())
}

fn profile_of(path: &Path) -> Result<Profile, CadenceError> {
    let delays = read_delays(path)?;
    Profile::from_intervals(&delays).ok_or(CadenceError::InsufficientData {
        what: "comparison",
        needed: 1,
        have: 0,
    })
}

fn config(store: &FileConfigStore, mut prefs: Config, cmd: ConfigCommand) -> Result<(), Box<dyn Error>> {
    match cmd {
        ConfigCommand::Show => {
            println!("# {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(&prefs)?);
        }
        ConfigCommand::Set {
            mode,
            techniques,
            seed,
            clear_seed,
            export_dir,
        } => {
            if let Some(mode) = mode {
                prefs.mode = mode;
            }
            if let Some(set) = techniques {
                prefs.technique_set = set;
            }
            if seed.is_some() {
                prefs.seed = seed;
            }
            if clear_seed {
                prefs.seed = None;
            }
            if export_dir.is_some() {
                prefs.export_dir = export_dir;
            }
            store.save(&prefs)?;
            tracing::info!(path = %store.path().display(), "config saved");
            println!("{}", serde_json::to_string_pretty(&prefs)?);
        }
    }
    Ok(())
}

fn print_report(mode: VarianceMode, s: &AggregatedStats, a: &Assessment) {
    println!("mode            {mode}");
    println!("intervals       {}", s.count);
    println!("mean interval   {:.1}ms", s.mean_interval);
    println!("p10/p50/p90     {:.0}/{:.0}/{:.0}ms", s.p10, s.p50, s.p90);
    println!("min/max         {:.0}/{:.0}ms", s.min_interval, s.max_interval);
    println!("variance        {:.0}", s.variance);
    println!("std dev         {:.1}ms", s.std_dev);
    println!(
        "rate            mean {:.2}  median {:.2}  min {:.2}  max {:.2}",
        s.mean_rate, s.median_rate, s.min_rate, s.max_rate
    );
    println!(
        "events          bursts {}  pauses {}  outliers {}  breaks {}  adjustments {}  throttles {}",
        s.counters.bursts,
        s.counters.pauses,
        s.counters.outliers,
        s.counters.pattern_breaks,
        s.counters.variance_adjustments,
        s.counters.throttles
    );
    println!(
        "time            session {:.1}s  active {:.1}s  idle {:.1}s",
        s.session_secs, s.active_secs, s.idle_secs
    );
    println!();
    println!(
        "score {}/100 (raw {})  risk {}  grade {}",
        a.score, a.raw_points, a.verdict, a.grade
    );
    for issue in &a.issues {
        println!("  ! {issue}");
    }
    for rec in &a.recommendations {
        println!("  > {rec}");
    }
}
