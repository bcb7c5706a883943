use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use vitals_core::snapshot::{build_snapshot_with, nutrition_total_for_day};
use vitals_core::*;

#[derive(Parser)]
#[command(name = "vitals")]
#[command(about = "Personal health tracking with staged advisories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a fluid, calorie-burn or nutrition entry
    Log {
        /// Category (fluid, calories, nutrition)
        category: String,

        /// Litres for fluid, kcal otherwise
        value: f64,

        /// Timestamp (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Start, stop or inspect sleep tracking
    Sleep {
        #[arg(value_enum)]
        action: SleepAction,
    },

    /// Show or update biometrics
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Print bucketed aggregates for a category
    Chart {
        /// Category (fluid, calories, nutrition)
        category: String,

        /// Window (today, weekly, monthly)
        #[arg(long, default_value = "today")]
        window: String,

        /// Also write the buckets to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print the current health snapshot as JSON
    Snapshot,

    /// Evaluate advisories and reveal them one at a time
    Advise {
        /// Reveal everything without waiting
        #[arg(long)]
        instant: bool,

        /// Seed for reveal jitter (only used when jitter is configured)
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SleepAction {
    Start,
    Stop,
    Status,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Update one or more biometric fields
    Set {
        #[arg(long)]
        height_cm: Option<f64>,

        #[arg(long)]
        weight_kg: Option<f64>,

        /// female, male, other, unspecified
        #[arg(long)]
        gender: Option<String>,
    },
    /// Print the stored profile
    Show,
}

fn main() {
    vitals_core::logging::init_with_level("warn");

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());

    tracing::debug!("Using data directory {:?}", data_dir);

    let store = EventStore::open(data_dir.join("events"));
    let profile_path = data_dir.join("profile.json");

    match cli.command {
        Commands::Log {
            category,
            value,
            at,
        } => cmd_log(&store, &category, value, at.as_deref()),
        Commands::Sleep { action } => cmd_sleep(&store, &profile_path, action),
        Commands::Profile { action } => cmd_profile(&profile_path, action),
        Commands::Chart {
            category,
            window,
            csv,
        } => cmd_chart(&store, &category, &window, csv.as_deref()),
        Commands::Snapshot => {
            let snapshot = current_snapshot(&store, &profile_path, &config)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Advise { instant, seed } => {
            cmd_advise(&store, &profile_path, &config, instant, seed)
        }
    }
}

fn parse_timestamp(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        None => Ok(Utc::now()),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", s, e))),
    }
}

fn cmd_log(store: &EventStore, category: &str, value: f64, at: Option<&str>) -> Result<()> {
    let category: ValueCategory = category.parse()?;
    let timestamp = parse_timestamp(at)?;
    let entry = TimestampedValue::new(value, timestamp);
    store.append_value(category, &entry)?;

    println!(
        "✓ Logged {} {} ({:?}) at {}",
        value,
        category.unit(),
        category,
        timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

fn cmd_sleep(store: &EventStore, profile_path: &Path, action: SleepAction) -> Result<()> {
    let now = Utc::now();

    match action {
        SleepAction::Start => {
            ProfileState::update(profile_path, |state| {
                let mut timer = SleepTimer::resume(state.sleep_started_at);
                timer.start(now)?;
                state.sleep_started_at = timer.persisted();
                Ok(())
            })?;
            println!("✓ Sleep tracking started");
        }
        SleepAction::Stop => {
            let mut state = ProfileState::load(profile_path)?;
            let session = state.finish_sleep(profile_path, store, now)?;
            println!("✓ Sleep session recorded: {:.2} h", session.hours());
        }
        SleepAction::Status => {
            let state = ProfileState::load(profile_path)?;
            let timer = SleepTimer::resume(state.sleep_started_at);
            match (timer.persisted(), timer.elapsed(now)) {
                (Some(since), Some(elapsed)) => println!(
                    "Sleeping since {} ({}h {:02}m)",
                    since.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    elapsed.num_hours(),
                    elapsed.num_minutes() % 60
                ),
                _ => println!("Not tracking sleep"),
            }
        }
    }
    Ok(())
}

fn parse_gender(raw: &str) -> Result<Gender> {
    match raw.to_lowercase().as_str() {
        "female" | "f" => Ok(Gender::Female),
        "male" | "m" => Ok(Gender::Male),
        "other" => Ok(Gender::Other),
        "unspecified" | "none" => Ok(Gender::Unspecified),
        other => Err(Error::InvalidInput(format!("Unknown gender: {}", other))),
    }
}

fn cmd_profile(profile_path: &Path, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Set {
            height_cm,
            weight_kg,
            gender,
        } => {
            let gender = gender.as_deref().map(parse_gender).transpose()?;
            let state = ProfileState::update(profile_path, |state| {
                if height_cm.is_some() {
                    state.profile.height_cm = height_cm;
                }
                if weight_kg.is_some() {
                    state.profile.weight_kg = weight_kg;
                }
                if let Some(gender) = gender {
                    state.profile.gender = gender;
                }
                Ok(())
            })?;
            println!("✓ Profile updated");
            println!("{}", serde_json::to_string_pretty(&state.profile)?);
        }
        ProfileAction::Show => {
            let state = ProfileState::load(profile_path)?;
            println!("{}", serde_json::to_string_pretty(&state.profile)?);
        }
    }
    Ok(())
}

fn cmd_chart(store: &EventStore, category: &str, window: &str, csv: Option<&Path>) -> Result<()> {
    let category: ValueCategory = category.parse()?;
    let window: Window = window.parse()?;
    let entries = store.read_values(category)?;
    let now = Local::now();

    let buckets = bucketize(&entries, window, &now, window.default_reducer());

    let peak = buckets
        .iter()
        .map(|b| b.aggregate)
        .fold(0.0_f64, f64::max);
    println!("{:?} {:?} ({})", category, window, category.unit());
    for bucket in &buckets {
        let width = if peak > 0.0 {
            (bucket.aggregate / peak * 30.0).round() as usize
        } else {
            0
        };
        println!(
            "  {:>6}  {:>9.2}  {}",
            bucket.label,
            bucket.aggregate,
            "█".repeat(width)
        );
    }

    if let Some(path) = csv {
        vitals_core::export::write_buckets_csv(path, &buckets)?;
        println!("✓ Wrote {}", path.display());
    }
    Ok(())
}

fn current_snapshot(
    store: &EventStore,
    profile_path: &Path,
    config: &Config,
) -> Result<HealthSnapshot> {
    let state = ProfileState::load(profile_path)?;
    let now = Local::now();

    let nutrition = store.read_values(ValueCategory::Nutrition)?;
    Ok(build_snapshot_with(
        &config.hydration,
        &state.profile,
        &store.read_sleep()?,
        &store.read_values(ValueCategory::Calories)?,
        &store.read_values(ValueCategory::Fluid)?,
        nutrition_total_for_day(&nutrition, &now),
        &now,
    ))
}

fn cmd_advise(
    store: &EventStore,
    profile_path: &Path,
    config: &Config,
    instant: bool,
    seed: Option<u64>,
) -> Result<()> {
    let snapshot = current_snapshot(store, profile_path, config)?;
    let advisories = AdvisoryEngine::from_config(config).evaluate(&snapshot);

    let timing = if instant {
        DeliveryTiming::immediate()
    } else {
        DeliveryTiming::from_config(&config.delivery)
    };

    println!("Analyzing your day...\n");

    let clock = Instant::now();
    let elapsed_ms = || clock.elapsed().as_millis() as u64;

    let mut scheduler = DeliveryScheduler::new();
    if timing.jitter_ms > 0 {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        scheduler.start_with_rng(advisories, timing, elapsed_ms(), &mut rng);
    } else {
        scheduler.start(advisories, timing, elapsed_ms());
    }

    while let Some(due) = scheduler.next_due() {
        let now = elapsed_ms();
        if due > now {
            std::thread::sleep(Duration::from_millis(due - now));
        }

        for event in scheduler.advance_to(elapsed_ms()) {
            match event {
                DeliveryEvent::Revealed { advisory, .. } => {
                    println!(
                        "  {} [{:?}] {}",
                        advisory.icon, advisory.priority, advisory.text
                    );
                }
                DeliveryEvent::Completed { revealed, .. } => {
                    println!("\n✓ {} insights delivered", revealed);
                }
                DeliveryEvent::Cancelled { .. } => {}
            }
        }
    }

    Ok(())
}
