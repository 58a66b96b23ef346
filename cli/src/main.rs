use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use ed_flow_core::arrivals::{self, ArrivalConfig, PatientGenerator};
use ed_flow_core::metrics::{event_counts, flow_summary, hourly_series};
use ed_flow_core::models::event::load_records;
use ed_flow_core::rules::RulesConfig;
use ed_flow_core::{Department, EventLog, EventSink, JsonLinesSink, SimulationClock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_START: &str = "2024-01-01T08:00:00Z";

#[derive(Parser)]
#[command(name = "ed-flow")]
#[command(about = "Emergency department patient-flow engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    /// Ten accident victims at the start of the run
    Influx,
    /// A minor patient waiting 7 hours and a fresh urgent one
    LongWait,
    /// Fill every room and submit five more
    Saturation,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a rules file or directory and print what it resolves to
    Rules {
        /// Rules JSON file, or directory of JSON files
        path: PathBuf,
    },
    /// Run a seeded simulation
    Run {
        /// Rules JSON file, or directory of JSON files
        #[arg(long)]
        rules: PathBuf,
        /// Seed for generated patients
        #[arg(long)]
        seed: u64,
        /// Simulated minutes to run
        #[arg(long, default_value_t = 480)]
        minutes: i64,
        /// Simulated minutes per tick
        #[arg(long, default_value_t = 1)]
        minutes_per_tick: i64,
        /// Expected arrivals per tick
        #[arg(long, default_value_t = 0.2)]
        arrival_rate: f64,
        /// Shift start (RFC 3339)
        #[arg(long, default_value = DEFAULT_START)]
        start: String,
        /// Canned scenario applied at the start
        #[arg(long, value_enum)]
        scenario: Option<Scenario>,
        /// Append events to this JSON-lines file
        #[arg(long)]
        events_out: Option<PathBuf>,
        /// Write a checkpoint here at the end
        #[arg(long)]
        checkpoint_out: Option<PathBuf>,
        /// Print every tick action
        #[arg(long)]
        verbose: bool,
    },
    /// Summarize a JSON-lines event log
    Report {
        /// Event log written by `run --events-out`
        #[arg(long)]
        events: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn load_rules(path: &Path) -> Result<RulesConfig, Box<dyn std::error::Error>> {
    let rules = if path.is_dir() {
        RulesConfig::from_dir(path)?
    } else {
        RulesConfig::from_file(path)?
    };
    Ok(rules)
}

fn parse_start(value: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("ed_flow_core=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rules { path } => {
            let resolved = load_rules(&path)?.resolve()?;
            println!("Rooms: {}", resolved.rooms.len());
            for room in &resolved.rooms {
                println!("  room {} capacity {}", room.id, room.capacity);
            }
            println!(
                "Staff: {} doctors, {} nurses, {} aides",
                resolved.staff.doctors.len(),
                resolved.staff.nurses.len(),
                resolved.staff.aides.len()
            );
            println!("Transfer units: {}", resolved.transfer_units.len());
            for unit in &resolved.transfer_units {
                println!(
                    "  {} capacity {} [{}]",
                    unit.name,
                    unit.capacity,
                    unit.specialties.join(", ")
                );
            }
            println!(
                "Minor exception after {} min, default unit {}",
                resolved.priority_rules.minor_exception_minutes, resolved.default_unit
            );
        }
        Commands::Run {
            rules,
            seed,
            minutes,
            minutes_per_tick,
            arrival_rate,
            start,
            scenario,
            events_out,
            checkpoint_out,
            verbose,
        } => {
            if minutes_per_tick <= 0 {
                return Err("--minutes-per-tick must be positive".into());
            }
            let rules = load_rules(&rules)?;
            let start = parse_start(&start)?;

            let sink: Box<dyn EventSink> = match &events_out {
                Some(path) => Box::new(JsonLinesSink::open(path)?),
                None => Box::new(EventLog::new()),
            };
            let mut department = Department::new(&rules, start, sink)?;
            let mut generator = PatientGenerator::new(seed);
            let mut clock = SimulationClock::new(start, minutes_per_tick);
            let config = ArrivalConfig {
                rate_per_tick: arrival_rate,
                ..ArrivalConfig::default()
            };

            match scenario {
                Some(Scenario::Influx) => {
                    let outcome = arrivals::admit_batch(&mut department, arrivals::mass_influx(start), start);
                    println!("Influx: {} admitted, {} refused", outcome.admitted.len(), outcome.refused.len());
                }
                Some(Scenario::LongWait) => {
                    let outcome =
                        arrivals::admit_batch(&mut department, arrivals::long_wait_minor(start), start);
                    println!("Long wait: {} admitted", outcome.admitted.len());
                }
                Some(Scenario::Saturation) => {
                    let outcome = arrivals::saturation(&mut department, &mut generator, start);
                    println!(
                        "Saturation: {} admitted, {} refused, {:.1}% saturated",
                        outcome.admitted.len(),
                        outcome.refused.len(),
                        outcome.saturation_pct
                    );
                }
                None => {}
            }

            let mut refused = 0usize;
            let mut violations = 0usize;
            while clock.elapsed_minutes() < minutes {
                let now = clock.now();
                for patient in generator.arrivals_for_tick(&config, now) {
                    if department.admit(patient, now).is_err() {
                        refused += 1;
                    }
                }

                let result = department.tick(now);
                if verbose {
                    for action in &result.actions {
                        println!("{} {}", clock.label(), action);
                    }
                }
                violations += department.check_constraints(now).len();
                clock.advance_tick();
            }

            let end = clock.now();
            let metrics = department.metrics(end);
            println!("Ran {} ({} ticks)", clock.elapsed_display(), clock.current_tick());
            println!(
                "Saturation {:.2}% | waiting {} | in consult {} | transferred {} | departed {}",
                metrics.saturation_pct,
                metrics.waiting,
                metrics.in_consult,
                metrics.transferred,
                metrics.departed
            );
            println!(
                "Wait avg {:.1} min, max {:.1} min | refused {} | surveillance violations {}",
                metrics.avg_wait_minutes, metrics.max_wait_minutes, refused, violations
            );
            let stranded = department.awaiting_transport();
            if !stranded.is_empty() {
                let ids: Vec<&str> = stranded.iter().map(|p| p.id()).collect();
                println!("Awaiting transport: {}", ids.join(", "));
            }

            if let Some(path) = checkpoint_out {
                std::fs::write(&path, department.save_state()?)?;
                println!("Checkpoint written to {}", path.display());
            }
        }
        Commands::Report { events, json } => {
            let records = load_records(&events)?;
            let summary = flow_summary(&records);
            let hourly = hourly_series(&records);
            let counts = event_counts(&records);

            if json {
                let report = serde_json::json!({
                    "summary": summary,
                    "hourly": hourly,
                    "counts": counts,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("{} records", summary.records);
            println!(
                "Saturation mean {:.2}% (min {:.2}%, max {:.2}%)",
                summary.mean_saturation_pct, summary.min_saturation_pct, summary.max_saturation_pct
            );
            println!(
                "Arrivals {} (peak {}/h), departures {} (peak {}/h)",
                summary.total_arrivals,
                summary.peak_hourly_arrivals,
                summary.total_departures,
                summary.peak_hourly_departures
            );
            println!();
            println!("{:<6} {:>8} {:>9} {:>11} {:>10}", "hour", "arrivals", "departures", "saturation", "mean wait");
            for bucket in &hourly {
                println!(
                    "{:<6} {:>8} {:>9} {:>10.1}% {:>10.1}",
                    bucket.hour.format("%H:00"),
                    bucket.arrivals,
                    bucket.departures,
                    bucket.mean_saturation_pct,
                    bucket.mean_wait_minutes
                );
            }
            println!();
            for (event_type, count) in &counts {
                println!("{:<24} {}", event_type, count);
            }
        }
    }

    Ok(())
}
