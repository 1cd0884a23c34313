// Matchday batch runner.
//
// Startup sequence:
// 1. Parse arguments, load config
// 2. Initialize tracing (log to file)
// 3. Open database, resolve engine settings
// 4. Load the data snapshot (and optional standings CSV)
// 5. Predict upcoming fixtures concurrently, cache-aware
// 6. Grade finished fixtures into per-kickoff-date performance rows
// 7. Print predictions and the recent accuracy summary

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Duration, Local};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use matchday_core::config;
use matchday_core::db::{self, Database};
use matchday_core::engine::{PredictionEngine, PredictionResult};
use matchday_core::performance::PerformanceSummary;
use matchday_core::snapshot::{self, DataSnapshot};

const USAGE: &str =
    "usage: matchday <snapshot.json> [--standings <file.csv>] [--refresh] [--reset-settings]";

/// Days of history included in the accuracy summary.
const SUMMARY_WINDOW_DAYS: i64 = 30;

#[derive(Debug, PartialEq)]
struct Args {
    snapshot: PathBuf,
    standings: Option<PathBuf>,
    refresh: bool,
    reset_settings: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut snapshot = None;
        let mut standings = None;
        let mut refresh = false;
        let mut reset_settings = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--refresh" => refresh = true,
                "--reset-settings" => reset_settings = true,
                "--standings" => match args.next() {
                    Some(path) => standings = Some(PathBuf::from(path)),
                    None => bail!("--standings requires a file path\n{USAGE}"),
                },
                flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
                path => {
                    if snapshot.is_some() {
                        bail!("unexpected argument {path}\n{USAGE}");
                    }
                    snapshot = Some(PathBuf::from(path));
                }
            }
        }

        let Some(snapshot) = snapshot else {
            bail!("missing snapshot path\n{USAGE}");
        };
        Ok(Args {
            snapshot,
            standings,
            refresh,
            reset_settings,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Arguments and config
    let args = Args::parse(std::env::args().skip(1))?;
    let config = config::load_config().context("failed to load configuration")?;

    // 2. Tracing
    init_tracing(config.logging.filter.as_deref())?;
    info!("Matchday starting up");

    // 3. Database and settings
    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    if args.reset_settings {
        db.reset_settings().context("failed to reset admin settings")?;
        db.clear_predictions()
            .context("failed to clear cached predictions")?;
        info!("Admin settings reset to defaults; prediction cache cleared");
    }

    let mut engine = PredictionEngine::default();
    let source = engine.reload(&db, &config)?;
    info!(
        "Engine settings from {:?} (weights total {})",
        source,
        engine.settings().weights.total()
    );

    // 4. Snapshot
    let mut data = DataSnapshot::load(&args.snapshot).context("failed to load snapshot")?;
    if let Some(path) = &args.standings {
        let standings = snapshot::load_standings_csv(path).context("failed to load standings")?;
        info!("Loaded {} standings rows from {}", standings.len(), path.display());
        data.merge_standings(standings);
    }
    info!(
        "Snapshot: {} teams, {} fixtures, {} standings",
        data.teams.len(),
        data.fixtures.len(),
        data.standings.len()
    );

    // 5. Predict upcoming fixtures
    let engine = Arc::new(engine);
    let db = Arc::new(db);
    let data = Arc::new(data);
    let predictions = predict_upcoming(
        &engine,
        &db,
        &data,
        args.refresh,
        config.runner.max_concurrency,
    )
    .await?;

    // 6. Grade finished fixtures
    let days = db::record_graded_fixtures(&db, data.finished())?;
    let graded: u32 = days.iter().map(|d| d.total_predictions).sum();
    if graded > 0 {
        info!(
            "Graded {} finished fixtures across {} kickoff date(s)",
            graded,
            days.len()
        );
    }

    // 7. Report
    for (fixture_id, line) in &predictions {
        println!("{fixture_id:>6}  {line}");
    }

    let today = Local::now().date_naive();
    let history = db.load_performance_since(today - Duration::days(SUMMARY_WINDOW_DAYS))?;
    let summary = PerformanceSummary::from_days(&history);
    if summary.total_predictions > 0 {
        println!(
            "Accuracy over {} day(s): {}% overall (home {}%, draw {}%, away {}%)",
            summary.days,
            summary.overall_accuracy(),
            summary.home_accuracy(),
            summary.draw_accuracy(),
            summary.away_accuracy()
        );
    }

    info!("Matchday finished: {} predictions", predictions.len());
    Ok(())
}

/// Predict every upcoming fixture on the blocking pool, at most
/// `max_concurrency` at a time. Returns display lines in fixture order.
async fn predict_upcoming(
    engine: &Arc<PredictionEngine>,
    db: &Arc<Database>,
    data: &Arc<DataSnapshot>,
    refresh: bool,
    max_concurrency: usize,
) -> anyhow::Result<Vec<(i64, String)>> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut handles = Vec::new();

    for fixture in data.upcoming() {
        let fixture_id = fixture.id;
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("prediction semaphore closed")?;
        let engine = Arc::clone(engine);
        let db = Arc::clone(db);
        let data = Arc::clone(data);

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let ctx = data.context_for(fixture_id)?;
            let result = db::predict_cached(&engine, &db, &ctx, refresh)?;
            Ok::<_, anyhow::Error>(format_line(
                &ctx.home_team.name,
                &ctx.away_team.name,
                &result,
            ))
        });
        handles.push((fixture_id, handle));
    }

    let mut lines = Vec::with_capacity(handles.len());
    for (fixture_id, handle) in handles {
        match handle.await {
            Ok(Ok(line)) => lines.push((fixture_id, line)),
            Ok(Err(e)) => error!("Fixture {} skipped: {:#}", fixture_id, e),
            Err(e) => error!("Prediction task for fixture {} panicked: {}", fixture_id, e),
        }
    }
    Ok(lines)
}

fn format_line(home: &str, away: &str, result: &PredictionResult) -> String {
    if result.is_fallback() {
        warn!("Fallback prediction for {} vs {}", home, away);
    }
    let consensus = match &result.criteria_scores.ai_predictions {
        Some(ai) => format!(
            ", AI {} x{} at {:.1}%",
            ai.prediction,
            ai.total_sources,
            ai.source_adjusted_confidence()
        ),
        None => String::new(),
    };
    format!(
        "{home} vs {away}: {} [{}] (home {}% / away {}%, data {}%{consensus})",
        result.confidence_display(),
        result.tier().label(),
        result.home_percentage,
        result.away_percentage,
        result.data_availability
    )
}

/// Initialize tracing to log to a file. `RUST_LOG` wins over the configured
/// filter.
fn init_tracing(config_filter: Option<&str>) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("matchday.log"))?;

    let default_filter = config_filter.unwrap_or("matchday=info,matchday_core=info,warn");
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_snapshot_and_flags() {
        let args = parse(&["data.json", "--standings", "table.csv", "--refresh"]).unwrap();
        assert_eq!(
            args,
            Args {
                snapshot: PathBuf::from("data.json"),
                standings: Some(PathBuf::from("table.csv")),
                refresh: true,
                reset_settings: false,
            }
        );
    }

    #[test]
    fn flags_may_precede_snapshot() {
        let args = parse(&["--reset-settings", "data.json"]).unwrap();
        assert!(args.reset_settings);
        assert_eq!(args.snapshot, PathBuf::from("data.json"));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["data.json", "--standings"]).is_err());
        assert!(parse(&["data.json", "--verbose"]).is_err());
        assert!(parse(&["a.json", "b.json"]).is_err());
    }

    #[test]
    fn fallback_line_shows_draw() {
        let line = format_line("Rovers", "United", &PredictionResult::fallback());
        assert!(line.starts_with("Rovers vs United: "));
        assert!(line.contains("35.0% Draw [Low]"));
        assert!(line.ends_with("data 0%)"));
    }

    #[test]
    fn line_carries_tier_and_source_weighted_consensus() {
        use matchday_core::engine::criteria::ConsensusScore;
        use matchday_core::model::Outcome;

        let mut result = PredictionResult::fallback();
        result.prediction = Outcome::Home;
        result.confidence = 72.5;
        result.criteria_scores.ai_predictions = Some(ConsensusScore {
            prediction: Outcome::Home,
            confidence: 75.0,
            home_count: 3,
            draw_count: 1,
            away_count: 0,
            total_sources: 4,
        });

        let line = format_line("Rovers", "United", &result);
        assert!(line.contains("72.5% Home Win [High]"), "{line}");
        assert!(line.ends_with(", AI Home x4 at 30.0%)"), "{line}");
    }
}
