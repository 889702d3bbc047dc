use crate::infra::{raw_snapshot, InMemorySnapshotProvider};
use crate::scheduler::run_scheduled_pass;
use chrono::{Duration, TimeZone, Utc};
use clap::Args;
use portfolio_insights::config::load_threshold_file;
use portfolio_insights::error::AppError;
use portfolio_insights::workflows::insights::{
    InsightEngine, InsightFilter, InsightId, InsightStore, ManualClock, PassSummary, PropertyId,
    PropertyInsight, RawMetricSnapshot, SnapshotImporter, SnapshotProvider, ThresholdConfig,
};
use portfolio_insights::workflows::legal_watch::{
    rank_legal_risks, LegalRiskSnapshot, LegalWatchConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// JSON array or CSV export of metric snapshots
    #[arg(long)]
    pub(crate) snapshots: PathBuf,
    /// Optional JSON threshold file (defaults apply otherwise)
    #[arg(long)]
    pub(crate) thresholds: Option<PathBuf>,
    /// Number of passes to run over the same export
    #[arg(long, default_value_t = 1)]
    pub(crate) passes: u32,
    /// Also list archived insights
    #[arg(long)]
    pub(crate) include_archived: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the legal risk watch portion of the demo.
    #[arg(long)]
    pub(crate) skip_legal_watch: bool,
}

pub(crate) async fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        snapshots,
        thresholds,
        passes,
        include_archived,
    } = args;

    let thresholds = match thresholds {
        Some(path) => load_threshold_file(&path)?,
        None => ThresholdConfig::default(),
    };
    let batch = SnapshotImporter::from_path(&snapshots)?;
    println!(
        "Loaded {} snapshots from {} ({} malformed)",
        batch.snapshots.len(),
        snapshots.display(),
        batch.malformed.len()
    );
    for bad in &batch.malformed {
        println!("  record {}: {}", bad.record, bad.reason);
    }

    let engine = InsightEngine::new(Arc::new(InsightStore::new()), thresholds)?;
    for pass in 1..=passes.max(1) {
        let summary = engine.run_batch(batch.clone()).await;
        render_pass_summary(&format!("Pass {pass}"), &summary);
    }

    render_dashboard(engine.store(), include_archived)
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start = Utc
        .with_ymd_and_hms(2025, 10, 1, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(InsightStore::with_clock(clock.clone()));
    let engine = InsightEngine::new(store.clone(), ThresholdConfig::default())?;

    println!("Portfolio insight demo");
    let thresholds = engine.thresholds();
    println!(
        "Thresholds: occupancy {:.0}% | pricing {:.0}% | closed days {} | min-stay comparison {}",
        thresholds.occupancy_difference_percent,
        thresholds.pricing_difference_percent,
        thresholds.closed_days_threshold,
        if thresholds.min_stay_comparison_enabled {
            "on"
        } else {
            "off"
        }
    );

    let feed = InMemorySnapshotProvider::default();
    let provider: Arc<dyn SnapshotProvider> = Arc::new(feed.clone());

    feed.replace(demo_snapshots(40.0));
    demo_pass(&engine, &provider, "Initial pass").await;
    render_dashboard(&store, false)?;

    clock.advance(Duration::hours(1));
    demo_pass(&engine, &provider, "Hourly re-run, nothing changed").await;

    clock.advance(Duration::hours(1));
    feed.replace(demo_snapshots(58.0));
    demo_pass(&engine, &provider, "Dune House occupancy recovers to 58%").await;

    if let Some(pricing) = first_insight_for(&store, "prop-harbor")? {
        store.mark_read(&pricing)?;
        println!("\nMarked {pricing} as read");
    }
    if let Some(onboarding) = first_insight_for(&store, "prop-birch")? {
        store.archive(&onboarding)?;
        println!("Dismissed {onboarding}");
    }

    clock.advance(Duration::hours(1));
    demo_pass(&engine, &provider, "Next pass after dismissal").await;
    render_dashboard(&store, true)?;

    if !args.skip_legal_watch {
        render_legal_watch();
    }

    Ok(())
}

async fn demo_pass(
    engine: &InsightEngine,
    provider: &Arc<dyn SnapshotProvider>,
    label: &str,
) {
    match run_scheduled_pass(engine, provider, None).await {
        Some(summary) => render_pass_summary(label, &summary),
        None => println!("\n{label}: snapshot feed unavailable"),
    }
}

fn demo_snapshots(dune_occupancy: f64) -> Vec<RawMetricSnapshot> {
    vec![
        raw_snapshot("prop-dune", "Dune House", "occupancy", dune_occupancy, 60.0, None),
        raw_snapshot("prop-harbor", "Harbor Loft", "pricing", 115.0, 100.0, Some(104.0)),
        raw_snapshot("prop-cedar", "Cedar Cabin", "availability", 9.0, 3.5, None),
        raw_snapshot("prop-cedar", "Cedar Cabin", "restriction", 5.0, 2.0, None),
        raw_snapshot("prop-birch", "Birch Studio", "onboarding", 45.0, 80.0, Some(50.0)),
        // no portfolio baseline yet; skipped
        raw_snapshot("prop-new", "", "pricing", 140.0, 0.0, None),
        // metric type the engine does not know; rejected
        raw_snapshot("prop-legacy", "Legacy Villa", "revenue", 10.0, 12.0, None),
    ]
}

fn first_insight_for(
    store: &InsightStore,
    property: &str,
) -> Result<Option<InsightId>, AppError> {
    Ok(store
        .list_active(&InsightFilter::for_property(property))?
        .into_iter()
        .next()
        .map(|insight| insight.id))
}

pub(crate) fn render_pass_summary(label: &str, summary: &PassSummary) {
    println!("\n{label}");
    println!(
        "- {} properties | {} snapshots evaluated | {} triggered",
        summary.properties, summary.evaluated, summary.triggered
    );
    println!(
        "- {} created | {} refreshed ({} severity changes) | {} suppressed | {} resolved",
        summary.created,
        summary.refreshed,
        summary.severity_changes,
        summary.suppressed,
        summary.resolved
    );
    if summary.non_evaluable > 0 || summary.rejected > 0 {
        println!(
            "- {} skipped without a usable baseline | {} rejected at import",
            summary.non_evaluable, summary.rejected
        );
    }
    if summary.purged > 0 {
        println!("- {} archived insights past retention purged", summary.purged);
    }
    if !summary.failed_properties.is_empty() {
        println!(
            "- failed properties: {}",
            summary.failed_properties.join(", ")
        );
    }
}

pub(crate) fn render_dashboard(
    store: &InsightStore,
    include_archived: bool,
) -> Result<(), AppError> {
    let active = store.list_active(&InsightFilter::default())?;
    let unread = store.unread_count()?;

    if active.is_empty() {
        println!("\nNo active insights");
    } else {
        println!("\nActive insights ({} open, {} unread)", active.len(), unread);
        for insight in &active {
            render_insight(insight);
        }
    }

    if include_archived {
        let archived = store.list_archived(&InsightFilter::default())?;
        if archived.is_empty() {
            println!("\nArchived insights: none");
        } else {
            println!("\nArchived insights");
            for insight in &archived {
                println!(
                    "- [{}] {} - {} (archived {})",
                    insight.severity.label(),
                    insight.title,
                    insight.property_name,
                    insight
                        .archived_at
                        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

fn render_insight(insight: &PropertyInsight) {
    println!(
        "- [{}] {} - {} ({}, {}, {})",
        insight.severity.label(),
        insight.title,
        insight.property_name,
        insight.insight_type.label(),
        insight.comparison_period.code(),
        insight.status.label()
    );
    println!("  {}", insight.message);
    println!("  Suggestion: {}", insight.suggestion);
    let actions: Vec<&str> = insight
        .actions
        .iter()
        .map(|action| action.label.as_str())
        .collect();
    println!("  Actions: {}", actions.join(" | "));
}

fn render_legal_watch() {
    let snapshots = [
        ("prop-dune", "Dune House", "Lisbon", 82.0),
        ("prop-harbor", "Harbor Loft", "Porto", 61.0),
        ("prop-cedar", "Cedar Cabin", "Sintra", 40.0),
    ]
    .into_iter()
    .map(|(id, name, jurisdiction, score)| LegalRiskSnapshot {
        property_id: PropertyId::new(id),
        property_name: name.to_string(),
        jurisdiction: jurisdiction.to_string(),
        risk_score: score,
        portfolio_average_risk: 48.0,
    })
    .collect::<Vec<_>>();

    let config = LegalWatchConfig::default();
    let flagged = rank_legal_risks(&snapshots, &config);

    println!(
        "\nLegal risk watch (flag at {:.0}% above portfolio average)",
        config.risk_difference_percent
    );
    if flagged.is_empty() {
        println!("- no properties above the risk threshold");
    }
    for decision in &flagged {
        println!(
            "- [{}] {} in {}: score {:.0} vs {:.0} ({:+.1}%)",
            decision.severity.label(),
            decision.property_id,
            decision.jurisdiction,
            decision.metric.risk_score,
            decision.metric.portfolio_average_risk,
            decision.metric.difference_percent
        );
    }
}
