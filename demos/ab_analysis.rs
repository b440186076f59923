//! Complete A/B Analysis: Planning → Attribution → Tests → Correction
//!
//! This demo walks through the full workflow:
//! 1. Size the experiment with the two-proportion sample-size formula
//! 2. Simulate exposures and events for a checkout experiment
//! 3. Analyze three metrics with BH correction
//! 4. Print the report as JSON
//!
//! Run with: RUST_LOG=trueno_ab=debug cargo run --example ab_analysis --release

use std::time::Instant;

use anyhow::Context;
use chrono::{TimeDelta, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;
use trueno_ab::experiment::{EventRecord, ExposureRecord, MetricSet};
use trueno_ab::sample_size::{SamplePlan, SampleSizeDefaults};
use trueno_ab::{Backend, ExperimentAnalyzer};

const METRICS: &str = r#"{
    "checkout_conversion": {
        "metric_id": "checkout_conversion",
        "event": {"name": "checkout"},
        "window": {"start": "0 days", "end": "7 days"},
        "aggregation": "binary"
    },
    "revenue": {
        "metric_id": "revenue",
        "event": {"name": "checkout"},
        "window": {"start": "0 days", "end": "7 days"},
        "aggregation": "sum"
    },
    "page_views": {
        "metric_id": "page_views",
        "event": {"name": "page_view"},
        "window": {"start": "0 days", "end": "2 days"},
        "aggregation": "count"
    }
}"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║             TRUENO-AB EXPERIMENT ANALYSIS DEMO               ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Step 1: Planning
    println!("┌─ STEP 1: SAMPLE SIZE ──────────────────────────────────────┐");
    let defaults = SampleSizeDefaults::recommended();
    let plan = SamplePlan::compute(0.10, 0.20, 0.05, 0.80)?;
    println!("│ {}", plan.interpretation);
    println!("│   Total users: {}", plan.total_sample_size);
    println!("│   MDE guidance: {}", defaults.mde_examples.moderate);
    println!("└────────────────────────────────────────────────────────────┘\n");

    // Step 2: Simulation
    println!("┌─ STEP 2: SIMULATED TRAFFIC ────────────────────────────────┐");
    let start = Instant::now();
    let (exposures, events) = simulate(plan.total_sample_size as usize);
    println!("│   Exposures: {}", exposures.len());
    println!("│   Events: {}", events.len());
    println!("│   Time: {:?}", start.elapsed());
    println!("└────────────────────────────────────────────────────────────┘\n");

    // Step 3: Analysis
    println!("┌─ STEP 3: ANALYSIS ─────────────────────────────────────────┐");
    let metrics = MetricSet::from_json(METRICS).context("parsing metric definitions")?;
    let analyzer = ExperimentAnalyzer::builder()
        .backend(Backend::CostBased)
        .build()?;
    let start = Instant::now();
    let report = analyzer
        .analyze("checkout-redesign", &exposures, &events, &metrics)
        .context("analyzing checkout-redesign")?;
    for metric in report.metrics() {
        let test = metric.test();
        println!(
            "│   {:<20} {:<10} p={:.4} lift={} significant={}",
            metric.metric_id(),
            test.detail().name(),
            test.p_value(),
            test.lift().map_or_else(|| "n/a".to_string(), |l| format!("{:+.1}%", l * 100.0)),
            test.significant()
        );
    }
    println!("│   Correction applied: {}", report.correction().applied);
    println!("│   Time: {:?}", start.elapsed());
    println!("└────────────────────────────────────────────────────────────┘\n");

    // Step 4: Report
    println!("{}", report.to_json_string()?);
    Ok(())
}

/// Treatment converts at 12% against a 10% baseline and spends a little more.
fn simulate(users: usize) -> (Vec<ExposureRecord>, Vec<EventRecord>) {
    let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).single().unwrap_or_default();
    let mut rng = StdRng::seed_from_u64(7);
    let mut exposures = Vec::with_capacity(users);
    let mut events = Vec::new();

    for i in 0..users {
        let user = format!("user-{i:06}");
        let treated = rng.gen_bool(0.5);
        let exposed_at = t0 + TimeDelta::minutes(rng.gen_range(0..14 * 24 * 60));
        exposures.push(ExposureRecord::new(
            &user,
            "checkout-redesign",
            if treated { "B" } else { "A" },
            exposed_at,
        ));

        for _ in 0..rng.gen_range(1..8) {
            let at = exposed_at + TimeDelta::minutes(rng.gen_range(0..3 * 24 * 60));
            events.push(EventRecord::new(&user, "page_view", at));
        }

        let rate = if treated { 0.12 } else { 0.10 };
        if rng.gen_bool(rate) {
            let at = exposed_at + TimeDelta::hours(rng.gen_range(1..9 * 24));
            let basket = rng.gen_range(20.0..80.0) * if treated { 1.05 } else { 1.0 };
            events.push(EventRecord::builder(&user, "checkout", at).value(basket).build());
        }
    }
    (exposures, events)
}
