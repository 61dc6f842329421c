use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use pit_strategy_sim::{
    CompetitorData, Compound, LapRecord, PitStop, RaceData, SearchControl, SearchParams,
    SimConfig, SimOptions, Strategy, StrategyEngine, TeamTier,
};

const RACE_LAPS: u32 = 53;
const DEMO_SEED: u64 = 2024;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = match std::env::var("MODEL_PATH") {
        Ok(path) => SimConfig::load(&path)
            .with_context(|| format!("failed to load pit loss model from {path}"))?,
        Err(_) => {
            tracing::info!("MODEL_PATH not set, using the built-in model");
            SimConfig::builtin()
        }
    };

    let race = demo_race();
    let engine = StrategyEngine::new(config, race);
    let opts = SimOptions::seeded(DEMO_SEED);

    // What if the leader had run soft/medium with earlier stops?
    let alternative = Strategy::new(vec![
        PitStop::new(15, Compound::Soft),
        PitStop::new(35, Compound::Medium),
    ]);
    let comparison = engine.compare(1, &alternative, &opts)?;

    println!("=== STRATEGY COMPARISON: {} ===", name_of(&engine, 1));
    print_strategy("actual     ", &comparison.actual_strategy);
    print_strategy("alternative", &comparison.alternative_strategy);
    println!(
        "actual {:.1}s | alternative {:.1}s | difference {:+.1}s ({})",
        comparison.actual_total_s,
        comparison.alternative_total_s,
        comparison.time_difference_s,
        if comparison.improvement { "faster" } else { "slower" }
    );
    for row in &comparison.stints {
        println!(
            "  stint {}: actual {:8.1}s | alternative {:8.1}s | {:+.1}s",
            row.stint_number, row.actual_time_s, row.alternative_time_s, row.time_difference_s
        );
    }

    // Optimal-strategy search for the same competitor.
    let params = SearchParams {
        max_stops: 2,
        top_n: 5,
        stride: 2,
        ..SearchParams::default()
    };
    let control = SearchControl::with_deadline(Instant::now() + Duration::from_secs(10));
    let report = engine.find_top_strategies(1, &params, &opts, &control)?;

    println!("\n=== TOP STRATEGIES ({} candidates evaluated) ===", report.evaluated);
    for option in &report.strategies {
        let stops: Vec<String> = option
            .strategy
            .stops()
            .iter()
            .map(|s| format!("lap {} -> {}", s.lap, s.compound))
            .collect();
        println!(
            "  #{} [{}] {:.1}s ({:+.1}s vs actual)",
            option.rank,
            stops.join(", "),
            option.total_s,
            option.improvement_s
        );
    }
    if report.timed_out {
        println!("  (search deadline reached, best results so far)");
    }

    // Field scenario: everyone pits two laps earlier than they actually did.
    let mut scenario = BTreeMap::new();
    for competitor in engine.race().competitors() {
        let shifted: Vec<PitStop> = competitor
            .actual_strategy
            .stops()
            .iter()
            .map(|s| PitStop::new(s.lap.saturating_sub(2).max(1), s.compound))
            .collect();
        scenario.insert(competitor.id, Strategy::new(shifted));
    }
    let field = engine.analyze_field(&scenario, &opts)?;

    println!("\n=== FIELD: EVERYONE PITS TWO LAPS EARLIER ===");
    println!(
        "improved {}/{} | total saved {:+.1}s | mean {:+.1}s",
        field.competitors_improved,
        field.results.len(),
        field.total_time_saved_s,
        field.mean_improvement_s
    );
    for id in &field.predicted_order {
        let result = &field.results[id];
        println!(
            "  P{} {} {:+.1}s",
            result.predicted_position.unwrap_or(0),
            result.competitor_name.as_deref().unwrap_or("?"),
            result.time_difference_s
        );
    }

    Ok(())
}

fn name_of(engine: &StrategyEngine, id: u32) -> String {
    engine
        .race()
        .competitor(id)
        .ok()
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| format!("#{id}"))
}

fn print_strategy(label: &str, strategy: &Strategy) {
    let stops: Vec<String> = strategy
        .stops()
        .iter()
        .map(|s| format!("lap {} -> {}", s.lap, s.compound))
        .collect();
    println!(
        "{label}: {}",
        if stops.is_empty() { "no stops".to_string() } else { stops.join(", ") }
    );
}

/// A synthetic race in lieu of ingested data: flat-ish baselines with seeded
/// jitter, compounds taken from each competitor's recorded stint plan.
fn demo_race() -> RaceData {
    let mut rng = ChaCha8Rng::seed_from_u64(DEMO_SEED);
    let competitors = vec![
        demo_competitor(
            &mut rng,
            1,
            "Verstappen",
            TeamTier::Top,
            90.2,
            Strategy::new(vec![PitStop::new(20, Compound::Hard)]),
        ),
        demo_competitor(
            &mut rng,
            16,
            "Leclerc",
            TeamTier::Top,
            90.5,
            Strategy::new(vec![PitStop::new(22, Compound::Hard)]),
        ),
        demo_competitor(
            &mut rng,
            4,
            "Norris",
            TeamTier::Midfield,
            90.8,
            Strategy::new(vec![
                PitStop::new(15, Compound::Medium),
                PitStop::new(34, Compound::Hard),
            ]),
        ),
        demo_competitor(
            &mut rng,
            77,
            "Bottas",
            TeamTier::Back,
            91.6,
            Strategy::new(vec![
                PitStop::new(12, Compound::Soft),
                PitStop::new(30, Compound::Medium),
            ]),
        ),
    ];
    RaceData::new("suzuka", RACE_LAPS, competitors)
}

fn demo_competitor(
    rng: &mut ChaCha8Rng,
    id: u32,
    name: &str,
    tier: TeamTier,
    base_s: f64,
    actual: Strategy,
) -> CompetitorData {
    let stints = actual.stints(RACE_LAPS, Compound::Medium);
    let laps = (1..=RACE_LAPS)
        .map(|lap| {
            let compound = stints
                .iter()
                .find(|s| lap >= s.start_lap && lap <= s.end_lap)
                .map(|s| s.compound)
                .unwrap_or(Compound::Medium);
            LapRecord {
                lap,
                time_s: base_s + rng.gen_range(-0.4..0.4),
                compound,
            }
        })
        .collect();
    CompetitorData {
        id,
        name: Some(name.to_string()),
        tier,
        laps,
        actual_strategy: actual,
    }
}
