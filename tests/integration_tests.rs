/// End-to-end tests for the strategy engine: exact flat-baseline scenarios,
/// search ranking and determinism, cancellation, and the error surface.
///
/// Run with: cargo test --test integration_tests -- --nocapture

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use pit_strategy_sim::{
    CompetitorData, Compound, CompoundSpec, CompoundTable, LapRecord, PitStop, RaceData,
    RandomVariation, SearchControl, SearchParams, SimConfig, SimError, SimOptions, Strategy,
    StrategyEngine, StrategyViolation, TeamTier,
};

const RACE_LAPS: u32 = 53;

fn flat_competitor(id: u32, time_s: f64, tier: TeamTier, actual: Strategy) -> CompetitorData {
    CompetitorData {
        id,
        name: None,
        tier,
        laps: (1..=RACE_LAPS)
            .map(|lap| LapRecord {
                lap,
                time_s,
                compound: Compound::Medium,
            })
            .collect(),
        actual_strategy: actual,
    }
}

/// Builtin model with tire terms zeroed and the random draw pinned to 1.0, so
/// totals reduce to baseline plus pit losses.
fn zeroed_config() -> SimConfig {
    let zero = CompoundSpec {
        base_delta_s: 0.0,
        degradation_s_per_lap: 0.0,
    };
    let mut config = SimConfig::builtin();
    config.compounds = CompoundTable {
        soft: zero,
        medium: zero,
        hard: zero,
        intermediate: zero,
        wet: zero,
    };
    config.random_variation = RandomVariation {
        std_dev: 0.0,
        min_factor: 1.0,
        max_factor: 1.0,
    };
    config
}

fn flat_engine(config: SimConfig, actual: Strategy) -> StrategyEngine {
    // "flatville" is not in the circuit table, so the flat base loss applies.
    let race = RaceData::new(
        "flatville",
        RACE_LAPS,
        vec![flat_competitor(1, 90.0, TeamTier::Midfield, actual)],
    );
    StrategyEngine::new(config, race)
}

#[test]
fn zero_stop_total_is_the_baseline_sum() {
    let engine = flat_engine(zeroed_config(), Strategy::default());
    let total = engine
        .total_race_time(1, &Strategy::default(), &SimOptions::default())
        .unwrap();
    assert_eq!(total, 53.0 * 90.0, "no stops means no pit loss");
}

#[test]
fn flat_single_stop_scenario_is_exact() {
    // 53 laps at a flat 90.0s plus one stop costing exactly 35.0s.
    let engine = flat_engine(zeroed_config(), Strategy::default());
    let strategy = Strategy::new(vec![PitStop::with_pit_loss(27, Compound::Medium, 35.0)]);
    let total = engine
        .total_race_time(1, &strategy, &SimOptions::default())
        .unwrap();
    assert_eq!(total, 4805.0);
    println!("✓ flat scenario total = {total}");
}

#[test]
fn an_added_stop_strictly_increases_the_total() {
    let engine = flat_engine(zeroed_config(), Strategy::default());
    let opts = SimOptions::default();

    let one = Strategy::new(vec![PitStop::with_pit_loss(20, Compound::Medium, 22.0)]);
    let two = Strategy::new(vec![
        PitStop::with_pit_loss(20, Compound::Medium, 22.0),
        PitStop::with_pit_loss(40, Compound::Medium, 22.0),
    ]);
    let t_one = engine.total_race_time(1, &one, &opts).unwrap();
    let t_two = engine.total_race_time(1, &two, &opts).unwrap();
    assert_eq!(t_two, t_one + 22.0);

    // Same holds when the model computes the losses: every pit loss is
    // positive by construction.
    let one = Strategy::new(vec![PitStop::new(20, Compound::Medium)]);
    let two = Strategy::new(vec![
        PitStop::new(20, Compound::Medium),
        PitStop::new(40, Compound::Medium),
    ]);
    let t_one = engine.total_race_time(1, &one, &opts).unwrap();
    let t_two = engine.total_race_time(1, &two, &opts).unwrap();
    assert!(t_two > t_one);
}

#[test]
fn phase_factor_drives_single_stop_ranking() {
    // With tire terms zeroed every candidate differs only by its pit loss, so
    // the late-race phase factor (0.95) must beat early (1.1) and mid (1.0),
    // and the earliest-lap tie-break picks the first late-third lap.
    let actual = Strategy::new(vec![PitStop::new(10, Compound::Medium)]);
    let engine = flat_engine(zeroed_config(), actual);

    let params = SearchParams {
        max_stops: 1,
        top_n: 1,
        stride: 1,
        ..SearchParams::default()
    };
    let report = engine
        .find_top_strategies(1, &params, &SimOptions::default(), &SearchControl::default())
        .unwrap();

    assert_eq!(report.strategies.len(), 1);
    let best = &report.strategies[0];
    assert_eq!(best.strategy.stops()[0].lap, 36, "lap 36 is the first late-third lap of 53");
    assert!((best.total_s - (53.0 * 90.0 + 35.0 * 0.95)).abs() < 1e-9);

    // Actual stop on lap 10 pays the early factor: 35.0 * 1.1.
    assert!((report.actual_total_s - (53.0 * 90.0 + 38.5)).abs() < 1e-9);
    assert!((best.improvement_s - (33.25 - 38.5)).abs() < 1e-9);
    println!("✓ best stop lap {} at {:.2}s", best.strategy.stops()[0].lap, best.total_s);
}

#[test]
fn search_output_is_sorted_and_deterministic() {
    let actual = Strategy::new(vec![PitStop::new(20, Compound::Medium)]);
    let race = RaceData::new(
        "suzuka",
        RACE_LAPS,
        vec![flat_competitor(1, 90.0, TeamTier::Top, actual)],
    );
    let engine = StrategyEngine::new(SimConfig::builtin(), race);

    let params = SearchParams {
        max_stops: 2,
        top_n: 10,
        stride: 4,
        ..SearchParams::default()
    };
    let opts = SimOptions::seeded(42);

    let first = engine
        .find_top_strategies(1, &params, &opts, &SearchControl::default())
        .unwrap();
    let second = engine
        .find_top_strategies(1, &params, &opts, &SearchControl::default())
        .unwrap();

    assert_eq!(first, second, "same seed must reproduce the whole report");
    assert!(!first.timed_out);
    assert_eq!(first.strategies.len(), 10);
    for pair in first.strategies.windows(2) {
        assert!(pair[0].total_s <= pair[1].total_s, "output must be sorted ascending");
    }
    for (i, option) in first.strategies.iter().enumerate() {
        assert_eq!(option.rank, i + 1);
        assert!((option.improvement_s - (option.total_s - first.actual_total_s)).abs() < 1e-9);
    }
    println!("✓ {} candidates evaluated, best {:.1}s", first.evaluated, first.strategies[0].total_s);
}

#[test]
fn search_never_emits_gap_violations() {
    let actual = Strategy::new(vec![PitStop::new(20, Compound::Medium)]);
    let engine = flat_engine(SimConfig::builtin(), actual);

    let params = SearchParams {
        max_stops: 3,
        top_n: 25,
        stride: 1,
        compounds: vec![Compound::Medium],
    };
    let report = engine
        .find_top_strategies(1, &params, &SimOptions::seeded(7), &SearchControl::default())
        .unwrap();

    let config = engine.config();
    for option in &report.strategies {
        assert!(
            option
                .strategy
                .validate(RACE_LAPS, config.min_stop_gap_laps, config.max_stops)
                .is_ok(),
            "candidate {:?} violates an invariant",
            option.strategy
        );
    }
}

#[test]
fn comparing_a_strategy_with_itself_is_exactly_zero() {
    let actual = Strategy::new(vec![
        PitStop::new(18, Compound::Soft),
        PitStop::new(36, Compound::Hard),
    ]);
    let race = RaceData::new(
        "suzuka",
        RACE_LAPS,
        vec![flat_competitor(1, 90.0, TeamTier::Back, actual.clone())],
    );
    let engine = StrategyEngine::new(SimConfig::builtin(), race);

    // Seeded, so both simulations draw identical per-stop variation.
    let result = engine.compare(1, &actual, &SimOptions::seeded(1234)).unwrap();
    assert_eq!(result.time_difference_s, 0.0);
    assert!(!result.improvement);
    for row in &result.stints {
        assert_eq!(row.time_difference_s, 0.0);
    }
}

#[test]
fn expired_deadline_fails_fast_with_timeout() {
    let engine = flat_engine(SimConfig::builtin(), Strategy::default());
    let control = SearchControl::with_deadline(Instant::now());
    let err = engine
        .find_top_strategies(1, &SearchParams::default(), &SimOptions::seeded(1), &control)
        .unwrap_err();
    assert!(matches!(err, SimError::SearchTimedOut));
}

#[test]
fn cancelled_search_returns_best_so_far() {
    let actual = Strategy::new(vec![PitStop::new(20, Compound::Medium)]);
    let engine = flat_engine(SimConfig::builtin(), actual);

    let params = SearchParams {
        max_stops: 3,
        top_n: 5,
        stride: 1,
        ..SearchParams::default()
    };
    let control = SearchControl::default();
    let cancel = control.cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        cancel.cancel();
    });

    let report = engine
        .find_top_strategies(1, &params, &SimOptions::seeded(5), &control)
        .unwrap();
    canceller.join().unwrap();

    // Whether or not the search finished before the cancel landed, the report
    // is well-formed and every returned candidate is valid.
    for option in &report.strategies {
        assert!(option.strategy.validate(RACE_LAPS, 3, 4).is_ok());
    }
    println!(
        "✓ cancelled search: timed_out={}, evaluated={}, returned={}",
        report.timed_out,
        report.evaluated,
        report.strategies.len()
    );
}

#[test]
fn field_analysis_reranks_by_adjusted_totals() {
    let config = zeroed_config();
    let race = RaceData::new(
        "flatville",
        RACE_LAPS,
        vec![
            flat_competitor(
                1,
                90.0,
                TeamTier::Midfield,
                Strategy::new(vec![PitStop::with_pit_loss(20, Compound::Medium, 30.0)]),
            ),
            flat_competitor(
                2,
                89.5,
                TeamTier::Midfield,
                Strategy::new(vec![PitStop::with_pit_loss(20, Compound::Medium, 30.0)]),
            ),
        ],
    );
    let engine = StrategyEngine::new(config, race);

    // Competitor 1 saves 10s with a cheaper stop and jumps ahead of 2, who
    // keeps the recorded plan.
    let mut scenario = BTreeMap::new();
    scenario.insert(
        1,
        Strategy::new(vec![PitStop::with_pit_loss(20, Compound::Medium, 20.0)]),
    );
    scenario.insert(
        2,
        Strategy::new(vec![PitStop::with_pit_loss(20, Compound::Medium, 30.0)]),
    );

    let report = engine.analyze_field(&scenario, &SimOptions::default()).unwrap();

    // Totals: #1 = 53*90 + 20 = 4790, #2 = 53*89.5 + 30 = 4773.5.
    assert_eq!(report.predicted_order, vec![2, 1]);
    assert_eq!(report.results[&2].predicted_position, Some(1));
    assert_eq!(report.results[&1].predicted_position, Some(2));
    assert_eq!(report.competitors_improved, 1);
    assert_eq!(report.total_time_saved_s, 10.0);
    assert_eq!(report.mean_improvement_s, -5.0);
}

#[test]
fn error_surface_is_typed() {
    let engine = flat_engine(SimConfig::builtin(), Strategy::default());
    let opts = SimOptions::default();

    let err = engine.compare(99, &Strategy::default(), &opts).unwrap_err();
    assert!(matches!(err, SimError::UnknownCompetitor(99)));

    let too_close = Strategy::new(vec![
        PitStop::new(20, Compound::Soft),
        PitStop::new(21, Compound::Soft),
    ]);
    let err = engine.compare(1, &too_close, &opts).unwrap_err();
    assert!(matches!(
        err,
        SimError::InvalidStrategy(StrategyViolation::MinGapViolated { prev: 20, lap: 21, min_gap: 3 })
    ));

    let out_of_range = Strategy::new(vec![PitStop::new(99, Compound::Soft)]);
    let err = engine.compare(1, &out_of_range, &opts).unwrap_err();
    assert!(matches!(
        err,
        SimError::InvalidStrategy(StrategyViolation::StopLapOutOfRange { lap: 99, race_laps: RACE_LAPS })
    ));

    assert!(matches!(
        Compound::from_name("QUALIFYING"),
        Err(SimError::InvalidCompound(_))
    ));
}

#[test]
fn broken_coefficients_are_rejected_not_clamped() {
    let mut config = SimConfig::builtin();
    config.base_pit_loss_s = 500.0;
    let engine = flat_engine(config, Strategy::default());

    let strategy = Strategy::new(vec![PitStop::new(20, Compound::Medium)]);
    let err = engine
        .total_race_time(1, &strategy, &SimOptions::seeded(3))
        .unwrap_err();
    assert!(matches!(err, SimError::PitLossOutOfRange { .. }));
}
