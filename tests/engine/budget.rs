use std::time::{Duration, Instant};

use taste_bo::{
    BoConfig, ConvergenceThresholds, IngredientBound, Observation, SessionEngine, SoftBudget,
    propose_next_sample, replay_history,
};

fn panel_2d(cycles: u32) -> (Vec<IngredientBound>, Vec<Observation>) {
    let bounds = vec![
        IngredientBound::new("sugar", 0.0, 100.0),
        IngredientBound::new("acid", 0.0, 50.0),
    ];
    let observations = (1..=cycles)
        .map(|cycle| {
            let sugar = f64::from(cycle * 37 % 100);
            let acid = f64::from(cycle * 17 % 50);
            let rating = 9.0 - ((sugar - 60.0) / 25.0).powi(2) - ((acid - 20.0) / 15.0).powi(2);
            Observation::rated(cycle, [("sugar", sugar), ("acid", acid)], rating)
        })
        .collect();
    (bounds, observations)
}

/// A config whose convergence check reads most of a long session.
fn deep_history(deadline: Option<Duration>) -> BoConfig {
    BoConfig::builder()
        .convergence_2d(ConvergenceThresholds {
            consecutive_required: 40,
            ..ConvergenceThresholds::two_dimensional()
        })
        .budget(SoftBudget {
            deadline,
            ..SoftBudget::default()
        })
        .build()
        .unwrap()
}

#[test]
fn test_deadline_bounds_the_whole_call() {
    let (bounds, observations) = panel_2d(45);
    let deadline = Duration::from_millis(20);
    let config = deep_history(Some(deadline));

    let start = Instant::now();
    let s = propose_next_sample(&observations, &bounds, &config, 46).unwrap();
    let elapsed = start.elapsed();

    assert!(
        elapsed < deadline * 20,
        "call took {elapsed:?} with a {deadline:?} deadline"
    );
    assert_eq!(s.cycle, 46);
    for (bound, c) in bounds.iter().zip(&s.concentrations) {
        assert!(c.value >= bound.min_concentration && c.value <= bound.max_concentration);
    }
}

#[test]
fn test_expired_deadline_still_suggests() {
    let (bounds, observations) = panel_2d(20);
    let config = deep_history(Some(Duration::ZERO));

    let s = propose_next_sample(&observations, &bounds, &config, 21).unwrap();
    assert!(s.uncertainty.is_finite());
    assert!(s.predicted_value.is_finite());

    let engine = SessionEngine::new(config);
    let cached = engine.propose("late", &observations, &bounds, 21).unwrap();
    assert_eq!(cached.cycle, 21);
    assert_eq!(engine.cached_cycles("late").last(), Some(&21));
}

#[test]
fn test_expired_deadline_truncates_replayed_history() {
    let (bounds, observations) = panel_2d(12);
    let full = replay_history(&observations, &bounds, &deep_history(None)).unwrap();
    assert_eq!(full.len(), 9);

    let truncated =
        replay_history(&observations, &bounds, &deep_history(Some(Duration::ZERO))).unwrap();
    assert!(truncated.is_empty());
}
