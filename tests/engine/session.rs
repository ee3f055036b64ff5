use taste_bo::{BoConfig, ConvergenceVerdict, Observation, SessionEngine, StopAction};

use crate::{liking, sugar_only};

/// Runs a simulated panel against `liking` until the engine forces a stop.
#[test]
fn test_simulated_session_runs_to_completion() {
    let config = BoConfig::default();
    let engine = SessionEngine::new(config.clone());
    let bounds = sugar_only();
    let max = config.convergence_1d.max_cycles;

    let mut observations: Vec<Observation> = [15.0, 60.0, 90.0]
        .into_iter()
        .zip(1..)
        .map(|(sugar, cycle)| Observation::rated(cycle, [("sugar", sugar)], liking(sugar)))
        .collect();

    let mut stopped_at = None;
    for cycle in 4..=max {
        let s = engine.propose("sim", &observations, &bounds, cycle).unwrap();
        let sugar = s.concentration("sugar").unwrap();
        assert!((0.0..=100.0).contains(&sugar));
        if config.stopping_mode.action(s.verdict()) != StopAction::Continue {
            stopped_at = Some((cycle, s.verdict()));
            break;
        }
        observations.push(Observation::rated(cycle, [("sugar", sugar)], liking(sugar)));
    }

    let (cycle, verdict) = stopped_at.expect("the session must stop by max_cycles");
    assert!(cycle <= max);
    assert_eq!(verdict, ConvergenceVerdict::SuggestStop);

    let best = observations
        .iter()
        .filter_map(|o| o.response.map(|r| (o.concentrations["sugar"], r)))
        .fold((0.0, f64::NEG_INFINITY), |acc, p| if p.1 > acc.1 { p } else { acc });
    assert!(
        (best.0 - 35.0).abs() < 10.0,
        "best observed sugar {} is far from the optimum",
        best.0
    );
}

#[test]
fn test_pending_rating_is_carried_but_not_trained_on() {
    let engine = SessionEngine::new(BoConfig::default());
    let mut observations: Vec<Observation> = [10.0, 50.0, 90.0]
        .into_iter()
        .zip(1..)
        .map(|(sugar, cycle)| Observation::rated(cycle, [("sugar", sugar)], liking(sugar)))
        .collect();
    let before = engine.propose("p", &observations, &sugar_only(), 4).unwrap();

    observations.push(Observation::unrated(4, before.concentration_map()));
    let pending = engine.propose("p", &observations, &sugar_only(), 5).unwrap();
    assert_eq!(pending.best_observed, before.best_observed);
    assert_eq!(engine.cached_cycles("p"), vec![4, 5]);
}

#[test]
fn test_concurrent_sessions_share_one_engine() {
    let engine = SessionEngine::new(BoConfig::default());
    std::thread::scope(|scope| {
        for offset in [0.0, 5.0, 10.0, 15.0] {
            let engine = &engine;
            scope.spawn(move || {
                let observations: Vec<Observation> = [10.0, 50.0, 90.0]
                    .into_iter()
                    .zip(1..)
                    .map(|(sugar, cycle)| {
                        Observation::rated(cycle, [("sugar", sugar + offset)], liking(sugar))
                    })
                    .collect();
                let id = format!("panel-{offset}");
                engine.propose(&id, &observations, &sugar_only(), 4).unwrap();
            });
        }
    });
    assert_eq!(engine.session_count(), 4);
}
