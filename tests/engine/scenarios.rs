use taste_bo::candidates;
use taste_bo::{
    AcquisitionKind, BoConfig, ConvergenceThresholds, ConvergenceVerdict, Dimensionality,
    Observation, SearchPhase, SuggestionRecord, convergence, fit_surrogate, propose_next_sample,
    propose_with_history,
};

use crate::{climbing_2d, sugar_only};

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

#[test]
fn test_exploitation_pulls_toward_the_best_region() {
    let (bounds, observations) = climbing_2d();
    let config = BoConfig::builder()
        .acquisition(AcquisitionKind::ExpectedImprovement)
        .adaptive_acquisition(false)
        .build()
        .unwrap();

    let s = propose_next_sample(&observations, &bounds, &config, 6).unwrap();
    let point = (
        s.concentration("sugar").unwrap(),
        s.concentration("acid").unwrap(),
    );
    assert!(
        distance(point, (80.0, 10.0)) < distance(point, (50.0, 25.0)),
        "suggested {point:?} is not pulled toward (80, 10)"
    );
}

#[test]
fn test_high_kappa_favours_uncertain_regions() {
    let (bounds, observations) = climbing_2d();
    let exploring = BoConfig::builder()
        .acquisition(AcquisitionKind::UpperConfidenceBound)
        .kappa(5.0, 1.0)
        .build()
        .unwrap();
    let exploiting = BoConfig::builder()
        .acquisition(AcquisitionKind::UpperConfidenceBound)
        .kappa(5.0, 1.0)
        .adaptive_acquisition(false)
        .build()
        .unwrap();

    let explore = propose_next_sample(&observations, &bounds, &exploring, 6).unwrap();
    assert_eq!(explore.phase, SearchPhase::Exploration);
    assert_eq!(explore.kappa_used(), Some(5.0));
    let exploit = propose_next_sample(&observations, &bounds, &exploiting, 6).unwrap();
    assert_eq!(exploit.kappa_used(), Some(1.0));

    assert!(
        explore.uncertainty >= exploit.uncertainty * 0.99,
        "kappa 5 picked std {} below kappa 1's {}",
        explore.uncertainty,
        exploit.uncertainty
    );

    let surrogate = fit_surrogate(&observations, &bounds, &exploring).unwrap();
    let search = candidates::suggest(
        surrogate.model(),
        &bounds,
        exploring.acquisition.with_parameter(5.0),
        surrogate.best_observed(),
        &[],
        &exploring.search,
        None,
    );
    assert!(
        (explore.uncertainty - search.max_std).abs() <= 0.02 * search.max_std,
        "std {} is not the grid maximum {}",
        explore.uncertainty,
        search.max_std
    );
}

#[test]
fn test_posterior_peaks_near_best_observation() {
    let observations = vec![
        Observation::rated(1, [("sugar", 10.0)], 2.0),
        Observation::rated(2, [("sugar", 50.0)], 8.0),
        Observation::rated(3, [("sugar", 90.0)], 3.0),
    ];
    let config = BoConfig::builder()
        .acquisition(AcquisitionKind::UpperConfidenceBound)
        .kappa(2.5, 2.5)
        .build()
        .unwrap();

    let s = propose_next_sample(&observations, &sugar_only(), &config, 4).unwrap();
    assert_eq!(s.kappa_used(), Some(2.5));

    let surrogate = fit_surrogate(&observations, &sugar_only(), &config).unwrap();
    let (at_peak, _) = surrogate.predict(&[50.0]);
    let (low_edge, _) = surrogate.predict(&[10.0]);
    let (high_edge, _) = surrogate.predict(&[90.0]);
    assert!(at_peak > low_edge);
    assert!(at_peak > high_edge);
    assert!((at_peak - 8.0).abs() < 0.1, "mean at an observation should be close to it");
}

fn stable_record(cycle: u32, predicted: f64) -> SuggestionRecord {
    SuggestionRecord {
        cycle,
        concentrations: vec![35.0 + 0.01 * f64::from(cycle % 2)],
        predicted_value: predicted,
        uncertainty: 0.05,
        acquisition_value: 0.000_2,
        acquisition: AcquisitionKind::ExpectedImprovement,
        best_observed: 8.9,
    }
}

#[test]
fn test_stable_history_suggests_stop() {
    let config = BoConfig::builder()
        .convergence_1d(ConvergenceThresholds {
            ei_threshold: 0.001,
            stability_window: 3,
            stability_threshold: 0.05,
            consecutive_required: 2,
            min_cycles: 8,
            ..ConvergenceThresholds::one_dimensional()
        })
        .build()
        .unwrap();

    let history: Vec<SuggestionRecord> = (8..=13)
        .map(|c| stable_record(c, 8.90 + 0.01 * f64::from(c % 2)))
        .collect();

    assert_eq!(
        convergence::check(&history[..2], &config, 9, Dimensionality::One),
        ConvergenceVerdict::NotConverged
    );
    assert_eq!(
        convergence::check(&history[..3], &config, 10, Dimensionality::One),
        ConvergenceVerdict::NotConverged
    );
    assert_eq!(
        convergence::check(&history[..4], &config, 11, Dimensionality::One),
        ConvergenceVerdict::SuggestStop
    );
    assert_eq!(
        convergence::check(&history, &config, 13, Dimensionality::One),
        ConvergenceVerdict::SuggestStop
    );

    let mut unsettled = history.clone();
    unsettled.push(stable_record(14, 6.0));
    let report = convergence::assess(&unsettled, &config, 14, Dimensionality::One);
    assert_eq!(report.verdict, ConvergenceVerdict::NotConverged);
    assert_eq!(report.consecutive_stable, 0);
}

#[test]
fn test_persisted_history_drives_the_verdict() {
    let observations: Vec<Observation> = [10.0, 50.0, 90.0]
        .into_iter()
        .zip(1..)
        .map(|(sugar, cycle)| {
            Observation::rated(cycle, [("sugar", sugar)], 5.0 - (sugar - 50.0).abs() / 20.0)
        })
        .collect();
    let config = BoConfig::default();
    let min = config.convergence_1d.min_cycles;

    let history: Vec<SuggestionRecord> = (1..min).map(|c| stable_record(c, 5.0)).collect();
    let with_history =
        propose_with_history(&observations, &sugar_only(), &config, min, &history).unwrap();
    assert!(with_history.convergence.stability.is_some());

    let replayed = propose_next_sample(&observations, &sugar_only(), &config, min).unwrap();
    assert!(replayed.convergence.stability.is_none());
    assert_eq!(with_history.concentrations, replayed.concentrations);
}
