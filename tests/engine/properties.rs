use taste_bo::gp::FALLBACK_STD;
use taste_bo::{
    AcquisitionKind, BoConfig, ConvergenceVerdict, Dimensionality, ModelQuality, Observation,
    SearchPhase, convergence, propose_next_sample,
};

use crate::{climbing_2d, liking, sugar_only};

#[test]
fn test_suggestions_stay_within_bounds() {
    let (bounds, observations) = climbing_2d();
    for acquisition in [
        AcquisitionKind::ExpectedImprovement,
        AcquisitionKind::UpperConfidenceBound,
    ] {
        let config = BoConfig::builder().acquisition(acquisition).build().unwrap();
        for cycle in [6, 12, 13, 30] {
            let s = propose_next_sample(&observations, &bounds, &config, cycle).unwrap();
            for (bound, c) in bounds.iter().zip(&s.concentrations) {
                assert_eq!(bound.name, c.ingredient);
                assert!(
                    c.value >= bound.min_concentration && c.value <= bound.max_concentration,
                    "{} = {} outside [{}, {}]",
                    c.ingredient,
                    c.value,
                    bound.min_concentration,
                    bound.max_concentration
                );
            }
        }
    }
}

#[test]
fn test_peak_at_the_edge_stays_within_bounds() {
    let observations: Vec<Observation> = [(60.0, 4.0), (80.0, 6.0), (95.0, 8.5), (100.0, 9.0)]
        .into_iter()
        .zip(1..)
        .map(|((sugar, r), cycle)| Observation::rated(cycle, [("sugar", sugar)], r))
        .collect();
    let s = propose_next_sample(&observations, &sugar_only(), &BoConfig::default(), 5).unwrap();
    let sugar = s.concentration("sugar").unwrap();
    assert!((0.0..=100.0).contains(&sugar));
}

#[test]
fn test_identical_inputs_give_identical_suggestions() {
    let (bounds, observations) = climbing_2d();
    let config = BoConfig::default();
    let a = propose_next_sample(&observations, &bounds, &config, 7).unwrap();
    let b = propose_next_sample(&observations, &bounds, &config, 7).unwrap();

    for (x, y) in a.concentrations.iter().zip(&b.concentrations) {
        assert!((x.value - y.value).abs() < 1e-9);
    }
    assert!((a.predicted_value - b.predicted_value).abs() < 1e-9);
    assert!((a.acquisition_value - b.acquisition_value).abs() < 1e-9);
    assert_eq!(a.convergence, b.convergence);
}

#[test]
fn test_observation_order_does_not_matter() {
    let (bounds, mut observations) = climbing_2d();
    let config = BoConfig::default();
    let forward = propose_next_sample(&observations, &bounds, &config, 6).unwrap();
    observations.reverse();
    let reversed = propose_next_sample(&observations, &bounds, &config, 6).unwrap();
    assert_eq!(forward.concentrations, reversed.concentrations);
}

#[test]
fn test_schedule_switches_between_cycle_five_and_six() {
    let mut config = BoConfig::builder()
        .acquisition(AcquisitionKind::UpperConfidenceBound)
        .kappa(5.0, 1.0)
        .exploration_budget(0.25)
        .build()
        .unwrap();
    config.convergence_1d.max_cycles = 20;

    let observations: Vec<Observation> = [10.0, 50.0, 90.0]
        .into_iter()
        .zip(1..)
        .map(|(sugar, cycle)| Observation::rated(cycle, [("sugar", sugar)], liking(sugar)))
        .collect();

    for cycle in 4..=20 {
        let s = propose_next_sample(&observations, &sugar_only(), &config, cycle).unwrap();
        if cycle <= 5 {
            assert_eq!(s.phase, SearchPhase::Exploration, "cycle {cycle}");
            assert_eq!(s.kappa_used(), Some(5.0));
        } else {
            assert_eq!(s.phase, SearchPhase::Exploitation, "cycle {cycle}");
            assert_eq!(s.kappa_used(), Some(1.0));
        }
        assert_eq!(s.xi_used(), None);
    }
}

#[test]
fn test_constant_responses_still_yield_a_suggestion() {
    let observations = vec![
        Observation::rated(1, [("sugar", 20.0)], 5.0),
        Observation::rated(2, [("sugar", 50.0)], 5.0),
        Observation::rated(3, [("sugar", 80.0)], 5.0),
    ];
    let s = propose_next_sample(&observations, &sugar_only(), &BoConfig::default(), 4).unwrap();
    assert!(s.uncertainty > 0.0);
    assert!((s.uncertainty - FALLBACK_STD).abs() < 1e-12);
    assert_eq!(s.model_quality, ModelQuality::Fallback);
    assert!(s.kernel_amplitude.is_nan());
    let sugar = s.concentration("sugar").unwrap();
    assert!((0.0..=100.0).contains(&sugar));
    for observed in [20.0, 50.0, 80.0] {
        assert!((sugar - observed).abs() > 1.0, "{sugar} repeats an observation");
    }
}

#[test]
fn test_forced_stop_at_max_cycles() {
    let config = BoConfig::default();
    let (bounds, observations) = climbing_2d();
    let max = config.convergence_2d.max_cycles;

    let s = propose_next_sample(&observations, &bounds, &config, max).unwrap();
    assert_eq!(s.verdict(), ConvergenceVerdict::SuggestStop);
    assert!(s.converged);

    assert_eq!(
        convergence::check(&[], &config, max, Dimensionality::Two),
        ConvergenceVerdict::SuggestStop
    );
    assert_eq!(
        convergence::check(&[], &config, max + 3, Dimensionality::Two),
        ConvergenceVerdict::SuggestStop
    );
}

#[test]
fn test_early_cycles_report_below_min() {
    let (bounds, observations) = climbing_2d();
    let s = propose_next_sample(&observations, &bounds, &BoConfig::default(), 6).unwrap();
    assert_eq!(s.verdict(), ConvergenceVerdict::CyclesBelowMin);
    assert!(!s.converged);
}

#[test]
fn test_suggestion_reports_model_details() {
    let (bounds, observations) = climbing_2d();
    let s = propose_next_sample(&observations, &bounds, &BoConfig::default(), 6).unwrap();
    assert_eq!(s.cycle, 6);
    assert_eq!(s.best_observed, 8.0);
    assert_eq!(s.acquisition_function, AcquisitionKind::ExpectedImprovement);
    assert_eq!(s.xi_used(), Some(0.1));
    assert_ne!(s.model_quality, ModelQuality::Fallback);
    assert!(s.kernel_amplitude > 0.0);
    assert!(s.kernel_length_scale > 0.0);
    assert!(s.uncertainty >= 0.0);
    assert!(s.acquisition_value >= 0.0);

    let display = s.display_concentrations();
    assert_eq!(display.len(), 2);
    assert_eq!(display[0].0, "sugar");
    assert!((display[0].1 * 10.0 - (display[0].1 * 10.0).round()).abs() < 1e-9);
}
