use taste_bo::{BoConfig, Error, IngredientBound, Observation, propose_next_sample};

use crate::sugar_only;

#[test]
fn test_insufficient_data_produces_no_suggestion() {
    let observations = vec![
        Observation::rated(1, [("sugar", 10.0)], 2.0),
        Observation::rated(2, [("sugar", 50.0)], 8.0),
    ];
    let err = propose_next_sample(&observations, &sugar_only(), &BoConfig::default(), 3)
        .expect_err("two ratings are below the default minimum");
    assert!(matches!(
        err,
        Error::InsufficientData {
            required: 3,
            available: 2
        }
    ));
    assert_eq!(
        err.to_string(),
        "insufficient data: 2 rated observations, BO needs at least 3"
    );
}

#[test]
fn test_custom_minimum_is_honoured() {
    let observations = vec![
        Observation::rated(1, [("sugar", 10.0)], 2.0),
        Observation::rated(2, [("sugar", 50.0)], 8.0),
    ];
    let config = BoConfig::builder().min_samples_for_bo(2).build().unwrap();
    assert!(propose_next_sample(&observations, &sugar_only(), &config, 3).is_ok());
}

#[test]
fn test_empty_bounds_are_rejected() {
    assert!(matches!(
        propose_next_sample(&[], &[], &BoConfig::default(), 1),
        Err(Error::NoIngredients)
    ));
}

#[test]
fn test_inverted_bounds_are_rejected() {
    let bounds = vec![IngredientBound::new("sugar", 50.0, 10.0)];
    let err = propose_next_sample(&[], &bounds, &BoConfig::default(), 1).unwrap_err();
    assert!(matches!(err, Error::InvalidBounds { ref name, .. } if name == "sugar"));
}

#[test]
fn test_duplicate_ingredient_names_are_rejected() {
    let bounds = vec![
        IngredientBound::new("sugar", 0.0, 10.0),
        IngredientBound::new("sugar", 0.0, 20.0),
    ];
    assert!(matches!(
        propose_next_sample(&[], &bounds, &BoConfig::default(), 1),
        Err(Error::DuplicateIngredient(name)) if name == "sugar"
    ));
}

#[test]
fn test_missing_ingredient_reports_expected_and_found() {
    let bounds = vec![
        IngredientBound::new("sugar", 0.0, 100.0),
        IngredientBound::new("acid", 0.0, 5.0),
    ];
    let observations = vec![
        Observation::rated(1, [("sugar", 10.0), ("acid", 1.0)], 2.0),
        Observation::rated(2, [("sugar", 50.0)], 8.0),
        Observation::rated(3, [("sugar", 90.0), ("acid", 4.0)], 3.0),
    ];
    let err = propose_next_sample(&observations, &bounds, &BoConfig::default(), 4).unwrap_err();
    match err {
        Error::IngredientMismatch {
            cycle,
            expected,
            found,
        } => {
            assert_eq!(cycle, 2);
            assert_eq!(expected, vec!["sugar", "acid"]);
            assert_eq!(found, vec!["sugar"]);
        }
        other => panic!("expected an ingredient mismatch, got {other:?}"),
    }
}

#[test]
fn test_config_errors_are_not_preconditions() {
    let mut config = BoConfig::default();
    config.kernel.length_scale_bounds = (1.0, 0.5);
    let observations = vec![
        Observation::rated(1, [("sugar", 10.0)], 2.0),
        Observation::rated(2, [("sugar", 50.0)], 8.0),
        Observation::rated(3, [("sugar", 90.0)], 3.0),
    ];
    let err = propose_next_sample(&observations, &sugar_only(), &config, 4).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
    assert!(!err.is_precondition());
}

#[test]
fn test_out_of_bounds_observations_are_accepted() {
    let observations = vec![
        Observation::rated(1, [("sugar", -5.0)], 2.0),
        Observation::rated(2, [("sugar", 50.0)], 8.0),
        Observation::rated(3, [("sugar", 120.0)], 3.0),
    ];
    let suggestion =
        propose_next_sample(&observations, &sugar_only(), &BoConfig::default(), 4).unwrap();
    let sugar = suggestion.concentration("sugar").unwrap();
    assert!((0.0..=100.0).contains(&sugar));
}
