mod budget;
mod errors;
mod properties;
mod scenarios;
mod session;

use taste_bo::{IngredientBound, Observation};

/// Two-ingredient setup whose responses climb toward `(80, 10)`.
pub(crate) fn climbing_2d() -> (Vec<IngredientBound>, Vec<Observation>) {
    let bounds = vec![
        IngredientBound::new("sugar", 0.0, 100.0),
        IngredientBound::new("acid", 0.0, 50.0),
    ];
    let observations = vec![
        Observation::rated(1, [("sugar", 20.0), ("acid", 40.0)], 1.0),
        Observation::rated(2, [("sugar", 40.0), ("acid", 30.0)], 3.0),
        Observation::rated(3, [("sugar", 55.0), ("acid", 22.0)], 4.5),
        Observation::rated(4, [("sugar", 70.0), ("acid", 15.0)], 6.5),
        Observation::rated(5, [("sugar", 80.0), ("acid", 10.0)], 8.0),
    ];
    (bounds, observations)
}

pub(crate) fn sugar_only() -> Vec<IngredientBound> {
    vec![IngredientBound::new("sugar", 0.0, 100.0)]
}

/// A single-peaked preference curve with its optimum at 35.
pub(crate) fn liking(sugar: f64) -> f64 {
    9.0 - ((sugar - 35.0) / 15.0).powi(2)
}
