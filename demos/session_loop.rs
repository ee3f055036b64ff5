//! Simulated tasting panel: the "hello world" of taste-bo.
//!
//! A virtual panelist rates lemonades on a sugar/citric-acid grid. Three
//! hand-picked samples seed the session, then the engine proposes one sample
//! per cycle until it suggests stopping or the moderator's `max_cycles` is hit.
//!
//! Run with: `cargo run --example session_loop`

use taste_bo::prelude::*;

/// The panelist's hidden preference: best at 45 g/L sugar and 2 g/L acid.
fn panelist(sugar: f64, acid: f64) -> f64 {
    let rating = 9.0 - ((sugar - 45.0) / 20.0).powi(2) - ((acid - 2.0) / 1.5).powi(2);
    rating.clamp(1.0, 9.0)
}

fn main() -> taste_bo::Result<()> {
    let bounds = vec![
        IngredientBound::new("sugar", 0.0, 100.0),
        IngredientBound::new("citric_acid", 0.0, 5.0),
    ];
    let config = BoConfig::default();
    let engine = SessionEngine::new(config.clone());

    // Fallback sampling covers the first cycles until BO has enough data.
    let mut observations: Vec<Observation> = [(20.0, 1.0), (60.0, 4.0), (85.0, 0.5)]
        .into_iter()
        .zip(1..)
        .map(|((sugar, acid), cycle)| {
            Observation::rated(
                cycle,
                [("sugar", sugar), ("citric_acid", acid)],
                panelist(sugar, acid),
            )
        })
        .collect();

    let max_cycles = config.convergence_2d.max_cycles;
    for cycle in 4..=max_cycles {
        let suggestion = engine.propose("demo-panel", &observations, &bounds, cycle)?;
        let sugar = suggestion.concentration("sugar").unwrap_or_default();
        let acid = suggestion.concentration("citric_acid").unwrap_or_default();
        let rating = panelist(sugar, acid);

        println!(
            "cycle {cycle:>2} [{:?}] sugar {sugar:5.1} acid {acid:4.2} -> rating {rating:.2} (predicted {:.2} ± {:.2})",
            suggestion.phase, suggestion.predicted_value, suggestion.uncertainty
        );

        match config.stopping_mode.action(suggestion.verdict()) {
            StopAction::Continue => {}
            StopAction::PromptModerator | StopAction::Stop => {
                println!("converged at cycle {cycle}: {:?}", suggestion.convergence.state);
                break;
            }
        }
        observations.push(Observation::rated(cycle, suggestion.concentration_map(), rating));
    }

    let best = observations
        .iter()
        .filter_map(|o| o.response.map(|r| (o, r)))
        .max_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((obs, rating)) = best {
        println!(
            "best sample: cycle {} sugar {:.1} acid {:.2} rated {rating:.2}",
            obs.cycle_number, obs.concentrations["sugar"], obs.concentrations["citric_acid"]
        );
    }
    engine.forget("demo-panel");
    Ok(())
}
