use crate::config::BoConfig;
use crate::error::{Error, Result};
use crate::types::{IngredientBound, Observation, Suggestion};

/// Runs [`propose_next_sample`](crate::propose_next_sample) on the blocking
/// thread pool.
///
/// GP fitting and the grid scan are CPU-bound; wrapping them in
/// [`spawn_blocking`](tokio::task::spawn_blocking) keeps the runtime's
/// worker threads free for request handling.
///
/// # Errors
///
/// Returns every error [`propose_next_sample`](crate::propose_next_sample)
/// returns, and [`Error::TaskError`] if the blocking task panics.
///
/// # Examples
///
/// ```
/// use taste_bo::{BoConfig, IngredientBound, Observation};
///
/// # #[cfg(feature = "async")]
/// # async fn example() -> taste_bo::Result<()> {
/// let bounds = vec![IngredientBound::new("salt", 0.0, 5.0)];
/// let observations = vec![
///     Observation::rated(1, [("salt", 0.5)], 3.0),
///     Observation::rated(2, [("salt", 2.5)], 7.0),
///     Observation::rated(3, [("salt", 4.5)], 4.0),
/// ];
///
/// let suggestion =
///     taste_bo::propose_next_sample_async(observations, bounds, BoConfig::default(), 4).await?;
/// assert_eq!(suggestion.cycle, 4);
/// # Ok(())
/// # }
/// ```
pub async fn propose_next_sample_async(
    observations: Vec<Observation>,
    bounds: Vec<IngredientBound>,
    config: BoConfig,
    current_cycle: u32,
) -> Result<Suggestion> {
    tokio::task::spawn_blocking(move || {
        super::propose_next_sample(&observations, &bounds, &config, current_cycle)
    })
    .await
    .map_err(|e| Error::TaskError(e.to_string()))?
}
