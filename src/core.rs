//! Sample storage and the drivers shared by all samplers: sequential generation,
//! generation split over independently seeded rayon streams, and progress bars.

use std::ops::AddAssign;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::{Result, SamplingError};

/// Below this fraction of accepted proposals a generation call logs a warning.
pub const LOW_EFFICIENCY_WARNING: f64 = 0.01;

const PROGRESS_CHUNK: usize = 1_000;

/// Generated points, one value per generated variable, stored row-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleBuffer {
    variables: Vec<String>,
    values: Vec<f64>,
}

impl SampleBuffer {
    pub fn new(variables: Vec<String>) -> Self {
        Self::with_capacity(variables, 0)
    }

    pub fn with_capacity(variables: Vec<String>, points: usize) -> Self {
        let values = Vec::with_capacity(points * variables.len());
        Self { variables, values }
    }

    /// Names of the generated variables, in column order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn dim(&self) -> usize {
        self.variables.len()
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len().checked_div(self.dim()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, point: &[f64]) {
        debug_assert_eq!(point.len(), self.dim());
        self.values.extend_from_slice(point);
    }

    /// Moves all points of `other` to the end of `self`.
    pub fn append(&mut self, mut other: SampleBuffer) {
        debug_assert_eq!(self.variables, other.variables);
        self.values.append(&mut other.values);
    }

    pub fn point(&self, i: usize) -> &[f64] {
        let d = self.dim();
        &self.values[i * d..(i + 1) * d]
    }

    pub fn points(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.dim().max(1))
    }

    /// All values of one variable.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.variables.iter().position(|v| v == name)?;
        Some(self.points().map(|p| p[j]).collect())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Copies the points into an `(n_points, dim)` array.
    pub fn to_array(&self) -> Array2<f64> {
        let d = self.dim();
        Array2::from_shape_fn((self.len(), d), |(i, j)| self.values[i * d + j])
    }
}

/// Bookkeeping of one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawStats {
    pub accepted: usize,
    pub trials: u64,
    /// Accepted proposals whose weight exceeded the envelope of their cell.
    pub overweight: usize,
}

impl DrawStats {
    /// Fraction of proposals that were rejected.
    pub fn resample_ratio(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            1.0 - self.accepted as f64 / self.trials as f64
        }
    }

    pub fn efficiency(&self) -> f64 {
        1.0 - self.resample_ratio()
    }
}

impl AddAssign for DrawStats {
    fn add_assign(&mut self, rhs: Self) {
        self.accepted += rhs.accepted;
        self.trials += rhs.trials;
        self.overweight += rhs.overweight;
    }
}

/// Anything that turns random numbers into accepted points.
///
/// `draw` only needs `&self`, so a frozen sampler can feed several threads at once.
pub trait EventSource: Sync {
    /// Names of the generated variables, in output order.
    fn variables(&self) -> &[String];

    /// Trial budget of one generation call.
    fn max_trials(&self) -> u64;

    /// Appends up to `count` accepted points to `out`, spending at most `budget` proposals.
    ///
    /// Running out of budget is not an error here; the caller compares
    /// [`DrawStats::accepted`] with what it asked for.
    fn draw<R: Rng>(
        &self,
        count: usize,
        budget: u64,
        rng: &mut R,
        out: &mut SampleBuffer,
    ) -> Result<DrawStats>;
}

/// Draws exactly `count` points on the calling thread.
pub fn run_source<S, R>(source: &S, count: usize, rng: &mut R) -> Result<(SampleBuffer, DrawStats)>
where
    S: EventSource,
    R: Rng,
{
    let mut out = SampleBuffer::with_capacity(source.variables().to_vec(), count);
    let stats = source.draw(count, source.max_trials(), rng, &mut out)?;
    check_complete(count, &stats)?;
    Ok((out, stats))
}

/// Like [`run_source`], advancing `pb` as points are accepted.
pub fn run_source_with_progress<S, R>(
    source: &S,
    count: usize,
    rng: &mut R,
    pb: &ProgressBar,
) -> Result<(SampleBuffer, DrawStats)>
where
    S: EventSource,
    R: Rng,
{
    let mut out = SampleBuffer::with_capacity(source.variables().to_vec(), count);
    let stats = draw_with_progress(source, count, source.max_trials(), rng, &mut out, pb)?;
    check_complete(count, &stats)?;
    Ok((out, stats))
}

fn draw_with_progress<S, R>(
    source: &S,
    count: usize,
    budget: u64,
    rng: &mut R,
    out: &mut SampleBuffer,
    pb: &ProgressBar,
) -> Result<DrawStats>
where
    S: EventSource + ?Sized,
    R: Rng,
{
    pb.set_length(count as u64);
    let mut stats = DrawStats::default();
    while stats.accepted < count && stats.trials < budget {
        let chunk = (count - stats.accepted).min(PROGRESS_CHUNK);
        let step = source.draw(chunk, budget - stats.trials, rng, out)?;
        pb.inc(step.accepted as u64);
        stats += step;
    }
    Ok(stats)
}

/// Logs efficiency problems of a finished call and fails if it fell short of `requested`.
pub(crate) fn check_complete(requested: usize, stats: &DrawStats) -> Result<()> {
    if stats.trials > 0 && stats.efficiency() < LOW_EFFICIENCY_WARNING {
        log::warn!(
            "generation efficiency {:.2e} ({} of {} proposals accepted); the sampler may be poorly adapted",
            stats.efficiency(),
            stats.accepted,
            stats.trials
        );
    }
    if stats.overweight > 0 {
        log::warn!(
            "{} accepted points exceeded their cell bound; increase exploration_samples",
            stats.overweight
        );
    }
    if stats.accepted < requested {
        return Err(SamplingError::GenerationBudgetExceeded {
            requested,
            accepted: stats.accepted,
            trials: stats.trials,
        });
    }
    Ok(())
}

/// Number of points stream `i` of `n_streams` produces.
fn stream_share(count: usize, n_streams: usize, i: usize) -> usize {
    count / n_streams + usize::from(i < count % n_streams)
}

/// Parallel generation over independently seeded streams.
///
/// Stream `i` uses a [`SmallRng`] seeded with `seed + i` and gets an equal share of the
/// trial budget. The output concatenates the streams in order, so results only depend
/// on `seed` and `n_streams`, not on thread scheduling.
pub trait ParallelGenerate: EventSource {
    fn par_generate(
        &self,
        count: usize,
        n_streams: usize,
        seed: u64,
    ) -> Result<(SampleBuffer, DrawStats)> {
        let n_streams = n_streams.max(1);
        // Every stream gets an equal slice of the trial budget.
        let budget = (self.max_trials() / n_streams as u64).max(1);
        let parts = (0..n_streams)
            .into_par_iter()
            .map(|i| -> Result<(SampleBuffer, DrawStats)> {
                let n = stream_share(count, n_streams, i);
                // Independent stream seeded with `seed + i`
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(i as u64));
                let mut out = SampleBuffer::with_capacity(self.variables().to_vec(), n);
                let stats = self.draw(n, budget, &mut rng, &mut out)?;
                Ok((out, stats))
            })
            .collect::<Result<Vec<_>>>()?;
        // Concatenate in stream order, then check the total against the request.
        merge(self.variables(), count, parts)
    }

    fn par_generate_with_progress(
        &self,
        count: usize,
        n_streams: usize,
        seed: u64,
    ) -> Result<(SampleBuffer, DrawStats)> {
        let n_streams = n_streams.max(1);
        let budget = (self.max_trials() / n_streams as u64).max(1);
        let multi = MultiProgress::new();
        let pb_style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        let parts = (0..n_streams)
            .into_par_iter()
            .map(|i| -> Result<(SampleBuffer, DrawStats)> {
                let n = stream_share(count, n_streams, i);
                let pb = multi.add(ProgressBar::new(n as u64));
                pb.set_prefix(format!("Stream {i}"));
                pb.set_style(pb_style.clone());

                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(i as u64));
                let mut out = SampleBuffer::with_capacity(self.variables().to_vec(), n);
                let stats = draw_with_progress(self, n, budget, &mut rng, &mut out, &pb)?;

                pb.finish_with_message("Done!");
                Ok((out, stats))
            })
            .collect::<Result<Vec<_>>>()?;
        merge(self.variables(), count, parts)
    }
}

impl<T: EventSource> ParallelGenerate for T {}

fn merge(
    variables: &[String],
    requested: usize,
    parts: Vec<(SampleBuffer, DrawStats)>,
) -> Result<(SampleBuffer, DrawStats)> {
    let mut all = SampleBuffer::with_capacity(variables.to_vec(), requested);
    let mut total = DrawStats::default();
    for (buffer, stats) in parts {
        all.append(buffer);
        total += stats;
    }
    check_complete(requested, &total)?;
    Ok((all, total))
}
