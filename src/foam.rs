/*!
# Adaptive cell ("foam") sampler

A density-agnostic generator for one or more observables. The sampling domain is mapped
onto the unit hypercube and partitioned into a binary tree of cells.

## Exploration

Every new cell is probed with `exploration_samples` Latin-hypercube points. From these the
cell records

- its integral estimate (mean value × volume),
- an upper bound of the density inside it (sampled maximum plus a margin),
- its non-flatness `1 - mean/max`,
- the best split: for each axis the points are histogrammed into 8 bins and the bin edge
  that minimises the envelope `max × volume` of the two halves wins.

The leaf whose split removes the most envelope volume is split next, as long as its
non-flatness exceeds `flatness_threshold`. Exploration ends at `target_cells` leaves or when
no leaf qualifies. It is sequential: each decision depends on the current tree.

## Generation

Once exploration stops the leaves are frozen into a cumulative weight table proportional to
each leaf's envelope integral `bound × volume`. A draw picks a leaf by binary search in that
table, places a uniform point in it and accepts the point with probability
`f(x) / bound`. Because the leaf is chosen in proportion to its envelope, accepted points
follow `f` exactly wherever the bounds hold. Points whose value exceeds their cell bound are
still accepted and counted in [`DrawStats::overweight`].

The frozen tree is read-only, so [`ParallelGenerate`](crate::core::ParallelGenerate) can
draw from it on several threads.

## Example

```rust
use densample::config::GenConfig;
use densample::distributions::FnDensity;
use densample::foam::FoamGenerator;
use densample::parameter::Parameter;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let peak = FnDensity::new(
    vec![Parameter::new("x", 0.5, 0.0, 1.0)],
    |p: &[f64]| (-0.5 * ((p[0] - 0.3) / 0.05).powi(2)).exp(),
);
let mut rng = SmallRng::seed_from_u64(42);
let mut foam = FoamGenerator::new(&peak, &["x"], &[], &GenConfig::default(), &mut rng).unwrap();
let samples = foam.generate(1_000, &mut rng).unwrap();
assert_eq!(samples.len(), 1_000);
assert!(foam.n_leaves() > 1);
```
*/

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{FoamConfig, GenConfig};
use crate::core::{check_complete, DrawStats, EventSource, SampleBuffer};
use crate::distributions::DensityFunction;
use crate::error::{Result, SamplingError};
use crate::parameter::{VariableId, VariableKind};

/// Histogram bins per axis used to locate split points.
const SPLIT_BINS: usize = 8;

/// The cell bound is the sampled maximum plus this fraction of the sampled spread.
const BOUND_MARGIN: f64 = 0.1;

/// Splits removing less than this fraction of the total envelope are not worth a cell.
const MIN_RELATIVE_GAIN: f64 = 1e-12;

/// Cells narrower than this (in unit coordinates) are not split further along that axis.
const MIN_CELL_WIDTH: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Split {
    axis: usize,
    at: f64,
    gain: f64,
}

/// Node of the partition tree. Bounds are in unit-hypercube coordinates; integrals and
/// volumes in the units of the generated variables.
#[derive(Debug, Clone, PartialEq)]
pub struct FoamCell {
    lo: Vec<f64>,
    hi: Vec<f64>,
    parent: Option<usize>,
    children: Option<[usize; 2]>,
    integral: f64,
    bound: f64,
    volume: f64,
    non_flatness: f64,
    split: Option<Split>,
}

impl FoamCell {
    pub fn lo(&self) -> &[f64] {
        &self.lo
    }

    pub fn hi(&self) -> &[f64] {
        &self.hi
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> Option<[usize; 2]> {
        self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Estimated integral of the density over the cell.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Upper bound of the density inside the cell.
    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Envelope integral `bound × volume`, the cell's selection weight.
    pub fn envelope(&self) -> f64 {
        self.bound * self.volume
    }

    /// `1 - mean/max` of the exploration samples; zero for a flat cell.
    pub fn non_flatness(&self) -> f64 {
        self.non_flatness
    }
}

/// Adaptive cell sampler over a fixed set of observables of a density.
#[derive(Debug)]
pub struct FoamGenerator<'a, D: ?Sized> {
    density: &'a D,
    variables: Vec<String>,
    /// Observable index of each generated variable.
    slots: Vec<usize>,
    /// Observable values used for everything that is not generated.
    base_point: Vec<f64>,
    xmin: Vec<f64>,
    range: Vec<f64>,
    cells: Vec<FoamCell>,
    leaves: Vec<usize>,
    cumulative: Vec<f64>,
    total_integral: f64,
    total_envelope: f64,
    max_trials: u64,
    last: DrawStats,
}

impl<'a, D> FoamGenerator<'a, D>
where
    D: DensityFunction + ?Sized,
{
    /// Builds the cell tree for `gen_vars` over their declared ranges.
    ///
    /// Conditional generation (`cond_vars` non-empty) and categorical variables fail with
    /// [`SamplingError::UnsupportedSamplingMode`]; a density that vanishes on the whole
    /// domain fails with [`SamplingError::DegenerateDensity`].
    pub fn new<R: Rng>(
        density: &'a D,
        gen_vars: &[&str],
        cond_vars: &[&str],
        config: &GenConfig,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        if !cond_vars.is_empty() {
            return Err(SamplingError::UnsupportedSamplingMode(format!(
                "conditional generation on {cond_vars:?}"
            )));
        }
        if gen_vars.is_empty() {
            return Err(SamplingError::UnsupportedSamplingMode(
                "no variables to generate".into(),
            ));
        }

        let mut slots = Vec::with_capacity(gen_vars.len());
        let mut xmin = Vec::with_capacity(gen_vars.len());
        let mut range = Vec::with_capacity(gen_vars.len());
        for &name in gen_vars {
            let slot = match density.variable_id(name) {
                Some(VariableId::Observable(i)) => i,
                Some(VariableId::Parameter(_)) => {
                    return Err(SamplingError::UnsupportedGenerationTarget(name.to_string()))
                }
                None => return Err(SamplingError::UnknownVariable(name.to_string())),
            };
            let var = &density.observables()[slot];
            if let VariableKind::Categorical { .. } = var.kind() {
                return Err(SamplingError::UnsupportedSamplingMode(format!(
                    "categorical variable '{name}'"
                )));
            }
            if !var.is_floating() {
                return Err(SamplingError::UnsupportedGenerationTarget(name.to_string()));
            }
            if slots.contains(&slot) {
                return Err(SamplingError::InvalidConfig(format!(
                    "'{name}' requested twice"
                )));
            }
            let (lo, hi) = var.finite_range()?;
            slots.push(slot);
            xmin.push(lo);
            range.push(hi - lo);
        }

        let mut foam = Self {
            density,
            variables: gen_vars.iter().map(|v| v.to_string()).collect(),
            slots,
            base_point: density.current_point(),
            xmin,
            range,
            cells: Vec::new(),
            leaves: Vec::new(),
            cumulative: Vec::new(),
            total_integral: 0.0,
            total_envelope: 0.0,
            max_trials: config.max_trials,
            last: DrawStats::default(),
        };
        foam.explore(&config.foam, rng)?;
        foam.build_table()?;
        Ok(foam)
    }

    pub fn can_sample_conditional() -> bool {
        false
    }

    pub fn can_sample_categories() -> bool {
        false
    }

    /// Generates exactly `count` points or fails with
    /// [`SamplingError::GenerationBudgetExceeded`].
    pub fn generate<R: Rng>(&mut self, count: usize, rng: &mut R) -> Result<SampleBuffer> {
        let mut out = SampleBuffer::with_capacity(self.variables.clone(), count);
        self.last = self.draw(count, self.max_trials, rng, &mut out)?;
        check_complete(count, &self.last)?;
        Ok(out)
    }

    /// Fraction of proposals rejected by the most recent `generate` call.
    pub fn resample_ratio(&self) -> f64 {
        self.last.resample_ratio()
    }

    pub fn last_stats(&self) -> DrawStats {
        self.last
    }

    /// All cells; index 0 is the root.
    pub fn cells(&self) -> &[FoamCell] {
        &self.cells
    }

    pub fn leaves(&self) -> impl Iterator<Item = &FoamCell> {
        self.leaves.iter().map(|&i| &self.cells[i])
    }

    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Sum of the leaf integral estimates.
    pub fn total_integral(&self) -> f64 {
        self.total_integral
    }

    /// Expected acceptance rate of a draw.
    pub fn envelope_efficiency(&self) -> f64 {
        self.total_integral / self.total_envelope
    }

    fn explore<R: Rng>(&mut self, config: &FoamConfig, rng: &mut R) -> Result<()> {
        let dim = self.slots.len();
        let root = self.make_cell(vec![0.0; dim], vec![1.0; dim], None, config, rng)?;
        self.cells.push(root);

        let mut n_leaves = 1;
        while n_leaves < config.target_cells {
            let Some(best) = self.next_split(config) else {
                break;
            };
            self.split_cell(best, config, rng)?;
            n_leaves += 1;
        }
        log::debug!(
            "foam exploration finished with {} leaves of {} requested",
            n_leaves,
            config.target_cells
        );
        Ok(())
    }

    /// The leaf whose split removes the largest share of the running envelope total.
    fn next_split(&self, config: &FoamConfig) -> Option<usize> {
        let envelope: f64 = self
            .cells
            .iter()
            .filter(|c| c.is_leaf())
            .map(FoamCell::envelope)
            .sum();
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_leaf() && c.non_flatness > config.flatness_threshold)
            .filter_map(|(i, c)| c.split.map(|s| (i, s.gain)))
            .filter(|&(_, gain)| gain > MIN_RELATIVE_GAIN * envelope)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn split_cell<R: Rng>(&mut self, idx: usize, config: &FoamConfig, rng: &mut R) -> Result<()> {
        let Some(split) = self.cells[idx].split else {
            return Ok(());
        };
        let lo = self.cells[idx].lo.clone();
        let hi = self.cells[idx].hi.clone();
        let mut left_hi = hi.clone();
        left_hi[split.axis] = split.at;
        let mut right_lo = lo.clone();
        right_lo[split.axis] = split.at;

        let left = self.make_cell(lo, left_hi, Some(idx), config, rng)?;
        let right = self.make_cell(right_lo, hi, Some(idx), config, rng)?;
        // Children go to the end of the arena; the parent stays in place as an inner node.
        let first = self.cells.len();
        self.cells.push(left);
        self.cells.push(right);
        self.cells[idx].children = Some([first, first + 1]);
        Ok(())
    }

    /// Probes a new cell with stratified samples.
    fn make_cell<R: Rng>(
        &self,
        lo: Vec<f64>,
        hi: Vec<f64>,
        parent: Option<usize>,
        config: &FoamConfig,
        rng: &mut R,
    ) -> Result<FoamCell> {
        let dim = lo.len();
        let n = config.exploration_samples;
        let volume: f64 = (0..dim).map(|k| (hi[k] - lo[k]) * self.range[k]).product();

        // Latin hypercube: every axis sees each of its n strata exactly once.
        let mut unit = vec![0.0; n * dim];
        let mut strata: Vec<usize> = (0..n).collect();
        for k in 0..dim {
            strata.shuffle(rng);
            for (j, &s) in strata.iter().enumerate() {
                let u = (s as f64 + rng.gen::<f64>()) / n as f64;
                unit[j * dim + k] = lo[k] + u * (hi[k] - lo[k]);
            }
        }
        let values = self.evaluate_unit(&unit)?;

        // Moments of the probe values; an all-zero cell gets a zero bound and no split.
        let (sum, max, min) = values.iter().fold(
            (0.0, 0.0_f64, f64::INFINITY),
            |(sum, max, min), &v| (sum + v, max.max(v), min.min(v)),
        );
        let mean = sum / n as f64;
        let non_flatness = if max > 0.0 { 1.0 - mean / max } else { 0.0 };
        let split = best_split(&unit, &values, &lo, &hi, max * volume);

        Ok(FoamCell {
            lo,
            hi,
            parent,
            children: None,
            integral: mean * volume,
            bound: max + BOUND_MARGIN * (max - min),
            volume,
            non_flatness,
            split,
        })
    }

    /// Evaluates unit-cube points, generated coordinates spliced into the base point.
    fn evaluate_unit(&self, unit: &[f64]) -> Result<Vec<f64>> {
        let dim = self.slots.len();
        let n_obs = self.base_point.len();
        let mut points = Vec::with_capacity(unit.len() / dim * n_obs);
        for u in unit.chunks_exact(dim) {
            let start = points.len();
            points.extend_from_slice(&self.base_point);
            for (k, &slot) in self.slots.iter().enumerate() {
                points[start + slot] = self.xmin[k] + u[k] * self.range[k];
            }
        }
        let values = self.density.evaluate_batch(&points)?;
        Ok(values.into_iter().map(sanitize).collect())
    }

    fn build_table(&mut self) -> Result<()> {
        self.leaves = (0..self.cells.len())
            .filter(|&i| self.cells[i].is_leaf())
            .collect();
        self.total_integral = self.leaves().map(FoamCell::integral).sum();
        self.total_envelope = self.leaves().map(FoamCell::envelope).sum();
        if !(self.total_integral > 0.0 && self.total_envelope.is_finite()) {
            return Err(SamplingError::DegenerateDensity {
                integral: self.total_integral,
            });
        }

        let mut running = 0.0;
        self.cumulative = self
            .leaves
            .iter()
            .map(|&i| {
                running += self.cells[i].envelope();
                running / self.total_envelope
            })
            .collect();
        if let Some(last) = self.cumulative.last_mut() {
            *last = 1.0;
        }
        log::debug!(
            "foam weight table: {} leaves, integral {:.6e}, envelope efficiency {:.3}",
            self.leaves.len(),
            self.total_integral,
            self.envelope_efficiency()
        );
        Ok(())
    }

    fn pick_leaf(&self, u: f64) -> &FoamCell {
        let i = self
            .cumulative
            .partition_point(|&c| c <= u)
            .min(self.leaves.len() - 1);
        &self.cells[self.leaves[i]]
    }
}

impl<'a, D> EventSource for FoamGenerator<'a, D>
where
    D: DensityFunction + ?Sized,
{
    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn max_trials(&self) -> u64 {
        self.max_trials
    }

    fn draw<R: Rng>(
        &self,
        count: usize,
        budget: u64,
        rng: &mut R,
        out: &mut SampleBuffer,
    ) -> Result<DrawStats> {
        let mut stats = DrawStats::default();
        let mut point = self.base_point.clone();
        let mut generated = vec![0.0; self.slots.len()];
        while stats.accepted < count && stats.trials < budget {
            stats.trials += 1;
            // Leaf by envelope weight, then a uniform point inside it.
            let cell = self.pick_leaf(rng.gen());
            for (k, x) in generated.iter_mut().enumerate() {
                let u = cell.lo[k] + rng.gen::<f64>() * (cell.hi[k] - cell.lo[k]);
                *x = self.xmin[k] + u * self.range[k];
                point[self.slots[k]] = *x;
            }
            let value = sanitize(self.density.evaluate(&point)?);
            if value > cell.bound {
                stats.overweight += 1;
            }
            // Rejection against the cell bound.
            if rng.gen::<f64>() * cell.bound < value {
                out.push(&generated);
                stats.accepted += 1;
            }
        }
        Ok(stats)
    }
}

/// Non-finite and negative density values count as zero.
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Best bin-edge split of a probed cell, measured by the envelope volume it removes.
fn best_split(unit: &[f64], values: &[f64], lo: &[f64], hi: &[f64], envelope: f64) -> Option<Split> {
    let dim = lo.len();
    if envelope <= 0.0 {
        return None;
    }
    let mut best: Option<Split> = None;
    for k in 0..dim {
        // Axes already split down to nothing are skipped.
        let width = hi[k] - lo[k];
        if width < MIN_CELL_WIDTH {
            continue;
        }
        // Largest probe value per bin along this axis.
        let mut bin_max = [0.0_f64; SPLIT_BINS];
        for (u, &v) in unit.chunks_exact(dim).zip(values) {
            let t = (u[k] - lo[k]) / width;
            let b = ((t * SPLIT_BINS as f64) as usize).min(SPLIT_BINS - 1);
            bin_max[b] = bin_max[b].max(v);
        }
        let cell_max = bin_max.iter().copied().fold(0.0, f64::max);
        // Each inner bin edge is a candidate; the halves keep their own maximum as bound.
        for edge in 1..SPLIT_BINS {
            let left = bin_max[..edge].iter().copied().fold(0.0, f64::max);
            let right = bin_max[edge..].iter().copied().fold(0.0, f64::max);
            let kept = left * edge as f64 + right * (SPLIT_BINS - edge) as f64;
            let gain = envelope * (1.0 - kept / (cell_max * SPLIT_BINS as f64));
            if best.map_or(true, |b| gain > b.gain) {
                best = Some(Split {
                    axis: k,
                    at: lo[k] + width * edge as f64 / SPLIT_BINS as f64,
                    gain,
                });
            }
        }
    }
    best.filter(|s| s.gain > 0.0)
}
