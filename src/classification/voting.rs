// Verdict fusion
//
// Each window votes for its label with weight `confidence`, scaled by the
// gap penalty when the window is gap-marked or came from a grace run. Labels rank by summed weight;
// equal sums rank the label voted for by the more recent window first. A
// label's fused confidence is its summed weight over the summed window
// weights.

use std::collections::HashMap;

use crate::classification::WindowVerdict;
use crate::config::ClassificationConfig;
use crate::types::{ClassifiedExercise, ExerciseLabel};

/// One window's verdict with its position in the block
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    /// Emission order within the block, later windows have larger indices
    pub window_index: usize,
    /// Gap-marked or grace-run window; weighs `gap_penalty`
    pub reduced: bool,
    pub verdict: WindowVerdict,
}

#[derive(Default)]
struct Tally {
    weight: f32,
    last_index: usize,
    attr_weight: f32,
    weight_kg: Option<f32>,
    intensity: Option<f32>,
}

impl Tally {
    fn add(&mut self, vote: &Vote, weight: f32) {
        self.weight += weight;
        self.last_index = self.last_index.max(vote.window_index);

        // weight-averaged optional attributes
        let w = weight.max(f32::EPSILON);
        self.attr_weight += w;
        if let Some(kg) = vote.verdict.weight {
            self.weight_kg = Some(self.weight_kg.unwrap_or(0.0) + kg * w);
        }
        if let Some(intensity) = vote.verdict.intensity {
            self.intensity = Some(self.intensity.unwrap_or(0.0) + intensity * w);
        }
    }
}

/// Rank labels across the votes of one block
///
/// # Returns
/// At most `config.max_results` entries, best first, each with a fused
/// confidence in [0, 1]; empty when there are no votes.
pub fn fuse_verdicts(votes: &[Vote], config: &ClassificationConfig) -> Vec<ClassifiedExercise> {
    let window_weight = |vote: &Vote| if vote.reduced { config.gap_penalty } else { 1.0 };
    let total: f32 = votes.iter().map(window_weight).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut tallies: HashMap<&ExerciseLabel, Tally> = HashMap::new();
    for vote in votes {
        let weight = vote.verdict.confidence.clamp(0.0, 1.0) * window_weight(vote);
        tallies
            .entry(&vote.verdict.label)
            .or_default()
            .add(vote, weight);
    }

    let mut ranked: Vec<(&ExerciseLabel, Tally)> = tallies.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| {
        b.weight
            .total_cmp(&a.weight)
            .then(b.last_index.cmp(&a.last_index))
    });

    ranked
        .into_iter()
        .map(|(label, tally)| {
            let mut exercise = ClassifiedExercise::new(label.clone(), tally.weight / total);
            exercise.weight = tally.weight_kg.map(|kg| kg / tally.attr_weight);
            exercise.intensity = tally.intensity.map(|i| i / tally.attr_weight);
            exercise
        })
        .filter(|exercise| exercise.confidence >= config.min_confidence)
        .take(config.max_results)
        .collect()
}
