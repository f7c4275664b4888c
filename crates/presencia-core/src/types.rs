use serde::{Deserialize, Serialize};

/// Distance below which a candidate counts as a confident match.
pub const CONFIDENT_DISTANCE: f32 = 0.5;

/// Matcher gate: at or above this distance no candidate is returned at all.
pub const MATCHER_GATE: f32 = 0.6;

/// Fixed-length face embedding produced by the encoder model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance to another descriptor.
    ///
    /// Dimensions are zipped; a shorter vector is treated as truncated
    /// rather than padded, which keeps mixed-dimension galleries from
    /// panicking (they simply never match well).
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Percentage confidence displayed for a match: `max(0, round((1 - d) * 100))`.
pub fn confidence_pct(distance: f32) -> u8 {
    ((1.0 - distance) * 100.0).round().max(0.0).min(100.0) as u8
}

/// One enrolled user: the external natural key plus every captured sample.
#[derive(Debug, Clone)]
pub struct EnrolledIdentity {
    pub dni: String,
    pub descriptors: Vec<Descriptor>,
}

/// Verdict of classifying a probe descriptor against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Nothing is enrolled; classification is meaningless.
    NoneEnrolled,
    /// Best distance cleared the gate but nobody is close enough.
    Unknown { distance: f32 },
    /// Nearest enrolled identity within the gate.
    Candidate { dni: String, distance: f32 },
}

impl MatchOutcome {
    /// True only for a candidate under the confident-match threshold.
    pub fn is_confident(&self) -> bool {
        matches!(self, MatchOutcome::Candidate { distance, .. } if *distance < CONFIDENT_DISTANCE)
    }
}

struct MatcherEntry {
    dni: String,
    descriptor: Descriptor,
}

/// Nearest-neighbor index over all enrolled descriptor sets.
///
/// Every sample is its own reference point (sets are never averaged).
/// The index is immutable once built; enrollment changes must build a
/// fresh matcher and swap it in whole.
pub struct FaceMatcher {
    entries: Vec<MatcherEntry>,
    gate: f32,
}

impl FaceMatcher {
    /// Build the index with the default gate distance.
    pub fn build(identities: &[EnrolledIdentity]) -> Self {
        Self::with_gate(identities, MATCHER_GATE)
    }

    pub fn with_gate(identities: &[EnrolledIdentity], gate: f32) -> Self {
        let mut entries = Vec::new();
        for identity in identities {
            for descriptor in &identity.descriptors {
                entries.push(MatcherEntry {
                    dni: identity.dni.clone(),
                    descriptor: descriptor.clone(),
                });
            }
        }
        Self { entries, gate }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of reference descriptors in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Classify a probe against every reference descriptor.
    pub fn classify(&self, probe: &Descriptor) -> MatchOutcome {
        let mut best: Option<(usize, f32)> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            let d = probe.euclidean_distance(&entry.descriptor);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }

        match best {
            None => MatchOutcome::NoneEnrolled,
            Some((_, distance)) if distance >= self.gate => MatchOutcome::Unknown { distance },
            Some((idx, distance)) => MatchOutcome::Candidate {
                dni: self.entries[idx].dni.clone(),
                distance,
            },
        }
    }
}
