//! Attendance decision pipeline.
//!
//! A pure state machine over per-cycle observations: cool-down against
//! re-triggering on the same standing subject, and a debounce so one
//! noisy frame never raises an unknown-face alert. The async driver
//! around it lives in [`crate::scanner`].

use presencia_core::{confidence_pct, MatchOutcome, CONFIDENT_DISTANCE};
use std::time::{Duration, Instant};

/// Temporal policy knobs, all operator-tunable via the environment.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Same-identity suppression window after a fired match.
    pub match_cooldown: Duration,
    /// Consecutive ambiguous cycles required before an alert.
    pub unknown_streak: u32,
    /// Minimum spacing between unknown-face alerts.
    pub unknown_alert_gap: Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            match_cooldown: Duration::from_secs(5),
            unknown_streak: 3,
            unknown_alert_gap: Duration::from_secs(10),
        }
    }
}

/// What one scan cycle saw.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    NoFace,
    /// A candidate under the confident-distance threshold.
    Confident { dni: String, distance: f32 },
    /// A face that matched nobody well enough to action.
    Ambiguous { distance: f32 },
}

/// Map a matcher verdict to a pipeline observation.
///
/// A candidate in the [confident, gate) band is tracked as ambiguous; an
/// empty gallery means any face present is by definition unknown.
pub fn observation_for(outcome: MatchOutcome) -> Observation {
    match outcome {
        MatchOutcome::Candidate { dni, distance } if distance < CONFIDENT_DISTANCE => {
            Observation::Confident { dni, distance }
        }
        MatchOutcome::Candidate { distance, .. } => Observation::Ambiguous { distance },
        MatchOutcome::Unknown { distance } => Observation::Ambiguous { distance },
        MatchOutcome::NoneEnrolled => Observation::Ambiguous { distance: 1.0 },
    }
}

/// Event the driver acts on: record attendance or persist an unknown capture.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Match { dni: String, distance: f32, confidence: u8 },
    Unknown,
}

/// Per-session temporal smoothing over raw observations.
pub struct ScanPipeline {
    policy: ScanPolicy,
    last_fired: Option<(String, Instant)>,
    unknown_streak: u32,
    last_unknown_alert: Option<Instant>,
    /// Live confidence for the kiosk display; cleared when nobody is in
    /// front of the camera.
    pub last_confidence: Option<u8>,
}

impl ScanPipeline {
    pub fn new(policy: ScanPolicy) -> Self {
        Self {
            policy,
            last_fired: None,
            unknown_streak: 0,
            last_unknown_alert: None,
            last_confidence: None,
        }
    }

    /// Feed one cycle's observation; returns the event to action, if any.
    pub fn observe(&mut self, observation: &Observation, now: Instant) -> Option<ScanEvent> {
        match observation {
            Observation::NoFace => {
                self.last_confidence = None;
                None
            }
            Observation::Confident { dni, distance } => {
                // A successful match clears unknown pressure.
                self.unknown_streak = 0;
                let confidence = confidence_pct(*distance);
                self.last_confidence = Some(confidence);

                if let Some((last_dni, fired_at)) = &self.last_fired {
                    if last_dni == dni
                        && now.duration_since(*fired_at) < self.policy.match_cooldown
                    {
                        return None;
                    }
                }

                self.last_fired = Some((dni.clone(), now));
                Some(ScanEvent::Match { dni: dni.clone(), distance: *distance, confidence })
            }
            Observation::Ambiguous { distance } => {
                self.last_confidence = Some(confidence_pct(*distance));
                self.unknown_streak += 1;
                if self.unknown_streak < self.policy.unknown_streak {
                    return None;
                }

                let gap_elapsed = self
                    .last_unknown_alert
                    .map_or(true, |at| now.duration_since(at) >= self.policy.unknown_alert_gap);
                if !gap_elapsed {
                    // Streak stays armed; the alert fires once the gap allows.
                    return None;
                }

                self.unknown_streak = 0;
                self.last_unknown_alert = Some(now);
                Some(ScanEvent::Unknown)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confident(dni: &str) -> Observation {
        Observation::Confident { dni: dni.to_string(), distance: 0.3 }
    }

    fn ambiguous() -> Observation {
        Observation::Ambiguous { distance: 0.55 }
    }

    #[test]
    fn test_match_cooldown_suppresses_same_identity() {
        let mut pipeline = ScanPipeline::new(ScanPolicy::default());
        let t0 = Instant::now();

        let first = pipeline.observe(&confident("1"), t0);
        assert!(matches!(first, Some(ScanEvent::Match { .. })));

        // Same identity 2s later: suppressed.
        assert_eq!(pipeline.observe(&confident("1"), t0 + Duration::from_secs(2)), None);

        // After the 5s window it fires again.
        let later = pipeline.observe(&confident("1"), t0 + Duration::from_secs(6));
        assert!(matches!(later, Some(ScanEvent::Match { .. })));
    }

    #[test]
    fn test_cooldown_does_not_suppress_other_identity() {
        let mut pipeline = ScanPipeline::new(ScanPolicy::default());
        let t0 = Instant::now();

        assert!(pipeline.observe(&confident("1"), t0).is_some());
        let other = pipeline.observe(&confident("2"), t0 + Duration::from_secs(1));
        assert!(matches!(other, Some(ScanEvent::Match { dni, .. }) if dni == "2"));
    }

    #[test]
    fn test_unknown_needs_three_consecutive_cycles() {
        let mut pipeline = ScanPipeline::new(ScanPolicy::default());
        let t0 = Instant::now();

        assert_eq!(pipeline.observe(&ambiguous(), t0), None);
        assert_eq!(pipeline.observe(&ambiguous(), t0 + Duration::from_millis(250)), None);
        let third = pipeline.observe(&ambiguous(), t0 + Duration::from_millis(500));
        assert_eq!(third, Some(ScanEvent::Unknown));
    }

    #[test]
    fn test_unknown_alert_gap_blocks_second_alert() {
        let mut pipeline = ScanPipeline::new(ScanPolicy::default());
        let t0 = Instant::now();

        for i in 0..3 {
            pipeline.observe(&ambiguous(), t0 + Duration::from_millis(250 * i));
        }
        // Another burst right after the alert: inside the 10s gap.
        for i in 3..7 {
            assert_eq!(
                pipeline.observe(&ambiguous(), t0 + Duration::from_millis(250 * i)),
                None,
                "cycle {i} must stay silent inside the alert gap"
            );
        }

        // Once the gap has elapsed the armed streak fires.
        let after_gap = pipeline.observe(&ambiguous(), t0 + Duration::from_secs(11));
        assert_eq!(after_gap, Some(ScanEvent::Unknown));
    }

    #[test]
    fn test_confident_match_resets_unknown_streak() {
        let mut pipeline = ScanPipeline::new(ScanPolicy::default());
        let t0 = Instant::now();

        pipeline.observe(&ambiguous(), t0);
        pipeline.observe(&ambiguous(), t0 + Duration::from_millis(250));
        pipeline.observe(&confident("1"), t0 + Duration::from_millis(500));

        // Two more ambiguous cycles: streak restarted, no alert yet.
        assert_eq!(pipeline.observe(&ambiguous(), t0 + Duration::from_millis(750)), None);
        assert_eq!(pipeline.observe(&ambiguous(), t0 + Duration::from_millis(1000)), None);
    }

    #[test]
    fn test_no_face_clears_confidence_but_keeps_streak() {
        let mut pipeline = ScanPipeline::new(ScanPolicy::default());
        let t0 = Instant::now();

        pipeline.observe(&ambiguous(), t0);
        assert!(pipeline.last_confidence.is_some());

        pipeline.observe(&Observation::NoFace, t0 + Duration::from_millis(250));
        assert_eq!(pipeline.last_confidence, None);

        // No-face neither increments nor resets the counter.
        pipeline.observe(&ambiguous(), t0 + Duration::from_millis(500));
        let third = pipeline.observe(&ambiguous(), t0 + Duration::from_millis(750));
        assert_eq!(third, Some(ScanEvent::Unknown));
    }

    #[test]
    fn test_observation_mapping() {
        let confident = observation_for(MatchOutcome::Candidate { dni: "1".into(), distance: 0.4 });
        assert!(matches!(confident, Observation::Confident { .. }));

        let tracked = observation_for(MatchOutcome::Candidate { dni: "1".into(), distance: 0.55 });
        assert!(matches!(tracked, Observation::Ambiguous { .. }));

        let unknown = observation_for(MatchOutcome::Unknown { distance: 0.8 });
        assert!(matches!(unknown, Observation::Ambiguous { .. }));

        let empty = observation_for(MatchOutcome::NoneEnrolled);
        assert!(matches!(empty, Observation::Ambiguous { .. }));
    }
}
