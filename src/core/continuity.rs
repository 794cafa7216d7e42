//! Missing-hand recovery.
//!
//! Hands drop out of tracking for a few frames at a time. As long as an earlier
//! frame exists, the missing hand's keys are borrowed from it so that every
//! resolved frame carries the full key set the classifier was trained on.

use crate::core::frame::FlatFrame;
use crate::core::keys::Hand;
use crate::error::ContinuityError;
use serde::{Deserialize, Serialize};

/// When the stored previous frame is replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Only frames in which every required hand was really tracked
    #[default]
    CompleteOnly,
    /// Every resolved frame, including ones with borrowed hand data
    Always,
}

/// Result of resolving one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The frame with any missing required hand filled in
    pub frame: FlatFrame,
    /// Hands whose keys were borrowed from the previous frame
    pub filled: Vec<Hand>,
}

impl Resolved {
    pub fn was_filled(&self) -> bool {
        !self.filled.is_empty()
    }
}

/// Keeps the previous frame and fills gaps from it.
#[derive(Debug, Clone)]
pub struct ContinuityResolver {
    required: Vec<Hand>,
    policy: RefreshPolicy,
    previous: Option<FlatFrame>,
}

impl ContinuityResolver {
    pub fn new(required: Vec<Hand>, policy: RefreshPolicy) -> Self {
        Self {
            required,
            policy,
            previous: None,
        }
    }

    pub fn previous(&self) -> Option<&FlatFrame> {
        self.previous.as_ref()
    }

    /// Resolve the frame for this tick.
    ///
    /// `None` means the sensor reported no hands at all. Such a frame is
    /// [`ContinuityError::NoHands`] once a previous frame exists, so the caller
    /// can skip it without ending the run; before that it is
    /// [`ContinuityError::WaitingForHands`].
    pub fn resolve(&mut self, frame: Option<FlatFrame>) -> Result<Resolved, ContinuityError> {
        let Some(mut frame) = frame.filter(|f| f.presence().any()) else {
            return Err(self.empty_frame_error());
        };
        let presence = frame.presence();

        let missing: Vec<Hand> = self
            .required
            .iter()
            .copied()
            .filter(|&hand| !presence.contains(hand))
            .collect();

        if missing.is_empty() {
            self.previous = Some(frame.clone());
            return Ok(Resolved {
                frame,
                filled: Vec::new(),
            });
        }

        let Some(previous) = self.previous.as_ref() else {
            return Err(ContinuityError::WaitingForHands { missing });
        };

        for &hand in &missing {
            frame.fill_hand_from(previous, hand);
            frame.mark_present(hand);
        }
        // Any other key the current frame lacks is borrowed as well; current values win.
        frame.fill_missing_from(previous);

        if self.policy == RefreshPolicy::Always {
            self.previous = Some(frame.clone());
        }

        Ok(Resolved {
            frame,
            filled: missing,
        })
    }

    fn empty_frame_error(&self) -> ContinuityError {
        if self.previous.is_some() {
            ContinuityError::NoHands
        } else {
            ContinuityError::WaitingForHands {
                missing: self.required.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::HandPresence;

    fn frame(entries: &[(&str, f64)], left: bool, right: bool) -> FlatFrame {
        let mut flat = FlatFrame::with_presence(HandPresence { left, right });
        for (key, value) in entries {
            flat.insert(*key, *value);
        }
        flat
    }

    #[test]
    fn test_complete_frame_passes_through() {
        let mut resolver = ContinuityResolver::new(Hand::BOTH.to_vec(), RefreshPolicy::CompleteOnly);
        let input = frame(&[("left_a", 1.0), ("right_a", 2.0)], true, true);

        let resolved = resolver.resolve(Some(input.clone())).unwrap();
        assert_eq!(resolved.frame, input);
        assert!(!resolved.was_filled());
        assert_eq!(resolver.previous(), Some(&input));
    }

    #[test]
    fn test_missing_hand_without_previous_waits() {
        let mut resolver = ContinuityResolver::new(Hand::BOTH.to_vec(), RefreshPolicy::CompleteOnly);
        let err = resolver
            .resolve(Some(frame(&[("left_a", 1.0)], true, false)))
            .unwrap_err();

        assert_eq!(
            err,
            ContinuityError::WaitingForHands {
                missing: vec![Hand::Right]
            }
        );
        assert!(resolver.previous().is_none());
    }

    #[test]
    fn test_missing_hand_is_borrowed_and_current_wins() {
        let mut resolver = ContinuityResolver::new(Hand::BOTH.to_vec(), RefreshPolicy::CompleteOnly);
        resolver
            .resolve(Some(frame(&[("left_a", 1.0), ("right_b", 2.0)], true, true)))
            .unwrap();

        let resolved = resolver
            .resolve(Some(frame(&[("left_a", 5.0)], true, false)))
            .unwrap();

        assert_eq!(resolved.frame.get("left_a"), Some(5.0));
        assert_eq!(resolved.frame.get("right_b"), Some(2.0));
        assert_eq!(resolved.filled, vec![Hand::Right]);
        assert!(resolved.frame.presence().right);
    }

    #[test]
    fn test_no_hands_at_start_waits() {
        let mut resolver = ContinuityResolver::new(Hand::BOTH.to_vec(), RefreshPolicy::CompleteOnly);
        assert_eq!(
            resolver.resolve(None),
            Err(ContinuityError::WaitingForHands {
                missing: Hand::BOTH.to_vec()
            })
        );
        let empty = FlatFrame::with_presence(HandPresence::default());
        assert!(matches!(
            resolver.resolve(Some(empty)),
            Err(ContinuityError::WaitingForHands { .. })
        ));
    }

    #[test]
    fn test_no_hands_after_a_frame_keeps_previous() {
        let mut resolver = ContinuityResolver::new(Hand::BOTH.to_vec(), RefreshPolicy::Always);
        let first = frame(&[("left_a", 1.0), ("right_a", 1.0)], true, true);
        resolver.resolve(Some(first.clone())).unwrap();

        assert_eq!(resolver.resolve(None), Err(ContinuityError::NoHands));
        assert_eq!(resolver.previous(), Some(&first));
    }

    #[test]
    fn test_complete_only_policy_keeps_last_real_frame() {
        let mut resolver = ContinuityResolver::new(Hand::BOTH.to_vec(), RefreshPolicy::CompleteOnly);
        resolver
            .resolve(Some(frame(&[("left_a", 1.0), ("right_a", 10.0)], true, true)))
            .unwrap();

        for step in 2..6 {
            let resolved = resolver
                .resolve(Some(frame(&[("left_a", step as f64)], true, false)))
                .unwrap();
            assert_eq!(resolved.frame.get("right_a"), Some(10.0));
            // the stored frame still has the original left value
            assert_eq!(resolver.previous().unwrap().get("left_a"), Some(1.0));
        }
    }

    #[test]
    fn test_always_policy_rebroadcasts_resolved_frames() {
        let mut resolver = ContinuityResolver::new(Hand::BOTH.to_vec(), RefreshPolicy::Always);
        resolver
            .resolve(Some(frame(&[("left_a", 1.0), ("right_a", 10.0)], true, true)))
            .unwrap();

        // left drops, then right drops: the right hand keeps its stale value
        // while the left hand's borrowed value follows the latest resolved frame
        resolver
            .resolve(Some(frame(&[("left_a", 2.0)], true, false)))
            .unwrap();
        let resolved = resolver
            .resolve(Some(frame(&[("right_a", 20.0)], false, true)))
            .unwrap();

        assert_eq!(resolved.frame.get("left_a"), Some(2.0));
        assert_eq!(resolver.previous().unwrap().get("right_a"), Some(20.0));
    }

    #[test]
    fn test_one_handed_mode_ignores_other_hand() {
        let mut resolver = ContinuityResolver::new(vec![Hand::Right], RefreshPolicy::CompleteOnly);
        let resolved = resolver
            .resolve(Some(frame(&[("right_a", 1.0)], false, true)))
            .unwrap();
        assert!(!resolved.was_filled());

        // only the left hand shows up; the right hand is borrowed
        let resolved = resolver
            .resolve(Some(frame(&[("left_a", 1.0)], true, false)))
            .unwrap();
        assert_eq!(resolved.filled, vec![Hand::Right]);
        assert_eq!(resolved.frame.get("right_a"), Some(1.0));
    }
}
