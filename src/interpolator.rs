use log::{debug, warn};
use std::f64::consts::FRAC_PI_2;

pub const JOINT_COUNT: usize = 6;

/// Attachment point names the twin's scene file is expected to provide, in
/// joint-vector order.
pub const JOINT_NAMES: [&str; JOINT_COUNT] =
    ["base", "shoulder", "elbow", "wrist_1", "wrist_2", "wrist_3"];

/// Fraction of the remaining gap closed per frame.
pub const BLEND_FACTOR: f64 = 0.1;

/// The shoulder's zero pose in the model is a quarter turn away from the
/// robot's.
pub const OFFSET_AXIS: usize = 1;
pub const OFFSET_RADIANS: f64 = FRAC_PI_2;

/// Which of the six joints the loaded model can actually move.
#[derive(Debug, Clone)]
pub struct TwinRig {
    bound: [bool; JOINT_COUNT],
}

impl TwinRig {
    pub fn from_attachments<S: AsRef<str>>(attachments: &[S]) -> Self {
        let mut bound = [false; JOINT_COUNT];
        for (i, name) in JOINT_NAMES.iter().enumerate() {
            bound[i] = attachments.iter().any(|a| a.as_ref() == *name);
            if !bound[i] {
                warn!("Twin model has no attachment point '{}', joint {} will not move", name, i);
            }
        }
        Self { bound }
    }

    pub fn is_bound(&self, joint: usize) -> bool {
        self.bound.get(joint).copied().unwrap_or(false)
    }
}

impl Default for TwinRig {
    fn default() -> Self {
        Self::from_attachments(&JOINT_NAMES)
    }
}

/// Displayed pose of the digital twin.
#[derive(Debug, Clone)]
pub struct JointInterpolator {
    rig: TwinRig,
    pose: [f64; JOINT_COUNT],
}

impl JointInterpolator {
    pub fn new(rig: TwinRig) -> Self {
        Self {
            rig,
            pose: [0.0; JOINT_COUNT],
        }
    }

    #[cfg(test)]
    pub fn with_pose(rig: TwinRig, pose: [f64; JOINT_COUNT]) -> Self {
        Self { rig, pose }
    }

    pub fn pose(&self) -> &[f64; JOINT_COUNT] {
        &self.pose
    }

    /// Advances one frame toward `target`. Holds the current pose and returns
    /// false when the target has fewer than six values. Axes whose target is
    /// not a finite number keep their current angle.
    pub fn step(&mut self, target: &[f64]) -> bool {
        if target.len() < JOINT_COUNT {
            debug!("Joint target has {} values, holding pose", target.len());
            return false;
        }
        for (i, current) in self.pose.iter_mut().enumerate() {
            if !self.rig.is_bound(i) {
                continue;
            }
            let mut goal = target[i];
            if !goal.is_finite() {
                debug!("Joint {} target {} is not finite, holding", i, goal);
                continue;
            }
            if i == OFFSET_AXIS {
                goal += OFFSET_RADIANS;
            }
            *current += (goal - *current) * BLEND_FACTOR;
        }
        true
    }
}
