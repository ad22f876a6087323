//! Rotation commands for the in-call control set

use std::time::Duration;

use tracing::trace;

/// The fixed set of on-screen controls rotated in lockstep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControlId {
    AudioRoute,
    MuteOut,
    Video,
    VideoSource,
    Hangup,
}

impl ControlId {
    pub const ALL: [ControlId; 5] = [
        ControlId::AudioRoute,
        ControlId::MuteOut,
        ControlId::Video,
        ControlId::VideoSource,
        ControlId::Hangup,
    ];
}

/// Target angle for every control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCommand {
    pub target: u16,
}

/// One animation applied to one control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationAnimation {
    /// Instantaneous jump performed before animating, if any
    pub pre_rotate_to: Option<f32>,
    pub target: f32,
    pub duration: Duration,
}

/// Anything that can be rotated on screen
pub trait RotatableControl {
    fn rotation(&self) -> f32;

    fn animate(&mut self, animation: RotationAnimation);
}

/// Start value that keeps the animation on the short arc
///
/// Returns the current angle shifted by a full turn when the plain distance
/// to the target exceeds half a turn.
pub fn shortest_path_start(current: f32, target: f32) -> Option<f32> {
    if target - current > 180.0 {
        Some(current + 360.0)
    } else if current - target > 180.0 {
        Some(current - 360.0)
    } else {
        None
    }
}

pub fn apply_rotation(control: &mut dyn RotatableControl, target: u16, duration: Duration) {
    let target = f32::from(target);
    let animation = RotationAnimation {
        pre_rotate_to: shortest_path_start(control.rotation(), target),
        target,
        duration,
    };
    trace!(
        "Rotating control to {} (from {:?}) over {:?}",
        animation.target,
        animation.pre_rotate_to,
        animation.duration
    );
    control.animate(animation);
}

/// Model of a control: its current angle and the last animation it ran
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlView {
    pub rotation: f32,
    pub last_animation: Option<RotationAnimation>,
}

impl RotatableControl for ControlView {
    fn rotation(&self) -> f32 {
        self.rotation
    }

    fn animate(&mut self, animation: RotationAnimation) {
        // The jump is instantaneous, the animation ends on the target
        self.rotation = animation.target;
        self.last_animation = Some(animation);
    }
}

/// The five controls of a call window
#[derive(Debug, Clone, Default)]
pub struct ControlPanel {
    controls: [ControlView; 5],
    duration: Duration,
}

impl ControlPanel {
    pub fn new(duration: Duration) -> Self {
        Self {
            controls: Default::default(),
            duration,
        }
    }

    pub fn control(&self, id: ControlId) -> &ControlView {
        &self.controls[Self::index(id)]
    }

    pub fn apply(&mut self, command: RotationCommand) {
        for control in self.controls.iter_mut() {
            apply_rotation(control, command.target, self.duration);
        }
    }

    fn index(id: ControlId) -> usize {
        match id {
            ControlId::AudioRoute => 0,
            ControlId::MuteOut => 1,
            ControlId::Video => 2,
            ControlId::VideoSource => 3,
            ControlId::Hangup => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_path_pre_rotation() {
        assert_eq!(shortest_path_start(350.0, 10.0), Some(-10.0));
        assert_eq!(shortest_path_start(10.0, 350.0), Some(370.0));
        assert_eq!(shortest_path_start(0.0, 180.0), None);
        assert_eq!(shortest_path_start(90.0, 270.0), None);
        assert_eq!(shortest_path_start(0.0, 270.0), Some(360.0));
    }

    #[test]
    fn panel_rotates_in_lockstep() {
        let mut panel = ControlPanel::new(Duration::from_millis(300));
        panel.apply(RotationCommand { target: 270 });
        panel.apply(RotationCommand { target: 0 });

        for id in ControlId::ALL {
            let control = panel.control(id);
            assert_eq!(control.rotation, 0.0);
            let animation = control.last_animation.expect("animated");
            assert_eq!(animation.pre_rotate_to, Some(-90.0));
            assert_eq!(animation.duration, Duration::from_millis(300));
        }
    }
}
