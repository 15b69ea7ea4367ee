use serde::{Deserialize, Serialize};

/// Continuous movement input. Latest value wins; never acknowledged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveIntent {
    /// Strafe axis, `[-1, 1]`.
    pub x: f32,
    /// Forward axis, `[-1, 1]`.
    pub z: f32,
    pub run: bool,
}

impl MoveIntent {
    /// Inputs with a squared magnitude below this count as "no input".
    pub const DEAD_ZONE_SQ: f32 = 0.01;

    pub const STOP: Self = Self {
        x: 0.0,
        z: 0.0,
        run: false,
    };

    pub fn new(x: f32, z: f32, run: bool) -> Self {
        Self { x, z, run }.clamped()
    }

    /// Clamps both axes into `[-1, 1]`; non-finite input becomes zero.
    pub fn clamped(self) -> Self {
        let clamp = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Self {
            x: clamp(self.x),
            z: clamp(self.z),
            run: self.run,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.x * self.x + self.z * self.z > Self::DEAD_ZONE_SQ
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Pickup,
    Throw,
    Jump,
}

/// Observer → authority intent. Fire-and-forget; denials are silent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    Move { intent: MoveIntent },
    Action { kind: ActionKind },
}

impl Command {
    pub fn pickup() -> Self {
        Command::Action {
            kind: ActionKind::Pickup,
        }
    }

    pub fn throw() -> Self {
        Command::Action {
            kind: ActionKind::Throw,
        }
    }

    pub fn jump() -> Self {
        Command::Action {
            kind: ActionKind::Jump,
        }
    }

    pub fn move_toward(x: f32, z: f32, run: bool) -> Self {
        Command::Move {
            intent: MoveIntent::new(x, z, run),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_are_clamped() {
        let i = MoveIntent::new(3.0, f32::NAN, true);
        assert_eq!(i.x, 1.0);
        assert_eq!(i.z, 0.0);
        assert!(i.run);
    }

    #[test]
    fn dead_zone_counts_as_idle() {
        assert!(!MoveIntent::new(0.05, 0.05, false).is_moving());
        assert!(MoveIntent::new(0.0, 0.5, false).is_moving());
    }
}
