//! Hand-off from a finished combat session to whatever comes next.

use log::warn;
use tokio::sync::mpsc;
use wayfarer_shared::{Character, CombatOutcome};

use crate::rules::Rewards;

/// Everything the caller needs once combat is over
#[derive(Debug, Clone, PartialEq)]
pub struct CombatExit {
    pub outcome: CombatOutcome,
    /// Updated party records, controlled character first
    pub party: Vec<Character>,
    /// Rewards earned (zero unless the outcome is a victory)
    pub rewards: Rewards,
    /// Net currency change applied to the controlled character
    pub currency_delta: i64,
}

impl CombatExit {
    /// The controlled character's updated record
    pub fn leader(&self) -> Option<&Character> {
        self.party.first()
    }
}

/// Invoked exactly once per session when combat ends
pub trait Navigator {
    fn leave_combat(&mut self, exit: CombatExit);
}

impl<T: Navigator + ?Sized> Navigator for Box<T> {
    fn leave_combat(&mut self, exit: CombatExit) {
        (**self).leave_combat(exit)
    }
}

/// Keeps the exits it receives, for callers that poll instead of react
#[derive(Debug, Default, Clone)]
pub struct RecordingNavigator {
    pub exits: Vec<CombatExit>,
}

impl Navigator for RecordingNavigator {
    fn leave_combat(&mut self, exit: CombatExit) {
        self.exits.push(exit);
    }
}

/// Forwards exits to an async receiver, e.g. the driver's main loop
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    sender: mpsc::UnboundedSender<CombatExit>,
}

impl ChannelNavigator {
    pub fn new(sender: mpsc::UnboundedSender<CombatExit>) -> Self {
        Self { sender }
    }
}

impl Navigator for ChannelNavigator {
    fn leave_combat(&mut self, exit: CombatExit) {
        if let Err(e) = self.sender.send(exit) {
            warn!("Combat exit ({}) dropped, receiver is gone", e.0.outcome.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_navigator_forwards_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut navigator = ChannelNavigator::new(tx);
        navigator.leave_combat(CombatExit {
            outcome: CombatOutcome::Fled,
            party: vec![Character::new(1, "Aria", "human")],
            rewards: Rewards::default(),
            currency_delta: 0,
        });

        let exit = rx.try_recv().unwrap();
        assert_eq!(exit.outcome, CombatOutcome::Fled);
        assert_eq!(exit.leader().map(|c| c.name.as_str()), Some("Aria"));
    }
}
