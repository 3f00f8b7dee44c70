//! Session state owned by the engine

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::timers::TimerSlots;
use crate::flashcards::{Card, CardContent, StudyPreferences};

/// Countdown settings for a study session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimerConfig {
    pub reveal_timeout_ms: u64,
    pub auto_advance_delay_ms: u64,
    pub timer_enabled: bool,
    pub auto_advance_enabled: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            reveal_timeout_ms: 10_000,
            auto_advance_delay_ms: 5_000,
            timer_enabled: false,
            auto_advance_enabled: false,
        }
    }
}

impl TimerConfig {
    pub fn reveal_timeout(&self) -> Duration {
        Duration::from_millis(self.reveal_timeout_ms)
    }

    pub fn auto_advance_delay(&self) -> Duration {
        Duration::from_millis(self.auto_advance_delay_ms)
    }
}

impl From<&StudyPreferences> for TimerConfig {
    fn from(prefs: &StudyPreferences) -> Self {
        Self {
            reveal_timeout_ms: prefs.timer_duration_ms,
            auto_advance_delay_ms: prefs.auto_advance_delay_ms,
            timer_enabled: prefs.timer_enabled,
            auto_advance_enabled: prefs.auto_advance_enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Prev,
}

/// Where the current card is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    /// No cards loaded
    Empty,
    /// Question visible, not yet answered
    Showing,
    /// Basic card flipped to the back
    Revealed,
    /// Single-answer choice made
    Answered,
    /// Multi-answer selection checked
    Checked,
}

impl CardPhase {
    /// Phases that wait for an explicit advance
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revealed | Self::Answered | Self::Checked)
    }
}

/// Display permutation for one card's choices: `order[display] = original`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOrder {
    pub card_id: i64,
    pub order: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub(crate) cards: Vec<Card>,
    pub(crate) index: usize,
    pub(crate) revealed: bool,
    pub(crate) selected_choice: Option<usize>,
    pub(crate) correct: Option<bool>,
    pub(crate) multi_selected: BTreeSet<usize>,
    pub(crate) multi_checked: bool,
    pub(crate) choice_order: Option<ChoiceOrder>,
    pub(crate) timed_out: bool,
    /// Keeps the reveal timer from re-arming until the next advance
    pub(crate) timer_hold: bool,
    /// A review was already logged for this visit
    pub(crate) logged: bool,
    pub(crate) view_started_at: Option<Instant>,
    pub(crate) timers: TimerSlots,
}

impl SessionState {
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.cards.get(self.index)
    }

    pub fn revealed(&self) -> bool {
        self.revealed
    }

    pub fn selected_choice(&self) -> Option<usize> {
        self.selected_choice
    }

    pub fn correct(&self) -> Option<bool> {
        self.correct
    }

    pub fn multi_selected(&self) -> &BTreeSet<usize> {
        &self.multi_selected
    }

    pub fn multi_checked(&self) -> bool {
        self.multi_checked
    }

    pub fn choice_order(&self) -> Option<&ChoiceOrder> {
        self.choice_order.as_ref()
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn timer_hold(&self) -> bool {
        self.timer_hold
    }

    pub fn logged(&self) -> bool {
        self.logged
    }

    pub fn timers(&self) -> &TimerSlots {
        &self.timers
    }

    pub fn phase(&self) -> CardPhase {
        let Some(card) = self.current_card() else {
            return CardPhase::Empty;
        };
        match &card.content {
            CardContent::Basic { .. } if self.revealed => CardPhase::Revealed,
            CardContent::MultipleChoiceSingle { .. } if self.selected_choice.is_some() => {
                CardPhase::Answered
            }
            CardContent::MultipleChoiceMulti { .. } if self.multi_checked => CardPhase::Checked,
            _ => CardPhase::Showing,
        }
    }

    /// Display order for the current card's choices, identity if none was generated
    pub fn display_order(&self) -> Vec<usize> {
        let count = self
            .current_card()
            .map(|c| c.content.choices().len())
            .unwrap_or(0);
        match &self.choice_order {
            Some(order) if order.order.len() == count => order.order.clone(),
            _ => (0..count).collect(),
        }
    }

    /// Map a display index to the original choice index
    pub fn resolve(&self, display_index: usize) -> Option<usize> {
        self.display_order().get(display_index).copied()
    }

    pub(crate) fn reset_transient(&mut self) {
        self.revealed = false;
        self.selected_choice = None;
        self.correct = None;
        self.multi_selected.clear();
        self.multi_checked = false;
        self.timed_out = false;
        self.timer_hold = false;
        self.logged = false;
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.view_started_at
            .map(|t| u64::try_from(t.elapsed().as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_follows_card_type() {
        let mut state = SessionState::default();
        assert_eq!(state.phase(), CardPhase::Empty);

        state.cards = vec![Card::basic(1, "Q", "A")];
        assert_eq!(state.phase(), CardPhase::Showing);
        state.revealed = true;
        assert_eq!(state.phase(), CardPhase::Revealed);

        state.cards = vec![Card::single_choice(2, "Q", &["a", "b"], 0)];
        assert_eq!(state.phase(), CardPhase::Showing);
        state.selected_choice = Some(1);
        assert_eq!(state.phase(), CardPhase::Answered);
    }

    #[test]
    fn test_stale_order_falls_back_to_identity() {
        let mut state = SessionState {
            cards: vec![Card::single_choice(2, "Q", &["a", "b", "c"], 0)],
            ..Default::default()
        };
        state.choice_order = Some(ChoiceOrder {
            card_id: 2,
            order: vec![1, 0],
        });

        assert_eq!(state.display_order(), vec![0, 1, 2]);
        assert_eq!(state.resolve(3), None);
    }

    #[test]
    fn test_timer_config_from_preferences() {
        let prefs = StudyPreferences {
            timer_enabled: true,
            timer_duration_ms: 3_000,
            ..Default::default()
        };
        let config = TimerConfig::from(&prefs);
        assert!(config.timer_enabled);
        assert_eq!(config.reveal_timeout(), Duration::from_secs(3));
        assert_eq!(config.auto_advance_delay_ms, 5_000);
    }
}
