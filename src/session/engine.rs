//! Study session state machine
//!
//! Every operation mutates the session state and returns the side effects
//! the host must carry out (start or cancel a countdown, write a review log
//! entry). The engine never sleeps or performs I/O itself. Operations called
//! in a state where they do not apply are no-ops returning no effects.

use std::collections::BTreeSet;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tokio::time::Instant;

use super::state::{CardPhase, ChoiceOrder, Direction, SessionState, TimerConfig};
use super::timers::{TimerHandle, TimerKind};
use super::view::SessionView;
use crate::flashcards::{Card, CardContent, ReviewOutcome};

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartTimer {
        kind: TimerKind,
        handle: TimerHandle,
        after: Duration,
    },
    CancelTimer {
        kind: TimerKind,
        handle: TimerHandle,
    },
    LogReview {
        card_id: i64,
        outcome: ReviewOutcome,
        duration_ms: u64,
    },
}

/// User-facing operations, as sent by presentation adapters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SessionCommand {
    Load { cards: Vec<Card> },
    SelectChoice { index: usize },
    ToggleMultiChoice { index: usize },
    CheckMulti,
    Flip,
    Advance { direction: Direction },
    Shuffle,
    SetTimerConfig { config: TimerConfig },
    SetAllowHtml { allow: bool },
    ResumeTimers,
}

pub struct SessionEngine {
    state: SessionState,
    config: TimerConfig,
    allow_html: bool,
    rng: StdRng,
}

impl SessionEngine {
    pub fn new(config: TimerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic shuffles, for tests and replays
    pub fn seeded(config: TimerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: TimerConfig, rng: StdRng) -> Self {
        Self {
            state: SessionState::default(),
            config,
            allow_html: false,
            rng,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn allow_html(&self) -> bool {
        self.allow_html
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.state.current_card()
    }

    pub fn phase(&self) -> CardPhase {
        self.state.phase()
    }

    pub fn view(&self) -> SessionView {
        SessionView::render(&self.state, self.allow_html)
    }

    #[cfg(test)]
    pub(crate) fn set_choice_order_for_test(&mut self, order: ChoiceOrder) {
        self.state.choice_order = Some(order);
    }

    pub fn apply(&mut self, command: SessionCommand) -> Vec<Effect> {
        match command {
            SessionCommand::Load { cards } => self.load(cards),
            SessionCommand::SelectChoice { index } => self.select_choice(index),
            SessionCommand::ToggleMultiChoice { index } => self.toggle_multi_choice(index),
            SessionCommand::CheckMulti => self.check_multi(),
            SessionCommand::Flip => self.flip(),
            SessionCommand::Advance { direction } => self.advance(direction),
            SessionCommand::Shuffle => self.shuffle_deck(),
            SessionCommand::SetTimerConfig { config } => self.set_timer_config(config),
            SessionCommand::SetAllowHtml { allow } => {
                self.allow_html = allow;
                Vec::new()
            }
            SessionCommand::ResumeTimers => self.resume_timers(),
        }
    }

    /// Replace the card list and start from the first card
    pub fn load(&mut self, cards: Vec<Card>) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.state.timers.cancel_all(&mut effects);
        self.state.cards = cards;
        self.state.index = 0;
        self.state.choice_order = None;
        self.enter_card(&mut effects);
        log::debug!("Session loaded with {} card(s)", self.state.cards.len());
        effects
    }

    pub fn select_choice(&mut self, display_index: usize) -> Vec<Effect> {
        let mut effects = Vec::new();
        let answer = match self.current_card().map(|c| &c.content) {
            Some(CardContent::MultipleChoiceSingle { answer, .. }) => *answer,
            _ => return effects,
        };
        if self.state.selected_choice.is_some() || self.state.timed_out {
            return effects;
        }
        let Some(original) = self.state.resolve(display_index) else {
            return effects;
        };

        let correct = Some(original) == answer;
        self.state.selected_choice = Some(display_index);
        self.state.correct = Some(correct);
        self.state.timer_hold = true;

        self.state.timers.cancel(TimerKind::Reveal, &mut effects);
        self.state.timers.cancel(TimerKind::AutoAdvance, &mut effects);
        self.log_once(outcome_for(correct), &mut effects);
        self.schedule_auto_advance(&mut effects);
        effects
    }

    pub fn toggle_multi_choice(&mut self, display_index: usize) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !matches!(
            self.current_card().map(|c| &c.content),
            Some(CardContent::MultipleChoiceMulti { .. })
        ) {
            return effects;
        }
        if self.state.multi_checked || self.state.resolve(display_index).is_none() {
            return effects;
        }

        if !self.state.multi_selected.remove(&display_index) {
            self.state.multi_selected.insert(display_index);
        }
        self.state.timer_hold = true;
        self.state.timers.cancel(TimerKind::Reveal, &mut effects);
        effects
    }

    pub fn check_multi(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        let answers = match self.current_card().map(|c| &c.content) {
            Some(CardContent::MultipleChoiceMulti { answers, .. }) => answers.clone(),
            _ => return effects,
        };
        if self.state.multi_checked || self.state.multi_selected.is_empty() {
            return effects;
        }

        let resolved: BTreeSet<usize> = self
            .state
            .multi_selected
            .iter()
            .filter_map(|&i| self.state.resolve(i))
            .collect();
        let correct = resolved == answers;
        self.state.multi_checked = true;
        self.state.correct = Some(correct);
        self.state.timer_hold = true;

        self.state.timers.cancel(TimerKind::Reveal, &mut effects);
        self.log_once(outcome_for(correct), &mut effects);
        self.schedule_auto_advance(&mut effects);
        effects
    }

    /// Toggle a basic card between front and back
    pub fn flip(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !matches!(
            self.current_card().map(|c| &c.content),
            Some(CardContent::Basic { .. })
        ) {
            return effects;
        }

        self.state.revealed = !self.state.revealed;
        self.state.timer_hold = true;
        self.state.timers.cancel(TimerKind::Reveal, &mut effects);

        if self.state.revealed {
            self.log_once(ReviewOutcome::Revealed, &mut effects);
            self.schedule_auto_advance(&mut effects);
        } else {
            self.state.timers.cancel(TimerKind::AutoAdvance, &mut effects);
        }
        effects
    }

    pub fn advance(&mut self, direction: Direction) -> Vec<Effect> {
        let mut effects = Vec::new();
        let len = self.state.cards.len();
        if len == 0 {
            return effects;
        }

        self.state.timers.cancel_all(&mut effects);
        self.state.index = match direction {
            Direction::Next => (self.state.index + 1) % len,
            Direction::Prev => (self.state.index + len - 1) % len,
        };
        self.state.choice_order = None;
        self.enter_card(&mut effects);
        effects
    }

    /// Shuffle the card sequence and restart from its first card
    pub fn shuffle_deck(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.state.cards.is_empty() {
            return effects;
        }

        self.state.timers.cancel_all(&mut effects);
        self.state.cards.shuffle(&mut self.rng);
        self.state.index = 0;
        self.state.choice_order = None;
        self.enter_card(&mut effects);
        effects
    }

    /// The reveal countdown ran out on the current card
    pub fn on_timeout(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.phase() != CardPhase::Showing || self.state.timed_out {
            return effects;
        }
        let Some(content) = self.current_card().map(|c| c.content.clone()) else {
            return effects;
        };

        match content {
            CardContent::Basic { .. } => {
                self.state.revealed = true;
            }
            CardContent::MultipleChoiceSingle { answer, .. } => {
                let order = self.state.display_order();
                self.state.selected_choice =
                    answer.and_then(|a| order.iter().position(|&o| o == a));
                self.state.correct = Some(true);
            }
            CardContent::MultipleChoiceMulti { .. } => {
                self.state.multi_checked = true;
                self.state.correct = Some(false);
            }
        }
        self.state.timed_out = true;
        self.state.timer_hold = true;

        self.state.timers.cancel_all(&mut effects);
        self.log_once(ReviewOutcome::Timeout, &mut effects);
        effects
    }

    /// Host callback for an elapsed countdown
    pub fn timer_fired(&mut self, kind: TimerKind, handle: TimerHandle) -> Vec<Effect> {
        if !self.state.timers.claim(kind, handle) {
            log::debug!("Ignoring stale {:?} timer {:?}", kind, handle);
            return Vec::new();
        }
        match kind {
            TimerKind::Reveal => self.on_timeout(),
            TimerKind::AutoAdvance => self.advance(Direction::Next),
        }
    }

    pub fn set_timer_config(&mut self, config: TimerConfig) -> Vec<Effect> {
        let mut effects = Vec::new();
        let previous = std::mem::replace(&mut self.config, config);

        if !config.timer_enabled {
            self.state.timers.cancel(TimerKind::Reveal, &mut effects);
        } else if !previous.timer_enabled {
            self.arm_reveal(&mut effects);
        }

        if !config.auto_advance_enabled {
            self.state.timers.cancel(TimerKind::AutoAdvance, &mut effects);
        } else if !previous.auto_advance_enabled && self.phase().is_terminal() {
            self.schedule_auto_advance(&mut effects);
        }
        effects
    }

    /// Re-render hook: re-arm the reveal countdown if it should be running
    pub fn resume_timers(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.arm_reveal(&mut effects);
        effects
    }

    fn enter_card(&mut self, effects: &mut Vec<Effect>) {
        self.state.reset_transient();
        self.state.view_started_at = Some(Instant::now());
        self.ensure_choice_order();
        self.arm_reveal(effects);
    }

    fn arm_reveal(&mut self, effects: &mut Vec<Effect>) {
        if self.config.timer_enabled
            && self.phase() == CardPhase::Showing
            && !self.state.timer_hold
            && !self.state.timers.is_pending(TimerKind::Reveal)
        {
            self.state
                .timers
                .schedule(TimerKind::Reveal, self.config.reveal_timeout(), effects);
        }
    }

    fn schedule_auto_advance(&mut self, effects: &mut Vec<Effect>) {
        if self.config.auto_advance_enabled && !self.state.timed_out {
            self.state.timers.schedule(
                TimerKind::AutoAdvance,
                self.config.auto_advance_delay(),
                effects,
            );
        }
    }

    fn log_once(&mut self, outcome: ReviewOutcome, effects: &mut Vec<Effect>) {
        if self.state.logged {
            return;
        }
        let Some(card_id) = self.current_card().map(|c| c.id) else {
            return;
        };
        self.state.logged = true;
        effects.push(Effect::LogReview {
            card_id,
            outcome,
            duration_ms: self.state.elapsed_ms(),
        });
    }

    /// Keep the cached permutation if it still fits the current card
    fn ensure_choice_order(&mut self) {
        let Some(card) = self.state.current_card() else {
            self.state.choice_order = None;
            return;
        };
        let card_id = card.id;
        let count = match &card.content {
            CardContent::Basic { .. } => {
                self.state.choice_order = None;
                return;
            }
            content => content.choices().len(),
        };

        let fits = matches!(
            &self.state.choice_order,
            Some(order) if order.card_id == card_id && order.order.len() == count
        );
        if !fits {
            self.state.choice_order = Some(ChoiceOrder {
                card_id,
                order: random_permutation(count, &mut self.rng),
            });
        }
    }
}

fn outcome_for(correct: bool) -> ReviewOutcome {
    if correct {
        ReviewOutcome::Correct
    } else {
        ReviewOutcome::Wrong
    }
}

/// Fisher-Yates: walk down from the last index, swapping with `j` in `[0, i]`
fn random_permutation(n: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }
    order
}
