//! Render snapshot handed to presentation adapters

use serde::Serialize;

use super::state::SessionState;
use super::timers::TimerKind;
use crate::flashcards::CardContent;
use crate::html_sanitizer::sanitize_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CardKind {
    Basic,
    SingleChoice,
    MultiChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Banner {
    Correct,
    Wrong,
    TimesUp,
}

impl Banner {
    pub fn text(&self) -> &'static str {
        match self {
            Self::Correct => "Correct!",
            Self::Wrong => "Wrong.",
            Self::TimesUp => "Time's up.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceView {
    /// Position on screen; what `select_choice`/`toggle_multi_choice` take
    pub index: usize,
    pub text: String,
    pub selected: bool,
    pub correct: bool,
    pub wrong: bool,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: i64,
    pub kind: CardKind,
    pub front: String,
    /// Back text, only once a basic card is revealed
    pub back: Option<String>,
    pub choices: Vec<ChoiceView>,
    /// Whether "check" is currently available (multi-answer cards)
    pub can_check: bool,
    pub banner: Option<Banner>,
    /// Correct choice texts, shown after a wrong answer or a timeout
    pub correct_answers: Vec<String>,
    /// Text fields hold sanitized HTML rather than plain text
    pub html: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub card: Option<CardView>,
    /// `"index+1 / total"`, `"0 / 0"` when empty
    pub position: String,
    pub reveal_pending: bool,
    pub auto_advance_pending: bool,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            card: None,
            position: "0 / 0".to_string(),
            reveal_pending: false,
            auto_advance_pending: false,
        }
    }
}

impl SessionView {
    pub fn render(state: &SessionState, allow_html: bool) -> Self {
        let total = state.cards().len();
        let position = if total == 0 {
            "0 / 0".to_string()
        } else {
            format!("{} / {}", state.index() + 1, total)
        };

        Self {
            card: render_card(state, allow_html),
            position,
            reveal_pending: state.timers().is_pending(TimerKind::Reveal),
            auto_advance_pending: state.timers().is_pending(TimerKind::AutoAdvance),
        }
    }
}

fn render_card(state: &SessionState, allow_html: bool) -> Option<CardView> {
    let card = state.current_card()?;
    let text = |s: &str| {
        if allow_html {
            sanitize_html(s)
        } else {
            s.to_string()
        }
    };
    let order = state.display_order();
    let choices = card.content.choices();
    let choice_text = |original: usize| choices.get(original).map(|c| text(c)).unwrap_or_default();
    // Out-of-range answer indices are skipped rather than shown as blanks
    let correct_texts = || -> Vec<String> {
        card.content
            .correct_choice_texts()
            .iter()
            .map(|c| text(c))
            .collect()
    };

    let mut view = CardView {
        id: card.id,
        kind: CardKind::Basic,
        front: text(card.content.front()),
        back: None,
        choices: Vec::new(),
        can_check: false,
        banner: None,
        correct_answers: Vec::new(),
        html: allow_html,
    };

    match &card.content {
        CardContent::Basic { back, .. } => {
            if state.revealed() {
                view.back = Some(text(back));
            }
            if state.timed_out() {
                view.banner = Some(Banner::TimesUp);
            }
        }
        CardContent::MultipleChoiceSingle { .. } => {
            view.kind = CardKind::SingleChoice;
            let answered = state.selected_choice().is_some() || state.timed_out();
            view.choices = order
                .iter()
                .enumerate()
                .map(|(i, &original)| {
                    let selected = state.selected_choice() == Some(i);
                    let correct = selected && state.correct() == Some(true);
                    ChoiceView {
                        index: i,
                        text: choice_text(original),
                        selected,
                        correct,
                        wrong: selected && !correct,
                        disabled: answered,
                    }
                })
                .collect();

            view.banner = if state.timed_out() {
                Some(Banner::TimesUp)
            } else {
                match state.correct() {
                    Some(true) => Some(Banner::Correct),
                    Some(false) => Some(Banner::Wrong),
                    None => None,
                }
            };
            if matches!(view.banner, Some(Banner::Wrong | Banner::TimesUp)) {
                view.correct_answers = correct_texts();
            }
        }
        CardContent::MultipleChoiceMulti { answers, .. } => {
            view.kind = CardKind::MultiChoice;
            let checked = state.multi_checked();
            view.choices = order
                .iter()
                .enumerate()
                .map(|(i, &original)| {
                    let selected = state.multi_selected().contains(&i);
                    let is_answer = answers.contains(&original);
                    ChoiceView {
                        index: i,
                        text: choice_text(original),
                        selected,
                        correct: checked && is_answer,
                        wrong: checked && selected && !is_answer,
                        disabled: checked,
                    }
                })
                .collect();
            view.can_check = !checked && !state.multi_selected().is_empty();

            if checked {
                view.banner = Some(if state.timed_out() {
                    Banner::TimesUp
                } else if state.correct() == Some(true) {
                    Banner::Correct
                } else {
                    Banner::Wrong
                });
                if view.banner != Some(Banner::Correct) {
                    view.correct_answers = correct_texts();
                }
            }
        }
    }

    Some(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::Card;
    use crate::session::engine::SessionEngine;
    use crate::session::state::{ChoiceOrder, TimerConfig};

    fn engine_with(card: Card, order: Vec<usize>) -> SessionEngine {
        let mut engine = SessionEngine::seeded(TimerConfig::default(), 3);
        engine.load(vec![card]);
        if !order.is_empty() {
            engine.set_choice_order_for_test(ChoiceOrder { card_id: 1, order });
        }
        engine
    }

    #[test]
    fn test_empty_view() {
        let engine = SessionEngine::seeded(TimerConfig::default(), 1);
        let view = engine.view();
        assert_eq!(view, SessionView::default());
    }

    #[test]
    fn test_basic_back_hidden_until_revealed() {
        let mut engine = engine_with(Card::basic(1, "Q", "A"), vec![]);
        assert_eq!(engine.view().card.unwrap().back, None);

        engine.flip();
        let view = engine.view();
        assert_eq!(view.position, "1 / 1");
        assert_eq!(view.card.unwrap().back.as_deref(), Some("A"));
    }

    #[test]
    fn test_wrong_single_answer_shows_correct_text() {
        let mut engine = engine_with(
            Card::single_choice(1, "Capital?", &["Rome", "Paris", "Oslo"], 1),
            vec![2, 1, 0],
        );
        engine.select_choice(0);

        let card = engine.view().card.unwrap();
        assert_eq!(card.kind, CardKind::SingleChoice);
        assert_eq!(card.choices[0].text, "Oslo");
        assert!(card.choices[0].wrong);
        assert!(card.choices.iter().all(|c| c.disabled));
        assert_eq!(card.banner, Some(Banner::Wrong));
        assert_eq!(card.correct_answers, vec!["Paris".to_string()]);
    }

    #[test]
    fn test_checked_multi_marks_choices() {
        let mut engine = engine_with(
            Card::multi_choice(1, "Primes?", &["2", "4", "5"], &[0, 2]),
            vec![0, 1, 2],
        );
        engine.toggle_multi_choice(0);
        engine.toggle_multi_choice(1);
        assert!(engine.view().card.unwrap().can_check);
        engine.check_multi();

        let card = engine.view().card.unwrap();
        let marks: Vec<(bool, bool)> = card.choices.iter().map(|c| (c.correct, c.wrong)).collect();
        assert_eq!(marks, vec![(true, false), (false, true), (true, false)]);
        assert_eq!(card.banner.map(|b| b.text()), Some("Wrong."));
        assert_eq!(card.correct_answers, vec!["2".to_string(), "5".to_string()]);
        assert!(!card.can_check);
    }

    #[test]
    fn test_html_rendering_follows_flag() {
        let mut engine = engine_with(Card::basic(1, "<b>Q</b><script>x</script>", "A"), vec![]);
        assert_eq!(engine.view().card.unwrap().front, "<b>Q</b><script>x</script>");

        engine.apply(crate::session::engine::SessionCommand::SetAllowHtml { allow: true });
        let card = engine.view().card.unwrap();
        assert!(card.html);
        assert_eq!(card.front, "<b>Q</b>");
    }

    #[test]
    fn test_out_of_range_answer_lists_no_blank_text() {
        let mut engine = engine_with(Card::single_choice(1, "Q", &["a", "b"], 7), vec![0, 1]);
        engine.select_choice(0);

        let card = engine.view().card.unwrap();
        assert_eq!(card.banner, Some(Banner::Wrong));
        assert!(card.correct_answers.is_empty());
    }

    #[test]
    fn test_multi_correct_answers_skip_missing_choices() {
        let mut engine = engine_with(
            Card::multi_choice(1, "Q", &["<i>a</i>", "b"], &[0, 5]),
            vec![0, 1],
        );
        engine.apply(crate::session::engine::SessionCommand::SetAllowHtml { allow: true });
        engine.toggle_multi_choice(1);
        engine.check_multi();

        let card = engine.view().card.unwrap();
        assert_eq!(card.banner, Some(Banner::Wrong));
        assert_eq!(card.correct_answers, vec!["<i>a</i>".to_string()]);
    }
}
