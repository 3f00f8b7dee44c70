use flashcards_lib::session::{Banner, CardKind, CardView, ChoiceView, SessionView};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Render a study session snapshot to terminal text
pub fn render_view(view: &SessionView, use_color: bool) -> String {
    let mut lines = Vec::new();

    let Some(card) = &view.card else {
        lines.push("No cards to study.".to_string());
        return lines.join("\n");
    };

    let mut status = vec![view.position.clone()];
    if view.reveal_pending {
        status.push("timer running".to_string());
    }
    if view.auto_advance_pending {
        status.push("next card soon".to_string());
    }
    lines.push(paint(
        &format!("[{}]  {}", status.join(", "), kind_label(card.kind)),
        Color::GRAY,
        use_color,
    ));
    lines.push(String::new());
    lines.push(paint(&card_text(card, &card.front), Color::BOLD, use_color));
    lines.push(String::new());

    if let Some(back) = &card.back {
        lines.push(paint(&card_text(card, back), Color::CYAN, use_color));
        lines.push(String::new());
    }

    for choice in &card.choices {
        lines.push(render_choice(card, choice, use_color));
    }
    if !card.choices.is_empty() {
        lines.push(String::new());
    }

    if let Some(banner) = card.banner {
        let color = match banner {
            Banner::Correct => Color::GREEN,
            Banner::Wrong => Color::RED,
            Banner::TimesUp => Color::YELLOW,
        };
        lines.push(paint(banner.text(), color, use_color));
    }
    if !card.correct_answers.is_empty() {
        let answers: Vec<String> = card
            .correct_answers
            .iter()
            .map(|a| card_text(card, a))
            .collect();
        lines.push(format!("Answer: {}", answers.join(", ")));
    }

    lines.join("\n")
}

/// One-line help for the keys the current card accepts
pub fn key_help(view: &SessionView) -> &'static str {
    match view.card.as_ref().map(|c| c.kind) {
        None => "q quit",
        Some(CardKind::Basic) => "[enter] flip/next  n next  p prev  s shuffle  t timer  a auto  q quit",
        Some(CardKind::SingleChoice) => "1-9 answer  n next  p prev  s shuffle  t timer  a auto  q quit",
        Some(CardKind::MultiChoice) => {
            "1-9 toggle  c check  n next  p prev  s shuffle  t timer  a auto  q quit"
        }
    }
}

fn kind_label(kind: CardKind) -> &'static str {
    match kind {
        CardKind::Basic => "basic",
        CardKind::SingleChoice => "choose one",
        CardKind::MultiChoice => "choose all that apply",
    }
}

fn render_choice(card: &CardView, choice: &ChoiceView, use_color: bool) -> String {
    let marker = match card.kind {
        CardKind::MultiChoice if choice.selected => "[x]",
        CardKind::MultiChoice => "[ ]",
        _ if choice.selected => "(*)",
        _ => "( )",
    };
    let line = format!(
        "  {} {} {}",
        choice.index + 1,
        marker,
        card_text(card, &choice.text)
    );

    if choice.correct {
        paint(&line, Color::GREEN, use_color)
    } else if choice.wrong {
        paint(&line, Color::RED, use_color)
    } else if choice.disabled {
        paint(&line, Color::DIM, use_color)
    } else {
        line
    }
}

fn card_text(card: &CardView, text: &str) -> String {
    if card.html {
        strip_html(text)
    } else {
        text.to_string()
    }
}

/// Strip HTML tags and decode entities
fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;

    for ch in html.chars() {
        if ch == '<' {
            in_tag = true;
        } else if ch == '>' {
            in_tag = false;
        } else if !in_tag {
            result.push(ch);
        }
    }

    html_escape::decode_html_entities(&result).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(index: usize, text: &str) -> ChoiceView {
        ChoiceView {
            index,
            text: text.to_string(),
            selected: false,
            correct: false,
            wrong: false,
            disabled: false,
        }
    }

    #[test]
    fn test_empty_session() {
        assert_eq!(render_view(&SessionView::default(), false), "No cards to study.");
    }

    #[test]
    fn test_wrong_answer_lists_correct_choice() {
        let mut picked = choice(0, "Rome");
        picked.selected = true;
        picked.wrong = true;
        let view = SessionView {
            card: Some(CardView {
                id: 1,
                kind: CardKind::SingleChoice,
                front: "Capital of France?".to_string(),
                back: None,
                choices: vec![picked, choice(1, "Paris")],
                can_check: false,
                banner: Some(Banner::Wrong),
                correct_answers: vec!["Paris".to_string()],
                html: false,
            }),
            position: "1 / 3".to_string(),
            reveal_pending: false,
            auto_advance_pending: false,
        };

        let text = render_view(&view, false);
        assert!(text.contains("  1 (*) Rome"));
        assert!(text.contains("  2 ( ) Paris"));
        assert!(text.contains("Wrong."));
        assert!(text.contains("Answer: Paris"));
    }

    #[test]
    fn test_html_text_is_stripped() {
        assert_eq!(strip_html("<b>Tom &amp; Jerry</b><br>"), "Tom & Jerry");
    }
}
