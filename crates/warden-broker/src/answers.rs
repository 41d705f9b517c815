//! Turning a human's answers into the text the agent reads.
//!
//! Answers travel back as the reason of a `deny` decision: the agent's
//! native question prompt is skipped and the reason carries the answers.

use std::collections::BTreeMap;

use warden_core::Question;

const PREAMBLE: &str = "The user answered through the approval channel:";

/// Format the answer to one question.
#[must_use]
pub fn single_answer(question: &Question, answer: &str) -> String {
    format!("{PREAMBLE}\n\n{}\n→ {}", question.question, answer.trim())
}

/// Format every question's recorded answer.
///
/// # Errors
///
/// Returns the indexes of questions without an answer.
pub fn collected_answers(
    questions: &[Question],
    selections: &BTreeMap<usize, Vec<String>>,
) -> Result<String, Vec<usize>> {
    let missing: Vec<usize> = (0..questions.len())
        .filter(|i| selections.get(i).is_none_or(Vec::is_empty))
        .collect();
    if !missing.is_empty() {
        return Err(missing);
    }

    let mut out = PREAMBLE.to_owned();
    for (i, q) in questions.iter().enumerate() {
        let picked = selections.get(&i).map(|v| v.join(", ")).unwrap_or_default();
        out.push_str("\n\n");
        out.push_str(&q.question);
        out.push_str("\n→ ");
        out.push_str(&picked);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(text: &str) -> Question {
        Question {
            question: text.into(),
            header: None,
            options: Vec::new(),
            multi_select: false,
        }
    }

    #[test]
    fn single() {
        let text = single_answer(&q("Proceed?"), " Yes ");
        assert_eq!(
            text,
            "The user answered through the approval channel:\n\nProceed?\n→ Yes"
        );
    }

    #[test]
    fn collected_in_question_order() {
        let questions = [q("Language?"), q("Features?")];
        let mut sel = BTreeMap::new();
        sel.insert(1, vec!["a".to_owned(), "b".to_owned()]);
        sel.insert(0, vec!["Rust".to_owned()]);
        let text = collected_answers(&questions, &sel).unwrap();
        assert!(text.ends_with("Language?\n→ Rust\n\nFeatures?\n→ a, b"));
    }

    #[test]
    fn missing_answers_are_reported() {
        let questions = [q("A?"), q("B?"), q("C?")];
        let mut sel = BTreeMap::new();
        sel.insert(1, vec!["x".to_owned()]);
        sel.insert(2, Vec::new());
        assert_eq!(collected_answers(&questions, &sel).unwrap_err(), vec![0, 2]);
    }
}
