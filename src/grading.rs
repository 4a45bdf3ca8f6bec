//! Answer comparison and scoring.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Question id -> correct choice letter. Fixed for the whole run.
pub type AnswerKey = BTreeMap<String, String>;

/// Question id -> choice letter detected by the backend.
pub type SubmittedAnswers = BTreeMap<String, String>;

/// What the backend reports for a question it could not read.
pub const UNREADABLE_MARK: &str = "?";

/// Grading of one detected question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub submitted: String,
    /// `None` when the answer key has no entry for this question
    pub correct: Option<String>,
    pub is_match: bool,
}

impl QuestionOutcome {
    pub fn is_unreadable(&self) -> bool {
        self.submitted == UNREADABLE_MARK
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingResult {
    pub per_question: BTreeMap<String, QuestionOutcome>,
    pub score: u32,
    /// Number of questions the backend detected, not the size of the key
    pub total: u32,
    /// `round(score / total * 100)`, 0 when nothing was detected
    pub percentage: u32,
}

impl GradingResult {
    /// Outcomes in natural question order (Q2 before Q10).
    pub fn ordered(&self) -> Vec<(&str, &QuestionOutcome)> {
        let mut rows: Vec<(&str, &QuestionOutcome)> = self
            .per_question
            .iter()
            .map(|(q, outcome)| (q.as_str(), outcome))
            .collect();
        rows.sort_by(|a, b| compare_question_ids(a.0, b.0));
        rows
    }
}

/// Grades every detected question against the key.
///
/// Questions missing from the key are graded incorrect. Questions in the key
/// that the backend did not detect are not counted.
pub fn grade(correct: &AnswerKey, submitted: &SubmittedAnswers) -> GradingResult {
    let per_question: BTreeMap<String, QuestionOutcome> = submitted
        .iter()
        .map(|(question, answer)| {
            let expected = correct.get(question).cloned();
            let is_match = expected.as_deref() == Some(answer.as_str());
            (
                question.clone(),
                QuestionOutcome {
                    submitted: answer.clone(),
                    correct: expected,
                    is_match,
                },
            )
        })
        .collect();

    let score = per_question.values().filter(|o| o.is_match).count() as u32;
    let total = per_question.len() as u32;

    GradingResult {
        per_question,
        score,
        total,
        percentage: rounded_percentage(score, total),
    }
}

/// `round(score * 100 / total)` with halves rounded up, in integer arithmetic.
fn rounded_percentage(score: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (score, total) = (score as u64, total as u64);
    ((score * 200 + total) / (total * 2)) as u32
}

fn question_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\D*)(\d+)$").expect("valid question id pattern"))
}

/// Orders ids by text prefix, then numeric suffix. Ids without a numeric
/// suffix sort after numbered ids with the same prefix.
pub fn compare_question_ids(a: &str, b: &str) -> Ordering {
    let split = |id: &str| -> (String, Option<u64>) {
        match question_id_pattern().captures(id) {
            Some(caps) => (caps[1].to_string(), caps[2].parse().ok()),
            None => (id.to_string(), None),
        }
    };

    let (prefix_a, num_a) = split(a);
    let (prefix_b, num_b) = split(b);

    prefix_a
        .cmp(&prefix_b)
        .then_with(|| match (num_a, num_b) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.cmp(b))
}
