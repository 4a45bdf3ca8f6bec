//! Display model for a graded sheet.
//!
//! Shared by the window and the headless mode so both show the same rows
//! in the same order.

use crate::grading::GradingResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultRow {
    pub question: String,
    pub submitted: String,
    pub correct: Option<String>,
    pub is_match: bool,
    pub unreadable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultView {
    pub rows: Vec<ResultRow>,
    pub score: u32,
    pub total: u32,
    pub percentage: u32,
    pub marked_image: String,
}

impl ResultView {
    pub fn new(result: &GradingResult, marked_image: &str) -> Self {
        let rows = result
            .ordered()
            .into_iter()
            .map(|(question, outcome)| ResultRow {
                question: question.to_string(),
                submitted: outcome.submitted.clone(),
                correct: outcome.correct.clone(),
                is_match: outcome.is_match,
                unreadable: outcome.is_unreadable(),
            })
            .collect();

        Self {
            rows,
            score: result.score,
            total: result.total,
            percentage: result.percentage,
            marked_image: marked_image.to_string(),
        }
    }

    pub fn summary(&self) -> String {
        format!("Score: {}/{} ({}%)", self.score, self.total, self.percentage)
    }

    /// Progress bar fill, 0.0 to 1.0.
    pub fn fraction(&self) -> f32 {
        self.percentage as f32 / 100.0
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.summary());
        out.push('\n');

        if self.rows.is_empty() {
            out.push_str("No questions were detected on the sheet.\n");
        }

        for row in &self.rows {
            let line = if row.is_match {
                format!("  {:<6} {:<2} correct", row.question, row.submitted)
            } else {
                let expected = row.correct.as_deref().unwrap_or("-");
                let note = if row.unreadable { " unreadable," } else { "" };
                format!(
                    "  {:<6} {:<2} wrong,{} correct: {}",
                    row.question, row.submitted, note, expected
                )
            };
            out.push_str(&line);
            out.push('\n');
        }

        out.push_str(&format!("Marked sheet: {}\n", self.marked_image));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{grade, AnswerKey, SubmittedAnswers};

    fn map(pairs: &[(&str, &str)]) -> AnswerKey {
        pairs
            .iter()
            .map(|(q, a)| (q.to_string(), a.to_string()))
            .collect()
    }

    #[test]
    fn test_rows_follow_question_order() {
        let key = map(&[("Q1", "B"), ("Q2", "C"), ("Q10", "A")]);
        let submitted: SubmittedAnswers = map(&[("Q10", "A"), ("Q2", "?"), ("Q1", "D")]);

        let view = ResultView::new(&grade(&key, &submitted), "http://h/marked");

        let order: Vec<&str> = view.rows.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(order, vec!["Q1", "Q2", "Q10"]);
        assert!(view.rows[1].unreadable);
        assert!(view.rows[2].is_match);
        assert_eq!(view.summary(), "Score: 1/3 (33%)");
        assert!((view.fraction() - 0.33).abs() < 1e-6);
    }

    #[test]
    fn test_render_text() {
        let key = map(&[("Q1", "B")]);
        let submitted = map(&[("Q1", "B"), ("Q99", "A")]);

        let text = ResultView::new(&grade(&key, &submitted), "http://h/marked").render_text();

        assert!(text.starts_with("Score: 1/2 (50%)\n"));
        assert!(text.contains("Q1     B  correct"));
        assert!(text.contains("Q99    A  wrong, correct: -"));
        assert!(text.ends_with("Marked sheet: http://h/marked\n"));
    }

    #[test]
    fn test_render_empty() {
        let view = ResultView::new(&grade(&AnswerKey::new(), &SubmittedAnswers::new()), "x");
        assert!(view.render_text().contains("No questions were detected"));
        assert_eq!(view.summary(), "Score: 0/0 (0%)");
    }
}
