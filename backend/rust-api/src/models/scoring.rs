use serde::{Deserialize, Serialize};

use super::answer::AnswerValue;
use super::field::FieldType;

/// Grading outcome for one question that declares a correct answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub field_id: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub user_answer: Option<AnswerValue>,
    pub correct_answer: Option<AnswerValue>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringResult {
    pub per_question: Vec<QuestionResult>,
    pub total_questions: u32,
    pub correct_count: u32,
    /// Rounded percentage in 0..=100; 0 when nothing was graded.
    pub score_percent: u8,
}

impl ScoringResult {
    pub fn empty() -> Self {
        Self {
            per_question: Vec::new(),
            total_questions: 0,
            correct_count: 0,
            score_percent: 0,
        }
    }

    pub fn question(&self, field_id: &str) -> Option<&QuestionResult> {
        self.per_question.iter().find(|q| q.field_id == field_id)
    }
}

/// Score bands used when presenting a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Pass,
    Borderline,
    Fail,
}

impl ScoreBand {
    pub fn for_percent(percent: u8) -> Self {
        match percent {
            80.. => ScoreBand::Pass,
            60..=79 => ScoreBand::Borderline,
            _ => ScoreBand::Fail,
        }
    }
}

/// Response body for a graded submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResultResponse {
    pub submission_id: String,
    pub form_id: String,
    pub band: ScoreBand,
    #[serde(flatten)]
    pub result: ScoringResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(ScoreBand::for_percent(100), ScoreBand::Pass);
        assert_eq!(ScoreBand::for_percent(80), ScoreBand::Pass);
        assert_eq!(ScoreBand::for_percent(79), ScoreBand::Borderline);
        assert_eq!(ScoreBand::for_percent(60), ScoreBand::Borderline);
        assert_eq!(ScoreBand::for_percent(0), ScoreBand::Fail);
    }
}
