// src/generation/schema.rs

//! Strict shape of the curriculum document the content generator must
//! return, and its conversion into a persistable [`NewCurriculum`].
//!
//! Required fields are modelled as `Option` so that a missing field produces
//! a precise `invalid_schema` message instead of a bare serde error.

use std::collections::HashSet;

use serde::Deserialize;

use crate::{
    config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PASSING_SCORE},
    error::{GenerationFailure, TrackError},
    generation::GenerationRequest,
    models::{
        quiz::{NewQuestion, NewQuiz, QuestionType},
        track::{Difficulty, NewCurriculum, NewDay},
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumDocument {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    pub days: Option<Vec<DayDocument>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayDocument {
    pub day_number: Option<i64>,
    #[serde(alias = "title")]
    pub topic: Option<String>,
    pub content: Option<String>,
    pub quiz: Option<QuizField>,
}

/// Generators sometimes return a day's quiz as a bare list of questions.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QuizField {
    Questions(Vec<QuestionDocument>),
    Full(QuizDocument),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDocument {
    pub title: Option<String>,
    pub passing_score: Option<i64>,
    pub allow_retakes: Option<bool>,
    pub max_attempts: Option<i64>,
    pub questions: Option<Vec<QuestionDocument>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDocument {
    #[serde(alias = "question")]
    pub question_text: Option<String>,
    #[serde(alias = "type")]
    pub question_type: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(alias = "answer")]
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
}

fn invalid(detail: impl Into<String>) -> TrackError {
    TrackError::generation(GenerationFailure::InvalidSchema, detail)
}

fn required(value: Option<String>, path: &str) -> Result<String, TrackError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(invalid(format!("missing {}", path))),
    }
}

/// Parses raw generator output. Anything that is not a JSON object of the
/// expected shape is `invalid_schema`; blank output is `empty_result`.
pub fn parse_document(raw: &str) -> Result<CurriculumDocument, TrackError> {
    if raw.trim().is_empty() {
        return Err(TrackError::generation(
            GenerationFailure::EmptyResult,
            "generator returned an empty response",
        ));
    }
    serde_json::from_str(raw).map_err(|e| invalid(format!("response is not a curriculum document: {}", e)))
}

impl CurriculumDocument {
    /// Validates and normalises the document. Never repairs it: any
    /// violation rejects the whole curriculum.
    pub fn into_curriculum(self, request: &GenerationRequest) -> Result<NewCurriculum, TrackError> {
        let title = required(self.title, "title")?;
        let description = required(self.description, "description")?;

        let difficulty_raw = required(self.difficulty, "difficulty")?;
        let difficulty = Difficulty::parse(&difficulty_raw)
            .ok_or_else(|| invalid(format!("unknown difficulty '{}'", difficulty_raw)))?;
        if difficulty != request.difficulty {
            return Err(invalid(format!(
                "difficulty '{}' does not match requested '{}'",
                difficulty, request.difficulty
            )));
        }

        let days = match self.days {
            Some(days) if !days.is_empty() => days,
            _ => {
                return Err(TrackError::generation(
                    GenerationFailure::EmptyResult,
                    "curriculum has no days",
                ));
            }
        };
        if days.len() as i64 != request.total_days {
            return Err(invalid(format!(
                "expected {} days, got {}",
                request.total_days,
                days.len()
            )));
        }

        let mut days = days
            .into_iter()
            .enumerate()
            .map(|(i, day)| day.into_new_day(i))
            .collect::<Result<Vec<_>, _>>()?;
        days.sort_by_key(|d| d.day_number);
        for (i, day) in days.iter().enumerate() {
            if day.day_number != i as i64 + 1 {
                return Err(invalid(format!(
                    "day numbers must run 1..={} without gaps or duplicates",
                    request.total_days
                )));
            }
        }

        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| request.topic.clone());

        let learning_objectives = self
            .learning_objectives
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(NewCurriculum {
            title,
            description,
            category,
            difficulty,
            learning_objectives,
            days,
        })
    }
}

impl DayDocument {
    fn into_new_day(self, index: usize) -> Result<NewDay, TrackError> {
        let path = format!("days[{}]", index);
        let day_number = self
            .day_number
            .ok_or_else(|| invalid(format!("missing {}.dayNumber", path)))?;
        let topic = required(self.topic, &format!("{}.topic", path))?;
        let content = required(self.content, &format!("{}.content", path))?;
        let content = ammonia::clean(&content).trim().to_string();
        if content.is_empty() {
            return Err(invalid(format!("{}.content is empty after sanitising", path)));
        }

        let quiz = match self.quiz {
            Some(QuizField::Full(quiz)) => quiz,
            Some(QuizField::Questions(questions)) => QuizDocument {
                title: None,
                passing_score: None,
                allow_retakes: None,
                max_attempts: None,
                questions: Some(questions),
            },
            None => return Err(invalid(format!("missing {}.quiz", path))),
        };

        Ok(NewDay {
            day_number,
            quiz: quiz.into_new_quiz(&path, day_number)?,
            topic,
            content,
        })
    }
}

impl QuizDocument {
    fn into_new_quiz(self, day_path: &str, day_number: i64) -> Result<NewQuiz, TrackError> {
        let passing_score = self.passing_score.unwrap_or(DEFAULT_PASSING_SCORE);
        if !(0..=100).contains(&passing_score) {
            return Err(invalid(format!(
                "{}.quiz.passingScore {} is outside 0..=100",
                day_path, passing_score
            )));
        }
        let max_attempts = self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts < 1 {
            return Err(invalid(format!(
                "{}.quiz.maxAttempts must be at least 1",
                day_path
            )));
        }

        let questions = self.questions.unwrap_or_default();
        if questions.is_empty() {
            return Err(invalid(format!("{}.quiz has no questions", day_path)));
        }
        let questions = questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| q.into_new_question(&format!("{}.quiz.questions[{}]", day_path, i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewQuiz {
            title: self
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Day {} Quiz", day_number)),
            passing_score,
            allow_retakes: self.allow_retakes.unwrap_or(true),
            max_attempts,
            questions,
        })
    }
}

fn parse_question_type(raw: Option<&str>) -> Option<QuestionType> {
    match raw.map(|r| r.trim().to_ascii_lowercase().replace('-', "_")) {
        None => Some(QuestionType::MultipleChoice),
        Some(r) => match r.as_str() {
            "multiple_choice" | "mcq" => Some(QuestionType::MultipleChoice),
            "true_false" => Some(QuestionType::TrueFalse),
            "fill_blank" => Some(QuestionType::FillBlank),
            _ => None,
        },
    }
}

impl QuestionDocument {
    fn into_new_question(self, path: &str) -> Result<NewQuestion, TrackError> {
        let question_text = required(self.question_text, &format!("{}.questionText", path))?;
        let mut correct_answer = required(self.correct_answer, &format!("{}.correctAnswer", path))?;
        let explanation = required(self.explanation, &format!("{}.explanation", path))?;
        let question_type = parse_question_type(self.question_type.as_deref())
            .ok_or_else(|| invalid(format!("{}.type is not a supported question type", path)))?;

        let options: Vec<String> = match question_type {
            QuestionType::MultipleChoice => {
                let options: Vec<String> = self.options.iter().map(|o| o.trim().to_string()).collect();
                if options.len() < 2 || options.iter().any(|o| o.is_empty()) {
                    return Err(invalid(format!(
                        "{}.options needs at least two non-empty options",
                        path
                    )));
                }
                let unique: HashSet<&String> = options.iter().collect();
                if unique.len() != options.len() {
                    return Err(invalid(format!("{}.options contains duplicates", path)));
                }
                if !options.contains(&correct_answer) {
                    return Err(invalid(format!(
                        "{}.correctAnswer '{}' is not one of its options",
                        path, correct_answer
                    )));
                }
                options
            }
            QuestionType::TrueFalse => {
                correct_answer = correct_answer.to_ascii_lowercase();
                if correct_answer != "true" && correct_answer != "false" {
                    return Err(invalid(format!(
                        "{}.correctAnswer must be 'true' or 'false'",
                        path
                    )));
                }
                vec!["true".to_string(), "false".to_string()]
            }
            QuestionType::FillBlank => Vec::new(),
        };

        Ok(NewQuestion {
            question_text,
            question_type,
            options,
            correct_answer,
            explanation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(days: i64) -> GenerationRequest {
        GenerationRequest {
            topic: "Budgeting".into(),
            difficulty: Difficulty::Beginner,
            total_days: days,
        }
    }

    fn day(n: i64) -> serde_json::Value {
        json!({
            "dayNumber": n,
            "topic": format!("Topic {}", n),
            "content": format!("Lesson {} <script>alert(1)</script><b>body</b>", n),
            "quiz": {
                "questions": [{
                    "questionText": "Pick A",
                    "options": ["A", "B"],
                    "correctAnswer": "A",
                    "explanation": "A is right"
                }]
            }
        })
    }

    fn doc(days: Vec<serde_json::Value>) -> String {
        json!({
            "title": "Budgeting Basics",
            "description": "Learn to budget",
            "difficulty": "beginner",
            "days": days
        })
        .to_string()
    }

    fn validate(raw: &str, days: i64) -> Result<NewCurriculum, TrackError> {
        parse_document(raw)?.into_curriculum(&request(days))
    }

    fn reason(err: TrackError) -> GenerationFailure {
        match err {
            TrackError::Generation { reason, .. } => reason,
            other => panic!("expected generation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_document_is_normalised() {
        let curriculum = validate(&doc(vec![day(2), day(1)]), 2).unwrap();
        assert_eq!(curriculum.category, "Budgeting");
        assert_eq!(curriculum.days[0].day_number, 1);
        assert_eq!(curriculum.days[0].quiz.passing_score, 70);
        assert_eq!(curriculum.days[0].quiz.max_attempts, 3);
        assert!(curriculum.days[0].quiz.allow_retakes);
        assert!(!curriculum.days[0].content.contains("<script>"));
        assert!(curriculum.days[0].content.contains("<b>body</b>"));
    }

    #[test]
    fn test_correct_answer_outside_options_is_rejected() {
        let mut bad = day(1);
        bad["quiz"]["questions"][0]["correctAnswer"] = json!("Z");
        let err = validate(&doc(vec![bad]), 1).unwrap_err();
        assert_eq!(reason(err), GenerationFailure::InvalidSchema);
    }

    #[test]
    fn test_gap_in_day_numbers_is_rejected() {
        let err = validate(&doc(vec![day(1), day(3)]), 2).unwrap_err();
        assert_eq!(reason(err), GenerationFailure::InvalidSchema);
    }

    #[test]
    fn test_duplicate_day_numbers_are_rejected() {
        let err = validate(&doc(vec![day(1), day(1)]), 2).unwrap_err();
        assert_eq!(reason(err), GenerationFailure::InvalidSchema);
    }

    #[test]
    fn test_day_count_must_match_request() {
        let err = validate(&doc(vec![day(1), day(2)]), 3).unwrap_err();
        assert_eq!(reason(err), GenerationFailure::InvalidSchema);
    }

    #[test]
    fn test_not_json_is_invalid_schema() {
        let err = validate("Here is your track: ```json {}```", 1).unwrap_err();
        assert_eq!(reason(err), GenerationFailure::InvalidSchema);
    }

    #[test]
    fn test_blank_and_dayless_responses_are_empty_results() {
        assert_eq!(reason(validate("   ", 1).unwrap_err()), GenerationFailure::EmptyResult);
        assert_eq!(
            reason(validate(&doc(vec![]), 1).unwrap_err()),
            GenerationFailure::EmptyResult
        );
    }

    #[test]
    fn test_difficulty_mismatch_is_rejected() {
        let raw = json!({
            "title": "T",
            "description": "D",
            "difficulty": "advanced",
            "days": [day(1)]
        })
        .to_string();
        assert_eq!(reason(validate(&raw, 1).unwrap_err()), GenerationFailure::InvalidSchema);
    }

    #[test]
    fn test_question_list_and_answer_aliases_are_accepted() {
        let raw = json!({
            "title": "T",
            "description": "D",
            "difficulty": "Beginner",
            "days": [{
                "dayNumber": 1,
                "topic": "Saving",
                "content": "Save first.",
                "quiz": [{
                    "question": "Is saving good?",
                    "type": "true_false",
                    "answer": "True",
                    "explanation": "Yes"
                }]
            }]
        })
        .to_string();
        let curriculum = validate(&raw, 1).unwrap();
        let question = &curriculum.days[0].quiz.questions[0];
        assert_eq!(question.question_type, QuestionType::TrueFalse);
        assert_eq!(question.correct_answer, "true");
        assert_eq!(question.options, vec!["true", "false"]);
    }

    #[test]
    fn test_passing_score_out_of_range_is_rejected() {
        let mut bad = day(1);
        bad["quiz"]["passingScore"] = json!(120);
        assert_eq!(
            reason(validate(&doc(vec![bad]), 1).unwrap_err()),
            GenerationFailure::InvalidSchema
        );
    }
}
