use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::{parse_object_id, AppError, AppResult};
use crate::models::quiz::{Answer, AttemptStatus, Grade, Quiz, QuizAttempt, SubmittedAnswer};

/// Percentage required to pass a quiz
pub const PASS_PERCENTAGE: f64 = 70.0;

/// Scores every submitted answer against the quiz's question bank.
///
/// Fails on the first answer that references an unknown question or repeats a
/// question already answered, so callers never see a partial result.
pub fn score_answers(quiz: &Quiz, submitted: &[SubmittedAnswer]) -> AppResult<Vec<Answer>> {
    let mut seen = HashSet::with_capacity(submitted.len());
    let mut answers = Vec::with_capacity(submitted.len());

    for entry in submitted {
        let question_id = parse_object_id(&entry.question_id, "question")?;
        let question = quiz.question(&question_id).ok_or_else(|| {
            AppError::invalid_input(format!("Question {} not found", entry.question_id))
        })?;

        if !seen.insert(question_id) {
            return Err(AppError::invalid_input(format!(
                "Question {} answered more than once",
                entry.question_id
            )));
        }

        let is_correct = question.correct_answer == entry.selected_answer;
        answers.push(Answer {
            question_id,
            selected_answer: entry.selected_answer,
            is_correct,
            points_earned: if is_correct { question.points } else { 0 },
            time_spent: entry.time_spent,
        });
    }

    Ok(answers)
}

/// Recomputes score, counts, percentage, grade and pass flag from `answers`
pub fn refresh_aggregates(attempt: &mut QuizAttempt) {
    attempt.score = attempt.answers.iter().map(|a| a.points_earned).sum();
    attempt.correct_answers = attempt.answers.iter().filter(|a| a.is_correct).count() as u32;
    attempt.total_questions = attempt.answers.len() as u32;

    attempt.percentage = if attempt.total_questions == 0 {
        0.0
    } else {
        (f64::from(attempt.correct_answers) / f64::from(attempt.total_questions) * 100.0).round()
    };

    attempt.grade = Some(Grade::from_percentage(attempt.percentage));
    attempt.is_passed = attempt.percentage >= PASS_PERCENTAGE;
}

/// Moves an in-progress attempt to completed with the scored answers
pub fn finalize_attempt(
    attempt: &mut QuizAttempt,
    quiz: &Quiz,
    answers: Vec<Answer>,
    time_spent: u32,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if attempt.status == AttemptStatus::Completed {
        return Err(AppError::conflict("Quiz already completed"));
    }

    attempt.answers = answers;
    attempt.time_spent = time_spent;
    attempt.total_points = quiz.total_points;
    attempt.status = AttemptStatus::Completed;
    attempt.completed_at = Some(now);
    refresh_aggregates(attempt);
    Ok(())
}
