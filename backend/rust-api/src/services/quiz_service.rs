use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use validator::Validate;

use super::quiz_scoring::{finalize_attempt, score_answers, PASS_PERCENTAGE};
use crate::error::{AppError, AppResult};
use crate::metrics::QUIZ_SUBMISSIONS_TOTAL;
use crate::models::quiz::{
    AttemptStarted, AttemptStatus, AvailableQuiz, AvailableQuizzes, CompletedQuiz,
    CreateQuizRequest, DetailedAnswer, Question, Quiz, QuizAttempt, QuizForTaking, QuizResult,
    QuizStats, RecentAttempt, SubmitQuizRequest, UserQuizStats,
};
use crate::models::round2;
use crate::store::QuizStore;

const RECENT_ATTEMPTS: usize = 5;

pub struct QuizService {
    quizzes: Arc<dyn QuizStore>,
}

impl QuizService {
    pub fn new(quizzes: Arc<dyn QuizStore>) -> Self {
        Self { quizzes }
    }

    async fn load_quiz(&self, quiz_id: &ObjectId) -> AppResult<Quiz> {
        self.quizzes
            .find_quiz(quiz_id)
            .await?
            .ok_or_else(|| AppError::not_found("Quiz not found"))
    }

    pub async fn create_quiz(
        &self,
        creator: ObjectId,
        req: CreateQuizRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Quiz> {
        req.validate()?;

        let mut questions = Vec::with_capacity(req.questions.len());
        for (index, q) in req.questions.into_iter().enumerate() {
            if q.correct_answer >= q.options.len() {
                return Err(AppError::invalid_input(format!(
                    "Question {}: correct answer index {} is out of range",
                    index + 1,
                    q.correct_answer
                )));
            }
            if q.options.iter().any(|o| o.trim().is_empty()) {
                return Err(AppError::invalid_input(format!(
                    "Question {}: options cannot be empty",
                    index + 1
                )));
            }

            questions.push(Question {
                id: ObjectId::new(),
                question: q.question,
                options: q.options,
                correct_answer: q.correct_answer,
                explanation: q.explanation,
                points: q.points.unwrap_or(10),
                category: q.category.unwrap_or(req.category),
            });
        }

        let mut quiz = Quiz {
            id: ObjectId::new(),
            title: req.title,
            description: req.description,
            category: req.category,
            difficulty: req.difficulty.unwrap_or_default(),
            questions,
            total_questions: 0,
            total_points: 0,
            estimated_time: req.estimated_time.unwrap_or(10),
            is_active: true,
            created_by: creator,
            tags: req.tags,
            created_at: now,
            updated_at: now,
        };
        quiz.refresh_totals();

        self.quizzes.insert_quiz(&quiz).await?;
        tracing::info!(
            quiz_id = %quiz.id,
            questions = quiz.total_questions,
            "Quiz created"
        );
        Ok(quiz)
    }

    pub async fn delete_quiz(&self, quiz_id: &ObjectId) -> AppResult<()> {
        if !self.quizzes.delete_quiz(quiz_id).await? {
            return Err(AppError::not_found("Quiz not found"));
        }
        Ok(())
    }

    /// Quiz without its answer key, with the caller's previous attempt if any
    pub async fn quiz_for_taking(
        &self,
        user: &ObjectId,
        quiz_id: &ObjectId,
    ) -> AppResult<QuizForTaking> {
        let quiz = self.load_quiz(quiz_id).await?;
        if !quiz.is_active {
            return Err(AppError::not_found("Quiz not found"));
        }

        let attempt = self.quizzes.find_attempt(user, quiz_id).await?;
        Ok(QuizForTaking::build(quiz, attempt.as_ref()))
    }

    /// Active quizzes the user has not completed, plus the completed ones
    pub async fn available(&self, user: &ObjectId) -> AppResult<AvailableQuizzes> {
        let quizzes = self.quizzes.active_quizzes().await?;
        let attempts = self.quizzes.completed_attempts_for_user(user).await?;

        let mut available = Vec::new();
        let mut completed = Vec::new();

        for quiz in &quizzes {
            match attempts.iter().find(|a| a.quiz == quiz.id) {
                None => available.push(AvailableQuiz::from(quiz)),
                Some(attempt) => completed.push(CompletedQuiz {
                    quiz_id: quiz.id.to_hex(),
                    title: quiz.title.clone(),
                    score: attempt.score,
                    grade: attempt.grade,
                    completed_at: attempt.completed_at,
                }),
            }
        }

        Ok(AvailableQuizzes {
            available,
            completed,
        })
    }

    /// Creates an in-progress attempt, or resumes the existing one
    pub async fn start(
        &self,
        user: ObjectId,
        quiz_id: &ObjectId,
        now: DateTime<Utc>,
    ) -> AppResult<AttemptStarted> {
        let quiz = self.load_quiz(quiz_id).await?;
        if !quiz.is_active {
            return Err(AppError::invalid_input("Quiz is not active"));
        }

        if let Some(existing) = self.quizzes.find_attempt(&user, quiz_id).await? {
            return resume(existing);
        }

        let attempt = QuizAttempt::start(user, &quiz, now);
        match self.quizzes.insert_attempt(&attempt).await {
            Ok(()) => {}
            Err(AppError::Conflict(_)) => {
                // Lost a race with a concurrent start for the same pair.
                let existing = self
                    .quizzes
                    .find_attempt(&user, quiz_id)
                    .await?
                    .ok_or_else(|| AppError::conflict("Quiz attempt already exists"))?;
                return resume(existing);
            }
            Err(err) => return Err(err),
        }

        tracing::info!(user_id = %user, quiz_id = %quiz_id, "Quiz attempt started");
        Ok(AttemptStarted {
            attempt_id: attempt.id.to_hex(),
            quiz_id: quiz_id.to_hex(),
            started_at: attempt.started_at,
            status: attempt.status,
            resumed: false,
        })
    }

    /// Scores and completes the user's attempt. All-or-nothing: the attempt is
    /// only written when every answer validates, and only the first of
    /// concurrent submissions is kept.
    pub async fn submit(
        &self,
        user: &ObjectId,
        quiz_id: &ObjectId,
        req: &SubmitQuizRequest,
        now: DateTime<Utc>,
    ) -> AppResult<QuizAttempt> {
        let quiz = self.load_quiz(quiz_id).await?;

        let mut attempt = self
            .quizzes
            .find_attempt(user, quiz_id)
            .await?
            .ok_or_else(|| AppError::invalid_input("No active quiz attempt found"))?;

        if attempt.status == AttemptStatus::Completed {
            return Err(AppError::conflict("Quiz already completed"));
        }

        let answers = score_answers(&quiz, &req.answers)?;
        finalize_attempt(&mut attempt, &quiz, answers, req.time_spent, now)?;

        if !self.quizzes.complete_attempt(&attempt).await? {
            return Err(AppError::conflict("Quiz already completed"));
        }

        if let Some(grade) = attempt.grade {
            QUIZ_SUBMISSIONS_TOTAL
                .with_label_values(&[grade.as_str()])
                .inc();
        }
        tracing::info!(
            user_id = %user,
            quiz_id = %quiz_id,
            score = attempt.score,
            percentage = attempt.percentage,
            passed = attempt.is_passed,
            "Quiz submitted"
        );

        Ok(attempt)
    }

    pub async fn results(
        &self,
        user: &ObjectId,
        quiz_id: &ObjectId,
        attempt_id: &ObjectId,
    ) -> AppResult<QuizResult> {
        let attempt = self
            .quizzes
            .find_attempt_by_id(attempt_id)
            .await?
            .filter(|a| &a.user == user && &a.quiz == quiz_id)
            .ok_or_else(|| AppError::not_found("Quiz attempt not found"))?;

        if attempt.status != AttemptStatus::Completed {
            return Err(AppError::invalid_input("Quiz attempt is not completed yet"));
        }

        let quiz = self.load_quiz(quiz_id).await?;
        Ok(detailed_result(&quiz, &attempt))
    }

    pub async fn user_stats(&self, user: &ObjectId) -> AppResult<UserQuizStats> {
        let attempts = self.quizzes.completed_attempts_for_user(user).await?;
        Ok(summarize_user_attempts(&attempts))
    }

    pub async fn quiz_stats(&self, quiz_id: &ObjectId) -> AppResult<QuizStats> {
        let quiz = self.load_quiz(quiz_id).await?;
        let attempts = self.quizzes.completed_attempts_for_quiz(quiz_id).await?;

        let total = attempts.len();
        let mean = |f: fn(&QuizAttempt) -> f64| {
            if total == 0 {
                0.0
            } else {
                round2(attempts.iter().map(f).sum::<f64>() / total as f64)
            }
        };

        Ok(QuizStats {
            quiz_id: quiz.id.to_hex(),
            title: quiz.title.clone(),
            category: quiz.category,
            difficulty: quiz.difficulty,
            total_attempts: total,
            average_score: mean(|a| f64::from(a.score)),
            average_percentage: mean(|a| a.percentage),
            highest_score: attempts.iter().map(|a| a.score).max().unwrap_or(0),
            average_time_spent: mean(|a| f64::from(a.time_spent)),
            pass_rate: mean(|a| if a.is_passed { 100.0 } else { 0.0 }),
        })
    }
}

fn resume(existing: QuizAttempt) -> AppResult<AttemptStarted> {
    if existing.status == AttemptStatus::Completed {
        return Err(AppError::conflict("Quiz already completed. Cannot retake."));
    }

    Ok(AttemptStarted {
        attempt_id: existing.id.to_hex(),
        quiz_id: existing.quiz.to_hex(),
        started_at: existing.started_at,
        status: existing.status,
        resumed: true,
    })
}

fn detailed_result(quiz: &Quiz, attempt: &QuizAttempt) -> QuizResult {
    let answers = attempt
        .answers
        .iter()
        .map(|answer| {
            let question = quiz.question(&answer.question_id);
            DetailedAnswer {
                question_id: answer.question_id.to_hex(),
                question: question.map(|q| q.question.clone()).unwrap_or_default(),
                selected_answer: answer.selected_answer,
                selected_option: question
                    .and_then(|q| q.options.get(answer.selected_answer).cloned()),
                correct_answer: question.map(|q| q.correct_answer).unwrap_or_default(),
                correct_option: question.and_then(|q| q.options.get(q.correct_answer).cloned()),
                is_correct: answer.is_correct,
                points_earned: answer.points_earned,
                points_possible: question.map(|q| q.points).unwrap_or_default(),
                explanation: question.map(|q| q.explanation.clone()).unwrap_or_default(),
                time_spent: answer.time_spent,
            }
        })
        .collect();

    QuizResult {
        attempt_id: attempt.id.to_hex(),
        quiz_id: quiz.id.to_hex(),
        quiz_title: quiz.title.clone(),
        score: attempt.score,
        total_points: attempt.total_points,
        percentage: attempt.percentage,
        correct_answers: attempt.correct_answers,
        total_questions: attempt.total_questions,
        grade: attempt.grade,
        is_passed: attempt.is_passed,
        time_spent: attempt.time_spent,
        completed_at: attempt.completed_at,
        answers,
    }
}

/// `attempts` must be completed attempts, most recent first
fn summarize_user_attempts(attempts: &[QuizAttempt]) -> UserQuizStats {
    let total = attempts.len();
    let (average_score, average_percentage) = if total == 0 {
        (0.0, 0.0)
    } else {
        let score: f64 = attempts.iter().map(|a| f64::from(a.score)).sum();
        let percentage: f64 = attempts.iter().map(|a| a.percentage).sum();
        (round2(score / total as f64), round2(percentage / total as f64))
    };

    UserQuizStats {
        total_attempts: total,
        average_score,
        average_percentage,
        highest_score: attempts.iter().map(|a| a.score).max().unwrap_or(0),
        total_time_spent: attempts.iter().map(|a| a.time_spent).sum(),
        passed_count: attempts
            .iter()
            .filter(|a| a.percentage >= PASS_PERCENTAGE)
            .count(),
        recent_attempts: attempts
            .iter()
            .take(RECENT_ATTEMPTS)
            .map(|a| RecentAttempt {
                attempt_id: a.id.to_hex(),
                quiz_id: a.quiz.to_hex(),
                score: a.score,
                percentage: a.percentage,
                grade: a.grade,
                completed_at: a.completed_at,
            })
            .collect(),
    }
}
