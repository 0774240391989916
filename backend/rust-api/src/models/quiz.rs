use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option, Difficulty};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum QuizCategory {
    #[default]
    #[serde(rename = "Carbon Footprint")]
    CarbonFootprint,
    Transportation,
    Food,
    Energy,
    Shopping,
    General,
}

fn default_points() -> u32 {
    10
}

fn default_estimated_time() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

/// Question embedded in a quiz document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub category: QuizCategory,
}

/// Quiz stored in MongoDB "quizzes" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub category: QuizCategory,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default = "default_estimated_time")]
    pub estimated_time: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_by: ObjectId,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    /// Recomputes `total_questions` and `total_points` from the question list
    pub fn refresh_totals(&mut self) {
        self.total_questions = self.questions.len() as u32;
        self.total_points = self.questions.iter().map(|q| q.points).sum();
    }

    pub fn question(&self, id: &ObjectId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    #[default]
    InProgress,
    Completed,
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Grade::A
        } else if percentage >= 80.0 {
            Grade::B
        } else if percentage >= 70.0 {
            Grade::C
        } else if percentage >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

/// Scored answer stored on an attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: ObjectId,
    pub selected_answer: usize,
    pub is_correct: bool,
    pub points_earned: u32,
    /// seconds
    #[serde(default)]
    pub time_spent: u32,
}

/// Attempt stored in MongoDB "quiz_attempts" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user: ObjectId,
    pub quiz: ObjectId,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub total_questions: u32,
    /// seconds
    #[serde(default)]
    pub time_spent: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub is_passed: bool,
    #[serde(default)]
    pub status: AttemptStatus,
    #[serde(with = "bson_datetime_as_chrono")]
    pub started_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizAttempt {
    pub fn start(user: ObjectId, quiz: &Quiz, now: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            user,
            quiz: quiz.id,
            answers: Vec::new(),
            score: 0,
            total_points: quiz.total_points,
            percentage: 0.0,
            correct_answers: 0,
            total_questions: 0,
            time_spent: 0,
            grade: None,
            is_passed: false,
            status: AttemptStatus::InProgress,
            started_at: now,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: String,
    pub selected_answer: usize,
    #[serde(default)]
    pub time_spent: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub time_spent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, message = "Question text is required"))]
    pub question: String,

    #[validate(length(min = 2, max = 6, message = "Questions need between 2 and 6 options"))]
    pub options: Vec<String>,

    pub correct_answer: usize,

    #[validate(length(min = 1, message = "Explanation is required"))]
    pub explanation: String,

    #[validate(range(min = 1, message = "Points must be at least 1"))]
    pub points: Option<u32>,

    pub category: Option<QuizCategory>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title must be between 1 and 100 characters"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 300,
        message = "Description must be between 1 and 300 characters"
    ))]
    pub description: String,

    pub category: QuizCategory,

    pub difficulty: Option<Difficulty>,

    #[validate(length(min = 1, message = "A quiz needs at least one question"), nested)]
    pub questions: Vec<CreateQuestionRequest>,

    #[validate(range(min = 1, message = "Estimated time must be at least 1 minute"))]
    pub estimated_time: Option<u32>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Question as shown to a quiz taker, without the answer key
#[derive(Debug, Serialize)]
pub struct QuestionForTaking {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub points: u32,
    pub category: QuizCategory,
}

#[derive(Debug, Serialize)]
pub struct AttemptSummary {
    pub id: String,
    pub score: u32,
    pub total_points: u32,
    pub percentage: f64,
    pub grade: Option<Grade>,
    pub is_passed: bool,
    pub status: AttemptStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&QuizAttempt> for AttemptSummary {
    fn from(attempt: &QuizAttempt) -> Self {
        AttemptSummary {
            id: attempt.id.to_hex(),
            score: attempt.score,
            total_points: attempt.total_points,
            percentage: attempt.percentage,
            grade: attempt.grade,
            is_passed: attempt.is_passed,
            status: attempt.status,
            completed_at: attempt.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuizForTaking {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: QuizCategory,
    pub difficulty: Difficulty,
    pub total_questions: u32,
    pub total_points: u32,
    pub estimated_time: u32,
    pub tags: Vec<String>,
    pub questions: Vec<QuestionForTaking>,
    pub has_attempted: bool,
    pub previous_attempt: Option<AttemptSummary>,
}

impl QuizForTaking {
    pub fn build(quiz: Quiz, attempt: Option<&QuizAttempt>) -> Self {
        QuizForTaking {
            id: quiz.id.to_hex(),
            title: quiz.title,
            description: quiz.description,
            category: quiz.category,
            difficulty: quiz.difficulty,
            total_questions: quiz.total_questions,
            total_points: quiz.total_points,
            estimated_time: quiz.estimated_time,
            tags: quiz.tags,
            questions: quiz
                .questions
                .into_iter()
                .map(|q| QuestionForTaking {
                    id: q.id.to_hex(),
                    question: q.question,
                    options: q.options,
                    points: q.points,
                    category: q.category,
                })
                .collect(),
            has_attempted: attempt.is_some(),
            previous_attempt: attempt.map(AttemptSummary::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttemptStarted {
    pub attempt_id: String,
    pub quiz_id: String,
    pub started_at: DateTime<Utc>,
    pub status: AttemptStatus,
    pub resumed: bool,
}

#[derive(Debug, Serialize)]
pub struct DetailedAnswer {
    pub question_id: String,
    pub question: String,
    pub selected_answer: usize,
    pub selected_option: Option<String>,
    pub correct_answer: usize,
    pub correct_option: Option<String>,
    pub is_correct: bool,
    pub points_earned: u32,
    pub points_possible: u32,
    pub explanation: String,
    pub time_spent: u32,
}

#[derive(Debug, Serialize)]
pub struct QuizResult {
    pub attempt_id: String,
    pub quiz_id: String,
    pub quiz_title: String,
    pub score: u32,
    pub total_points: u32,
    pub percentage: f64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub grade: Option<Grade>,
    pub is_passed: bool,
    pub time_spent: u32,
    pub completed_at: Option<DateTime<Utc>>,
    pub answers: Vec<DetailedAnswer>,
}

#[derive(Debug, Serialize)]
pub struct RecentAttempt {
    pub attempt_id: String,
    pub quiz_id: String,
    pub score: u32,
    pub percentage: f64,
    pub grade: Option<Grade>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct UserQuizStats {
    pub total_attempts: usize,
    pub average_score: f64,
    pub average_percentage: f64,
    pub highest_score: u32,
    pub total_time_spent: u32,
    pub passed_count: usize,
    pub recent_attempts: Vec<RecentAttempt>,
}

#[derive(Debug, Serialize)]
pub struct QuizStats {
    pub quiz_id: String,
    pub title: String,
    pub category: QuizCategory,
    pub difficulty: Difficulty,
    pub total_attempts: usize,
    pub average_score: f64,
    pub average_percentage: f64,
    pub highest_score: u32,
    pub average_time_spent: f64,
    pub pass_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct AvailableQuiz {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: QuizCategory,
    pub difficulty: Difficulty,
    pub total_questions: u32,
    pub total_points: u32,
    pub estimated_time: u32,
}

impl From<&Quiz> for AvailableQuiz {
    fn from(quiz: &Quiz) -> Self {
        AvailableQuiz {
            id: quiz.id.to_hex(),
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            category: quiz.category,
            difficulty: quiz.difficulty,
            total_questions: quiz.total_questions,
            total_points: quiz.total_points,
            estimated_time: quiz.estimated_time,
        }
    }
}

/// A quiz the user already finished. Attempts are one per user and quiz,
/// so these never return to the available list.
#[derive(Debug, Serialize)]
pub struct CompletedQuiz {
    pub quiz_id: String,
    pub title: String,
    pub score: u32,
    pub grade: Option<Grade>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AvailableQuizzes {
    pub available: Vec<AvailableQuiz>,
    pub completed: Vec<CompletedQuiz>,
}
