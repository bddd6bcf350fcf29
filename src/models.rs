use crate::errors::FeedbackError;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    New,
    #[serde(rename = "In progress", alias = "InProgress")]
    InProgress,
    Resolved,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::New => "New",
            Status::InProgress => "In progress",
            Status::Resolved => "Resolved",
        }
    }

    pub fn parse(value: &str) -> Result<Self, FeedbackError> {
        match value {
            "New" => Ok(Status::New),
            "In progress" | "InProgress" => Ok(Status::InProgress),
            "Resolved" => Ok(Status::Resolved),
            _ => Err(FeedbackError::validation(
                "Status must be New, In progress, or Resolved.",
            )),
        }
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Status::parse(text).map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn parse(value: &str) -> Result<Self, FeedbackError> {
        match value.trim() {
            "up" => Ok(VoteDirection::Up),
            "down" => Ok(VoteDirection::Down),
            _ => Err(FeedbackError::validation("Vote must be 'up' or 'down'.")),
        }
    }

    pub fn value(self) -> i8 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(VoteDirection::Up),
            -1 => Some(VoteDirection::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: i64,
    pub categories: Vec<String>,
    pub rating: u8,
    pub comment: String,
    pub status: Status,
    pub votes: i64,
    pub created_at: String,
}

/// A submission that passed validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub categories: Vec<String>,
    pub rating: u8,
    pub comment: String,
}

impl TryFrom<SubmitFeedbackRequest> for NewFeedback {
    type Error = FeedbackError;

    fn try_from(request: SubmitFeedbackRequest) -> Result<Self, Self::Error> {
        if request.categories.is_empty() {
            return Err(FeedbackError::validation(
                "Please select at least one category.",
            ));
        }

        let rating = parse_rating(request.rating.as_ref())?;
        let comment = request.comment.unwrap_or_default().trim().to_string();

        Ok(NewFeedback {
            categories: request.categories,
            rating,
            comment,
        })
    }
}

// Forms post the rating as a string, scripts as a number.
fn parse_rating(value: Option<&Value>) -> Result<u8, FeedbackError> {
    let whole = match value {
        Some(Value::Number(number)) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0)
                .map(|float| float as i64)
        }),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| FeedbackError::validation("Rating must be a whole number."))?;

    if !(1..=5).contains(&whole) {
        return Err(FeedbackError::validation("Rating must be between 1 and 5."));
    }
    Ok(whole as u8)
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitFeedbackRequest {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(default)]
    pub vote: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
    pub id: i64,
}

/// A feedback item annotated with the viewer's own vote.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackView {
    #[serde(flatten)]
    pub item: FeedbackItem,
    #[serde(rename = "myVote")]
    pub my_vote: Option<i8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub message: String,
    pub votes: i64,
    #[serde(rename = "myVote")]
    pub my_vote: i8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub role: String,
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label: String,
    pub start: String,
    pub end: String,
    pub average: Option<f64>,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RatingTrends {
    pub hours: Vec<TrendPoint>,
    pub days: Vec<TrendPoint>,
    pub weeks: Vec<TrendPoint>,
    pub months: Vec<TrendPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total: u64,
    pub average_rating: Option<f64>,
    pub status_counts: BTreeMap<Status, u64>,
    pub category_counts: BTreeMap<String, u64>,
    pub daily_trend: Vec<DailyPoint>,
    pub rating_trends: RatingTrends,
    pub top_attention: Vec<FeedbackItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(categories: &[&str], rating: Value, comment: Option<&str>) -> SubmitFeedbackRequest {
        SubmitFeedbackRequest {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            rating: Some(rating),
            comment: comment.map(str::to_string),
        }
    }

    #[test]
    fn accepts_numeric_and_string_ratings() {
        for rating in [json!(4), json!(4.0), json!("4"), json!(" 4 ")] {
            let parsed = NewFeedback::try_from(request(&["UI"], rating, None)).unwrap();
            assert_eq!(parsed.rating, 4);
        }
    }

    #[test]
    fn rejects_fractional_and_out_of_range_ratings() {
        for rating in [json!(4.5), json!("4.5"), json!(null), json!(0), json!(6), json!(true)] {
            let err = NewFeedback::try_from(request(&["UI"], rating, None)).unwrap_err();
            assert!(matches!(err, FeedbackError::Validation(_)));
        }
    }

    #[test]
    fn rejects_empty_categories() {
        let err = NewFeedback::try_from(request(&[], json!(3), None)).unwrap_err();
        assert_eq!(err.to_string(), "Please select at least one category.");
    }

    #[test]
    fn trims_comment_and_keeps_category_order() {
        let parsed =
            NewFeedback::try_from(request(&["UI", "Bug"], json!(2), Some("  slow \n"))).unwrap();
        assert_eq!(parsed.comment, "slow");
        assert_eq!(parsed.categories, vec!["UI", "Bug"]);
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_value(Status::InProgress).unwrap(), json!("In progress"));
        assert_eq!(Status::parse("InProgress").unwrap(), Status::InProgress);
        assert!(Status::parse("Closed").is_err());
    }

    #[test]
    fn view_flattens_item_with_my_vote() {
        let view = FeedbackView {
            item: FeedbackItem {
                id: 1,
                categories: vec!["UI".into()],
                rating: 5,
                comment: String::new(),
                status: Status::New,
                votes: 0,
                created_at: "2026-01-05T10:00:00.000000".into(),
            },
            my_vote: None,
        };
        let value = serde_json::to_value(view).unwrap();
        assert_eq!(value["id"], json!(1));
        assert_eq!(value["status"], json!("New"));
        assert_eq!(value["myVote"], json!(null));
    }
}
