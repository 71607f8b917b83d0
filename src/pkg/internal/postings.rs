//! Owner-side posting book and the request lifecycle.
//!
//! Requests move pending -> accepted -> completed, and can be removed while
//! pending or accepted. A posting moves active -> submitting while its
//! completion transaction is handed to the wallet, then to pending_confirmation,
//! and only reaches completed once the settlement event is observed.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pkg::internal::{
    category::Category,
    chain::TxHash,
    failure::{Failure, Outcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostingStatus {
    Active,
    Closed,
    Draft,
    Submitting,
    PendingConfirmation { tx_hash: TxHash },
    Completed,
}

impl PostingStatus {
    fn label(&self) -> &'static str {
        match self {
            PostingStatus::Active => "active",
            PostingStatus::Closed => "closed",
            PostingStatus::Draft => "draft",
            PostingStatus::Submitting => "submitting",
            PostingStatus::PendingConfirmation { .. } => "pending_confirmation",
            PostingStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub status: RequestStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posting {
    pub id: String,
    pub owner_id: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub title: String,
    pub organization: String,
    #[serde(flatten)]
    pub status: PostingStatus,
    pub requests: Vec<Request>,
    pub created_at: DateTime<Utc>,
}

impl Posting {
    pub fn new(owner_id: &str, category: Category, title: &str, organization: &str) -> Self {
        Posting {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            category,
            title: title.to_string(),
            organization: organization.to_string(),
            status: PostingStatus::Active,
            requests: vec![],
            created_at: Utc::now(),
        }
    }
}

impl Request {
    pub fn new(user_id: &str, user_name: &str, message: &str) -> Self {
        Request {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            status: RequestStatus::Pending,
            message: message.to_string(),
            created_at: Utc::now(),
        }
    }
}

fn posting_missing(id: &str) -> Failure {
    Failure::NotFound(format!("posting {}", id))
}

fn request_missing(id: &str) -> Failure {
    Failure::NotFound(format!("request {}", id))
}

#[derive(Default)]
pub struct PostingBook {
    postings: RwLock<Vec<Posting>>,
    // completion events seen before the matching submission was recorded
    observed: Mutex<HashSet<String>>,
}

impl PostingBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_postings(postings: Vec<Posting>) -> Self {
        PostingBook {
            postings: RwLock::new(postings),
            observed: Mutex::new(HashSet::new()),
        }
    }

    pub fn list(&self, category: Option<Category>) -> Vec<Posting> {
        self.postings
            .read()
            .iter()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .cloned()
            .collect()
    }

    pub fn get(&self, posting_id: &str) -> Outcome<Posting> {
        self.postings
            .read()
            .iter()
            .find(|p| p.id == posting_id)
            .cloned()
            .ok_or_else(|| posting_missing(posting_id))
    }

    pub fn create(&self, posting: Posting) -> Posting {
        tracing::info!("posting {} created: {}", &posting.id, &posting.title);
        self.postings.write().push(posting.clone());
        posting
    }

    pub fn remove_posting(&self, posting_id: &str) -> Outcome<Posting> {
        let mut postings = self.postings.write();
        let at = postings
            .iter()
            .position(|p| p.id == posting_id)
            .ok_or_else(|| posting_missing(posting_id))?;
        self.observed.lock().remove(posting_id);
        tracing::info!("posting {} removed", posting_id);
        Ok(postings.remove(at))
    }

    fn with_posting<T>(
        &self,
        posting_id: &str,
        f: impl FnOnce(&mut Posting) -> Outcome<T>,
    ) -> Outcome<T> {
        let mut postings = self.postings.write();
        let posting = postings
            .iter_mut()
            .find(|p| p.id == posting_id)
            .ok_or_else(|| posting_missing(posting_id))?;
        f(posting)
    }

    fn transition_request(
        &self,
        posting_id: &str,
        request_id: &str,
        action: &'static str,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Outcome<Request> {
        self.with_posting(posting_id, |posting| {
            let request = posting
                .requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| request_missing(request_id))?;
            if request.status != from {
                return Err(Failure::InvalidTransition {
                    action,
                    state: format!("{:?}", request.status).to_lowercase(),
                });
            }
            request.status = to;
            tracing::info!("request {} on posting {}: {}", request_id, posting_id, action);
            Ok(request.clone())
        })
    }

    pub fn add_request(&self, posting_id: &str, request: Request) -> Outcome<Request> {
        self.with_posting(posting_id, |posting| {
            posting.requests.push(request.clone());
            Ok(request)
        })
    }

    pub fn accept_request(&self, posting_id: &str, request_id: &str) -> Outcome<Request> {
        self.transition_request(
            posting_id,
            request_id,
            "accept",
            RequestStatus::Pending,
            RequestStatus::Accepted,
        )
    }

    pub fn complete_request(&self, posting_id: &str, request_id: &str) -> Outcome<Request> {
        self.transition_request(
            posting_id,
            request_id,
            "complete",
            RequestStatus::Accepted,
            RequestStatus::Completed,
        )
    }

    pub fn remove_request(&self, posting_id: &str, request_id: &str) -> Outcome<Request> {
        self.with_posting(posting_id, |posting| {
            let at = posting
                .requests
                .iter()
                .position(|r| r.id == request_id)
                .ok_or_else(|| request_missing(request_id))?;
            match posting.requests[at].status {
                RequestStatus::Pending | RequestStatus::Accepted => {
                    tracing::info!("request {} removed from posting {}", request_id, posting_id);
                    Ok(posting.requests.remove(at))
                }
                other => Err(Failure::InvalidTransition {
                    action: "remove",
                    state: format!("{:?}", other).to_lowercase(),
                }),
            }
        })
    }

    /// Claims an active posting for settlement. Only one caller can hold the
    /// claim, so a concurrent second completion fails before anything is sent.
    pub fn begin_completion(&self, posting_id: &str) -> Outcome<Posting> {
        self.with_posting(posting_id, |posting| match posting.status {
            PostingStatus::Active => {
                posting.status = PostingStatus::Submitting;
                Ok(posting.clone())
            }
            ref other => Err(Failure::InvalidTransition {
                action: "complete posting",
                state: other.label().to_string(),
            }),
        })
    }

    /// Releases a claim whose transaction never reached the chain.
    pub fn abandon_completion(&self, posting_id: &str) {
        let _ = self.with_posting(posting_id, |posting| {
            if posting.status == PostingStatus::Submitting {
                posting.status = PostingStatus::Active;
                tracing::warn!("posting {} back to active, submission failed", posting_id);
            }
            Ok(())
        });
    }

    /// Records the submitted completion transaction for a claimed posting.
    pub fn await_confirmation(&self, posting_id: &str, tx_hash: TxHash) -> Outcome<Posting> {
        self.with_posting(posting_id, |posting| {
            if posting.status != PostingStatus::Submitting {
                return Err(Failure::InvalidTransition {
                    action: "record completion",
                    state: posting.status.label().to_string(),
                });
            }
            let early = self.observed.lock().remove(posting_id);
            posting.status = if early {
                PostingStatus::Completed
            } else {
                PostingStatus::PendingConfirmation { tx_hash }
            };
            tracing::info!("posting {} is {} ({})", posting_id, posting.status.label(), tx_hash);
            Ok(posting.clone())
        })
    }

    /// Applies an observed completion event. Returns the posting when it moved.
    pub fn confirm_completion(&self, posting_id: &str) -> Option<Posting> {
        let mut postings = self.postings.write();
        let Some(posting) = postings.iter_mut().find(|p| p.id == posting_id) else {
            tracing::debug!("completion observed for unknown posting {}", posting_id);
            return None;
        };
        match posting.status {
            PostingStatus::PendingConfirmation { .. } => {
                posting.status = PostingStatus::Completed;
                tracing::info!("posting {} confirmed completed", posting_id);
                Some(posting.clone())
            }
            PostingStatus::Active | PostingStatus::Submitting => {
                self.observed.lock().insert(posting_id.to_string());
                None
            }
            _ => None,
        }
    }

    /// Returns a pending posting to active after its transaction was abandoned.
    pub fn revert_completion(&self, posting_id: &str) -> Outcome<Posting> {
        self.with_posting(posting_id, |posting| match posting.status {
            PostingStatus::PendingConfirmation { .. } => {
                posting.status = PostingStatus::Active;
                tracing::warn!("posting {} completion reverted", posting_id);
                Ok(posting.clone())
            }
            ref other => Err(Failure::InvalidTransition {
                action: "revert completion",
                state: other.label().to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::internal::chain::H256;

    fn book() -> PostingBook {
        let mut posting = Posting::new(
            "owner1",
            Category::Jobs,
            "Senior Blockchain Developer",
            "VeriLearn",
        );
        posting.id = "1".into();
        let mut request = Request::new(
            "user1",
            "John Doe",
            "I am interested in this position and have 5 years of experience.",
        );
        request.id = "1".into();
        posting.requests.push(request);
        PostingBook::with_postings(vec![posting])
    }

    #[test]
    fn test_accept_then_complete_request() {
        let book = book();
        let accepted = book.accept_request("1", "1").unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert_eq!(book.get("1").unwrap().status, PostingStatus::Active);

        let completed = book.complete_request("1", "1").unwrap();
        assert_eq!(completed.status, RequestStatus::Completed);
        assert_eq!(book.get("1").unwrap().requests[0].status, RequestStatus::Completed);
    }

    #[test]
    fn test_request_cannot_skip_accepted() {
        let book = book();
        let err = book.complete_request("1", "1").unwrap_err();
        assert!(matches!(err, Failure::InvalidTransition { action: "complete", .. }));
        assert_eq!(book.get("1").unwrap().requests[0].status, RequestStatus::Pending);

        book.accept_request("1", "1").unwrap();
        assert!(book.accept_request("1", "1").is_err());
    }

    #[test]
    fn test_remove_request_keeps_others() {
        let book = book();
        let second = book
            .add_request("1", Request::new("user2", "Jane Roe", "count me in"))
            .unwrap();
        let third = book
            .add_request("1", Request::new("user3", "Sam Poe", "me too"))
            .unwrap();
        book.accept_request("1", &third.id).unwrap();
        let before = book.get("1").unwrap().requests;

        book.remove_request("1", &second.id).unwrap();

        let after = book.get("1").unwrap().requests;
        assert_eq!(after.len(), before.len() - 1);
        let expected: Vec<_> = before.into_iter().filter(|r| r.id != second.id).collect();
        assert_eq!(after, expected);
    }

    #[test]
    fn test_completed_request_cannot_be_removed() {
        let book = book();
        book.accept_request("1", "1").unwrap();
        book.complete_request("1", "1").unwrap();
        assert!(book.remove_request("1", "1").is_err());
        assert!(matches!(
            book.remove_request("1", "missing"),
            Err(Failure::NotFound(_))
        ));
    }

    #[test]
    fn test_completion_waits_for_event() {
        let book = book();
        let hash = H256([1; 32]);
        book.begin_completion("1").unwrap();
        let pending = book.await_confirmation("1", hash).unwrap();
        assert_eq!(pending.status, PostingStatus::PendingConfirmation { tx_hash: hash });
        assert!(book.begin_completion("1").is_err());

        let done = book.confirm_completion("1").unwrap();
        assert_eq!(done.status, PostingStatus::Completed);
        assert!(book.confirm_completion("1").is_none());
    }

    #[test]
    fn test_event_before_submission_record() {
        let book = book();
        assert!(book.confirm_completion("1").is_none());
        book.begin_completion("1").unwrap();
        let posting = book.await_confirmation("1", H256([2; 32])).unwrap();
        assert_eq!(posting.status, PostingStatus::Completed);
    }

    #[test]
    fn test_revert_completion() {
        let book = book();
        assert!(book.revert_completion("1").is_err());
        book.begin_completion("1").unwrap();
        book.await_confirmation("1", H256([3; 32])).unwrap();
        let posting = book.revert_completion("1").unwrap();
        assert_eq!(posting.status, PostingStatus::Active);
    }

    #[test]
    fn test_remove_posting_and_filter() {
        let book = book();
        book.create(Posting::new("owner1", Category::Courses, "Rust 101", "VeriLearn"));
        assert_eq!(book.list(None).len(), 2);
        assert_eq!(book.list(Some(Category::Courses)).len(), 1);
        assert!(book.list(Some(Category::Scholarships)).is_empty());

        book.remove_posting("1").unwrap();
        assert!(matches!(book.get("1"), Err(Failure::NotFound(_))));
        assert_eq!(book.list(None).len(), 1);
    }

    #[test]
    fn test_posting_serializes_flat_status() {
        let book = book();
        let json = serde_json::to_value(book.get("1").unwrap()).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["type"], "jobs");
        assert_eq!(json["requests"][0]["status"], "pending");
    }

    #[test]
    fn test_completion_claim_is_exclusive() {
        let book = book();
        let claimed = book.begin_completion("1").unwrap();
        assert_eq!(claimed.status, PostingStatus::Submitting);
        assert!(matches!(
            book.begin_completion("1"),
            Err(Failure::InvalidTransition { .. })
        ));

        book.abandon_completion("1");
        assert_eq!(book.get("1").unwrap().status, PostingStatus::Active);
        assert!(book.await_confirmation("1", H256([4; 32])).is_err());
    }

    #[test]
    fn test_removed_posting_forgets_early_event() {
        let book = book();
        assert!(book.confirm_completion("1").is_none());
        book.remove_posting("1").unwrap();
        assert!(book.observed.lock().is_empty());
    }
}
