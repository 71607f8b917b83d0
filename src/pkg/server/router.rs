use axum::middleware::from_fn_with_state;
use axum::routing::{delete, patch, post, put};
use axum::{Router, routing::get};

use super::handlers::probes::{healthz, livez};
use super::handlers::{postings, posts, profile, wallet};
use super::middlewares::authn;
use super::state::AppState;

pub fn build_routes(state: AppState) -> Router {
    Router::new()
        .route("/posts", get(posts::list).post(posts::create))
        .route("/posts/mine", get(posts::mine))
        .route("/posts/:id", patch(posts::update).delete(posts::remove))
        .route("/profile", get(profile::get).patch(profile::update))
        .route("/profile/skills", put(profile::update_skills))
        .route("/profile/chain", post(profile::register_on_chain))
        .route("/profile/:section", post(profile::add_entry))
        .route(
            "/profile/:section/:entry_id",
            put(profile::update_entry).delete(profile::remove_entry),
        )
        .route("/postings", get(postings::list).post(postings::create))
        .route("/postings/:id", delete(postings::remove))
        .route("/postings/:id/requests", post(postings::add_request))
        .route(
            "/postings/:id/requests/:request_id",
            delete(postings::remove_request),
        )
        .route(
            "/postings/:id/requests/:request_id/accept",
            post(postings::accept_request),
        )
        .route(
            "/postings/:id/requests/:request_id/complete",
            post(postings::complete_request),
        )
        .route(
            "/postings/:id/complete",
            post(postings::complete).delete(postings::revert_completion),
        )
        .route("/projects/complete", post(wallet::complete_project))
        .route("/wallet", get(wallet::status))
        .layer(from_fn_with_state(state.clone(), authn::authenticate))
        .route("/healthz", get(healthz))
        .route("/livez", get(livez))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use tracing_test::traced_test;

    use super::*;
    use crate::pkg::internal::{
        chain::{
            Address, Contracts, Fees, H256,
            abi::{Function, POSTING_COMPLETED, ParamType, Token},
            contract::testing::FakeWallet,
            events::testing::FakeChain,
        },
        store::memory::MemoryStore,
    };

    const POSTING: Address = Address([2; 20]);

    struct Harness {
        app: Router,
        wallet: Arc<FakeWallet>,
        chain: Arc<FakeChain>,
    }

    fn harness(wallet: FakeWallet) -> Harness {
        let store = Arc::new(MemoryStore::new());
        store.add_session("tok-1", "u1");
        store.add_session("tok-2", "u2");
        let wallet = Arc::new(wallet);
        let chain = Arc::new(FakeChain::default());
        let contracts = Contracts {
            profile: Address([1; 20]),
            posting: POSTING,
            project: Address([3; 20]),
        };
        let state = AppState::assemble(
            store,
            wallet.clone(),
            chain.clone(),
            contracts,
            Fees::default(),
            656476,
            Duration::from_millis(10),
        );
        Harness {
            app: build_routes(state),
            wallet,
            chain,
        }
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if !token.is_empty() {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    #[traced_test]
    async fn test_probes_skip_authentication() {
        let h = harness(FakeWallet::connected());
        let (status, _) = call(&h.app, "GET", "/livez", "", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&h.app, "GET", "/healthz", "", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unknown_session_is_rejected() {
        let h = harness(FakeWallet::connected());
        let (status, _) = call(&h.app, "GET", "/posts", "", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&h.app, "GET", "/posts", "stale", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_posts_filter_and_ownership() {
        let h = harness(FakeWallet::connected());
        let body = json!({
            "title": "Solidity intern",
            "organization": "VeriLearn",
            "description": "audit contracts",
            "type": "internships",
            "work_type": "remote",
            "skills": ["solidity"],
        });
        let (status, post) = call(&h.app, "POST", "/posts", "tok-1", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(post["user_id"], "u1");
        assert_eq!(post["status"], "active");
        let id = post["id"].as_str().unwrap().to_string();

        let (_, listed) = call(&h.app, "GET", "/posts?type=internships", "tok-2", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        let (_, listed) = call(&h.app, "GET", "/posts?type=courses", "tok-2", None).await;
        assert!(listed.as_array().unwrap().is_empty());

        let uri = format!("/posts/{}", id);
        let patch = json!({"status": "closed"});
        let (status, _) = call(&h.app, "PATCH", &uri, "tok-2", Some(patch.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, updated) = call(&h.app, "PATCH", &uri, "tok-1", Some(patch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "closed");

        let (_, mine) = call(&h.app, "GET", "/posts/mine", "tok-1", None).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        let (status, deleted) = call(&h.app, "DELETE", &uri, "tok-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deleted"], true);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_post_validation() {
        let h = harness(FakeWallet::connected());
        let body = json!({
            "title": "",
            "organization": "VeriLearn",
            "description": "x",
            "type": "jobs",
        });
        let (status, _) = call(&h.app, "POST", "/posts", "tok-1", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_profile_sections() {
        let h = harness(FakeWallet::connected());
        let (status, profile) = call(&h.app, "GET", "/profile", "tok-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["education"], json!([]));

        let education = json!({
            "degree": "BSc",
            "institution": "Open Campus",
            "year": "2022",
            "specialization": "CS",
        });
        let (status, profile) =
            call(&h.app, "POST", "/profile/education", "tok-1", Some(education)).await;
        assert_eq!(status, StatusCode::CREATED);
        let entry_id = profile["education"][0]["entry_id"].as_str().unwrap().to_string();

        let uri = format!("/profile/education/{}", entry_id);
        let (status, profile) = call(&h.app, "DELETE", &uri, "tok-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["education"], json!([]));

        let (status, _) = call(&h.app, "POST", "/profile/hobbies", "tok-1", Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_profile_on_chain_needs_wallet() {
        let h = harness(FakeWallet::disconnected());
        call(&h.app, "GET", "/profile", "tok-1", None).await;
        let patch = json!({
            "name": "New User",
            "age": 25,
            "location": "Location",
            "gender": "Prefer not to say",
        });
        let (status, _) = call(&h.app, "PATCH", "/profile", "tok-1", Some(patch)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&h.app, "POST", "/profile/chain", "tok-1", None).await;
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert!(h.wallet.sent.lock().is_empty());

        let (_, wallet) = call(&h.app, "GET", "/wallet", "tok-1", None).await;
        assert_eq!(wallet["connected"], false);
        assert_eq!(wallet["last_call"]["state"], "failed");
        assert_eq!(wallet["watched_events"], 3);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_profile_on_chain_records_environment_label() {
        let h = harness(FakeWallet::connected());
        call(&h.app, "GET", "/profile", "tok-1", None).await;
        let patch = json!({
            "name": "New User",
            "age": 25,
            "location": "Location",
            "gender": "Prefer not to say",
            "work_environment": "in-office",
        });
        let (status, _) = call(&h.app, "PATCH", "/profile", "tok-1", Some(patch)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&h.app, "POST", "/profile/chain", "tok-1", None).await;
        assert_eq!(status, StatusCode::OK);
        let sent = h.wallet.sent.lock();
        assert_eq!(sent.len(), 1);
        let data = &sent[0].data.0;
        assert!(data.windows(9).any(|w| w == b"In-office"));
        assert!(!data.windows(9).any(|w| w == b"in-office"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_posting_lifecycle_settles_on_event() {
        let h = harness(FakeWallet::connected());
        let (_, posting) = call(
            &h.app,
            "POST",
            "/postings",
            "tok-1",
            Some(json!({
                "title": "Senior Blockchain Developer",
                "organization": "VeriLearn",
                "type": "jobs",
            })),
        )
        .await;
        let id = posting["id"].as_str().unwrap().to_string();

        let (status, request) = call(
            &h.app,
            "POST",
            &format!("/postings/{}/requests", id),
            "tok-2",
            Some(json!({"message": "interested"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(request["status"], "pending");
        let rid = request["id"].as_str().unwrap().to_string();

        let complete = format!("/postings/{}/requests/{}/complete", id, rid);
        let (status, _) = call(&h.app, "POST", &complete, "tok-1", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let accept = format!("/postings/{}/requests/{}/accept", id, rid);
        let (_, request) = call(&h.app, "POST", &accept, "tok-1", None).await;
        assert_eq!(request["status"], "accepted");
        let (_, request) = call(&h.app, "POST", &complete, "tok-1", None).await;
        assert_eq!(request["status"], "completed");

        // let the poller record its starting block
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (status, posting) =
            call(&h.app, "POST", &format!("/postings/{}/complete", id), "tok-1", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(posting["status"], "pending_confirmation");
        assert_eq!(h.wallet.sent.lock().len(), 1);

        let mut issuer = [0u8; 32];
        issuer[12..].copy_from_slice(&[0x11; 20]);
        let body = Function {
            name: "x",
            inputs: &[ParamType::String],
        }
        .encode_call(&[Token::String(id.clone())])
        .unwrap();
        h.chain.emit(
            POSTING,
            vec![POSTING_COMPLETED.topic(), H256(issuer)],
            body.0[4..].to_vec(),
        );

        let mut settled = Value::Null;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let (_, list) = call(&h.app, "GET", "/postings?type=jobs", "tok-1", None).await;
            settled = list[0].clone();
            if settled["status"] == "completed" {
                break;
            }
        }
        assert_eq!(settled["status"], "completed");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_postings_only_change_for_owner() {
        let h = harness(FakeWallet::connected());
        let (_, posting) = call(
            &h.app,
            "POST",
            "/postings",
            "tok-1",
            Some(json!({"title": "Audit", "organization": "VeriLearn", "type": "projects"})),
        )
        .await;
        assert_eq!(posting["owner_id"], "u1");
        let id = posting["id"].as_str().unwrap().to_string();
        let (_, request) = call(
            &h.app,
            "POST",
            &format!("/postings/{}/requests", id),
            "tok-2",
            Some(json!({"message": "let me"})),
        )
        .await;
        let rid = request["id"].as_str().unwrap().to_string();

        let forbidden = [
            ("POST", format!("/postings/{}/requests/{}/accept", id, rid)),
            ("POST", format!("/postings/{}/requests/{}/complete", id, rid)),
            ("DELETE", format!("/postings/{}/requests/{}", id, rid)),
            ("POST", format!("/postings/{}/complete", id)),
            ("DELETE", format!("/postings/{}/complete", id)),
            ("DELETE", format!("/postings/{}", id)),
        ];
        for (method, uri) in &forbidden {
            let (status, _) = call(&h.app, method, uri, "tok-2", None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
        }
        assert!(h.wallet.sent.lock().is_empty());

        let (_, list) = call(&h.app, "GET", "/postings", "tok-2", None).await;
        assert_eq!(list[0]["status"], "active");
        assert_eq!(list[0]["requests"][0]["status"], "pending");

        let (status, _) = call(&h.app, "DELETE", &format!("/postings/{}", id), "tok-1", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
