use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_test::block_on;
use uuid::Uuid;

use super::{Engine, MutationState};
use crate::{
    api::{
        BidReplyAPI, BidRequestAPI, ListingSource, RefundAPI, RefundFilter, SessionAPI, WalletAPI,
    },
    auth::{Role, Session, User},
    backend::memory::MemoryBackend,
    config::EngineConfig,
    entities::{
        sample_refund, BidDraft, CheckoutSession, NewBidRequest, RefundStatus, ReplyStatus,
        RequestStatus, TopUpRedirect,
    },
    error::Error,
};

fn engine(backend: &Arc<MemoryBackend>) -> Engine {
    Engine::new(backend.clone(), EngineConfig::default()).unwrap()
}

fn draft(amount: f64) -> BidDraft {
    BidDraft {
        amount,
        time_estimate: "2-3 days".into(),
        message: "Genuine parts, fixed price".into(),
        warranty: Some("6 months".into()),
        includes: vec!["Parts".into(), "Labour".into()],
    }
}

fn new_request(title: &str) -> NewBidRequest {
    NewBidRequest {
        title: title.into(),
        description: "Oil dripping under the engine".into(),
        category: "Engine".into(),
        ..Default::default()
    }
}

async fn login(engine: &Engine, user: &User) -> Session {
    engine.open_session(&user.access_token).await.unwrap()
}

#[test]
fn capabilities_follow_role() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);

        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let admin = backend.add_user(Role::Admin, "Admin", None).await;

        let owner = login(&engine, &owner).await.capabilities;
        assert!(owner.create_bid_request);
        assert!(!owner.place_bid);
        assert!(owner.top_up_wallet);
        assert!(!owner.review_refunds);

        let garage = login(&engine, &garage).await.capabilities;
        assert!(!garage.create_bid_request);
        assert!(garage.place_bid);
        assert!(garage.top_up_wallet);

        let admin = login(&engine, &admin).await.capabilities;
        assert!(admin.review_refunds);
        assert!(admin.adjust_wallet);
        assert!(!admin.place_bid);
    });
}

#[test]
fn unknown_token_is_unauthenticated() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);

        assert_eq!(engine.open_session("").await.unwrap_err().code, 102);
        assert_eq!(engine.find_session("nope").await.unwrap_err().code, 102);
    });
}

#[test]
fn session_is_resolved_once() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;

        login(&engine, &owner).await;
        engine.find_session(&owner.access_token).await.unwrap();
        assert_eq!(backend.state().await.calls_to("current_user"), 1);

        engine.close_session(&owner.access_token).await.unwrap();
        engine.find_session(&owner.access_token).await.unwrap();
        assert_eq!(backend.state().await.calls_to("current_user"), 2);
    });
}

#[test]
fn stale_session_is_resolved_again() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let config = EngineConfig {
            session_max_age: Duration::ZERO,
            ..Default::default()
        };
        let engine = Engine::new(backend.clone(), config).unwrap();
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;

        let session = login(&engine, &owner).await;
        engine.list_my_requests(&session).await.unwrap();
        engine.find_session(&owner.access_token).await.unwrap();
        assert_eq!(backend.state().await.calls_to("current_user"), 2);
        assert!(engine.caches.read().await.contains_key(&owner.id));

        backend
            .state()
            .await
            .users
            .get_mut(&owner.access_token)
            .unwrap()
            .role = Role::Admin;
        let promoted = engine.find_session(&owner.access_token).await.unwrap();
        assert!(promoted.capabilities.review_refunds);

        backend.state().await.users.remove(&owner.access_token);
        let err = engine.find_session(&owner.access_token).await.unwrap_err();
        assert_eq!(err.code, 102);
        assert!(engine.sessions.read().await.is_empty());
        assert!(!engine.caches.read().await.contains_key(&owner.id));
    });
}

#[test]
fn garage_cannot_create_request() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let session = login(&engine, &garage).await;

        let err = engine
            .create_bid_request(&session, new_request("Brake pads"))
            .await
            .unwrap_err();

        assert!(err.is_forbidden_error());
        assert_eq!(err.message, "Only car owners can create bid requests");
        assert_eq!(backend.state().await.calls_to("fn_create_bid_request"), 0);
        assert!(engine.mutations(&session).await.is_empty());
    });
}

#[test]
fn invalid_request_never_reaches_backend() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let session = login(&engine, &owner).await;

        let err = engine
            .create_bid_request(&session, new_request("   "))
            .await
            .unwrap_err();

        assert!(err.is_invalid_input_error());
        assert_eq!(err.message, "Please fill in all required fields");
        assert_eq!(backend.state().await.calls_to("fn_create_bid_request"), 0);
    });
}

#[test]
fn created_request_gets_display_id() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let session = login(&engine, &owner).await;

        let first = engine
            .create_bid_request(&session, new_request("Engine Oil Leak Repair"))
            .await
            .unwrap();
        let second = engine
            .create_bid_request(&session, new_request("Air Conditioning Service"))
            .await
            .unwrap();

        let first_id = first.display_id.unwrap();
        assert!(first_id.starts_with("REQ-"));
        assert!(first_id.ends_with("-001"));
        assert!(second.display_id.unwrap().ends_with("-002"));

        let mine = engine.list_my_requests(&session).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second.id);
        assert!(mine[1].display_id.as_deref().unwrap().ends_with("-001"));

        let mutations = engine.mutations(&session).await;
        assert_eq!(mutations.len(), 2);
        assert!(mutations
            .iter()
            .all(|m| m.kind == "create_bid_request" && m.state == MutationState::Confirmed));
    });
}

#[test]
fn failed_create_rolls_back() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let session = login(&engine, &owner).await;

        backend
            .fail_on("fn_create_bid_request", Error::rejected_error("database unavailable"))
            .await;

        let err = engine
            .create_bid_request(&session, new_request("Brake pads"))
            .await
            .unwrap_err();
        assert_eq!(err.message, "database unavailable");

        assert!(engine.list_my_requests(&session).await.unwrap().is_empty());
        assert_eq!(
            engine.mutations(&session).await[0].state,
            MutationState::Failed {
                reason: "database unavailable".into()
            }
        );
    });
}

#[test]
fn browse_falls_back_to_samples() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let session = login(&engine, &garage).await;

        let listing = engine.list_available_requests(&session).await.unwrap();
        assert_eq!(listing.source, ListingSource::Sample);
        assert_eq!(listing.requests.len(), 2);

        let err = engine
            .place_bid(&session, listing.requests[0].id, draft(500.0))
            .await
            .unwrap_err();
        assert_eq!(err.code, 100);
        assert_eq!(backend.state().await.calls_to("fetch_request"), 0);

        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        backend.insert_request(&owner, "Brake pads").await;

        let listing = engine.list_available_requests(&session).await.unwrap();
        assert_eq!(listing.source, ListingSource::Remote);
        assert_eq!(listing.requests.len(), 1);
    });
}

#[test]
fn browse_without_fallback_stays_empty() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let config = EngineConfig {
            sample_fallback: false,
            ..Default::default()
        };
        let engine = Engine::new(backend.clone(), config).unwrap();
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let session = login(&engine, &garage).await;

        let listing = engine.list_available_requests(&session).await.unwrap();
        assert_eq!(listing.source, ListingSource::Remote);
        assert!(listing.requests.is_empty());
    });
}

#[test]
fn first_bid_costs_two_credits_and_update_is_free() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        backend.set_balance(garage.id, 10.0).await;
        let request = backend.insert_request(&owner, "Engine Oil Leak Repair").await;
        let session = login(&engine, &garage).await;

        let placed = engine
            .place_bid(&session, request.id, draft(500.0))
            .await
            .unwrap();
        assert!(placed.created);
        assert_eq!(placed.charged, 2.0);
        assert_eq!(placed.wallet.unwrap().balance, 8.0);
        assert_eq!(engine.wallet(&session).await.unwrap().balance, 8.0);

        let updated = engine
            .place_bid(&session, request.id, draft(450.0))
            .await
            .unwrap();
        assert!(!updated.created);
        assert_eq!(updated.charged, 0.0);
        assert_eq!(updated.reply.id, placed.reply.id);
        assert_eq!(updated.reply.amount, 450.0);

        let state = backend.state().await;
        assert_eq!(state.calls_to("fn_reply_to_bid"), 1);
        assert_eq!(state.calls_to("update_reply"), 1);
        assert_eq!(state.wallets[&garage.id].balance, 8.0);
        assert_eq!(state.requests[0].reply_count, 1);
        drop(state);

        let transactions = engine.transactions(&session).await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].amount, 2.0);
    });
}

#[test]
fn bid_without_credits_needs_top_up() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        backend.set_balance(garage.id, 1.5).await;
        let request = backend.insert_request(&owner, "Brake pads").await;
        let session = login(&engine, &garage).await;

        let err = engine
            .place_bid(&session, request.id, draft(300.0))
            .await
            .unwrap_err();

        assert!(err.is_top_up_required_error());
        assert_eq!(backend.state().await.calls_to("fn_reply_to_bid"), 0);
        assert!(engine.mutations(&session).await.is_empty());
        assert_eq!(engine.wallet(&session).await.unwrap().balance, 1.5);
    });
}

#[test]
fn invalid_bid_never_reaches_backend() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let request = backend.insert_request(&owner, "Brake pads").await;
        let session = login(&engine, &garage).await;

        let err = engine
            .place_bid(&session, request.id, draft(0.0))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input_error());

        let owner_session = login(&engine, &owner).await;
        let err = engine
            .place_bid(&owner_session, request.id, draft(100.0))
            .await
            .unwrap_err();
        assert!(err.is_forbidden_error());
        assert_eq!(err.message, "Only garage owners can submit bids");

        assert_eq!(backend.state().await.calls_to("fetch_request"), 0);
    });
}

#[test]
fn failed_bid_restores_wallet() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        backend.set_balance(garage.id, 10.0).await;
        let request = backend.insert_request(&owner, "Brake pads").await;
        let session = login(&engine, &garage).await;

        backend
            .fail_on("fn_reply_to_bid", Error::rejected_error("Insufficient credits"))
            .await;

        let err = engine
            .place_bid(&session, request.id, draft(300.0))
            .await
            .unwrap_err();
        assert_eq!(err.code, 109);

        assert_eq!(engine.wallet(&session).await.unwrap().balance, 10.0);
        assert!(engine.list_my_bids(&session).await.unwrap().is_empty());
        assert!(matches!(
            engine.mutations(&session).await[0].state,
            MutationState::Failed { .. }
        ));
    });
}

#[test]
fn double_submit_is_refused() {
    block_on(async {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(MemoryBackend::with_reply_gate(gate.clone()));
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        backend.set_balance(garage.id, 10.0).await;
        let request = backend.insert_request(&owner, "Brake pads").await;
        let session = login(&engine, &garage).await;

        let (first, second, _) = futures::join!(
            engine.place_bid(&session, request.id, draft(300.0)),
            engine.place_bid(&session, request.id, draft(300.0)),
            async { gate.add_permits(1) },
        );

        assert!(first.unwrap().created);
        assert!(second.unwrap_err().is_in_flight_error());
        assert_eq!(backend.state().await.calls_to("fn_reply_to_bid"), 1);
        assert_eq!(backend.state().await.wallets[&garage.id].balance, 8.0);
    });
}

#[test]
fn cancelled_bid_releases_request() {
    block_on(async {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(MemoryBackend::with_reply_gate(gate.clone()));
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        backend.set_balance(garage.id, 10.0).await;
        let request = backend.insert_request(&owner, "Brake pads").await;
        let session = login(&engine, &garage).await;
        assert_eq!(engine.wallet(&session).await.unwrap().balance, 10.0);

        // parked on the gate with the charge applied locally
        let mut abandoned = engine.place_bid(&session, request.id, draft(300.0));
        assert!(futures::poll!(abandoned.as_mut()).is_pending());
        assert_eq!(
            engine
                .cache(&session)
                .await
                .lock()
                .await
                .fresh_wallet(Duration::from_secs(30))
                .unwrap()
                .balance,
            8.0
        );
        drop(abandoned);

        let mutations = engine.mutations(&session).await;
        assert_eq!(mutations[0].kind, "place_bid");
        assert_eq!(
            mutations[0].state,
            MutationState::Failed {
                reason: "cancelled".into()
            }
        );
        assert_eq!(engine.wallet(&session).await.unwrap().balance, 10.0);
        assert_eq!(backend.state().await.calls_to("fn_reply_to_bid"), 0);

        gate.add_permits(1);
        let outcome = engine
            .place_bid(&session, request.id, draft(300.0))
            .await
            .unwrap();
        assert!(outcome.created);
        assert_eq!(backend.state().await.wallets[&garage.id].balance, 8.0);
    });
}

#[test]
fn closed_request_refuses_bids() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        backend.set_balance(garage.id, 10.0).await;
        let request = backend.insert_request(&owner, "Brake pads").await;
        backend
            .state()
            .await
            .request_mut(request.id)
            .unwrap()
            .status = RequestStatus::Closed;
        let session = login(&engine, &garage).await;

        let err = engine
            .place_bid(&session, request.id, draft(300.0))
            .await
            .unwrap_err();
        assert_eq!(err.message, "This request is no longer accepting bids");

        let missing = engine
            .place_bid(&session, Uuid::new_v4(), draft(300.0))
            .await
            .unwrap_err();
        assert!(missing.is_not_found_error());
    });
}

#[test]
fn accepting_closes_the_request() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let first = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let second = backend.add_user(Role::GarageOwner, "Quick Lube", None).await;
        backend.set_balance(first.id, 10.0).await;
        backend.set_balance(second.id, 10.0).await;
        let request = backend.insert_request(&owner, "Brake pads").await;

        let first_session = login(&engine, &first).await;
        let second_session = login(&engine, &second).await;
        let owner_session = login(&engine, &owner).await;

        let winning = engine
            .place_bid(&first_session, request.id, draft(300.0))
            .await
            .unwrap()
            .reply;
        let losing = engine
            .place_bid(&second_session, request.id, draft(350.0))
            .await
            .unwrap()
            .reply;

        let replies = engine.list_replies(&owner_session, request.id).await.unwrap();
        assert_eq!(replies.len(), 2);

        let err = engine
            .list_replies(&first_session, request.id)
            .await
            .unwrap_err();
        assert!(err.is_forbidden_error());

        let err = engine.accept_bid(&first_session, winning.id).await.unwrap_err();
        assert!(err.is_forbidden_error());

        let accepted = engine.accept_bid(&owner_session, winning.id).await.unwrap();
        assert_eq!(accepted.status, ReplyStatus::Accepted);

        {
            let state = backend.state().await;
            assert_eq!(state.requests[0].status, RequestStatus::Closed);
            assert_eq!(state.requests[0].accepted_reply_id, Some(winning.id));
        }

        let err = engine.accept_bid(&owner_session, losing.id).await.unwrap_err();
        assert_eq!(err.code, 100);
        assert_eq!(backend.state().await.calls_to("fn_accept_bid"), 1);
    });
}

#[test]
fn accepting_rejects_other_pending_replies() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let first = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let second = backend.add_user(Role::GarageOwner, "Quick Lube", None).await;
        backend.set_balance(first.id, 10.0).await;
        backend.set_balance(second.id, 10.0).await;
        let request = backend.insert_request(&owner, "Brake pads").await;

        let first_session = login(&engine, &first).await;
        let second_session = login(&engine, &second).await;
        let owner_session = login(&engine, &owner).await;

        let winning = engine
            .place_bid(&first_session, request.id, draft(300.0))
            .await
            .unwrap()
            .reply;
        let losing = engine
            .place_bid(&second_session, request.id, draft(350.0))
            .await
            .unwrap()
            .reply;
        engine.list_replies(&owner_session, request.id).await.unwrap();

        backend
            .fail_on("fn_accept_bid", Error::rejected_error("database unavailable"))
            .await;
        engine
            .accept_bid(&owner_session, winning.id)
            .await
            .unwrap_err();
        {
            let cache = engine.cache(&owner_session).await;
            let cache = cache.lock().await;
            assert_eq!(cache.find_reply(winning.id).unwrap().status, ReplyStatus::Pending);
            assert_eq!(cache.find_reply(losing.id).unwrap().status, ReplyStatus::Pending);
        }

        engine.accept_bid(&owner_session, winning.id).await.unwrap();

        let cache = engine.cache(&owner_session).await;
        let cache = cache.lock().await;
        assert_eq!(cache.find_reply(winning.id).unwrap().status, ReplyStatus::Accepted);
        assert_eq!(cache.find_reply(losing.id).unwrap().status, ReplyStatus::Rejected);
        assert_eq!(backend.state().await.calls_to("fetch_replies_for_request"), 1);
    });
}

#[test]
fn contact_unlocks_after_acceptance() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend
            .add_user(Role::CarOwner, "Sara", Some("+971 50 111 2222"))
            .await;
        let garage = backend
            .add_user(Role::GarageOwner, "Fix It", Some("+971 4 333 4444"))
            .await;
        let outsider = backend.add_user(Role::GarageOwner, "Other", None).await;
        backend.set_balance(garage.id, 10.0).await;
        let request = backend.insert_request(&owner, "Brake pads").await;

        let garage_session = login(&engine, &garage).await;
        let owner_session = login(&engine, &owner).await;
        let outsider_session = login(&engine, &outsider).await;

        let reply = engine
            .place_bid(&garage_session, request.id, draft(300.0))
            .await
            .unwrap()
            .reply;

        let err = engine
            .contact_counterparty(&garage_session, reply.id)
            .await
            .unwrap_err();
        assert!(err.is_locked_error());

        engine.accept_bid(&owner_session, reply.id).await.unwrap();

        let link = engine
            .contact_counterparty(&garage_session, reply.id)
            .await
            .unwrap();
        assert_eq!(link.phone, "971501112222");
        assert!(link.url.starts_with("https://wa.me/971501112222?text="));
        assert!(link.message.starts_with("Hello Sara!"));
        assert!(link.message.contains("My bid of AED 300 has been accepted"));

        let link = engine
            .contact_counterparty(&owner_session, reply.id)
            .await
            .unwrap();
        assert_eq!(link.phone, "97143334444");
        assert!(link.message.starts_with("Hello Fix It! I accepted your bid"));

        let err = engine
            .contact_counterparty(&outsider_session, reply.id)
            .await
            .unwrap_err();
        assert!(err.is_forbidden_error());
    });
}

#[test]
fn withdraw_only_pending_own_bid() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let other = backend.add_user(Role::GarageOwner, "Other", None).await;
        backend.set_balance(garage.id, 10.0).await;
        let request = backend.insert_request(&owner, "Brake pads").await;

        let session = login(&engine, &garage).await;
        let other_session = login(&engine, &other).await;

        let reply = engine
            .place_bid(&session, request.id, draft(300.0))
            .await
            .unwrap()
            .reply;

        let err = engine.withdraw_bid(&other_session, reply.id).await.unwrap_err();
        assert!(err.is_forbidden_error());

        let withdrawn = engine.withdraw_bid(&session, reply.id).await.unwrap();
        assert_eq!(withdrawn.status, ReplyStatus::Withdrawn);
        assert_eq!(
            engine.list_my_bids(&session).await.unwrap()[0].status,
            ReplyStatus::Withdrawn
        );

        let err = engine.withdraw_bid(&session, reply.id).await.unwrap_err();
        assert_eq!(err.code, 100);
    });
}

#[test]
fn top_up_redirects_to_checkout() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let session = login(&engine, &garage).await;

        for amount in [5.0, 10_001.0, f64::NAN] {
            let err = engine.top_up(&session, amount).await.unwrap_err();
            assert!(err.is_out_of_range_error());
        }
        assert_eq!(backend.state().await.calls_to("stripe-create-checkout"), 0);

        let redirect = engine.top_up(&session, 100.0).await.unwrap();
        assert_eq!(
            redirect,
            TopUpRedirect::Url {
                url: "https://checkout.stripe.com/c/pay/cs_test_memory".into(),
                order_id: Some("ord_memory".into()),
            }
        );

        let state = backend.state().await;
        assert_eq!(state.checkouts[0].amount, 10_000);
        assert_eq!(state.checkouts[0].kind, "wallet_credit");
        assert_eq!(state.checkouts[0].cancel_url, "http://localhost:5173/wallet");
    });
}

#[test]
fn top_up_without_url_needs_publishable_key() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        backend.state().await.checkout = Some(CheckoutSession {
            url: None,
            session_id: Some("cs_test_123".into()),
            order_id: None,
        });
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;

        let engine_without_key = engine(&backend);
        let session = login(&engine_without_key, &garage).await;
        let err = engine_without_key.top_up(&session, 50.0).await.unwrap_err();
        assert_eq!(err.code, 4);

        let config = EngineConfig {
            stripe_publishable_key: Some("pk_test_abc".into()),
            ..Default::default()
        };
        let engine = Engine::new(backend.clone(), config).unwrap();
        let session = login(&engine, &garage).await;

        let redirect = engine.top_up(&session, 50.0).await.unwrap();
        assert_eq!(
            redirect,
            TopUpRedirect::StripeSession {
                session_id: "cs_test_123".into(),
                publishable_key: "pk_test_abc".into(),
                order_id: None,
            }
        );
    });
}

#[test]
fn admin_adjusts_garage_wallet() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let admin = backend.add_user(Role::Admin, "Admin", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let admin_session = login(&engine, &admin).await;
        let garage_session = login(&engine, &garage).await;

        let err = engine
            .adjust_wallet(&garage_session, garage.id, 50.0, "self service".into())
            .await
            .unwrap_err();
        assert!(err.is_forbidden_error());

        let err = engine
            .adjust_wallet(&admin_session, garage.id, 50.0, "  ".into())
            .await
            .unwrap_err();
        assert!(err.is_invalid_input_error());

        let err = engine
            .adjust_wallet(&admin_session, garage.id, -5.0, "goodwill".into())
            .await
            .unwrap_err();
        assert!(err.is_out_of_range_error());

        engine
            .adjust_wallet(&admin_session, garage.id, 50.0, "goodwill credit".into())
            .await
            .unwrap();

        let state = backend.state().await;
        assert_eq!(state.topups, vec![(garage.id, 50.0, "goodwill credit".to_string())]);
        assert_eq!(state.wallets[&garage.id].balance, 50.0);
    });
}

#[test]
fn refund_review_flow() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        backend.state().await.refunds = vec![
            sample_refund("ref_001", RefundStatus::Pending),
            sample_refund("ref_002", RefundStatus::Pending),
        ];
        let engine = engine(&backend);
        let admin = backend.add_user(Role::Admin, "Admin", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        let session = login(&engine, &admin).await;

        let garage_session = login(&engine, &garage).await;
        let err = engine
            .list_refunds(&garage_session, RefundFilter::default())
            .await
            .unwrap_err();
        assert!(err.is_forbidden_error());

        let err = engine
            .approve_refund(&session, "ref_001".into(), " ".into())
            .await
            .unwrap_err();
        assert!(err.is_invalid_input_error());

        let err = engine
            .process_refund(&session, "ref_001".into())
            .await
            .unwrap_err();
        assert_eq!(err.code, 100);

        let approved = engine
            .approve_refund(&session, "ref_001".into(), "Listing was never published".into())
            .await
            .unwrap();
        assert_eq!(approved.status, RefundStatus::Approved);
        assert!(approved.reviewed_at.is_some());

        engine
            .reject_refund(&session, "ref_002".into(), "Duplicate request".into())
            .await
            .unwrap();

        let processed = engine
            .process_refund(&session, "ref_001".into())
            .await
            .unwrap();
        assert_eq!(processed.status, RefundStatus::Processed);

        let stats = engine.refund_stats(&session).await.unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.total_refunded, 50.0);

        let rejected = engine
            .list_refunds(
                &session,
                RefundFilter {
                    status: Some(RefundStatus::Rejected),
                    search: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, "ref_002");

        let export = engine
            .export_refunds(&session, RefundFilter::default())
            .await
            .unwrap();
        assert!(export.filename.starts_with("refunds-"));
        assert_eq!(export.content.lines().count(), 3);

        assert_eq!(backend.state().await.calls_to("fetch_refund_requests"), 1);
    });
}

#[test]
fn refresh_reloads_wallet_bids_and_requests() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend.add_user(Role::CarOwner, "Sara", None).await;
        let garage = backend.add_user(Role::GarageOwner, "Fix It", None).await;
        backend.set_balance(garage.id, 10.0).await;
        let request = backend.insert_request(&owner, "Brake pads").await;
        let session = login(&engine, &garage).await;

        engine
            .place_bid(&session, request.id, draft(300.0))
            .await
            .unwrap();
        backend.set_balance(garage.id, 40.0).await;

        let overview = engine.refresh(&session).await.unwrap();
        assert_eq!(overview.wallet.balance, 40.0);
        assert_eq!(overview.bids.len(), 1);
        assert!(overview.requests.is_empty());
        assert_eq!(engine.wallet(&session).await.unwrap().balance, 40.0);
    });
}

#[test]
fn owner_and_garage_end_to_end() {
    block_on(async {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine(&backend);
        let owner = backend
            .add_user(Role::CarOwner, "Sara", Some("0501112222"))
            .await;
        let garage = backend
            .add_user(Role::GarageOwner, "Fix It", Some("043334444"))
            .await;
        backend.set_balance(garage.id, 4.0).await;

        let owner_session = login(&engine, &owner).await;
        let garage_session = login(&engine, &garage).await;

        let request = engine
            .create_bid_request(&owner_session, new_request("Engine Oil Leak Repair"))
            .await
            .unwrap();

        let listing = engine
            .list_available_requests(&garage_session)
            .await
            .unwrap();
        assert_eq!(listing.source, ListingSource::Remote);
        assert_eq!(listing.requests[0].id, request.id);

        let outcome = engine
            .place_bid(&garage_session, request.id, draft(800.0))
            .await
            .unwrap();
        assert_eq!(outcome.wallet.unwrap().balance, 2.0);

        let replies = engine.list_replies(&owner_session, request.id).await.unwrap();
        engine
            .accept_bid(&owner_session, replies[0].id)
            .await
            .unwrap();

        let bids = engine.list_my_bids(&garage_session).await.unwrap();
        assert_eq!(bids[0].status, ReplyStatus::Accepted);

        let link = engine
            .contact_counterparty(&garage_session, bids[0].id)
            .await
            .unwrap();
        assert_eq!(link.phone, "0501112222");

        let mine = engine.list_my_requests(&owner_session).await.unwrap();
        assert_eq!(mine[0].status, RequestStatus::Closed);
        assert_eq!(mine[0].display_id, request.display_id);
    });
}
