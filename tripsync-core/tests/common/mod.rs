#![allow(dead_code)]

use std::future::Future;
use std::rc::Rc;

use tripsync_core::{
    ActivityDraft, MemorySession, MemoryStore, Planner, TripDraft, TripId, UserId, UserIdentity,
};

pub fn run<F: Future>(future: F) -> F::Output {
    futures::executor::block_on(future)
}

pub fn backend() -> Rc<MemoryStore> {
    let _ = env_logger::builder().is_test(true).try_init();
    Rc::new(MemoryStore::new())
}

pub fn ana() -> UserIdentity {
    UserIdentity {
        id: UserId("uid-ana".into()),
        email: "ana@example.com".into(),
        display_name: Some("Ana".into()),
    }
}

pub fn ben() -> UserIdentity {
    UserIdentity {
        id: UserId("uid-ben".into()),
        email: "ben@example.com".into(),
        display_name: Some("Ben".into()),
    }
}

pub fn cleo() -> UserIdentity {
    UserIdentity {
        id: UserId("uid-cleo".into()),
        email: "cleo@example.com".into(),
        display_name: None,
    }
}

pub fn owner_planner(store: &Rc<MemoryStore>) -> Planner<MemorySession> {
    Planner::new(MemorySession::signed_in(store, ana()))
}

/// A fresh private trip owned by ana, not yet opened.
pub fn seed_trip(planner: &Planner<MemorySession>) -> TripId {
    run(planner.create_trip(TripDraft::titled("Kyoto in May")))
        .expect("seed trip")
        .id
}

pub fn titled(title: &str) -> ActivityDraft {
    ActivityDraft {
        title: title.into(),
        ..ActivityDraft::default()
    }
}

pub fn costed(title: &str, cost: f64) -> ActivityDraft {
    ActivityDraft {
        title: title.into(),
        cost: Some(cost),
        ..ActivityDraft::default()
    }
}

pub fn titles(planner: &Planner<MemorySession>) -> Vec<String> {
    planner.activities().iter().map(|a| a.title.clone()).collect()
}
