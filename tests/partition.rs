//! Randomised interleavings: each role writes only its own partition and
//! every candidate reaches the other side exactly once, in discovery order.

mod common;

use common::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use relaycall::store::WriteTarget;
use relaycall::{MemoryStore, SessionState};

fn caller_may_write(target: &WriteTarget) -> bool {
    match target {
        WriteTarget::CreateDocument => true,
        WriteTarget::Field(f) => f == "offer",
        WriteTarget::Subcollection(s) => s == "offerCandidates",
    }
}

fn answerer_may_write(target: &WriteTarget) -> bool {
    match target {
        WriteTarget::CreateDocument => false,
        WriteTarget::Field(f) => f == "answer",
        WriteTarget::Subcollection(s) => s == "answerCandidates",
    }
}

async fn run_schedule(seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let backend = MemoryStore::new();
    let mut caller = caller(&backend);
    let mut answerer = answerer(&backend);

    let id = caller.start_as_caller().await.unwrap();
    let mut joined = false;
    let mut caller_sent = Vec::new();
    let mut answerer_sent = Vec::new();

    for step in 0..60 {
        match rng.random_range(0..6) {
            0 => {
                let c = cand(&format!("o{step}"));
                caller.transport().emit_candidate(c.clone());
                caller_sent.push(c);
            }
            1 if joined => {
                let c = cand(&format!("a{step}"));
                answerer.transport().emit_candidate(c.clone());
                answerer_sent.push(c);
            }
            2 => {
                caller.drain_pending().await.unwrap();
            }
            3 => {
                answerer.drain_pending().await.unwrap();
            }
            4 if !joined => {
                answerer.join_as_answerer(&id).await.unwrap();
                joined = true;
            }
            5 => {
                if rng.random_bool(0.3) {
                    backend.redeliver().await;
                }
            }
            _ => {}
        }
    }

    if !joined {
        answerer.join_as_answerer(&id).await.unwrap();
    }
    for _ in 0..2 {
        caller.drain_pending().await.unwrap();
        answerer.drain_pending().await.unwrap();
    }

    for w in backend.writes_by("caller").await {
        assert!(caller_may_write(&w.target), "seed {seed}: caller wrote {w:?}");
    }
    for w in backend.writes_by("answerer").await {
        assert!(answerer_may_write(&w.target), "seed {seed}: answerer wrote {w:?}");
    }

    assert_eq!(answerer.transport().added_candidates(), caller_sent, "seed {seed}");
    assert_eq!(caller.transport().added_candidates(), answerer_sent, "seed {seed}");
    assert_eq!(caller.transport().remote_descriptions().len(), 1, "seed {seed}");
    assert_eq!(answerer.transport().remote_descriptions().len(), 1, "seed {seed}");
    assert_eq!(caller.transport().rejected_candidates(), 0);
    assert_eq!(answerer.transport().rejected_candidates(), 0);
    assert_eq!(caller.state(), SessionState::CandidatesFlowing);
}

#[tokio::test]
async fn partitions_hold_under_random_interleavings() {
    for seed in 0..64 {
        run_schedule(seed).await;
    }
}
