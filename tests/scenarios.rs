mod common;

use common::*;
use reqwest::StatusCode;
use swipetui::feeds::home_timeline::decode_timeline;
use swipetui::feeds::FetchCursor;
use swipetui::post::Verdict;
use swipetui::triage::{CardState, TriageEvent, ANIMATION_DURATION_MS};
use tempfile::tempdir;

const DRAG: [(u64, i32); 5] = [(0, 0), (25, 40), (50, 80), (75, 140), (100, 220)];

#[tokio::test]
async fn first_run_shows_newest_post() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push_ids(&[30, 20, 10]);
    let mut c = controller(dir.path(), fetcher.clone());

    fetch(&mut c, 0).await;

    assert_eq!(fetcher.cursors(), vec![FetchCursor::Latest { count: 200 }]);
    assert_eq!(c.incoming_with_current().ids(), vec![30, 20, 10]);
    assert_eq!(c.model().current().map(|p| p.id), Some(30));
    assert_eq!(c.model().incoming().ids(), vec![20, 10]);
    assert_eq!(c.model().most_recent_id(), 30);
    assert_eq!(c.state(), CardState::AtRest);
}

#[tokio::test]
async fn fast_swipe_right_likes_and_advances() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push_ids(&[30, 20, 10]);
    let mut c = controller(dir.path(), fetcher);
    let events = record(&mut c);
    fetch(&mut c, 0).await;
    c.tick(500);

    gesture(&mut c, 1_000, &DRAG);
    assert_eq!(c.card().offset_x(), 220);
    c.release(310, 5, 1_110);
    assert_eq!(c.state(), CardState::Coasting);
    let expected = 1000.0 * 310.0 / 110.0 / 25.0;
    assert!((c.velocity() - expected).abs() < 1e-9);

    // The first coasting tick carries the card past the right edge.
    c.tick(1_135);
    assert_eq!(c.state(), CardState::Dismissing(Verdict::Liked));
    assert_eq!(c.model().liked().ids(), vec![30]);
    assert!(events.borrow().contains(&TriageEvent::Classified {
        id: 30,
        verdict: Verdict::Liked
    }));

    c.tick(1_135 + ANIMATION_DURATION_MS);
    assert_eq!(c.state(), CardState::AtRest);
    assert_eq!(c.model().current().map(|p| p.id), Some(20));
    assert_eq!(c.card().opacity(), 1.0);
    assert_disjoint(&c);
}

#[tokio::test]
async fn slow_drop_returns_without_classifying() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push_ids(&[30, 20, 10]);
    let mut c = controller(dir.path(), fetcher);
    fetch(&mut c, 0).await;
    c.tick(500);

    gesture(&mut c, 1_000, &DRAG);
    c.release(310, 5, 1_400);
    assert_eq!(c.state(), CardState::Returning);

    c.tick(1_400 + ANIMATION_DURATION_MS);
    assert_eq!(c.state(), CardState::AtRest);
    assert!(c.card().is_at_rest());
    assert_eq!(c.card().opacity(), 1.0);
    assert!(c.model().liked().is_empty());
    assert!(c.model().disliked().is_empty());
    assert_eq!(c.model().current().map(|p| p.id), Some(30));
}

#[tokio::test]
async fn refresh_merges_without_duplicating_current() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push_ids(&[30, 20, 10]);
    fetcher.push_ids(&[40, 30]);
    let mut c = controller(dir.path(), fetcher.clone());
    fetch(&mut c, 0).await;
    fetch(&mut c, 1_000).await;

    assert_eq!(
        fetcher.cursors(),
        vec![FetchCursor::Latest { count: 200 }, FetchCursor::SinceId(30)]
    );
    assert_eq!(c.model().incoming().ids(), vec![40, 20, 10]);
    assert_eq!(c.model().current().map(|p| p.id), Some(30));
    assert_eq!(c.model().most_recent_id(), 40);
    assert_disjoint(&c);
}

#[tokio::test]
async fn clicking_a_word_records_it_once() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(vec![swipetui::post::Post::new(
        1,
        "Hello, world #rust",
        "Ada",
    )]));
    let mut c = controller(dir.path(), fetcher);
    fetch(&mut c, 0).await;

    let token = c
        .card()
        .chips()
        .iter()
        .find(|chip| chip.token == "#rust")
        .map(|chip| chip.token.clone())
        .unwrap();
    c.select_word(&token);
    assert_eq!(c.words().iter().collect::<Vec<_>>(), vec!["#rust"]);
    c.select_word(&token);
    assert_eq!(c.words().iter().collect::<Vec<_>>(), vec!["#rust"]);
}

#[tokio::test]
async fn api_error_is_reported_and_changes_nothing() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push_ids(&[30, 20, 10]);
    fetcher.push(decode_timeline(
        StatusCode::TOO_MANY_REQUESTS,
        r#"{"errors":[{"message":"Rate","code":88}]}"#,
    ));
    fetcher.push_ids(&[50]);
    let mut c = controller(dir.path(), fetcher);
    fetch(&mut c, 0).await;
    let before = (
        c.model().all_ids(),
        c.model().most_recent_id(),
        c.state(),
    );

    let events = record(&mut c);
    fetch(&mut c, 100).await;

    let after = (
        c.model().all_ids(),
        c.model().most_recent_id(),
        c.state(),
    );
    assert_eq!(before, after);
    let warning = events.borrow().iter().find_map(|e| match e {
        TriageEvent::Warning { body, .. } => Some(body.clone()),
        _ => None,
    });
    assert!(warning.unwrap().contains("Rate (code: 88)"));
    assert!(events
        .borrow()
        .iter()
        .any(|e| matches!(e, TriageEvent::StatusMessage(_))));

    // Another refresh goes through.
    fetch(&mut c, 200).await;
    assert!(c.model().incoming().contains(50));
}

#[tokio::test]
async fn overlapping_refresh_is_ignored() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push_ids(&[3, 2, 1]);
    let mut c = controller(dir.path(), fetcher.clone());
    let events = record(&mut c);

    c.refresh();
    c.refresh();
    assert!(c.wait_for_fetch(0).await);
    assert!(!c.wait_for_fetch(0).await);
    assert_eq!(fetcher.cursors().len(), 1);
    let started = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, TriageEvent::FetchStarted))
        .count();
    assert_eq!(started, 1);
}

#[tokio::test]
async fn inputs_during_dismissal_are_ignored() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push_ids(&[30, 20, 10]);
    let mut c = controller(dir.path(), fetcher);
    fetch(&mut c, 0).await;
    c.tick(500);

    c.like(1_000);
    c.dislike(1_010);
    c.like(1_020);
    gesture(&mut c, 1_030, &DRAG);
    c.release(900, 5, 1_140);
    c.tick(1_150);

    assert_eq!(c.model().liked().ids(), vec![30]);
    assert!(c.model().disliked().is_empty());
    assert_eq!(c.state(), CardState::Dismissing(Verdict::Liked));

    c.tick(1_000 + ANIMATION_DURATION_MS);
    assert_eq!(c.model().current().map(|p| p.id), Some(20));
}

#[tokio::test]
async fn sets_stay_disjoint_through_a_session() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push_ids(&[10, 9, 8, 7]);
    fetcher.push_ids(&[12, 11, 10, 9]);
    fetcher.push_ids(&[13, 7, 6]);
    let mut c = controller(dir.path(), fetcher);
    let mut now = 0;
    let mut last_recent = 0;

    for round in 0..3 {
        fetch(&mut c, now).await;
        assert!(c.model().most_recent_id() >= last_recent);
        last_recent = c.model().most_recent_id();
        for step in 0..3 {
            now += 1_000;
            if (round + step) % 2 == 0 {
                c.like(now);
            } else {
                c.dislike(now);
            }
            c.tick(now + ANIMATION_DURATION_MS);
            assert_disjoint(&c);
        }
    }
    // The last press of the final round finds no card left.
    assert_eq!(c.model().liked().len() + c.model().disliked().len(), 8);
    assert_eq!(c.state(), CardState::Empty);
    assert_eq!(c.model().most_recent_id(), 13);
}

#[tokio::test]
async fn release_decision_depends_on_gap_and_sample_count() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push_ids(&[1]);
    let mut c = controller(dir.path(), fetcher);
    fetch(&mut c, 0).await;

    let small: [(u64, i32); 5] = [(0, 0), (10, 2), (20, 4), (30, 6), (40, 8)];
    let mut now = 1_000;
    for gap in [0, 1, 50, 100, 101, 150, 400] {
        c.tick(now);
        gesture(&mut c, now, &small);
        c.release(8, 5, now + 40 + gap);
        let expected = if gap <= 100 {
            CardState::Coasting
        } else {
            CardState::Returning
        };
        assert_eq!(c.state(), expected, "gap {}", gap);
        // Let it settle back to rest.
        for _ in 0..200 {
            now += 25;
            c.tick(now);
        }
        assert_eq!(c.state(), CardState::AtRest, "gap {}", gap);
    }

    // Four samples are never enough.
    c.tick(now);
    gesture(&mut c, now, &small[..4]);
    c.release(6, 5, now + 31);
    assert_eq!(c.state(), CardState::Returning);
}
