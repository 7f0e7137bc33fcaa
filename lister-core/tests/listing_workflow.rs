mod support;

use std::collections::HashSet;
use std::time::Duration;

use lister_core::browser::{ClickStrategy, HumanPacing};
use lister_core::config::{ListerConfig, PollWindow};
use lister_core::marketplace;
use lister_core::{ListingWorkflow, StatusReporter, WorkflowOutcome, WorkflowSettings};
use tempfile::tempdir;
use tokio::time::Instant;

use support::{listing, test_config, Action, FakeBackend, FakeSurface, Report, SurfaceState};

fn workflow(config: &ListerConfig) -> ListingWorkflow {
    ListingWorkflow::new(WorkflowSettings::from_config(config), HumanPacing::immediate())
}

fn reporter() -> StatusReporter {
    StatusReporter::with_limits(3, Duration::ZERO)
}

/// A create form where everything renders and one location suggestion shows up.
fn form_state() -> SurfaceState {
    let mut state = SurfaceState::permissive();
    state
        .missing
        .insert(marketplace::creation_limit_marker().value);
    state
        .counts
        .insert(marketplace::location_suggestions().value, 1);
    state
}

fn scratch_files(config: &ListerConfig) -> usize {
    match std::fs::read_dir(&config.paths.photos_dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

fn unpublished_reasons(backend: &FakeBackend) -> Vec<String> {
    backend
        .reports()
        .into_iter()
        .filter_map(|report| match report {
            Report::Unpublished { reason, .. } => Some(reason),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn publishes_a_complete_listing() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let backend = FakeBackend::with_location();
    let mut surface = FakeSurface::new(form_state());

    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &listing(1, 10))
        .await;

    assert_eq!(
        outcome,
        WorkflowOutcome::Published {
            location_id: "77".into(),
            reported: true,
        }
    );
    assert_eq!(
        backend.reports(),
        vec![Report::Published {
            listing: "1".into(),
            location: "77".into(),
        }]
    );

    let state = surface.state.borrow();
    assert_eq!(
        state.navigations(),
        vec![config.marketplace.create_listing_url.clone()]
    );
    let attached = state
        .actions
        .iter()
        .find_map(|action| match action {
            Action::Attach { files, .. } => Some(files.len()),
            _ => None,
        })
        .unwrap();
    assert_eq!(attached, 2);
    assert!(state.actions.contains(&Action::Type {
        locator: marketplace::location_input().value,
        value: "Bab Ezzouar, Alger, Algeria".into(),
    }));
    assert!(state.actions.contains(&Action::Type {
        locator: marketplace::price_input().value,
        value: "25000".into(),
    }));
    let clicks = state.clicks();
    assert_eq!(
        clicks[clicks.len() - 3..],
        [
            marketplace::hide_from_friends().value,
            marketplace::next_button().value,
            marketplace::publish_button().value,
        ]
    );
    assert_eq!(scratch_files(&config), 0, "downloaded photos are cleaned up");
}

#[tokio::test]
async fn category_failure_reports_once_and_stops() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let backend = FakeBackend::with_location();
    let mut state = form_state();
    state
        .failing
        .insert(marketplace::category_dropdown().value);
    let mut surface = FakeSurface::new(state);

    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &listing(2, 10))
        .await;

    let WorkflowOutcome::Unpublished { reason, reported } = outcome.clone() else {
        panic!("expected an unpublished outcome, got {outcome:?}");
    };
    assert!(reported);
    assert!(reason.contains("set-category"), "{reason}");

    let reasons = unpublished_reasons(&backend);
    assert_eq!(backend.reports().len(), 1);
    assert!(reasons[0].contains("category"));

    let state = surface.state.borrow();
    assert!(!state.clicks().contains(&marketplace::publish_button().value));
    assert!(!state
        .attempts
        .iter()
        .any(|key| key.contains(&marketplace::condition_dropdown().value)));
    assert_eq!(backend.state.borrow().location_calls, 0);
    assert_eq!(scratch_files(&config), 0);
}

#[tokio::test]
async fn limit_marker_aborts_before_touching_the_form() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let backend = FakeBackend::with_location();
    let mut state = form_state();
    state
        .missing
        .remove(&marketplace::creation_limit_marker().value);
    let mut surface = FakeSurface::new(state);

    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &listing(3, 10))
        .await;

    assert_eq!(outcome, WorkflowOutcome::LimitReached { reported: true });
    assert_eq!(
        unpublished_reasons(&backend),
        vec![lister_core::workflow::LIMIT_REACHED_REASON.to_string()]
    );
    assert_eq!(surface.state.borrow().actions.len(), 1);
    assert!(backend.state.borrow().downloads.is_empty());
}

#[tokio::test]
async fn missing_field_is_reported_without_automation() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let backend = FakeBackend::with_location();
    let mut surface = FakeSurface::new(form_state());
    let mut incomplete = listing(4, 10);
    incomplete.title = None;

    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &incomplete)
        .await;

    assert!(matches!(outcome, WorkflowOutcome::Unpublished { .. }));
    assert_eq!(
        unpublished_reasons(&backend),
        vec!["missing required field: title".to_string()]
    );
    assert!(surface.state.borrow().attempts.is_empty());
}

#[tokio::test]
async fn any_failing_interaction_yields_exactly_one_report() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let backend = FakeBackend::with_location();
    let mut surface = FakeSurface::new(form_state());
    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &listing(5, 10))
        .await;
    assert!(outcome.is_published());
    let sequence: Vec<String> = surface
        .state
        .borrow()
        .actions
        .iter()
        .map(Action::key)
        .collect();

    for failing_at in 0..sequence.len() {
        let backend = FakeBackend::with_location();
        let mut state = form_state();
        state.fail_after = Some(failing_at);
        let mut surface = FakeSurface::new(state);

        let outcome = workflow(&config)
            .run(&mut surface, &backend, &reporter(), &listing(5, 10))
            .await;

        assert!(
            matches!(outcome, WorkflowOutcome::Unpublished { .. }),
            "failure at {} should not publish",
            sequence[failing_at]
        );
        assert_eq!(backend.reports().len(), 1, "one report for {}", sequence[failing_at]);

        let reached: HashSet<&String> = sequence[..=failing_at].iter().collect();
        let state = surface.state.borrow();
        assert_eq!(state.succeeded, failing_at);
        for attempted in &state.attempts {
            assert!(
                reached.contains(attempted),
                "{attempted} ran after {} failed",
                sequence[failing_at]
            );
        }
        assert_eq!(scratch_files(&config), 0);
    }
}

#[tokio::test]
async fn location_is_retried_until_the_attempt_cap() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.workflow.location_max_attempts = 3;
    let backend = FakeBackend::with_location();
    let mut state = form_state();
    state.counts.clear();
    let mut surface = FakeSurface::new(state);

    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &listing(6, 10))
        .await;

    let WorkflowOutcome::Unpublished { reason, .. } = outcome.clone() else {
        panic!("expected an unpublished outcome, got {outcome:?}");
    };
    assert!(reason.starts_with("resolve-and-set-location failed"), "{reason}");
    assert!(reason.contains("gave up after 3 attempts"), "{reason}");
    assert_eq!(backend.state.borrow().location_calls, 3);
    assert!(!surface
        .state
        .borrow()
        .clicks()
        .contains(&marketplace::first_location_suggestion().value));
}

#[tokio::test(start_paused = true)]
async fn location_retries_stop_at_the_deadline() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.workflow.location_deadline_seconds = 5;
    config.poll.suggestions = PollWindow {
        max_iterations: 3,
        delay_ms: [1000, 1000],
    };
    let backend = FakeBackend::with_location();
    let mut state = form_state();
    state.counts.clear();
    let mut surface = FakeSurface::new(state);

    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &listing(6, 10))
        .await;

    let WorkflowOutcome::Unpublished { reason, .. } = outcome.clone() else {
        panic!("expected an unpublished outcome, got {outcome:?}");
    };
    assert!(reason.contains("gave up after 2 attempts"), "{reason}");
    assert_eq!(backend.state.borrow().location_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn human_pacing_hesitates_before_clicks_and_types_slowly() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.pacing.human_typing = true;
    config.pacing.click_hesitation_ms = [1000, 1000];
    let backend = FakeBackend::with_location();
    let mut surface = FakeSurface::new(form_state());
    let workflow = ListingWorkflow::new(
        WorkflowSettings::from_config(&config),
        HumanPacing::new(config.pacing.clone()),
    );
    let started = Instant::now();

    let outcome = workflow
        .run(&mut surface, &backend, &reporter(), &listing(8, 10))
        .await;

    assert!(matches!(outcome, WorkflowOutcome::Published { .. }), "{outcome:?}");
    let state = surface.state.borrow();
    let clicks = state.clicks().len() as u64;
    assert!(clicks >= 7);
    assert_eq!(started.elapsed(), Duration::from_secs(clicks));
    for locator in [
        marketplace::title_input(),
        marketplace::price_input(),
        marketplace::location_input(),
    ] {
        assert!(state.paced_typing.contains(&locator.value), "{locator}");
    }
}

#[tokio::test]
async fn obstructed_buttons_fall_back_to_script_clicks() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let backend = FakeBackend::with_location();
    let mut state = form_state();
    state
        .obstructed
        .insert(marketplace::publish_button().value);
    let mut surface = FakeSurface::new(state);

    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &listing(7, 10))
        .await;

    assert!(outcome.is_published());
    assert!(surface.state.borrow().actions.contains(&Action::Click {
        locator: marketplace::publish_button().value,
        strategy: ClickStrategy::ScrollAndScript,
    }));
}

#[tokio::test]
async fn undelivered_publication_is_still_published() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let backend = FakeBackend::with_location();
    backend.state.borrow_mut().failing_reports = usize::MAX;
    let mut surface = FakeSurface::new(form_state());

    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &listing(8, 10))
        .await;

    assert_eq!(
        outcome,
        WorkflowOutcome::Published {
            location_id: "77".into(),
            reported: false,
        }
    );
    assert_eq!(backend.state.borrow().report_calls, 3);
}

#[tokio::test]
async fn listing_without_photos_skips_the_upload() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let backend = FakeBackend::with_location();
    let mut surface = FakeSurface::new(form_state());
    let mut bare = listing(9, 10);
    bare.photos.clear();

    let outcome = workflow(&config)
        .run(&mut surface, &backend, &reporter(), &bare)
        .await;

    assert!(outcome.is_published());
    assert!(!surface
        .state
        .borrow()
        .actions
        .iter()
        .any(|action| matches!(action, Action::Attach { .. })));
}
