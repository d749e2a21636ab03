//! End-to-end pipeline tests: upload, approval, training, generation.

mod common;

use common::PipelineHarness;

use slideforge::error::{MatchError, SlideforgeError, TrainingError};
use slideforge::{CandidateAction, GenerationRequest, SourceStatus};

fn request(topic: &str, slide_count: usize) -> GenerationRequest {
    GenerationRequest {
        topic: topic.to_string(),
        customer: None,
        industry: None,
        audience: None,
        style: None,
        slide_count,
        requirements: vec![],
    }
}

const DECK_A: &str = "Agenda\nwhat we cover today\n---\n\
Payments growth\nmobile payments doubled\n---\n\
Wrap up\nsummary and next steps\n";

const DECK_B: &str = "Compliance\nregulatory overview\n---\n\
Risk controls\nfraud detection measures\n";

#[test]
fn approved_deck_flows_through_to_generation() {
    let harness = PipelineHarness::new();
    let source = harness.upload_approved("payments.txt", DECK_A);

    let status = harness.train();
    assert_eq!(status.status, "completed");
    assert_eq!(status.processed_count, 1);
    assert_eq!(status.progress, 100);

    let artifact = harness
        .service
        .generate(&request("payments growth", 2))
        .unwrap();
    assert_eq!(artifact.slides.len(), 2);
    assert!(artifact.slides.iter().all(|s| s.source_id == source.id));
}

#[test]
fn pending_deck_is_invisible_to_generation() {
    let harness = PipelineHarness::new();
    harness.upload("pending.txt", DECK_A);
    harness.train();

    let result = harness.service.generate(&request("payments", 2));
    assert!(matches!(
        result,
        Err(SlideforgeError::Match(MatchError::InsufficientContent))
    ));
}

#[test]
fn late_rejection_removes_content_immediately() {
    let harness = PipelineHarness::new();
    let source = harness.upload_approved("payments.txt", DECK_A);
    harness.train();

    assert!(harness.service.generate(&request("payments", 1)).is_ok());

    // Revoke approval between generations. Rejection is only legal from
    // `processing`, so revocation happens as a soft delete.
    harness.service.soft_delete(&source.id, "admin").unwrap();

    assert!(matches!(
        harness.service.generate(&request("payments", 1)),
        Err(SlideforgeError::Match(MatchError::InsufficientContent))
    ));
}

#[test]
fn rejected_deck_never_trains() {
    let harness = PipelineHarness::new();
    let source = harness.upload("rejected.txt", DECK_A);
    harness
        .service
        .reject(&source.id, "bob", "off brand")
        .unwrap();

    let status = harness.train();
    assert_eq!(status.status, "completed");
    assert_eq!(status.total_count, 0);

    assert!(harness.service.generate(&request("payments", 1)).is_err());
}

#[test]
fn training_slot_is_exclusive_until_terminal() {
    let harness = PipelineHarness::new();
    harness.upload_approved("a.txt", DECK_A);

    // Hold the slot manually so the second start is deterministic.
    harness
        .db
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO training_jobs (id, status, progress, processed_count, total_count, created_at)
                 VALUES ('held', 'running', 10, 0, 1, '2026-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

    assert!(matches!(
        harness.service.start_training(),
        Err(SlideforgeError::Training(TrainingError::AlreadyRunning))
    ));

    harness
        .db
        .with_conn(|conn| {
            conn.execute("UPDATE training_jobs SET status = 'failed' WHERE id = 'held'", [])?;
            Ok(())
        })
        .unwrap();

    // Slot released: the retry goes through.
    let status = harness.train();
    assert_eq!(status.status, "completed");
}

#[test]
fn generation_spreads_across_sources() {
    let harness = PipelineHarness::new();
    let a = harness.upload_approved("a.txt", DECK_A);
    let b = harness.upload_approved("b.txt", DECK_B);
    harness.train();

    // Default max_source_share is 0.4: a 4-slide deck takes at most
    // ceil(4 * 0.4) = 2 slides per source.
    let artifact = harness.service.generate(&request("overview", 4)).unwrap();
    let from_a = artifact.slides.iter().filter(|s| s.source_id == a.id).count();
    let from_b = artifact.slides.iter().filter(|s| s.source_id == b.id).count();
    assert!(from_a <= 2, "source A supplied {} slides", from_a);
    assert!(from_b <= 2, "source B supplied {} slides", from_b);
    assert_eq!(artifact.slides.len(), 4);
}

#[test]
fn title_slide_opens_the_generated_deck() {
    let harness = PipelineHarness::new();
    harness.upload_approved("a.txt", DECK_A);
    harness.train();

    let artifact = harness.service.generate(&request("payments", 3)).unwrap();
    // "Agenda" classifies as a title slide and must come first.
    assert_eq!(artifact.slides[0].title, "Agenda");
}

#[test]
fn high_confidence_slides_are_copied_verbatim() {
    let harness = PipelineHarness::new();
    harness.upload_approved("a.txt", DECK_A);
    harness.train();

    let artifact = harness.service.generate(&request("payments", 1)).unwrap();
    let slide = &artifact.slides[0];
    // StubScorer returns 0.9; blended with the embedding component this
    // stays in the copy-exact band.
    assert_eq!(slide.action, CandidateAction::CopyExact);
}

#[test]
fn second_training_run_skips_indexed_sources() {
    let harness = PipelineHarness::new();
    harness.upload_approved("a.txt", DECK_A);

    let first = harness.train();
    assert_eq!(first.processed_count, 1);

    // Everything is indexed; the second run has nothing to do.
    let second = harness.train();
    assert_eq!(second.status, "completed");
    assert_eq!(second.total_count, 0);
}

#[test]
fn training_history_is_retained() {
    let harness = PipelineHarness::new();
    harness.train();
    harness.train();

    let count: u32 = harness
        .db
        .with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM training_jobs", [], |r| r.get(0))?;
            Ok(count)
        })
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn failed_upload_is_visible_with_error_detail() {
    let harness = PipelineHarness::new();
    let result = harness.service.upload(slideforge::NewSource {
        owner: "alice".to_string(),
        filename: "empty.txt".to_string(),
        file_path: harness.write_deck("empty.txt", "").to_string_lossy().to_string(),
        byte_size: 0,
        title: None,
        industry: None,
        tags: vec![],
    });
    assert!(result.is_err());

    let failed = harness.service.sources_by_status(SourceStatus::Failed).unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error.as_deref().unwrap().contains("No slides"));
}

#[test]
fn audit_trail_covers_the_full_lifecycle() {
    let harness = PipelineHarness::new();
    let source = harness.upload_approved("a.txt", DECK_A);

    let trail: Vec<(String, String)> = harness
        .db
        .with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT actor, new_status FROM audit_events WHERE source_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([&source.id], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .unwrap();

    let statuses: Vec<&str> = trail.iter().map(|(_, s)| s.as_str()).collect();
    assert_eq!(statuses, vec!["pending", "processing", "approved"]);
    assert_eq!(trail[2].0, "bob");
}
