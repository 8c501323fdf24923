use std::time::Duration;

use pdfshelf_application::{
    Disposition, ReaderCommand, ReaderError, ReaderOutcome, ReaderPhase,
};
use pdfshelf_core::{BookId, NavigationParams, Zoom};
use pdfshelf_test::{Harness, RenderCall, SAMPLE_PDF};

fn open_params(id: &str) -> NavigationParams {
    NavigationParams::for_book(BookId::from(id))
}

#[tokio::test(start_paused = true)]
async fn resumes_at_stored_page() -> Result<(), ReaderError> {
    let harness = Harness::new(10).with_book("dune", 5, 10);
    let session = harness.session();

    let outcome = session.load(&open_params("dune")).await?;
    assert_eq!(outcome, ReaderOutcome::Rendered { page: 5 });

    let view = session.snapshot();
    assert_eq!(view.phase, ReaderPhase::Ready);
    assert_eq!((view.current_page, view.total_pages), (5, 10));
    assert_eq!(view.progress_pct(), 50);
    assert_eq!(view.zoom, Zoom::default());
    assert_eq!(view.surface.map(|s| s.page), Some(5));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn out_of_range_last_page_starts_at_first_page() -> Result<(), ReaderError> {
    let harness = Harness::new(10).with_book("dune", 15, 20);
    let session = harness.session();

    session.load(&open_params("dune")).await?;
    assert_eq!(session.current_page(), 1);
    let stored = harness.stored("dune").map(|b| (b.last_page, b.total_pages));
    assert_eq!(stored, Some((1, 10)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn page_count_is_saved_before_first_render() -> Result<(), ReaderError> {
    let harness = Harness::new(7).with_book("fresh", 1, 0);
    let session = harness.session();

    session.load(&open_params("fresh")).await?;
    // One write for the page count, one for the first rendered page.
    assert_eq!(harness.metadata.writes(), 2);
    assert_eq!(harness.stored("fresh").map(|b| b.total_pages), Some(7));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn missing_binary_fails_without_rendering() {
    let harness = Harness::new(10).with_book("gone", 3, 10);
    harness.binaries.clear();
    let session = harness.session();

    let err = session.load(&open_params("gone")).await.unwrap_err();
    assert!(matches!(err, ReaderError::DocumentMissing(_)));
    assert_eq!(err.disposition(), Disposition::RedirectToLibrary);
    assert!(matches!(session.phase(), ReaderPhase::Error(_)));
    assert_eq!(harness.renderer.log.opens(), 0);
    assert_eq!(harness.renderer.log.render_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_book_is_not_found() {
    let harness = Harness::new(10);
    let session = harness.session();

    let err = session.load(&open_params("nope")).await.unwrap_err();
    assert_eq!(err, ReaderError::BookNotFound(BookId::from("nope")));
    assert_eq!(err.disposition(), Disposition::RedirectToLibrary);
}

#[tokio::test(start_paused = true)]
async fn missing_id_is_a_missing_parameter() {
    let harness = Harness::new(10).with_book("dune", 1, 0);
    let session = harness.session();

    let err = session
        .load(&NavigationParams::from_query("?name=Dune"))
        .await
        .unwrap_err();
    assert_eq!(err, ReaderError::MissingParameter);
    assert_eq!(harness.metadata.writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn rapid_requests_during_render_are_dropped() -> Result<(), ReaderError> {
    let harness = Harness::new(10).with_book("dune", 2, 10);
    let session = harness.session();
    session.load(&open_params("dune")).await?;

    let renders_before = harness.renderer.log.render_count();
    let writes_before = harness.metadata.writes();

    let (first, second) = tokio::join!(session.next_page(), session.next_page());
    assert_eq!(first?, ReaderOutcome::Rendered { page: 3 });
    assert_eq!(second?, ReaderOutcome::Dropped);

    assert_eq!(harness.renderer.log.render_count(), renders_before + 1);
    assert_eq!(harness.metadata.writes(), writes_before + 1);
    assert_eq!(session.current_page(), 3);
    assert_eq!(harness.stored("dune").map(|b| b.last_page), Some(3));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn navigation_clamps_and_skips_current_page() -> Result<(), ReaderError> {
    let harness = Harness::new(10).with_book("dune", 4, 10);
    let session = harness.session();
    session.load(&open_params("dune")).await?;

    assert_eq!(session.go_to(4).await?, ReaderOutcome::NoOp);
    assert_eq!(session.go_to(0).await?, ReaderOutcome::Rendered { page: 1 });
    assert_eq!(session.previous_page().await?, ReaderOutcome::NoOp);
    assert_eq!(
        session.dispatch(ReaderCommand::Jump(7)).await?,
        ReaderOutcome::Rendered { page: 7 }
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn last_page_shows_completion_after_delay() -> Result<(), ReaderError> {
    let harness = Harness::new(10).with_book("dune", 9, 10);
    let session = harness.session();
    session.load(&open_params("dune")).await?;

    let (outcome, phase_before_delay) = tokio::join!(session.go_to(99), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.phase()
    });
    assert_eq!(phase_before_delay, ReaderPhase::Ready);
    assert_eq!(outcome?, ReaderOutcome::Finished { page: 10 });
    assert_eq!(session.phase(), ReaderPhase::Finished);

    // Only restart or leaving works from the completion panel.
    assert_eq!(session.go_to(3).await?, ReaderOutcome::Ignored);
    assert_eq!(
        session.dispatch(ReaderCommand::Restart).await?,
        ReaderOutcome::Rendered { page: 1 }
    );
    assert_eq!(session.phase(), ReaderPhase::Ready);
    assert_eq!(session.current_page(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn leaving_last_page_during_delay_cancels_completion() -> Result<(), ReaderError> {
    let harness = Harness::new(10).with_book("dune", 9, 10);
    let session = harness.session();
    session.load(&open_params("dune")).await?;

    let (outcome, back) = tokio::join!(session.next_page(), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.previous_page().await
    });
    assert_eq!(back?, ReaderOutcome::Rendered { page: 9 });
    assert_eq!(outcome?, ReaderOutcome::Rendered { page: 10 });
    assert_eq!(session.phase(), ReaderPhase::Ready);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn render_failure_ends_session_without_saving() -> Result<(), ReaderError> {
    let mut harness = Harness::new(10).with_book("dune", 1, 10);
    harness.renderer = harness.renderer.clone().failing_on(2);
    let session = harness.session();
    session.load(&open_params("dune")).await?;
    let writes_before = harness.metadata.writes();

    let err = session.next_page().await.unwrap_err();
    assert!(matches!(err, ReaderError::Render { page: 2, .. }));
    assert_eq!(err.disposition(), Disposition::Alert);
    assert!(matches!(session.phase(), ReaderPhase::Error(_)));
    assert!(!session.is_rendering());
    assert_eq!(harness.metadata.writes(), writes_before);
    assert_eq!(harness.stored("dune").map(|b| b.last_page), Some(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_progress_write_keeps_previous_page() -> Result<(), ReaderError> {
    let harness = Harness::new(10).with_book("dune", 1, 10);
    let session = harness.session();
    session.load(&open_params("dune")).await?;

    harness.metadata.set_fail_writes(true);
    let err = session.next_page().await.unwrap_err();
    assert!(matches!(err, ReaderError::Storage(_)));
    assert_eq!(err.disposition(), Disposition::Notice);

    let view = session.snapshot();
    assert_eq!(view.phase, ReaderPhase::Ready);
    assert_eq!(view.current_page, 1);
    assert!(view.notice.is_some());
    assert_eq!(view.surface.map(|s| s.page), Some(1));

    harness.metadata.set_fail_writes(false);
    assert_eq!(session.next_page().await?, ReaderOutcome::Rendered { page: 2 });
    assert_eq!(session.snapshot().notice, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_progress_write_on_open_still_shows_resume_page() -> Result<(), ReaderError> {
    let harness = Harness::new(10).with_book("dune", 5, 10);
    harness.metadata.set_fail_writes(true);
    let session = harness.session();

    let err = session.load(&open_params("dune")).await.unwrap_err();
    assert!(matches!(err, ReaderError::Storage(_)));

    let view = session.snapshot();
    assert_eq!(view.phase, ReaderPhase::Ready);
    assert_eq!(view.current_page, 5);
    assert_eq!(view.surface.map(|s| s.page), Some(5));
    assert!(view.notice.is_some());

    harness.metadata.set_fail_writes(false);
    assert_eq!(session.next_page().await?, ReaderOutcome::Rendered { page: 6 });
    assert_eq!(harness.stored("dune").map(|b| b.last_page), Some(6));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zoom_rerenders_and_survives_dropped_render() -> Result<(), ReaderError> {
    let harness = Harness::new(10).with_book("dune", 3, 10);
    let session = harness.session();
    session.load(&open_params("dune")).await?;

    assert_eq!(session.zoom_in().await?, ReaderOutcome::Rendered { page: 3 });
    assert_eq!(
        harness.renderer.log.renders().last().copied(),
        Some(RenderCall {
            page: 3,
            zoom_percent: 140
        })
    );

    let (next, zoom) = tokio::join!(session.next_page(), session.zoom_out());
    assert_eq!(next?, ReaderOutcome::Rendered { page: 4 });
    assert_eq!(zoom?, ReaderOutcome::Dropped);
    assert_eq!(session.zoom().percent(), 120);

    session.next_page().await?;
    assert_eq!(
        harness.renderer.log.renders().last().copied(),
        Some(RenderCall {
            page: 5,
            zoom_percent: 120
        })
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn progress_stays_within_page_range() -> Result<(), ReaderError> {
    let harness = Harness::new(6).with_book("short", 1, 0);
    let session = harness.session();
    session.load(&open_params("short")).await?;

    for command in [
        ReaderCommand::Jump(50),
        ReaderCommand::Restart,
        ReaderCommand::Previous,
        ReaderCommand::Jump(3),
        ReaderCommand::Next,
        ReaderCommand::Next,
        ReaderCommand::Next,
        ReaderCommand::Next,
    ] {
        session.dispatch(command).await?;
        let book = harness.stored("short").expect("book stays stored");
        assert!(book.last_page >= 1 && book.last_page <= book.total_pages);
        assert!(session.snapshot().progress_pct() <= 100);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn file_source_reads_path_and_updates_known_book() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("manual.pdf");
    std::fs::write(&path, SAMPLE_PDF)?;

    let harness = Harness::new(4).with_book("manual", 2, 4);
    let query = format!("file={}&id=manual&name=Manual", path.display());
    let session = harness.session();
    session.load(&NavigationParams::from_query(&query)).await?;
    assert_eq!(session.snapshot().name, "Manual");
    assert_eq!(session.current_page(), 2);

    session.next_page().await?;
    assert_eq!(harness.stored("manual").map(|b| b.last_page), Some(3));

    let unknown = harness.session();
    let query = format!("file={}", path.display());
    unknown.load(&NavigationParams::from_query(&query)).await?;
    assert_eq!(unknown.current_page(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unreadable_file_source_redirects() {
    let harness = Harness::new(4);
    let session = harness.session();
    let err = session
        .load(&NavigationParams::from_query("file=/definitely/not/here.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReaderError::DocumentMissing(_)));
    assert_eq!(err.disposition(), Disposition::RedirectToLibrary);
}
