use pdfshelf_application::{
    Confirmation, DeleteOutcome, LibraryError, ReaderError, Upload,
};
use pdfshelf_core::{BinaryStore, BookId, MetadataStore, NavigationParams};
use pdfshelf_test::{Harness, SAMPLE_PDF};

#[test]
fn empty_library_shows_empty_state() -> Result<(), LibraryError> {
    let harness = Harness::new(3);
    let snapshot = harness.library().snapshot()?;
    assert_eq!(snapshot.count(), 0);
    assert!(snapshot.is_empty());
    Ok(())
}

#[test]
fn cards_follow_stored_order_with_progress() -> Result<(), LibraryError> {
    let harness = Harness::new(10)
        .with_book("newest", 1, 0)
        .with_book("half", 5, 10)
        .with_book("done", 10, 10);
    let snapshot = harness.library().snapshot()?;

    let summary: Vec<_> = snapshot
        .cards
        .iter()
        .map(|card| (card.id.as_str(), card.progress_pct))
        .collect();
    assert_eq!(summary, vec![("newest", 0), ("half", 50), ("done", 100)]);
    assert_eq!(snapshot.cards[1].action_label, "Continue 50%");
    Ok(())
}

#[test]
fn rejected_upload_leaves_both_stores_untouched() -> Result<(), LibraryError> {
    let harness = Harness::new(3).with_book("existing", 1, 0);
    let library = harness.library();
    let writes_before = harness.metadata.writes();

    let err = library
        .upload(Upload::new("cover.png", b"\x89PNG".to_vec()).with_mime("image/png"))
        .unwrap_err();
    assert!(matches!(err, LibraryError::UnsupportedFile { .. }));
    assert_eq!(harness.metadata.writes(), writes_before);
    assert_eq!(harness.binaries.len(), 1);
    assert_eq!(library.snapshot()?.count(), 1);
    Ok(())
}

#[test]
fn failed_metadata_write_removes_uploaded_bytes() {
    let harness = Harness::new(3);
    harness.metadata.set_fail_writes(true);

    let err = harness
        .library()
        .upload(Upload::new("book.pdf", SAMPLE_PDF.to_vec()))
        .unwrap_err();
    assert!(matches!(err, LibraryError::Storage(_)));
    assert!(harness.binaries.is_empty());
    assert!(harness.metadata.load_books().unwrap_or_default().is_empty());
}

#[test]
fn delete_removes_metadata_and_bytes() -> Result<(), LibraryError> {
    let harness = Harness::new(3).with_book("a", 1, 0).with_book("b", 1, 0);
    let library = harness.library();
    let id = BookId::from("a");

    let outcome = library.delete(&id, Confirmation::Confirmed)?;
    assert!(matches!(outcome, DeleteOutcome::Deleted(book) if book.id == id));
    assert_eq!(harness.metadata.find_book(&id)?, None);
    assert_eq!(harness.binaries.get_binary(&id)?, None);
    assert!(harness.binaries.get_binary(&BookId::from("b"))?.is_some());
    Ok(())
}

#[test]
fn cancelled_delete_changes_nothing() -> Result<(), LibraryError> {
    let harness = Harness::new(3).with_book("a", 1, 0);
    let writes_before = harness.metadata.writes();

    let outcome = harness
        .library()
        .delete(&BookId::from("a"), Confirmation::Cancelled)?;
    assert_eq!(outcome, DeleteOutcome::Cancelled);
    assert_eq!(harness.metadata.writes(), writes_before);
    assert_eq!(harness.binaries.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn uploaded_book_opens_and_deleted_book_does_not() -> Result<(), Box<dyn std::error::Error>> {
    let harness = Harness::new(8);
    let library = harness.library();
    let book = library.upload(Upload::new("guide.pdf", SAMPLE_PDF.to_vec()))?;

    let session = harness.session();
    session
        .load(&NavigationParams::for_book(book.id.clone()))
        .await?;
    session.next_page().await?;
    let snapshot = library.snapshot()?;
    let card = &snapshot.cards[0];
    assert_eq!((card.last_page, card.total_pages), (2, 8));
    assert_eq!(card.progress_pct, 25);

    library.delete(&book.id, Confirmation::Confirmed)?;
    let reopened = harness.session();
    let err = reopened
        .load(&NavigationParams::for_book(book.id.clone()))
        .await
        .unwrap_err();
    assert_eq!(err, ReaderError::BookNotFound(book.id));
    Ok(())
}
