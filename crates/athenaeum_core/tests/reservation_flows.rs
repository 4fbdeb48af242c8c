//! Reservation queueing, fulfillment and the notification fan-out.

mod common;

use athenaeum_core::LibraryError;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn available_books_cannot_be_reserved() {
    let db = common::setup().await;
    let staff = common::librarian(&db).await;
    let ada = common::member(&db, "Ada").await;
    let book = common::book_with_copies(&db, &staff, "A Memory Called Empire", 1).await;

    let refused = db.reserve(ada.actor, &ada.barcode, &book).await.unwrap_err();
    assert!(matches!(refused, LibraryError::BookAvailable));
}

#[tokio::test]
async fn one_pending_reservation_per_user_and_book() {
    let db = common::setup().await;
    let staff = common::librarian(&db).await;
    let ada = common::member(&db, "Ada").await;
    let bea = common::member(&db, "Bea").await;
    let book = common::book_with_copies(&db, &staff, "A Desolation Called Peace", 1).await;

    db.checkout(ada.actor, &book).await.expect("checkout");
    db.reserve(bea.actor, &bea.barcode, &book).await.expect("reserve");

    let doubled = db.reserve(bea.actor, &bea.barcode, &book).await.unwrap_err();
    assert!(matches!(doubled, LibraryError::DuplicateReservation));
}

#[tokio::test]
async fn only_pending_reservations_cancel() {
    let db = common::setup().await;
    let staff = common::librarian(&db).await;
    let ada = common::member(&db, "Ada").await;
    let bea = common::member(&db, "Bea").await;
    let book = common::book_with_copies(&db, &staff, "Ancillary Justice", 1).await;

    db.checkout(ada.actor, &book).await.expect("checkout");
    let held = db.reserve(bea.actor, &bea.barcode, &book).await.expect("reserve");

    db.cancel_reservation(bea.actor, held.reservation_id)
        .await
        .expect("cancel");
    let twice = db
        .cancel_reservation(bea.actor, held.reservation_id)
        .await
        .unwrap_err();
    assert!(matches!(twice, LibraryError::ReservationClosed(_)));
    assert!(twice.to_string().contains("cancelled"));

    let missing = db.cancel_reservation(bea.actor, 9999).await.unwrap_err();
    assert!(matches!(missing, LibraryError::NotFound("reservation")));
}

#[tokio::test]
async fn checkout_fulfills_the_borrowers_own_reservation() {
    let db = common::setup().await;
    let staff = common::librarian(&db).await;
    let ada = common::member(&db, "Ada").await;
    let bea = common::member(&db, "Bea").await;
    let book = common::book_with_copies(&db, &staff, "Ancillary Sword", 1).await;

    db.checkout(ada.actor, &book).await.expect("checkout");
    let held = db.reserve(bea.actor, &bea.barcode, &book).await.expect("reserve");

    let open = db
        .checked_out_books(ada.actor, ada.actor.user_id)
        .await
        .expect("open loans");
    db.return_book(staff.actor, open[0].loan_id).await.expect("return");

    db.checkout(bea.actor, &book).await.expect("checkout");
    let closed = db
        .cancel_reservation(bea.actor, held.reservation_id)
        .await
        .unwrap_err();
    assert!(matches!(closed, LibraryError::ReservationClosed(_)));
    assert!(closed.to_string().contains("fulfilled"));
}

#[tokio::test]
async fn a_returned_copy_notifies_every_pending_reserver() {
    let db = common::setup().await;
    let staff = common::librarian(&db).await;
    let ada = common::member(&db, "Ada").await;
    let bea = common::member(&db, "Bea").await;
    let cai = common::member(&db, "Cai").await;
    let book = common::book_with_copies(&db, &staff, "Translation State", 1).await;

    let loan = db.checkout(ada.actor, &book).await.expect("checkout");
    db.reserve(bea.actor, &bea.barcode, &book).await.expect("reserve");
    db.reserve(cai.actor, &cai.barcode, &book).await.expect("reserve");

    db.return_book(staff.actor, loan.loan_id).await.expect("return");

    for reserver in [&bea, &cai] {
        let inbox = db
            .notifications(reserver.actor, reserver.actor.user_id)
            .await
            .expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].subject, "Book Reservation Available");
        assert!(inbox[0].body.contains("Translation State"));
        assert_eq!(inbox[0].book_title.as_deref(), Some("Translation State"));
    }

    // The shelf is first come, first served.
    db.checkout(bea.actor, &book).await.expect("checkout");
    let too_slow = db.checkout(cai.actor, &book).await.unwrap_err();
    assert!(matches!(too_slow, LibraryError::NoAvailableCopy));

    // Cai's reservation is still pending, so a repeat is a duplicate.
    let still_held = db.reserve(cai.actor, &cai.barcode, &book).await.unwrap_err();
    assert!(matches!(still_held, LibraryError::DuplicateReservation));
}

#[tokio::test]
async fn new_copies_and_manual_shelf_flips_notify_reservers() {
    let db = common::setup().await;
    let staff = common::librarian(&db).await;
    let ada = common::member(&db, "Ada").await;
    let bea = common::member(&db, "Bea").await;
    let book = common::book_with_copies(&db, &staff, "Some Desperate Glory", 1).await;

    db.checkout(ada.actor, &book).await.expect("checkout");
    db.reserve(bea.actor, &bea.barcode, &book).await.expect("reserve");

    let added = db
        .add_copy(staff.actor, &book, "Rack 9")
        .await
        .expect("add copy");
    let inbox = db
        .notifications(bea.actor, bea.actor.user_id)
        .await
        .expect("inbox");
    assert_eq!(inbox.len(), 1);

    // Hand-flipping the loaned copy back to available also counts.
    let copies = db.copies_of(staff.actor, &book).await.expect("copies");
    let loaned = copies.iter().find(|copy| !copy.is_available).expect("loaned copy");
    db.update_copy(
        staff.actor,
        &book,
        loaned.id,
        athenaeum_core::database::types::CopyUpdate {
            is_available: Some(true),
            ..Default::default()
        },
    )
    .await
    .expect("update copy");
    let inbox = db
        .notifications(bea.actor, bea.actor.user_id)
        .await
        .expect("inbox");
    assert_eq!(inbox.len(), 2);

    // A rack move alone says nothing.
    db.update_copy(
        staff.actor,
        &book,
        added.id,
        athenaeum_core::database::types::CopyUpdate {
            rack_location: Some("Rack 1".to_owned()),
            ..Default::default()
        },
    )
    .await
    .expect("update copy");
    let inbox = db
        .notifications(bea.actor, bea.actor.user_id)
        .await
        .expect("inbox");
    assert_eq!(inbox.len(), 2);
}
