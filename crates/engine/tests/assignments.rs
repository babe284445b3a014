mod common;

use common::{date, engine, item, q};
use engine::{
    Assignment, AssignmentStatus, Engine, EngineError, ItemId, Money, Violation,
};

use common::MemoryBackend;

/// A finalized session with two discrepancies: A is short by 3, B is over
/// by 1.5, C matches.
async fn finalized() -> Engine<MemoryBackend> {
    let items = vec![
        item(1, "A", "10").first_count(q("6")).second_count(q("7")),
        item(2, "B", "4").first_count(q("5")).second_count(q("5.5")),
        item(3, "C", "2").first_count(q("2")),
    ];
    let mut engine = engine(items);
    engine.open_session(date(), "floreana").await.unwrap();
    engine
}

#[tokio::test]
async fn ledger_covers_discrepant_items_only() {
    let engine = finalized().await;
    let ledger = engine.ledger().unwrap();

    assert_eq!(ledger.item_ids().collect::<Vec<_>>(), [ItemId(1), ItemId(2)]);
    assert_eq!(ledger.target(ItemId(1)).unwrap(), q("3"));
    assert_eq!(ledger.target(ItemId(2)).unwrap(), q("1.5"));
    assert_eq!(ledger.total_value(), Money::new(900, 2));
}

#[tokio::test]
async fn complete_set_is_written_without_empty_rows() {
    let mut engine = finalized().await;
    let id = ItemId(1);

    engine.expand_assignment(id).unwrap();
    engine.set_assignment_person(id, 0, " Ana ").unwrap();
    engine.set_assignment_quantity(id, 0, q("2")).unwrap();
    engine.add_assignment_row(id).unwrap();
    let row = engine.add_assignment_row(id).unwrap();
    engine.set_assignment_person(id, row, "Luis").unwrap();
    engine.set_assignment_quantity(id, row, q("1")).unwrap();
    assert_eq!(engine.assignment_status(id).unwrap(), AssignmentStatus::Complete);

    engine.save_assignments(id).await.unwrap();

    let expected = vec![Assignment::new("Ana", q("2")), Assignment::new("Luis", q("1"))];
    let state = engine.backend().state.lock().unwrap();
    assert_eq!(state.assignment_writes, [(id, expected.clone())]);
    drop(state);
    assert_eq!(engine.ledger().unwrap().rows(id).unwrap(), expected);
}

#[tokio::test]
async fn incomplete_set_is_not_written() {
    let mut engine = finalized().await;
    let id = ItemId(1);
    engine.expand_assignment(id).unwrap();
    engine.set_assignment_person(id, 0, "Ana").unwrap();
    engine.set_assignment_quantity(id, 0, q("2")).unwrap();
    assert_eq!(engine.assignment_status(id).unwrap(), AssignmentStatus::Partial);

    let err = engine.save_assignments(id).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(Violation::IncompleteAssignment {
            code: "A".to_string(),
            expected: q("3"),
            assigned: q("2"),
        })
    );
    assert!(engine.backend().state.lock().unwrap().assignment_writes.is_empty());
    assert_eq!(engine.ledger().unwrap().rows(id).unwrap().len(), 1);
}

#[tokio::test]
async fn quantities_are_clamped_to_the_remaining_amount() {
    let mut engine = finalized().await;
    let id = ItemId(2);
    engine.expand_assignment(id).unwrap();
    engine.set_assignment_person(id, 0, "Marta").unwrap();

    let clamped = engine.set_assignment_quantity(id, 0, q("4")).unwrap();
    assert!(clamped.max_exceeded);
    assert_eq!(clamped.quantity, q("1.5"));

    let row = engine.add_assignment_row(id).unwrap();
    let clamped = engine.set_assignment_quantity(id, row, q("1")).unwrap();
    assert_eq!(clamped.quantity, q("0"));
    assert_eq!(engine.ledger().unwrap().assigned(id).unwrap(), q("1.5"));
}

#[tokio::test]
async fn unknown_and_repeated_people_are_refused() {
    let mut engine = finalized().await;
    let id = ItemId(1);
    engine.expand_assignment(id).unwrap();
    engine.set_assignment_person(id, 0, "Pedro").unwrap();
    engine.set_assignment_quantity(id, 0, q("3")).unwrap();
    let err = engine.save_assignments(id).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(Violation::UnknownPerson("Pedro".to_string()))
    );

    engine.set_assignment_person(id, 0, "Ana").unwrap();
    engine.set_assignment_quantity(id, 0, q("1")).unwrap();
    let row = engine.add_assignment_row(id).unwrap();
    engine.set_assignment_person(id, row, "Ana").unwrap();
    engine.set_assignment_quantity(id, row, q("2")).unwrap();
    let err = engine.save_assignments(id).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(Violation::DuplicatePerson("Ana".to_string()))
    );
}

#[tokio::test]
async fn save_all_is_best_effort() {
    let mut engine = finalized().await;

    // A is complete, B only half assigned.
    engine.expand_assignment(ItemId(1)).unwrap();
    engine.set_assignment_person(ItemId(1), 0, "Luis").unwrap();
    engine.set_assignment_quantity(ItemId(1), 0, q("3")).unwrap();
    engine.expand_assignment(ItemId(2)).unwrap();
    engine.set_assignment_person(ItemId(2), 0, "Ana").unwrap();
    engine.set_assignment_quantity(ItemId(2), 0, q("0.75")).unwrap();

    let outcome = engine.save_all_assignments().await.unwrap();
    assert_eq!(outcome.saved, 1);
    assert_eq!(outcome.failed(), 1);
    assert_eq!(outcome.failures[0].0, ItemId(2));

    let state = engine.backend().state.lock().unwrap();
    assert_eq!(state.assignment_writes.len(), 1);
    assert_eq!(state.assignment_writes[0].0, ItemId(1));
}

#[tokio::test]
async fn rejected_write_keeps_rows_for_retry() {
    let mut engine = finalized().await;
    let id = ItemId(1);
    engine.expand_assignment(id).unwrap();
    engine.set_assignment_person(id, 0, "Ana").unwrap();
    engine.set_assignment_quantity(id, 0, q("3")).unwrap();
    engine.add_assignment_row(id).unwrap();
    engine.backend().set(|state| _ = state.failing.insert(id));

    let err = engine.save_assignments(id).await.unwrap_err();
    assert!(err.is_persistence());
    // The empty template row is still there: nothing was committed.
    assert_eq!(engine.ledger().unwrap().rows(id).unwrap().len(), 2);

    engine.backend().set(|state| state.failing.clear());
    engine.save_assignments(id).await.unwrap();
    assert_eq!(engine.ledger().unwrap().rows(id).unwrap().len(), 1);
}

#[tokio::test]
async fn saved_rows_come_back_on_reopen() {
    let mut engine = finalized().await;
    engine.backend().set(|state| {
        state.ledger.insert(ItemId(1), vec![Assignment::new("Marta", q("3"))]);
        state.ledger.insert(ItemId(3), vec![Assignment::new("Ana", q("1"))]);
    });

    engine.open_session(date(), "floreana").await.unwrap();
    let ledger = engine.ledger().unwrap();
    assert_eq!(ledger.rows(ItemId(1)).unwrap(), [Assignment::new("Marta", q("3"))]);
    assert!(!ledger.contains(ItemId(3)));
    assert_eq!(
        engine.assignment_status(ItemId(1)).unwrap(),
        AssignmentStatus::Complete
    );
}

#[tokio::test]
async fn ledger_needs_a_finalized_session() {
    let mut engine = engine(vec![item(1, "A", "1"), item(2, "B", "2")]);
    assert_eq!(engine.ledger().unwrap_err(), EngineError::NoSession);

    engine.open_session(date(), "floreana").await.unwrap();
    assert!(matches!(
        engine.expand_assignment(ItemId(1)),
        Err(EngineError::InvalidStage(_))
    ));
}

#[tokio::test]
async fn save_all_continues_past_a_rejected_write() {
    let mut engine = finalized().await;
    engine.expand_assignment(ItemId(1)).unwrap();
    engine.set_assignment_person(ItemId(1), 0, "Luis").unwrap();
    engine.set_assignment_quantity(ItemId(1), 0, q("3")).unwrap();
    engine.expand_assignment(ItemId(2)).unwrap();
    engine.set_assignment_person(ItemId(2), 0, "Ana").unwrap();
    engine.set_assignment_quantity(ItemId(2), 0, q("1.5")).unwrap();
    engine.add_assignment_row(ItemId(1)).unwrap();
    engine
        .backend()
        .set(|state| _ = state.failing.insert(ItemId(1)));

    let outcome = engine.save_all_assignments().await.unwrap();
    assert_eq!(outcome.saved, 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].0, ItemId(1));
    assert!(outcome.failures[0].1.is_persistence());

    let state = engine.backend().state.lock().unwrap();
    assert_eq!(
        state.assignment_writes,
        [(ItemId(2), vec![Assignment::new("Ana", q("1.5"))])]
    );
    drop(state);

    // The rejected item keeps its unsaved rows, template row included.
    let ledger = engine.ledger().unwrap();
    assert_eq!(ledger.rows(ItemId(1)).unwrap().len(), 2);
    assert_eq!(ledger.status(ItemId(1)).unwrap(), AssignmentStatus::Complete);
}
