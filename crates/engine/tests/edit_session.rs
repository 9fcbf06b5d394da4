use span_engine::bridge::drain_actions;
use span_engine::segment::SegmentSet;
use span_engine::{
    Command, Editor, EditorSettings, Event, FieldState, FormField, SegmentStore, SessionPhase,
    StoreAction, Structure,
};

const DOCUMENT: &str = r#"{
    "type": "root",
    "label": "Lecture",
    "items": [
        {
            "type": "div",
            "label": "Part one",
            "items": [
                { "type": "span", "id": "welcome", "label": "Welcome", "begin": "00:00:00", "end": "00:00:04" },
                { "type": "span", "id": "agenda", "label": "Agenda", "begin": "00:00:04", "end": "00:00:09" }
            ]
        },
        { "type": "span", "id": "q-and-a", "label": "Q&A", "begin": "00:00:30", "end": "00:00:45" }
    ]
}"#;

fn editor() -> Editor<SegmentStore> {
    let structure = Structure::from_json_str(DOCUMENT).expect("document should load");
    let store = SegmentStore::new(SegmentSet::from_spans(
        &structure.spans().expect("spans parse"),
    ));
    Editor::new(structure, EditorSettings { track_duration: 60.0 }, store)
}

fn run(editor: &mut Editor<SegmentStore>, command: Command) -> Vec<Event> {
    editor
        .handle_command(command)
        .expect("command should succeed")
}

fn last_form(events: &[Event]) -> Option<&span_engine::FormView> {
    events.iter().rev().find_map(|event| match event {
        Event::FormChanged(view) => Some(view),
        _ => None,
    })
}

#[test]
fn typed_end_survives_first_drag_then_follows_the_next_one() {
    let mut editor = editor();
    run(&mut editor, Command::BeginEdit {
        span_id: "agenda".to_string(),
    });
    run(&mut editor, Command::Reconcile);
    assert_eq!(editor.phase(), SessionPhase::Editing);

    run(&mut editor, Command::Type {
        field: FormField::EndTime,
        value: "00:00:05".to_string(),
    });
    run(&mut editor, Command::Drag {
        id: "agenda".to_string(),
        start_time: 4.0,
        end_time: 12.0,
    });

    let view = editor.form_view().expect("session is open");
    assert_eq!(view.end_time, "00:00:05");

    let events = run(&mut editor, Command::Reconcile);
    let view = last_form(&events).expect("drag reconciliation updates the form");
    assert_eq!(view.end_time, "00:00:12");
    assert_eq!(view.end_state, FieldState::Valid);
}

#[test]
fn cancel_after_mixed_edits_reverts_the_store_segment_exactly() {
    let mut editor = editor();
    let original = editor
        .bridge()
        .segments()
        .get("agenda")
        .cloned()
        .expect("agenda segment exists");

    run(&mut editor, Command::BeginEdit {
        span_id: "agenda".to_string(),
    });
    run(&mut editor, Command::Type {
        field: FormField::BeginTime,
        value: "00:00:06".to_string(),
    });
    run(&mut editor, Command::Drag {
        id: "agenda".to_string(),
        start_time: 7.123,
        end_time: 20.0,
    });
    run(&mut editor, Command::DragEnd);
    let events = run(&mut editor, Command::Cancel);

    assert_eq!(
        events,
        vec![Event::Cancelled {
            span_id: "agenda".to_string()
        }]
    );
    let reverted = editor
        .bridge()
        .segments()
        .get("agenda")
        .cloned()
        .expect("agenda segment exists");
    assert_eq!(reverted, original);
    assert!(editor.bridge().segments().active().is_none());
    assert_eq!(editor.phase(), SessionPhase::Idle);
}

#[test]
fn subscribers_observe_the_full_action_sequence_of_a_commit() {
    let mut store = SegmentStore::new(SegmentSet::default());
    let subscriber = store.subscribe();
    let structure = Structure::from_json_str(DOCUMENT).expect("document should load");
    let mut editor = Editor::new(structure, EditorSettings { track_duration: 60.0 }, store);

    run(&mut editor, Command::BeginEdit {
        span_id: "q-and-a".to_string(),
    });
    run(&mut editor, Command::Type {
        field: FormField::BeginTime,
        value: "00:00:09".to_string(),
    });
    let events = run(&mut editor, Command::Save);

    let actions = drain_actions(&subscriber);
    let kinds: Vec<&str> = actions
        .iter()
        .map(|action| match action {
            StoreAction::ActivateSegment { .. } => "activate",
            StoreAction::UpdateSegment { .. } => "update",
            StoreAction::RevertSegment { .. } => "revert",
            StoreAction::SaveSegment { .. } => "save",
        })
        .collect();
    assert_eq!(kinds, vec!["activate", "update", "update", "save"]);

    let Some(Event::Committed(commit)) = events.first() else {
        panic!("save must commit, got {events:?}");
    };
    assert_eq!(commit.begin_time, "00:00:09");
    let span = editor
        .structure()
        .span("q-and-a")
        .expect("spans parse")
        .expect("span exists");
    assert_eq!(span.start_time, 9.0);
}

#[test]
fn overlapping_edit_cannot_be_saved_but_can_be_cancelled() {
    let mut editor = editor();
    run(&mut editor, Command::BeginEdit {
        span_id: "q-and-a".to_string(),
    });
    let events = run(&mut editor, Command::Type {
        field: FormField::BeginTime,
        value: "00:00:08".to_string(),
    });
    let view = last_form(&events).expect("typing updates the form");
    assert_eq!(view.begin_state, FieldState::Invalid);

    let rejected = run(&mut editor, Command::Save);
    assert!(matches!(rejected.as_slice(), [Event::SaveRejected { .. }]));
    assert!(editor.editing_disabled());

    run(&mut editor, Command::Cancel);
    assert!(!editor.editing_disabled());
    let span = editor
        .structure()
        .span("q-and-a")
        .expect("spans parse")
        .expect("span exists");
    assert_eq!(span.start_time, 30.0);
}

#[test]
fn drag_before_first_reconcile_is_committed_and_kept_in_the_store() {
    let mut editor = editor();
    run(&mut editor, Command::BeginEdit {
        span_id: "q-and-a".to_string(),
    });
    run(&mut editor, Command::Drag {
        id: "q-and-a".to_string(),
        start_time: 30.0,
        end_time: 50.0,
    });
    run(&mut editor, Command::DragEnd);
    run(&mut editor, Command::Reconcile);

    let events = run(&mut editor, Command::Save);

    let Some(Event::Committed(commit)) = events.first() else {
        panic!("save must commit, got {events:?}");
    };
    assert_eq!(commit.end_time, "00:00:50");
    let stored = editor
        .bridge()
        .segments()
        .get("q-and-a")
        .cloned()
        .expect("q-and-a segment exists");
    assert_eq!((stored.start_time, stored.end_time), (30.0, 50.0));
    assert!(!stored.editable);
    let span = editor
        .structure()
        .span("q-and-a")
        .expect("spans parse")
        .expect("span exists");
    assert_eq!(span.end_time, 50.0);
}
