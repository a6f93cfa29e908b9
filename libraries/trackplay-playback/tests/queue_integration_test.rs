//! Queue management integration tests
//!
//! Insert-or-replace, batch adds, removal, and how the current track
//! follows queue edits. Also exercises the serialized command surface.

mod common;

use common::{manager_at, manager_with, new_manager, queue_ids, track};
use trackplay_playback::{
    Command, PlaybackError, PlaybackEvent, Reply, Track, TrackDescriptor,
};

// ===== Insertion =====

#[test]
fn test_insert_before_current_shifts_current_index() {
    let (mut manager, events, engine) = manager_at(&["A", "B"], "B");

    manager.add(track("X"), 0).unwrap();

    assert_eq!(queue_ids(&manager), vec!["X", "A", "B"]);
    assert_eq!(manager.current_index(), Some(2));
    assert_eq!(manager.current_track().unwrap().id(), "B");
    assert!(engine.calls().is_empty());
    assert!(events.drain().is_empty());
}

#[test]
fn test_insert_after_current_keeps_current_index() {
    let (mut manager, _events, _engine) = manager_at(&["A", "B"], "A");

    manager.add(track("X"), 1).unwrap();

    assert_eq!(queue_ids(&manager), vec!["A", "X", "B"]);
    assert_eq!(manager.current_index(), Some(0));
}

#[test]
fn test_add_out_of_range_is_rejected() {
    let (mut manager, _events, _engine) = manager_with(&["A"]);

    assert_eq!(
        manager.add(track("B"), 5),
        Err(PlaybackError::IndexOutOfRange {
            op: "add",
            index: 5,
            len: 1
        })
    );
    assert_eq!(queue_ids(&manager), vec!["A"]);
}

#[test]
fn test_add_existing_id_replaces_in_place() {
    let (mut manager, _events, _engine) = manager_with(&["A", "B", "C"]);

    manager
        .add(track("C").with_presentation("title", "New C"), 0)
        .unwrap();

    assert_eq!(queue_ids(&manager), vec!["A", "B", "C"]);
    assert_eq!(
        manager.queue().unwrap()[2].presentation()["title"],
        "New C"
    );
}

// ===== Batch add =====

#[test]
fn test_add_many_cursor_skips_replacements() {
    let (mut manager, _events, _engine) = manager_with(&["A", "B"]);

    manager
        .add_many(vec![track("X"), track("B"), track("Y")], 1)
        .unwrap();

    // X goes in at 1, B is replaced where it is, Y follows X
    assert_eq!(queue_ids(&manager), vec!["A", "X", "Y", "B"]);
}

#[test]
fn test_add_many_to_empty_queue_after_play_starts_first() {
    let (mut manager, events, engine) = new_manager();
    manager.play().unwrap();

    manager
        .add_many(vec![track("A"), track("B")], 0)
        .unwrap();

    assert_eq!(manager.current_index(), Some(0));
    assert_eq!(engine.prepared_sources().len(), 1);
    assert_eq!(
        events.drain(),
        vec![PlaybackEvent::TrackChanged {
            from: None,
            position_at_switch_ms: 0,
            to: Some(track("A")),
        }]
    );
}

#[test]
fn test_add_many_out_of_range_changes_nothing() {
    let (mut manager, _events, _engine) = manager_with(&["A"]);

    let result = manager.add_many(vec![track("B")], 3);

    assert!(matches!(
        result,
        Err(PlaybackError::IndexOutOfRange { op: "add_many", .. })
    ));
    assert_eq!(queue_ids(&manager), vec!["A"]);
}

// ===== Removal =====

#[test]
fn test_remove_other_tracks_follows_current() {
    let (mut manager, events, engine) = manager_at(&["A", "B", "C", "D"], "C");

    manager.remove(&[0, 3]).unwrap();

    assert_eq!(queue_ids(&manager), vec!["B", "C"]);
    assert_eq!(manager.current_index(), Some(1));
    assert_eq!(manager.current_track().unwrap().id(), "C");
    assert!(engine.calls().is_empty());
    assert!(events.drain().is_empty());
}

#[test]
fn test_remove_with_bad_index_removes_nothing() {
    let (mut manager, _events, _engine) = manager_with(&["A", "B"]);

    assert!(matches!(
        manager.remove(&[0, 7]),
        Err(PlaybackError::IndexOutOfRange { index: 7, .. })
    ));
    assert_eq!(queue_ids(&manager), vec!["A", "B"]);
}

#[test]
fn test_remove_duplicate_indices_once() {
    let (mut manager, _events, _engine) = manager_with(&["A", "B", "C"]);

    manager.remove(&[1, 1]).unwrap();

    assert_eq!(queue_ids(&manager), vec!["A", "C"]);
}

#[test]
fn test_remove_upcoming_keeps_history_and_current() {
    let (mut manager, _events, _engine) = manager_at(&["A", "B", "C", "D"], "B");

    manager.remove_upcoming().unwrap();

    assert_eq!(queue_ids(&manager), vec!["A", "B"]);
    assert_eq!(manager.current_index(), Some(1));
}

#[test]
fn test_remove_upcoming_without_current_is_noop() {
    let (mut manager, _events, _engine) = manager_with(&["A", "B"]);

    manager.remove_upcoming().unwrap();

    assert_eq!(queue_ids(&manager), vec!["A", "B"]);
}

// ===== Update =====

#[test]
fn test_update_rejects_id_of_another_slot() {
    let (mut manager, _events, _engine) = manager_with(&["A", "B"]);

    assert!(matches!(
        manager.update(0, track("B")),
        Err(PlaybackError::InvalidTrack { .. })
    ));
    assert!(matches!(
        manager.update(9, track("Z")),
        Err(PlaybackError::IndexOutOfRange { op: "update", .. })
    ));
}

#[test]
fn test_update_may_change_id_of_slot() {
    let (mut manager, _events, _engine) = manager_with(&["A", "B"]);

    manager.update(1, track("Z")).unwrap();

    assert_eq!(queue_ids(&manager), vec!["A", "Z"]);
    manager.skip_to("Z").unwrap();
    assert!(manager.skip_to("B").is_err());
}

// ===== Command surface =====

#[test]
fn test_command_add_without_index_appends() {
    let (mut manager, _events, _engine) = manager_with(&["A"]);

    let reply = manager
        .execute(Command::Add {
            track: TrackDescriptor::new("B", "https://cdn.example/B.mp3"),
            index: None,
        })
        .unwrap();

    assert_eq!(reply, Reply::Done);
    assert_eq!(queue_ids(&manager), vec!["A", "B"]);
}

#[test]
fn test_command_add_many_reports_invalid_elements() {
    let (mut manager, _events, _engine) = new_manager();

    let result = manager.execute(Command::AddMany {
        tracks: vec![
            TrackDescriptor::new("A", "https://cdn.example/A.mp3"),
            TrackDescriptor::new("", "https://cdn.example/nothing.mp3"),
            TrackDescriptor::new("C", "not a url"),
            TrackDescriptor::new("D", "https://cdn.example/D.mp3"),
        ],
        index: None,
    });

    match result {
        Err(PlaybackError::Partial { failures }) => {
            let positions: Vec<usize> = failures.iter().map(|(i, _)| *i).collect();
            assert_eq!(positions, vec![1, 2]);
            assert!(failures
                .iter()
                .all(|(_, e)| matches!(e, PlaybackError::InvalidTrack { .. })));
        }
        other => panic!("expected partial failure, got {:?}", other),
    }
    assert_eq!(queue_ids(&manager), vec!["A", "D"]);
}

#[test]
fn test_command_queries() {
    let (mut manager, _events, _engine) = manager_at(&["A", "B"], "B");

    assert_eq!(
        manager.execute(Command::GetCurrentTrack).unwrap(),
        Reply::CurrentTrack {
            track: Some(track("B"))
        }
    );
    match manager.execute(Command::GetQueue).unwrap() {
        Reply::Queue { tracks } => {
            let ids: Vec<&str> = tracks.iter().map(Track::id).collect();
            assert_eq!(ids, vec!["A", "B"]);
        }
        other => panic!("unexpected reply {:?}", other),
    }
    assert_eq!(
        manager.execute(Command::GetRate).unwrap(),
        Reply::Rate { rate: 1.0 }
    );
}

#[test]
fn test_commands_after_destroy_fail() {
    let (mut manager, _events, _engine) = manager_with(&["A"]);

    assert_eq!(manager.execute(Command::Destroy).unwrap(), Reply::Done);
    assert_eq!(
        manager.execute(Command::Update {
            index: 0,
            track: TrackDescriptor::new("", ""),
        }),
        Err(PlaybackError::Destroyed)
    );
    assert_eq!(
        manager.execute(Command::GetState),
        Err(PlaybackError::Destroyed)
    );
}
