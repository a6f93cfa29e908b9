//! End-to-end scenarios for the playback manager
//!
//! Each test drives a manager over the recording fake engine and checks the
//! exact engine calls and emitted events.

mod common;

use common::{
    deliver_state, manager_at, manager_with, new_manager, queue_ids, source_of, track, EngineCall,
};
use trackplay_playback::{
    BehindLiveWindow, DerivedState, EngineError, EngineErrorKind, EngineEvent, ErrorCode,
    MetadataEntry, MetadataSource, PlaybackEvent, RawState, Track,
};

// ===== Auto-play =====

#[test]
fn test_play_on_empty_queue_then_add_starts_playback() {
    let (mut manager, events, engine) = new_manager();

    manager.play().unwrap();
    assert!(events.drain().is_empty());
    assert!(engine.calls().is_empty());
    assert!(manager.auto_play());

    manager.add(track("A"), 0).unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            EngineCall::Prepare {
                source: source_of("A"),
                reset_position: true,
                reset_state: true,
            },
            EngineCall::SetPlayWhenReady(true),
        ]
    );
    assert_eq!(
        events.drain(),
        vec![PlaybackEvent::TrackChanged {
            from: None,
            position_at_switch_ms: 0,
            to: Some(track("A")),
        }]
    );
    assert_eq!(manager.current_index(), Some(0));
}

#[test]
fn test_add_without_play_does_not_arm() {
    let (mut manager, events, engine) = new_manager();

    manager.add(track("A"), 0).unwrap();

    assert!(engine.calls().is_empty());
    assert!(events.drain().is_empty());
    assert_eq!(manager.current_index(), None);
}

// ===== Replace current =====

#[test]
fn test_replacing_current_track_re_prepares_it() {
    let (mut manager, events, engine) = manager_at(&["A", "B", "C"], "B");

    let replacement = Track::new("B", "https://cdn.example/B-v2.mp3").unwrap();
    manager.add(replacement, 0).unwrap();

    assert_eq!(queue_ids(&manager), vec!["A", "B", "C"]);
    assert_eq!(manager.current_index(), Some(1));
    assert_eq!(
        manager.current_track().unwrap().uri().as_str(),
        "https://cdn.example/B-v2.mp3"
    );
    assert_eq!(
        engine.prepared_sources(),
        vec!["https://cdn.example/B-v2.mp3".to_string()]
    );

    match events.drain().as_slice() {
        [PlaybackEvent::TrackChanged {
            from: Some(from),
            to: Some(to),
            ..
        }] => {
            assert_eq!(from.uri().as_str(), source_of("B"));
            assert_eq!(to.uri().as_str(), "https://cdn.example/B-v2.mp3");
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[test]
fn test_replacing_other_track_keeps_engine_untouched() {
    let (mut manager, events, engine) = manager_at(&["A", "B", "C"], "B");

    let replacement = Track::new("C", "https://cdn.example/C-v2.mp3").unwrap();
    manager.add(replacement, 0).unwrap();

    assert_eq!(queue_ids(&manager), vec!["A", "B", "C"]);
    assert_eq!(manager.current_index(), Some(1));
    assert!(engine.calls().is_empty());
    assert!(events.drain().is_empty());
}

// ===== Remove current =====

#[test]
fn test_removing_current_track_stops_engine() {
    let (mut manager, events, engine) = manager_at(&["A", "B", "C"], "B");

    manager.remove(&[1]).unwrap();

    assert_eq!(queue_ids(&manager), vec!["A", "C"]);
    assert_eq!(manager.current_index(), None);
    assert_eq!(engine.calls(), vec![EngineCall::Stop { reset: true }]);
    assert_eq!(
        events.drain(),
        vec![PlaybackEvent::TrackChanged {
            from: Some(track("B")),
            position_at_switch_ms: 0,
            to: None,
        }]
    );
}

// ===== Wrap-around =====

#[test]
fn test_skip_to_next_wraps_to_first() {
    let (mut manager, events, engine) = manager_at(&["A", "B", "C"], "C");

    manager.skip_to_next().unwrap();

    assert_eq!(manager.current_index(), Some(0));
    assert_eq!(engine.prepared_sources(), vec![source_of("A")]);
    assert_eq!(
        events.drain(),
        vec![PlaybackEvent::TrackChanged {
            from: Some(track("C")),
            position_at_switch_ms: 0,
            to: Some(track("A")),
        }]
    );
}

#[test]
fn test_skip_to_previous_wraps_to_last() {
    let (mut manager, events, _engine) = manager_at(&["A", "B", "C"], "A");

    manager.skip_to_previous().unwrap();

    assert_eq!(manager.current_index(), Some(2));
    assert!(matches!(
        events.drain().as_slice(),
        [PlaybackEvent::TrackChanged { to: Some(t), .. }] if t.id() == "C"
    ));
}

// ===== ICY metadata =====

#[test]
fn test_icy_title_is_split_into_artist_and_title() {
    let (mut manager, events, _engine) = manager_at(&["radio"], "radio");

    manager.handle_engine_event(EngineEvent::Metadata(vec![MetadataEntry::IcyInfo {
        title: Some("Pink Floyd - Time".to_string()),
        url: None,
    }]));

    match events.drain().as_slice() {
        [PlaybackEvent::MetadataReceived(record)] => {
            assert_eq!(record.source, MetadataSource::Icy);
            assert_eq!(record.artist.as_deref(), Some("Pink Floyd"));
            assert_eq!(record.title.as_deref(), Some("Time"));
        }
        other => panic!("unexpected events {:?}", other),
    }
}

// ===== Behind live window =====

#[test]
fn test_behind_live_window_error_re_prepares_current_track() {
    let (mut manager, events, engine) = manager_with(&["live"]);
    manager.play().unwrap();
    events.drain();
    engine.take_calls();

    let error = EngineError::new(EngineErrorKind::Source, "behind live window")
        .with_source(BehindLiveWindow);
    manager.handle_engine_event(EngineEvent::PlayerError(error));

    assert_eq!(
        engine.calls(),
        vec![
            EngineCall::Stop { reset: true },
            EngineCall::SetPlayWhenReady(false),
            EngineCall::Prepare {
                source: source_of("live"),
                reset_position: true,
                reset_state: true,
            },
            EngineCall::SetPlayWhenReady(true),
        ]
    );

    let events = events.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        PlaybackEvent::Error {
            code: ErrorCode::PlaybackSource,
            message: "behind live window".to_string(),
        }
    );
    assert_eq!(
        events[1],
        PlaybackEvent::TrackChanged {
            from: Some(track("live")),
            position_at_switch_ms: 0,
            to: Some(track("live")),
        }
    );
    assert!(manager.auto_play());
}

#[test]
fn test_other_engine_errors_only_report() {
    let (mut manager, events, engine) = manager_at(&["A"], "A");

    manager.handle_engine_event(EngineEvent::PlayerError(EngineError::new(
        EngineErrorKind::Renderer,
        "audio sink lost",
    )));

    assert!(engine.calls().is_empty());
    assert_eq!(
        events.drain(),
        vec![PlaybackEvent::Error {
            code: ErrorCode::PlaybackRenderer,
            message: "audio sink lost".to_string(),
        }]
    );
}

#[test]
fn test_behind_live_window_on_renderer_error_only_reports() {
    let (mut manager, events, engine) = manager_at(&["live"], "live");
    engine.take_calls();

    let error = EngineError::new(EngineErrorKind::Renderer, "renderer stalled")
        .with_source(BehindLiveWindow);
    manager.handle_engine_event(EngineEvent::PlayerError(error));

    assert!(engine.calls().is_empty());
    assert_eq!(
        events.drain(),
        vec![PlaybackEvent::Error {
            code: ErrorCode::PlaybackRenderer,
            message: "renderer stalled".to_string(),
        }]
    );
}

// ===== Derived state edges =====

#[test]
fn test_buffering_then_ready_emits_single_play_edge() {
    let (mut manager, events, engine) = manager_at(&["A"], "A");

    deliver_state(&mut manager, &engine, false, RawState::Buffering);
    assert_eq!(
        events.drain(),
        vec![PlaybackEvent::StateChanged {
            state: DerivedState::Connecting
        }]
    );

    deliver_state(&mut manager, &engine, true, RawState::Buffering);
    assert_eq!(
        events.drain(),
        vec![PlaybackEvent::StateChanged {
            state: DerivedState::Buffering
        }]
    );

    deliver_state(&mut manager, &engine, true, RawState::Ready);
    assert_eq!(
        events.drain(),
        vec![
            PlaybackEvent::Play,
            PlaybackEvent::StateChanged {
                state: DerivedState::Playing
            },
        ]
    );
}

#[test]
fn test_repeated_state_emits_nothing() {
    let (mut manager, events, engine) = manager_at(&["A"], "A");

    deliver_state(&mut manager, &engine, true, RawState::Ready);
    events.drain();

    deliver_state(&mut manager, &engine, true, RawState::Ready);
    assert!(events.drain().is_empty());
}

#[test]
fn test_pause_edge() {
    let (mut manager, events, engine) = manager_at(&["A"], "A");
    deliver_state(&mut manager, &engine, true, RawState::Ready);
    events.drain();

    deliver_state(&mut manager, &engine, false, RawState::Ready);

    assert_eq!(
        events.drain(),
        vec![
            PlaybackEvent::Pause,
            PlaybackEvent::StateChanged {
                state: DerivedState::Paused
            },
        ]
    );
}

#[test]
fn test_end_follows_stopped() {
    let (mut manager, events, engine) = manager_at(&["A"], "A");
    deliver_state(&mut manager, &engine, true, RawState::Ready);
    events.drain();

    engine.set_position(183_500);
    deliver_state(&mut manager, &engine, true, RawState::Ended);

    assert_eq!(
        events.drain(),
        vec![
            PlaybackEvent::Stop,
            PlaybackEvent::StateChanged {
                state: DerivedState::Stopped
            },
            PlaybackEvent::End {
                track: Some(track("A")),
                position_ms: 183_500,
            },
        ]
    );
}
