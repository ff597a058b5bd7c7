use std::{sync::atomic::Ordering, time::Duration};

use super::{
    state::Filters,
    testing::{Harness, Script, settle, track, voice_state},
};
use crate::{
    common::Severity,
    configs::{Config, FiltersConfig, PlayerConfig},
    protocol::{NodeEvent, OutgoingMessage, TrackEndReason},
    voice::{
        PlayerStatus, PlayerTransition, StatusReason, TransportStatus, VoiceEvent, VoiceSession,
    },
};

async fn playing(h: &Harness, identifier: &str) {
    h.handle
        .play(track(identifier), false)
        .await
        .expect("player gone");
    settle().await;
}

fn config(player: PlayerConfig) -> Config {
    Config {
        player,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn replacing_a_track_ends_the_old_one_first() {
    let h = Harness::new();
    h.connect().await;

    playing(&h, "A").await;
    assert_eq!(h.drain_events(), vec!["start:A"]);

    playing(&h, "B").await;
    assert_eq!(h.drain_events(), vec!["end:A:replaced", "start:B"]);

    let player = h.handle.snapshot().await.unwrap();
    assert_eq!(player.track.unwrap().info.identifier, "B");
    assert_eq!(h.metrics.playing_players(), 1);
}

#[tokio::test(start_paused = true)]
async fn one_start_per_genuine_start() {
    let h = Harness::new();
    h.connect().await;

    for id in ["A", "B", "C"] {
        playing(&h, id).await;
    }

    let starts = h
        .drain_events()
        .into_iter()
        .filter(|e| e.starts_with("start:"))
        .count();
    assert_eq!(starts, 3);
    assert_eq!(h.metrics.playing_players(), 1);
}

#[tokio::test(start_paused = true)]
async fn resolver_failure_reports_exception_then_load_failed() {
    let h = Harness::new();
    h.connect().await;
    h.resolver.script("X", Script::ResolveFails);

    let player = h.handle.play(track("X"), false).await.unwrap();
    settle().await;

    assert!(player.track.is_none());
    assert_eq!(h.drain_events(), vec!["exception:X", "end:X:loadFailed"]);
    assert_eq!(h.metrics.playing_players(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_replacement_sends_no_replaced_event() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;
    h.resolver.script("X", Script::ResolveFails);

    let player = h.handle.play(track("X"), false).await.unwrap();
    settle().await;

    assert_eq!(
        h.drain_events(),
        vec!["start:A", "exception:X", "end:X:loadFailed"]
    );
    // not restored as the active track, but its stream is left alone
    assert!(player.track.is_none());
    assert!(h.session().has_stream());
}

#[tokio::test(start_paused = true)]
async fn failed_replacement_ends_the_old_streams_telemetry() {
    let h = Harness::with_config(config(PlayerConfig {
        player_update_interval_ms: 1000,
        ..Default::default()
    }));
    h.connect().await;
    playing(&h, "A").await;
    assert_eq!(h.metrics.playing_players(), 1);
    h.resolver.script("X", Script::ResolveFails);

    h.handle.play(track("X"), false).await.unwrap();
    settle().await;
    h.drain();

    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert!(
        !h.drain()
            .iter()
            .any(|m| matches!(m, OutgoingMessage::PlayerUpdate { .. }))
    );
    assert_eq!(h.metrics.playing_players(), 0);
    assert!(h.session().has_stream());
}

#[tokio::test(start_paused = true)]
async fn events_for_a_superseded_resource_are_ignored() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;
    let session = h.session();
    let stale = session.resource();

    playing(&h, "B").await;
    assert_eq!(h.drain_events(), vec!["start:A", "end:A:replaced", "start:B"]);
    assert_ne!(session.resource(), stale);

    session.inject(VoiceEvent::PlayerStateChange {
        old: PlayerTransition::new(PlayerStatus::Playing, StatusReason::Requested, stale),
        new: PlayerTransition::new(PlayerStatus::Idle, StatusReason::Finished, stale),
    });
    session.inject(VoiceEvent::Error {
        resource: stale,
        message: "read error on the old stream".into(),
    });
    settle().await;

    assert!(h.drain_events().is_empty());
    let player = h.handle.snapshot().await.unwrap();
    assert_eq!(player.track.unwrap().info.identifier, "B");
    assert!(player.state.is_some());
    assert_eq!(session.player_status(), PlayerStatus::Playing);
    assert_eq!(h.metrics.playing_players(), 1);
}

#[tokio::test(start_paused = true)]
async fn failure_events_carry_the_new_tracks_user_data() {
    let h = Harness::new();
    h.connect().await;
    h.resolver.script("X", Script::ResolveFails);

    let failing = track("X").with_user_data(Some(serde_json::json!({ "requester": 7 })));
    h.handle.play(failing, false).await.unwrap();
    settle().await;

    let tracks: Vec<_> = h
        .drain()
        .into_iter()
        .filter_map(|msg| match msg {
            OutgoingMessage::Event {
                event: NodeEvent::TrackException { track, .. } | NodeEvent::TrackEnd { track, .. },
            } => Some(track),
            _ => None,
        })
        .collect();
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| t.user_data["requester"] == 7));
}

#[tokio::test(start_paused = true)]
async fn open_failure_is_a_load_failure() {
    let h = Harness::new();
    h.connect().await;
    h.resolver.script("X", Script::OpenFails);

    let player = h.handle.play(track("X"), false).await.unwrap();
    settle().await;

    assert!(player.track.is_none());
    assert_eq!(h.drain_events(), vec!["exception:X", "end:X:loadFailed"]);
}

#[tokio::test(start_paused = true)]
async fn no_replace_keeps_the_active_track() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;

    let player = h.handle.play(track("B"), true).await.unwrap();
    settle().await;

    assert_eq!(player.track.unwrap().info.identifier, "A");
    assert_eq!(h.drain_events(), vec!["start:A"]);
}

#[tokio::test(start_paused = true)]
async fn stop_on_idle_is_a_no_op() {
    let h = Harness::new();
    h.connect().await;

    let before = h.handle.snapshot().await.unwrap();
    let after = h.handle.stop().await.unwrap();
    settle().await;

    assert!(h.drain_events().is_empty());
    assert_eq!(before.track, after.track);
    assert_eq!(before.volume, after.volume);
}

#[tokio::test(start_paused = true)]
async fn stop_ends_the_track_and_its_bookkeeping() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;

    let player = h.handle.stop().await.unwrap();
    settle().await;

    assert!(player.track.is_none());
    assert!(player.state.is_none());
    assert_eq!(h.drain_events(), vec!["start:A", "end:A:stopped"]);
    assert_eq!(h.metrics.playing_players(), 0);
    assert!(!h.session().has_stream());
}

#[tokio::test(start_paused = true)]
async fn finished_tracks_end_with_finished() {
    let h = Harness::new();
    h.connect().await;
    h.resolver.script("A", Script::Frames(10));

    playing(&h, "A").await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(h.drain_events(), vec!["start:A", "end:A:finished"]);
    assert!(h.handle.snapshot().await.unwrap().track.is_none());
    assert_eq!(h.metrics.playing_players(), 0);
}

#[tokio::test(start_paused = true)]
async fn stream_errors_are_faults() {
    let h = Harness::new();
    h.connect().await;
    h.resolver.script("A", Script::Broken(5));

    playing(&h, "A").await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let events: Vec<_> = h
        .drain()
        .into_iter()
        .filter_map(|msg| match msg {
            OutgoingMessage::Event { event } => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(events.len(), 3);
    match &events[1] {
        NodeEvent::TrackException { exception, .. } => {
            assert_eq!(exception.severity, Severity::Fault);
            assert_eq!(exception.message.as_deref(), Some("upstream reset"));
        }
        other => panic!("expected exception, got {other:?}"),
    }
    assert!(matches!(
        &events[2],
        NodeEvent::TrackEnd { reason, .. } if *reason == TrackEndReason::LoadFailed
    ));
    assert!(h.handle.snapshot().await.unwrap().track.is_none());
}

#[tokio::test(start_paused = true)]
async fn volume_set_while_idle_applies_to_the_next_track() {
    let h = Harness::new();
    h.connect().await;

    let staged = h.handle.volume(50).await.unwrap();
    assert_eq!(staged.volume, 100);

    let player = h.handle.play(track("A"), false).await.unwrap();
    assert_eq!(player.volume, 50);
    assert_eq!(h.session().current_volume(), Some(0.5));

    let live = h.handle.volume(200).await.unwrap();
    assert_eq!(live.volume, 200);
    assert_eq!(h.session().current_volume(), Some(2.0));
}

#[tokio::test(start_paused = true)]
async fn volume_is_clamped_to_the_configured_ceiling() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;

    let player = h.handle.volume(5000).await.unwrap();
    assert_eq!(player.volume, 1000);
    assert_eq!(h.session().current_volume(), Some(10.0));
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_position_without_restarting() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let paused = h.handle.pause(true).await.unwrap();
    assert!(paused.paused);
    let frozen = paused.state.unwrap().position;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let still = h.handle.snapshot().await.unwrap();
    assert_eq!(still.state.unwrap().position, frozen);

    h.handle.pause(false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.handle.snapshot().await.unwrap().state.unwrap().position > frozen);
    assert_eq!(h.drain_events(), vec!["start:A"]);
}

#[tokio::test(start_paused = true)]
async fn filters_restart_at_the_real_time_position() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let filters = Filters {
        volume: Some(0.5),
        ..Default::default()
    };
    let player = h.handle.filters(filters, Some(90_000)).await.unwrap();
    settle().await;
    assert_eq!(player.filters.volume, Some(0.5));

    let seek = {
        let requests = h.pipeline.requests.lock();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.url, "mem://A");
        assert_eq!(request.protocol, "mem");
        assert_eq!(request.end_time_ms, Some(90_000));
        request.seek_ms.unwrap()
    };
    assert!((960..=1060).contains(&seek), "seek at {seek}");

    // a swap, not a new track
    assert_eq!(h.drain_events(), vec!["start:A"]);
    assert_eq!(h.metrics.playing_players(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let position = h.handle.snapshot().await.unwrap().state.unwrap().position;
    assert!(
        (seek + 440..=seek + 560).contains(&position),
        "position {position} after seek {seek}"
    );
}

#[tokio::test(start_paused = true)]
async fn filters_are_ignored_while_nothing_plays() {
    let h = Harness::new();
    h.connect().await;

    let player = h
        .handle
        .filters(
            Filters {
                volume: Some(0.5),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert!(player.filters.is_all_none());
    assert!(h.pipeline.requests.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn filters_are_ignored_when_disabled() {
    let h = Harness::with_config(Config {
        filters: FiltersConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    });
    h.connect().await;
    playing(&h, "A").await;

    let player = h
        .handle
        .filters(
            Filters {
                volume: Some(0.5),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert!(player.filters.is_all_none());
    assert!(h.pipeline.requests.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn filter_failure_clears_track_and_filters() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;
    h.pipeline.fail.store(true, Ordering::SeqCst);

    let player = h
        .handle
        .filters(
            Filters {
                volume: Some(0.5),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    settle().await;

    assert!(player.track.is_none());
    assert!(player.filters.is_all_none());
    assert_eq!(
        h.drain_events(),
        vec!["start:A", "exception:A", "end:A:loadFailed"]
    );
    assert_eq!(h.metrics.playing_players(), 0);
    assert!(!h.session().has_stream());
}

#[tokio::test(start_paused = true)]
async fn active_filters_route_new_tracks_through_the_pipeline() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;
    h.handle
        .filters(
            Filters {
                volume: Some(0.8),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    playing(&h, "B").await;

    let requests = h.pipeline.requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].info.identifier, "B");
    assert_eq!(requests[1].seek_ms, None);
    assert_eq!(requests[1].transcoder, Some(4242));
    assert_eq!(requests[1].filters.volume, Some(0.8));
    drop(requests);

    assert_eq!(
        h.drain_events(),
        vec!["start:A", "end:A:replaced", "start:B"]
    );
}

#[tokio::test(start_paused = true)]
async fn build_failure_after_replace_clears_filters() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;
    h.handle
        .filters(
            Filters {
                volume: Some(0.8),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    h.pipeline.fail.store(true, Ordering::SeqCst);

    let player = h.handle.play(track("B"), false).await.unwrap();
    settle().await;

    assert!(player.track.is_none());
    assert!(player.filters.is_all_none());
    assert_eq!(
        h.drain_events(),
        vec!["start:A", "end:A:replaced", "exception:B", "end:B:loadFailed"]
    );
    assert_eq!(h.metrics.playing_players(), 0);
}

#[tokio::test(start_paused = true)]
async fn abnormal_disconnect_resets_the_session() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;

    h.session().close(4014, "Disconnected");
    settle().await;

    assert_eq!(h.drain_events(), vec!["start:A", "closed:4014"]);
    let player = h.handle.snapshot().await.unwrap();
    assert!(player.track.is_none());
    assert!(player.state.is_none());
    assert_eq!(player.voice, Default::default());
    assert_eq!(h.metrics.playing_players(), 0);
    assert_eq!(h.metrics.players(), 1);

    // a fresh voice update joins a new transport
    h.connect().await;
    assert_eq!(h.connector.joined(), 2);
    assert!(h.session().status().is_connected());
}

#[tokio::test(start_paused = true)]
async fn websocket_closed_event_describes_the_code() {
    let h = Harness::new();
    h.connect().await;

    h.session().close(4006, "");
    settle().await;

    let closed = h.drain().into_iter().find_map(|msg| match msg {
        OutgoingMessage::Event {
            event:
                NodeEvent::WebSocketClosed {
                    code,
                    reason,
                    by_remote,
                    ..
                },
        } => Some((code, reason, by_remote)),
        _ => None,
    });
    assert_eq!(
        closed,
        Some((4006, "Session no longer valid".to_string(), true))
    );
}

#[tokio::test(start_paused = true)]
async fn server_crash_disconnect_is_not_terminal() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;

    h.session().close(4015, "Voice server crashed");
    settle().await;

    assert_eq!(h.drain_events(), vec!["start:A"]);
    let player = h.handle.snapshot().await.unwrap();
    assert_eq!(player.track.unwrap().info.identifier, "A");
    assert_eq!(h.connector.joined(), 1);
}

#[tokio::test(start_paused = true)]
async fn telemetry_ticks_on_the_configured_interval() {
    let h = Harness::with_config(config(PlayerConfig {
        player_update_interval_ms: 5000,
        ..Default::default()
    }));
    h.connect().await;
    playing(&h, "A").await;
    h.drain();

    tokio::time::sleep(Duration::from_millis(12_000)).await;

    let positions: Vec<u64> = h
        .drain()
        .into_iter()
        .filter_map(|msg| match msg {
            OutgoingMessage::PlayerUpdate { guild_id, state } => {
                assert_eq!(&*guild_id, "G1");
                assert!(state.connected);
                Some(state.position)
            }
            _ => None,
        })
        .collect();

    assert_eq!(positions.len(), 2);
    assert!(positions.windows(2).all(|w| w[0] <= w[1]));
    assert!((4900..=5100).contains(&positions[0]), "{positions:?}");
}

#[tokio::test(start_paused = true)]
async fn telemetry_is_off_when_interval_is_zero() {
    let h = Harness::with_config(config(PlayerConfig {
        player_update_interval_ms: 0,
        ..Default::default()
    }));
    h.connect().await;
    playing(&h, "A").await;

    tokio::time::sleep(Duration::from_millis(12_000)).await;
    assert!(
        !h.drain()
            .iter()
            .any(|m| matches!(m, OutgoingMessage::PlayerUpdate { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn telemetry_stops_with_the_track() {
    let h = Harness::with_config(config(PlayerConfig {
        player_update_interval_ms: 1000,
        ..Default::default()
    }));
    h.connect().await;
    playing(&h, "A").await;

    h.handle.stop().await.unwrap();
    h.drain();
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn play_waits_for_voice_credentials() {
    let h = Harness::new();

    let handle = h.handle.clone();
    let pending = tokio::spawn(async move { handle.play(track("A"), false).await });
    settle().await;
    assert!(h.drain_events().is_empty());

    // served while the play is still waiting for the connection
    let updated = h.handle.update_voice(voice_state()).await.unwrap();
    assert_eq!(updated.voice, voice_state());

    let player = pending.await.unwrap().unwrap();
    settle().await;
    assert_eq!(player.track.unwrap().info.identifier, "A");
    assert_eq!(h.drain_events(), vec!["start:A"]);
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_is_a_load_failure() {
    let h = Harness::with_config(config(PlayerConfig {
        connect_timeout_ms: 1000,
        ..Default::default()
    }));

    let player = h.handle.play(track("A"), false).await.unwrap();
    settle().await;

    assert!(player.track.is_none());
    let exception = h.drain().into_iter().find_map(|msg| match msg {
        OutgoingMessage::Event {
            event: NodeEvent::TrackException { exception, .. },
        } => Some(exception),
        _ => None,
    });
    assert_eq!(
        exception.unwrap().message.as_deref(),
        Some("voice connection was not ready within 1000 ms")
    );
}

#[tokio::test(start_paused = true)]
async fn commands_queued_during_the_wait_run_afterwards() {
    let h = Harness::new();

    let handle = h.handle.clone();
    let pending = tokio::spawn(async move { handle.play(track("A"), false).await });
    settle().await;

    let handle = h.handle.clone();
    let queued_volume = tokio::spawn(async move { handle.volume(30).await });
    settle().await;

    h.connect().await;
    pending.await.unwrap().unwrap();
    let player = queued_volume.await.unwrap().unwrap();
    assert_eq!(player.volume, 30);
    assert_eq!(h.session().current_volume(), Some(0.3));
}

#[tokio::test(start_paused = true)]
async fn destroy_discards_work_in_flight() {
    let h = Harness::new();
    h.connect().await;
    h.resolver.delay(Duration::from_secs(1));

    let handle = h.handle.clone();
    let pending = tokio::spawn(async move { handle.play(track("A"), false).await });
    settle().await;

    h.handle.destroy();
    assert!(pending.await.unwrap().is_none());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.drain_events().is_empty());
    assert!(h.registry.is_empty());
    assert_eq!(h.metrics.players(), 0);
    assert!(h.handle.snapshot().await.is_none());
    assert!(h.session().status().is_disconnected());
}

#[tokio::test(start_paused = true)]
async fn destroy_releases_playback() {
    let h = Harness::new();
    h.connect().await;
    playing(&h, "A").await;

    h.handle.destroy();
    settle().await;

    assert!(h.handle.is_destroyed());
    assert_eq!(h.metrics.players(), 0);
    assert_eq!(h.metrics.playing_players(), 0);
    assert!(!h.session().has_stream());
    assert!(matches!(
        h.session().status(),
        TransportStatus::Disconnected { code: 1000, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn snapshot_reports_state_only_while_playing() {
    let h = Harness::new();
    h.connect().await;
    assert!(h.handle.snapshot().await.unwrap().state.is_none());

    playing(&h, "A").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = h.handle.snapshot().await.unwrap().state.unwrap();
    assert!(state.connected);
    assert_eq!(state.ping, 0);
    assert!(state.position >= 80);
}
