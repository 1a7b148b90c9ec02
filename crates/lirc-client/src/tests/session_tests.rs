//! Tests for the session state machine and the event loop bridge

use super::fixtures::{
    DOUBLE_POWER, POWER_CODE, PROGRAM, SINGLE_POWER, data, drain, event_channel, scripted_session,
    write_lircrc,
};
use crate::bridge::Cycle;
use crate::channel::ReadOutcome;
use crate::error::Error;
use crate::event::ClientEvent;
use crate::registry::MAX_CONFIGS;

// ============================================================================
// Connection state machine
// ============================================================================

#[tokio::test]
async fn test_connect_twice_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "rc", SINGLE_POWER);
    let (mut session, script) = scripted_session();
    let (tx, _rx) = event_channel();

    session.connect(PROGRAM, false, rc.as_str(), tx.clone()).await.unwrap();
    session.connect("other", true, "ignored", tx).await.unwrap();

    assert!(session.is_connected());
    assert_eq!(script.opens(), 1);
    assert_eq!(session.program(), PROGRAM);
    assert_eq!(session.config_files(), &[rc]);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "rc", SINGLE_POWER);
    let (mut session, script) = scripted_session();
    let (tx, _rx) = event_channel();

    session.close();
    assert_eq!(script.closes(), 0);

    session.connect(PROGRAM, false, rc.as_str(), tx).await.unwrap();
    session.close();
    session.close();

    assert!(!session.is_connected());
    assert_eq!(script.closes(), 1);
    assert!(session.registry().is_empty());
    assert_eq!(session.run_cycle(), None);
}

#[tokio::test]
async fn test_connect_failure_stays_disconnected() {
    let (mut session, script) = scripted_session();
    script.set_refuse(true);
    let (tx, _rx) = event_channel();

    let err = session
        .connect(PROGRAM, false, crate::ConfigSources::none(), tx)
        .await
        .unwrap_err();

    assert!(err.is_connection());
    assert!(!session.is_connected());
    assert_eq!(session.run_cycle(), None);

    script.set_refuse(false);
    session.reconnect().await.unwrap();
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_config_failure_keeps_channel_open() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_lircrc(dir.path(), "good", SINGLE_POWER);
    let missing = dir.path().join("missing").to_string_lossy().into_owned();
    let (mut session, script) = scripted_session();
    let (tx, _rx) = event_channel();

    let err = session
        .connect(PROGRAM, false, vec![good.clone(), missing], tx.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConfigLoad { .. }));
    assert!(!session.is_connected());
    assert_eq!(script.closes(), 0);

    // Retrying reuses the half-open channel
    session.connect(PROGRAM, false, good.as_str(), tx).await.unwrap();
    assert!(session.is_connected());
    assert_eq!(script.opens(), 1);
    assert_eq!(session.config_files(), &[good]);
}

#[tokio::test]
async fn test_close_releases_half_open_channel() {
    let (mut session, script) = scripted_session();
    let (tx, _rx) = event_channel();

    let _ = session
        .connect(PROGRAM, false, "/nonexistent/lircrc", tx)
        .await;
    session.close();

    assert_eq!(script.closes(), 1);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_reconnect_when_connected_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "rc", SINGLE_POWER);
    let (mut session, script) = scripted_session();
    let (tx, _rx) = event_channel();

    session.connect(PROGRAM, false, rc.as_str(), tx).await.unwrap();
    session.reconnect().await.unwrap();

    assert_eq!(script.opens(), 1);
}

// ============================================================================
// Event dispatch
// ============================================================================

#[tokio::test]
async fn test_fan_out_one_raw_three_data() {
    let dir = tempfile::tempdir().unwrap();
    let one = write_lircrc(dir.path(), "one", SINGLE_POWER);
    let two = write_lircrc(dir.path(), "two", DOUBLE_POWER);
    let (mut session, script) = scripted_session();
    let (tx, mut rx) = event_channel();

    session
        .connect(PROGRAM, false, vec![one.as_str(), two.as_str()], tx)
        .await
        .unwrap();
    script.push_code(POWER_CODE);

    assert_eq!(
        session.next_cycle().await,
        Some(Cycle::Dispatched { data: 3 })
    );
    assert_eq!(
        drain(&mut rx),
        vec![
            ClientEvent::RawData {
                code: POWER_CODE.to_string()
            },
            data("POWER", &one),
            data("POWER", &two),
            data("POWER", &two),
        ]
    );
}

#[tokio::test]
async fn test_shared_lircrc_other_program_quit() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(
        dir.path(),
        "shared",
        "begin\nprog = mythtv\nbutton = KEY_POWER\nconfig = theirs\nflags = quit\nend\n\
         begin\nprog = app\nbutton = KEY_POWER\nconfig = POWER\nend\n",
    );
    let (mut session, script) = scripted_session();
    let (tx, mut rx) = event_channel();

    session.connect(PROGRAM, false, rc.as_str(), tx).await.unwrap();
    script.push_code(POWER_CODE);

    assert_eq!(session.run_cycle(), Some(Cycle::Dispatched { data: 1 }));
    assert_eq!(drain(&mut rx).last(), Some(&data("POWER", &rc)));
}

#[tokio::test]
async fn test_one_code_per_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "rc", SINGLE_POWER);
    let (mut session, script) = scripted_session();
    let (tx, mut rx) = event_channel();

    session.connect(PROGRAM, false, rc.as_str(), tx).await.unwrap();
    script.push_code(POWER_CODE);
    script.push_code(POWER_CODE);

    session.run_cycle();
    assert_eq!(drain(&mut rx).len(), 2);
    session.run_cycle();
    assert_eq!(drain(&mut rx).len(), 2);
    assert_eq!(session.run_cycle(), Some(Cycle::Idle));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_unmapped_code_emits_raw_only() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "rc", SINGLE_POWER);
    let (mut session, script) = scripted_session();
    let (tx, mut rx) = event_channel();

    session.connect(PROGRAM, false, rc.as_str(), tx).await.unwrap();
    script.push_code("0000000000000001 00 KEY_1 tv");
    script.push_code("not a code");

    assert_eq!(session.run_cycle(), Some(Cycle::Dispatched { data: 0 }));
    assert_eq!(session.run_cycle(), Some(Cycle::Dispatched { data: 0 }));
    let names: Vec<&str> = drain(&mut rx).iter().map(ClientEvent::name).collect();
    assert_eq!(names, vec!["rawdata", "rawdata"]);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_peer_loss_closes_and_emits_closed() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "rc", SINGLE_POWER);
    let (mut session, script) = scripted_session();
    let (tx, mut rx) = event_channel();

    session.connect(PROGRAM, false, rc.as_str(), tx).await.unwrap();
    script.push(ReadOutcome::Lost("eof".to_string()));

    assert_eq!(session.next_cycle().await, Some(Cycle::Closed));
    assert_eq!(drain(&mut rx), vec![ClientEvent::Closed]);
    assert!(!session.is_connected());
    assert_eq!(session.next_cycle().await, None);
    assert_eq!(session.config_files(), &[rc]);
}

#[tokio::test]
async fn test_reconnect_replays_configs() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "cfgA", SINGLE_POWER);
    let (mut session, script) = scripted_session();
    let (tx, mut rx) = event_channel();

    session.connect("app", false, rc.as_str(), tx).await.unwrap();
    script.push(ReadOutcome::Lost("eof".to_string()));
    session.run().await;
    assert!(!session.is_connected());
    drain(&mut rx);

    session.reconnect().await.unwrap();
    assert!(session.is_connected());
    assert_eq!(session.config_files(), &[rc.clone()]);
    assert_eq!(script.opens(), 2);

    // The replayed table and the remembered sink are both live again
    script.push_code(POWER_CODE);
    assert_eq!(session.run_cycle(), Some(Cycle::Dispatched { data: 1 }));
    assert_eq!(drain(&mut rx).last(), Some(&data("POWER", &rc)));
}

#[tokio::test]
async fn test_run_stops_on_close() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "rc", SINGLE_POWER);
    let (mut session, script) = scripted_session();
    let (tx, mut rx) = event_channel();

    session.connect(PROGRAM, false, rc.as_str(), tx).await.unwrap();
    script.push_code(POWER_CODE);
    script.push(ReadOutcome::Lost("eof".to_string()));

    session.run().await;

    let names: Vec<&str> = drain(&mut rx).iter().map(ClientEvent::name).collect();
    assert_eq!(names, vec!["rawdata", "data", "closed"]);
}

#[tokio::test]
async fn test_closure_sink() {
    use std::sync::{Arc, Mutex};

    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "rc", SINGLE_POWER);
    let (mut session, script) = scripted_session();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);

    session
        .connect(PROGRAM, false, rc.as_str(), move |event: ClientEvent| {
            sink_seen.lock().unwrap().push(event.name());
        })
        .await
        .unwrap();
    script.push_code(POWER_CODE);
    session.run_cycle();

    assert_eq!(*seen.lock().unwrap(), vec!["rawdata", "data"]);
}

// ============================================================================
// Mode
// ============================================================================

#[tokio::test]
async fn test_mode_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let rc = write_lircrc(dir.path(), "rc", SINGLE_POWER);
    let (mut session, _script) = scripted_session();
    let (tx, _rx) = event_channel();

    session.connect(PROGRAM, false, rc.as_str(), tx).await.unwrap();
    assert_eq!(session.mode(), None);

    session.set_mode(Some("TV")).unwrap();
    assert_eq!(session.mode(), Some("TV"));

    session.set_mode(None).unwrap();
    assert_eq!(session.mode(), None);
}

#[test]
fn test_mode_without_tables() {
    let (mut session, _script) = scripted_session();

    assert_eq!(session.mode(), None);
    assert!(matches!(
        session.set_mode(Some("TV")),
        Err(Error::NoConfigLoaded)
    ));
}

#[test]
fn test_mode_follows_slot_zero_only() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_lircrc(dir.path(), "a", SINGLE_POWER);
    let b = write_lircrc(dir.path(), "b", SINGLE_POWER);
    let (mut session, _script) = scripted_session();

    session.add_config(vec![a.as_str(), b.as_str()]).unwrap();
    session.remove_config(&a);

    assert!(matches!(
        session.set_mode(Some("TV")),
        Err(Error::NoConfigLoaded)
    ));
}

// ============================================================================
// Registry independence
// ============================================================================

#[tokio::test]
async fn test_registry_independent_of_connection() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_lircrc(dir.path(), "a", SINGLE_POWER);
    let b = write_lircrc(dir.path(), "b", SINGLE_POWER);
    let (mut session, _script) = scripted_session();

    session.add_config(a.as_str()).unwrap();
    assert_eq!(session.config_files(), &[a.clone()]);
    session.clear_config();
    assert!(session.config_files().is_empty());

    let (tx, _rx) = event_channel();
    session.connect(PROGRAM, false, crate::ConfigSources::none(), tx).await.unwrap();

    session.add_config(b.as_str()).unwrap();
    assert_eq!(session.config_files(), &[b]);
    session.clear_config();
    assert!(session.config_files().is_empty());
    assert!(session.is_connected());
}

#[test]
fn test_registry_capacity_through_session() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<String> = (0..=MAX_CONFIGS)
        .map(|i| write_lircrc(dir.path(), &format!("rc{i}"), SINGLE_POWER))
        .collect();
    let (mut session, _script) = scripted_session();

    let err = session.add_config(paths.clone()).unwrap_err();

    match err {
        Error::RegistryFull { path } => assert_eq!(path, paths[MAX_CONFIGS]),
        other => panic!("Expected RegistryFull, got {other:?}"),
    }
    assert_eq!(session.config_files(), &paths[..MAX_CONFIGS]);
}

#[tokio::test]
async fn test_connect_clears_previous_configs() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_lircrc(dir.path(), "a", SINGLE_POWER);
    let b = write_lircrc(dir.path(), "b", SINGLE_POWER);
    let (mut session, _script) = scripted_session();
    let (tx, _rx) = event_channel();

    session.add_config(a.as_str()).unwrap();
    session.connect(PROGRAM, false, b.as_str(), tx).await.unwrap();

    assert_eq!(session.config_files(), &[b]);
}
