use std::time::Duration;

use cadenza::{
    abr::{AbrReason, EngineStatus, VariantId},
    session::{AbrEvent, AbrSession, SessionConfig},
};
use cadenza_test_utils::{RecordingSink, ScriptedBuffer, StaticHint, bytes_at, small_ladder};
use tokio::{sync::broadcast, time::sleep};

fn session() -> (AbrSession, RecordingSink, ScriptedBuffer) {
    let session = AbrSession::new(SessionConfig::default()).unwrap();
    let sink = RecordingSink::new();
    let buffer = ScriptedBuffer::new(20.0);
    session.init(sink.clone());
    session.attach_buffer_source(buffer.clone());
    session.set_variants(small_ladder());
    (session, sink, buffer)
}

fn variant_changes(rx: &mut broadcast::Receiver<AbrEvent>) -> Vec<(u64, AbrReason)> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|e| match e {
            AbrEvent::VariantChanged { to, reason, .. } => Some((to.id.0, reason)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn fast_network_then_buffer_pressure() {
    let (session, sink, buffer) = session();
    let mut rx = session.subscribe();

    for _ in 0..3 {
        session.segment_downloaded(Duration::from_secs(1), bytes_at(20.0, 1.0), false);
    }
    session.enable().unwrap();

    // t=2s: first pick, 60th percentile on a high-class link
    sleep(Duration::from_millis(2_100)).await;
    assert_eq!(sink.ids(), vec![2]);

    // t=4s: the first pick already saw the new class, the interval still holds
    sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.ids(), vec![2]);

    // t=8s: interval elapsed, forced upgrade on a high-class link
    sleep(Duration::from_secs(4)).await;
    assert_eq!(sink.ids(), vec![2, 3]);

    // t=10s: buffer below the downgrade threshold
    buffer.set_level(6.0);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.ids(), vec![2, 3, 2]);

    assert_eq!(
        variant_changes(&mut rx),
        vec![
            (2, AbrReason::Initial),
            (3, AbrReason::ForcedUpgrade),
            (2, AbrReason::Urgent),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn safe_mode_pauses_the_monitor_until_success() {
    let (session, sink, buffer) = session();
    for _ in 0..3 {
        session.segment_downloaded(Duration::from_secs(1), bytes_at(4.0, 1.0), false);
    }
    session.enable().unwrap();
    sleep(Duration::from_millis(2_100)).await;
    assert_eq!(sink.ids(), vec![2]);

    for _ in 0..3 {
        session.notify_switch_error(None);
    }
    assert_eq!(session.current_variant().map(|v| v.id), Some(VariantId(1)));

    // a healthy buffer would allow an upgrade, but the engine waits
    buffer.set_level(20.0);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(sink.ids(), vec![2, 1]);

    session.notify_switch_success();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.ids(), vec![2, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn data_saver_hint_caps_quality() {
    let (session, sink, _buffer) = session();
    session.set_network_hints(StaticHint::new("4g", true));
    for _ in 0..3 {
        session.segment_downloaded(Duration::from_secs(1), bytes_at(5.0, 1.0), false);
    }
    let state = session.network_state();
    assert!((state.safety_factor - 0.4).abs() < f64::EPSILON);

    session.enable().unwrap();
    sleep(Duration::from_secs(30)).await;
    // 5 Mbps * 0.4 = 2 Mbps usable: 4 Mbps is never reached
    assert!(!sink.ids().contains(&3), "{:?}", sink.ids());
}

#[tokio::test(start_paused = true)]
async fn stop_and_reenable_starts_fresh() {
    let (session, sink, _buffer) = session();
    session.enable().unwrap();
    sleep(Duration::from_millis(2_100)).await;
    assert_eq!(session.status(), EngineStatus::Steady);

    session.stop();
    assert_eq!(session.status(), EngineStatus::Disabled);
    assert!(session.current_variant().is_none());
    assert!(!session.is_monitoring());

    session.enable().unwrap();
    assert_eq!(session.status(), EngineStatus::Initial);
    sleep(Duration::from_millis(2_100)).await;
    assert_eq!(sink.ids(), vec![1, 1]);
}
