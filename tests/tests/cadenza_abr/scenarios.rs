use std::time::Duration;

use cadenza::abr::{AbrEngine, AbrOptions, AbrReason, DefaultAbrEngine, VariantId};
use cadenza_test_utils::{RecordingSink, ScriptedBuffer, bytes_at, small_ladder, wide_ladder};
use rstest::{fixture, rstest};
use web_time::Instant;

struct Host {
    engine: DefaultAbrEngine,
    sink: RecordingSink,
    buffer: ScriptedBuffer,
    t0: Instant,
}

impl Host {
    fn at(&self, secs: u64) -> Instant {
        self.t0 + Duration::from_secs(secs)
    }

    /// Three one-second downloads at 4 Mbps.
    fn measure_4mbps(&mut self) {
        for _ in 0..3 {
            self.engine.segment_downloaded(
                Duration::from_secs(1),
                bytes_at(4.0, 1.0),
                false,
                self.t0,
            );
        }
    }
}

#[fixture]
fn host() -> Host {
    let t0 = Instant::now();
    let sink = RecordingSink::new();
    let buffer = ScriptedBuffer::new(20.0);
    let mut engine = AbrEngine::new(AbrOptions::default()).unwrap();
    engine.init(sink.clone());
    engine.attach_buffer_source(buffer.clone());
    engine.set_variants(small_ladder(), t0);
    Host {
        engine,
        sink,
        buffer,
        t0,
    }
}

#[rstest]
fn initial_pick_on_a_4mbps_network(mut host: Host) {
    host.measure_4mbps();
    let picked = host.engine.choose_variant(host.t0).unwrap();
    // medium class: 4 Mbps * 0.75 = 3 Mbps usable, 40th percentile -> 1.5 Mbps
    assert_eq!(picked.id, VariantId(2));
}

#[rstest]
fn critical_buffer_forces_lowest_with_clear(mut host: Host) {
    host.measure_4mbps();
    host.engine.enable();
    host.engine.tick(host.t0);
    assert_eq!(host.sink.ids(), vec![2]);

    host.buffer.set_level(4.0);
    let at = host.at(1);
    host.engine.tick(at);

    let last = host.sink.last().unwrap();
    assert_eq!(last.variant.id, VariantId(1));
    assert_eq!(last.reason, AbrReason::Critical);
    assert!(last.clear_buffer, "500 kbps < 0.7 * 1.5 Mbps");
    assert_eq!(last.safe_margin_secs, 3);
}

#[rstest]
fn repeated_switch_errors_force_safe_mode(mut host: Host) {
    host.measure_4mbps();
    host.engine.enable();
    host.engine.tick(host.t0);
    assert_eq!(host.engine.current_variant().map(|v| v.id), Some(VariantId(2)));

    for secs in 1..=3 {
        let at = host.at(secs);
        host.engine.notify_switch_error(Some(VariantId(2)), at);
    }

    assert_eq!(host.engine.current_variant().map(|v| v.id), Some(VariantId(1)));
    let last = host.sink.last().unwrap();
    assert_eq!(last.reason, AbrReason::SafeMode);
    assert_eq!(host.sink.ids(), vec![2, 1]);
}

#[rstest]
fn blacklisted_variant_is_avoided_then_restored(mut host: Host) {
    host.measure_4mbps();
    host.engine.enable();
    host.engine.tick(host.t0);

    let at = host.at(1);
    host.engine.notify_switch_error(Some(VariantId(2)), at);
    host.buffer.set_level(10.0);
    let at = host.at(6);
    host.engine.tick(at);
    assert_eq!(host.engine.current_variant().map(|v| v.id), Some(VariantId(1)));

    host.engine.notify_switch_success();
    assert_eq!(host.engine.last_failed_variant(), None);
    assert_eq!(host.engine.consecutive_errors(), 0);
}

#[rstest]
fn manifest_update_keeps_current_when_still_offered(mut host: Host) {
    host.measure_4mbps();
    host.engine.enable();
    host.engine.tick(host.t0);

    let mut ladder = small_ladder();
    ladder.push(cadenza::abr::Variant::new(4, 8_000_000, 1440));
    let at = host.at(1);
    assert!(host.engine.set_variants(ladder, at));
    assert_eq!(host.engine.current_variant().map(|v| v.id), Some(VariantId(2)));
    assert_eq!(host.sink.ids(), vec![2]);
}

#[rstest]
fn playhead_position_selects_the_buffered_range(mut host: Host) {
    host.measure_4mbps();
    host.engine.enable();

    // playhead inside the second range: 30 - 10 seconds ahead
    host.buffer.set_ranges(vec![0.0..3.0, 4.0..30.0], 10.0);
    host.engine.tick(host.t0);
    assert!(host.engine.buffer_level().is_some_and(|b| (b - 20.0).abs() < 1e-9));
    assert_eq!(host.sink.ids(), vec![2]);

    // playhead in a gap between ranges counts as an empty buffer
    host.buffer.set_ranges(vec![0.0..10.0, 20.0..40.0], 15.0);
    let at = host.at(1);
    host.engine.tick(at);
    assert!(host.engine.buffer_level().is_some_and(|b| b.abs() < 1e-9));
    assert_eq!(host.sink.last().unwrap().reason, AbrReason::Critical);
}

#[rstest]
fn class_change_after_a_normal_switch_waits_for_the_interval(mut host: Host) {
    host.engine.set_variants(wide_ladder(), host.t0);
    host.buffer.set_level(12.0);
    host.engine.enable();
    host.engine.tick(host.t0);
    assert_eq!(host.sink.ids(), vec![2]);

    let at = host.at(6);
    for _ in 0..3 {
        host.engine
            .segment_downloaded(Duration::from_secs(1), bytes_at(40.0, 1.0), false, at);
    }
    host.engine.tick(at);
    let upgrade = host.sink.last().unwrap();
    assert_eq!(upgrade.reason, AbrReason::ForcedUpgrade);
    assert_eq!(upgrade.variant.id, VariantId(4), "at most two rungs per decision");

    // the switch at 6s already reflected the new class
    let at = host.at(8);
    assert!(host.engine.tick(at).is_none());
    assert_eq!(host.sink.ids(), vec![2, 4]);

    let at = host.at(11);
    let next = host.engine.tick(at).unwrap();
    assert_eq!(next.variant.id, VariantId(6));
    assert_eq!(host.sink.ids(), vec![2, 4, 6]);
}
