//! Closed-loop runs: the engine picks, a simulated link downloads, the
//! buffer moves accordingly.

use std::time::Duration;

use cadenza::abr::{AbrEngine, AbrOptions, DefaultAbrEngine, SpeedClass, Variant};
use cadenza_test_utils::{LinkTrace, RecordingSink, ScriptedBuffer, wide_ladder};
use rstest::rstest;
use web_time::Instant;

const SEGMENT_SECS: f64 = 4.0;
/// The player stops fetching above this much buffered media.
const MAX_BUFFER_SECS: f64 = 30.0;

struct Sim {
    engine: DefaultAbrEngine,
    buffer: ScriptedBuffer,
    level: f64,
    clock: f64,
    t0: Instant,
}

impl Sim {
    fn new() -> Self {
        let t0 = Instant::now();
        let buffer = ScriptedBuffer::new(0.0);
        let mut engine = AbrEngine::new(AbrOptions::default()).unwrap();
        engine.init(RecordingSink::new());
        engine.attach_buffer_source(buffer.clone());
        engine.set_variants(wide_ladder(), t0);
        engine.enable();
        Self {
            engine,
            buffer,
            level: 0.0,
            clock: 0.0,
            t0,
        }
    }

    fn current(&mut self) -> Variant {
        let now = self.t0 + Duration::from_secs_f64(self.clock);
        match self.engine.current_variant() {
            Some(v) => v.clone(),
            None => self.engine.choose_variant(now).unwrap(),
        }
    }

    /// Download one segment of the current variant over a `mbps` link.
    fn step(&mut self, mbps: f64) {
        if self.level > MAX_BUFFER_SECS {
            // idle while playback drains the excess
            self.clock += self.level - MAX_BUFFER_SECS;
            self.level = MAX_BUFFER_SECS;
        }
        let variant = self.current();
        #[expect(clippy::cast_precision_loss)]
        let bits = variant.bandwidth_bps as f64 * SEGMENT_SECS;
        let secs = bits / (mbps * 1_000_000.0);
        self.clock += secs;
        self.level = (self.level - secs).max(0.0) + SEGMENT_SECS;
        self.buffer.set_level(self.level);

        let now = self.t0 + Duration::from_secs_f64(self.clock);
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bytes = (bits / 8.0) as u64;
        self.engine
            .segment_downloaded(Duration::from_secs_f64(secs), bytes, true, now);
        self.engine.tick(now);
    }
}

#[rstest]
#[case(3)]
#[case(11)]
#[case(2024)]
fn random_link_keeps_selection_inside_catalog(#[case] seed: u64) {
    let mut sim = Sim::new();
    let mut link = LinkTrace::new(seed, 300_000.0, 25_000_000.0);
    for _ in 0..200 {
        sim.step(link.next_mbps());
        let current = sim.engine.current_variant().unwrap();
        assert!(sim.engine.variants().contains(current));
        assert_eq!(sim.engine.consecutive_errors(), 0);
    }
}

#[test]
fn sustained_slow_link_settles_low() {
    let mut sim = Sim::new();
    for _ in 0..60 {
        sim.step(0.6);
    }
    assert_eq!(sim.engine.network_state().speed_class, SpeedClass::Low);
    let current = sim.engine.current_variant().unwrap();
    assert!(current.height <= 720, "{current:?}");
    assert!(current.bandwidth_bps <= 700_000, "{current:?}");
}

#[test]
fn fast_link_climbs_to_the_top() {
    let mut sim = Sim::new();
    for _ in 0..60 {
        sim.step(40.0);
    }
    assert_eq!(sim.engine.network_state().speed_class, SpeedClass::High);
    assert_eq!(
        sim.engine.current_variant().map(|v| v.bandwidth_bps),
        Some(14_000_000)
    );
}
