use std::time::Duration;

use cadenza::abr::{
    AbrEngine, AbrOptions, BandwidthEstimator, EngineStatus, Variant, VariantId,
};
use cadenza_test_utils::{
    RecordingSink, ScriptedBuffer, bytes_at, download_trace, small_ladder, wide_ladder,
};
use rstest::rstest;
use web_time::Instant;

fn harmonic_mean(values: &[f64]) -> f64 {
    #[expect(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    n / values.iter().map(|v| 1.0 / v).sum::<f64>()
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(42)]
#[case(0xDEAD_BEEF)]
fn estimate_is_harmonic_mean_of_recent_window(#[case] seed: u64) {
    let trace = download_trace(seed, 37, 200_000.0, 30_000_000.0);
    let mut estimator = BandwidthEstimator::new(&AbrOptions::default());
    let mut seen = Vec::new();

    for download in &trace {
        estimator.record_sample(download.bytes, download.elapsed);
        seen.push(download.bps());

        let window = &seen[seen.len().saturating_sub(20)..];
        let estimate = estimator.estimate_bps().unwrap();
        let min = window.iter().copied().fold(f64::INFINITY, f64::min);
        let max = window.iter().copied().fold(0.0, f64::max);
        assert!(estimate >= min * (1.0 - 1e-9) && estimate <= max * (1.0 + 1e-9));

        let expected = harmonic_mean(window);
        assert!((estimate - expected).abs() <= expected * 1e-9, "{estimate} vs {expected}");
    }
}

#[test]
fn only_last_twenty_samples_count() {
    let mut estimator = BandwidthEstimator::new(&AbrOptions::default());
    for _ in 0..5 {
        estimator.record_sample(bytes_at(1.0, 1.0), Duration::from_secs(1));
    }
    for _ in 0..20 {
        estimator.record_sample(bytes_at(8.0, 1.0), Duration::from_secs(1));
    }
    assert_eq!(estimator.len(), 20);
    let estimate = estimator.estimate_bps().unwrap();
    assert!((estimate - 8_000_000.0).abs() < 1.0, "{estimate}");
}

#[rstest]
#[case(400_000.0)]
#[case(900_000.0)]
#[case(2_000_000.0)]
#[case(4_000_000.0)]
#[case(7_500_000.0)]
#[case(12_000_000.0)]
#[case(40_000_000.0)]
fn fresh_selection_fits_usable_bandwidth(#[case] bps: f64) {
    let now = Instant::now();
    let mut engine = AbrEngine::new(AbrOptions::default()).unwrap();
    engine.set_variants(wide_ladder(), now);
    for _ in 0..3 {
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bytes = (bps / 8.0) as u64;
        engine.segment_downloaded(Duration::from_secs(1), bytes, false, now);
    }

    let picked = engine.choose_variant(now).unwrap();
    let usable = engine.bandwidth_estimate().unwrap() * engine.network_state().safety_factor;
    let lowest = engine.variants()[0].id;
    #[expect(clippy::cast_precision_loss)]
    let fits = picked.bandwidth_bps as f64 <= usable;
    assert!(fits || picked.id == lowest, "{picked:?} over {usable}");
}

#[test]
fn disable_twice_and_release_after_disable_have_no_effects() {
    let now = Instant::now();
    let sink = RecordingSink::new();
    let mut engine = AbrEngine::new(AbrOptions::default()).unwrap();
    engine.init(sink.clone());
    engine.attach_buffer_source(ScriptedBuffer::new(20.0));
    engine.set_variants(small_ladder(), now);
    engine.enable();
    engine.tick(now);
    assert_eq!(sink.len(), 1);

    engine.disable();
    engine.disable();
    assert_eq!(engine.status(), EngineStatus::Disabled);
    assert_eq!(engine.current_variant().map(|v| v.id), Some(VariantId(1)));

    engine.release();
    engine.release();
    engine.disable();
    assert_eq!(engine.status(), EngineStatus::Released);
    assert_eq!(sink.len(), 1);
}

#[rstest]
#[case(2)]
#[case(4)]
#[case(6)]
fn three_second_buffer_selects_lowest(#[case] current_index: usize) {
    let now = Instant::now();
    let buffer = ScriptedBuffer::new(20.0);
    let mut engine = AbrEngine::new(AbrOptions::default()).unwrap();
    engine.attach_buffer_source(buffer.clone());
    engine.enable();

    // start on the wanted rung, then offer the whole ladder
    let start = wide_ladder()[current_index].clone();
    engine.set_variants(vec![start.clone()], now);
    engine.tick(now);
    engine.set_variants(wide_ladder(), now);
    assert_eq!(engine.current_variant().map(|v| v.id), Some(start.id));

    buffer.set_level(3.0);
    engine.tick(now + Duration::from_secs(1));
    assert_eq!(engine.current_variant().map(|v| v.id), Some(VariantId(1)));
}

#[test]
fn three_errors_end_on_lowest_catalog_entry() {
    let now = Instant::now();
    let mut engine = AbrEngine::new(AbrOptions::default()).unwrap();
    engine.set_variants(wide_ladder(), now);
    engine.enable();
    for _ in 0..3 {
        engine.segment_downloaded(Duration::from_secs(1), bytes_at(50.0, 1.0), false, now);
    }
    engine.choose_variant(now);
    assert_ne!(engine.current_variant().map(|v| v.id), Some(VariantId(1)));

    for _ in 0..3 {
        engine.notify_switch_error(None, now);
    }
    assert_eq!(engine.current_variant().map(|v| v.id), Some(VariantId(1)));
}

#[test]
fn sole_failed_variant_is_still_returned() {
    let now = Instant::now();
    let mut engine = AbrEngine::new(AbrOptions::default()).unwrap();
    engine.set_variants(vec![Variant::new(1, 800_000, 480)], now);
    engine.notify_switch_error(Some(VariantId(1)), now);

    let picked = engine.choose_variant(now).unwrap();
    assert_eq!(picked.id, VariantId(1));
}
