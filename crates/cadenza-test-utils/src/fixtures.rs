//! Variant ladders used across the workspace tests.

use cadenza_abr::Variant;
use rstest::fixture;

/// Three-rung ladder: 500 kbps/360p, 1.5 Mbps/720p, 4 Mbps/1080p.
#[fixture]
pub fn small_ladder() -> Vec<Variant> {
    vec![
        Variant::new(1, 500_000, 360),
        Variant::new(2, 1_500_000, 720),
        Variant::new(3, 4_000_000, 1080),
    ]
}

/// Seven rungs from 300 kbps/240p up to 14 Mbps/2160p.
#[fixture]
pub fn wide_ladder() -> Vec<Variant> {
    vec![
        Variant::new(1, 300_000, 240),
        Variant::new(2, 700_000, 360),
        Variant::new(3, 1_200_000, 480),
        Variant::new(4, 2_500_000, 720),
        Variant::new(5, 5_000_000, 1080),
        Variant::new(6, 8_000_000, 1440),
        Variant::new(7, 14_000_000, 2160),
    ]
}

/// Bytes a segment of `elapsed_secs` carries at `mbps`.
pub fn bytes_at(mbps: f64, elapsed_secs: f64) -> u64 {
    (mbps * 1_000_000.0 / 8.0 * elapsed_secs).round() as u64
}
