//! Run the engine against a synthetic bandwidth trace and log its choices.
//!
//! ```
//! RUST_LOG=cadenza_abr=debug cargo run -p cadenza --example simulate
//! ```

use std::{error::Error, ops::Range, sync::Arc, time::Duration};

use cadenza::prelude::*;
use parking_lot::Mutex;
use tracing::{info, metadata::LevelFilter};
use tracing_subscriber::EnvFilter;
use web_time::Instant;

const SEGMENT_SECS: f64 = 4.0;

/// Simulated media buffer: playhead plus seconds buffered ahead.
#[derive(Clone, Default)]
struct SimBuffer(Arc<Mutex<f64>>);

impl BufferSource for SimBuffer {
    fn buffered_ranges(&self) -> Vec<Range<f64>> {
        vec![0.0..*self.0.lock()]
    }

    fn current_time(&self) -> f64 {
        0.0
    }
}

/// Throughput in Mbps for each step: good, congested, recovering.
fn trace() -> impl Iterator<Item = f64> {
    std::iter::repeat_n(12.0, 15)
        .chain(std::iter::repeat_n(0.8, 10))
        .chain(std::iter::repeat_n(6.0, 15))
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::default()
                .add_directive("cadenza_abr=info".parse()?)
                .add_directive(LevelFilter::INFO.into()),
        )
        .with_line_number(false)
        .with_file(false)
        .init();

    let buffer = SimBuffer::default();
    let mut engine = AbrEngine::new(AbrOptions::default())?;
    engine.attach_buffer_source(buffer.clone());
    engine.init(|instruction: &SwitchInstruction| {
        info!(
            variant = %instruction.variant.id,
            reason = ?instruction.reason,
            "host: switching"
        );
    });

    let start = Instant::now();
    engine.set_variants(
        vec![
            Variant::new(1, 400_000, 360),
            Variant::new(2, 1_200_000, 540),
            Variant::new(3, 2_500_000, 720),
            Variant::new(4, 5_000_000, 1080),
            Variant::new(5, 9_000_000, 1440),
        ],
        start,
    );
    engine.enable();

    let mut clock = 0.0_f64;
    let mut variant = engine
        .choose_variant(start)
        .ok_or("catalog has no video variants")?;

    for mbps in trace() {
        #[expect(clippy::cast_precision_loss)]
        let segment_bits = variant.bandwidth_bps as f64 * SEGMENT_SECS;
        let download_secs = segment_bits / (mbps * 1_000_000.0);
        clock += download_secs;

        {
            let mut level = buffer.0.lock();
            *level = (*level - download_secs).max(0.0) + SEGMENT_SECS;
        }

        let now = start + Duration::from_secs_f64(clock);
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bytes = (segment_bits / 8.0) as u64;
        engine.segment_downloaded(Duration::from_secs_f64(download_secs), bytes, true, now);
        engine.tick(now);

        if let Some(current) = engine.current_variant() {
            variant = current.clone();
        }
        info!(
            t = %format!("{clock:.1}s"),
            link_mbps = mbps,
            buffer = %format!("{:.1}s", *buffer.0.lock()),
            variant = %variant.id,
            class = %engine.network_state().speed_class,
            "step"
        );
    }

    engine.release();
    Ok(())
}
