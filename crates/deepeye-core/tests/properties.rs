//! Property-based tests for deepeye-core.
//!
//! Ring buffer round-trips and range errors, filter mapping continuity and
//! monotonicity, and envelope follower bounds.

use proptest::prelude::*;
use deepeye_core::{
    EnvelopeFollower, FilterMode, RingBuffer, RingError, SidechainConfig, map_filter,
};

const CAPACITY: usize = 512;

fn sample_at(channel: usize, t: i64) -> f32 {
    ((t % 10_000) as f32 * 0.001) + channel as f32
}

/// Write `[0, total)` in blocks of `block` frames.
fn fill(ring: &RingBuffer, total: i64, block: usize) {
    let mut t = 0;
    while t < total {
        let end = (t + block as i64).min(total);
        let len = (end - t) as usize;
        let planes: Vec<Vec<f32>> = (0..ring.channels())
            .map(|ch| (0..len).map(|i| sample_at(ch, t + i as i64)).collect())
            .collect();
        ring.write(&planes, t, end).unwrap();
        t = end;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any window inside the retained range reads back exactly what was
    /// written for those times.
    #[test]
    fn ring_round_trip(
        total in 1i64..4000,
        block in 1usize..300,
        offset in 0usize..CAPACITY,
        len in 1usize..CAPACITY,
        channel in 0usize..2,
    ) {
        let ring = RingBuffer::new(2, CAPACITY);
        fill(&ring, total, block);

        let oldest = ring.oldest_time().unwrap();
        let retained = (total - oldest) as usize;
        let start = oldest + (offset % retained) as i64;
        let len = 1 + (len - 1) % (total - start) as usize;
        let end = start + len as i64;

        let mut out = vec![0.0; len];
        ring.read_channel(channel, start, end, &mut out).unwrap();
        for (i, &s) in out.iter().enumerate() {
            prop_assert_eq!(s, sample_at(channel, start + i as i64));
        }
    }

    /// Empty and reversed ranges are always InvalidRange.
    #[test]
    fn ring_reversed_ranges(start in -1000i64..5000, back in 0i64..100) {
        let ring = RingBuffer::new(1, CAPACITY);
        fill(&ring, 2000, 128);
        let mut out = vec![0.0; CAPACITY];
        prop_assert_eq!(
            ring.read_channel(0, start, start - back, &mut out),
            Err(RingError::InvalidRange)
        );
    }

    /// Anything starting before the retained window is NotAvailable.
    #[test]
    fn ring_evicted_ranges(total in 600i64..5000, behind in 1i64..400, len in 1i64..100) {
        let ring = RingBuffer::new(1, CAPACITY);
        fill(&ring, total, 64);
        let start = total - CAPACITY as i64 - behind;
        let mut out = vec![0.0; len as usize];
        prop_assert_eq!(
            ring.read_channel(0, start, start + len, &mut out),
            Err(RingError::NotAvailable)
        );
    }

    /// Within each half of the knob range the cutoff rises with the knob.
    #[test]
    fn filter_cutoff_monotonic(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (s_lo, s_hi) = (map_filter(lo, 0.0), map_filter(hi, 0.0));
        if s_lo.mode == s_hi.mode && s_lo.mode != FilterMode::Bypass {
            prop_assert!(s_lo.cutoff_hz <= s_hi.cutoff_hz);
        }
    }

    /// Small knob moves away from the deadband and centre produce small
    /// relative cutoff changes (no discontinuities).
    #[test]
    fn filter_cutoff_continuous(v in 0.0f32..0.999) {
        let step = 0.001;
        let (a, b) = (map_filter(v, 0.0), map_filter(v + step, 0.0));
        prop_assume!(a.mode == b.mode && a.mode != FilterMode::Bypass);
        let ratio = b.cutoff_hz / a.cutoff_hz;
        prop_assert!(ratio >= 1.0 && ratio < 1.02, "ratio {} at {}", ratio, v);
    }

    /// The follower never leaves the segment between 0 dB and the reduction.
    #[test]
    fn follower_stays_bounded(
        levels in prop::collection::vec(prop::option::of(-100.0f32..10.0), 1..200),
        attack in 0.0f32..2.0,
        release in 0.0f32..4.0,
    ) {
        let cfg = SidechainConfig {
            enabled: true,
            attack_seconds: attack,
            release_seconds: release,
            ..SidechainConfig::default()
        };
        let mut follower = EnvelopeFollower::new();
        for level in levels {
            let g = follower.tick(&cfg, level, 0.05);
            prop_assert!(g <= 0.0 && g >= cfg.reduction_db, "gain {}", g);
        }
    }
}
