//! Smallest-three quaternion compression.
//!
//! A unit quaternion `[x, y, z, w]` is packed into 32 bits:
//!
//! ```text
//!  31  30 29                 20 19                 10 9                   0
//! +------+---------------------+---------------------+---------------------+
//! | i_lg | sign | magnitude(9) | sign | magnitude(9) | sign | magnitude(9) |
//! +------+---------------------+---------------------+---------------------+
//! ```
//!
//! `i_lg` is the index of the largest-magnitude component, which is dropped
//! and rebuilt from the unit-norm constraint. The other three components are
//! stored lowest index first in the most significant groups. Each stored
//! component is at most `1/sqrt(2)` in magnitude, quantized to 9 bits.
//! Signs are flipped when the dropped component is negative so that the
//! rebuilt component is always non-negative (`q` and `-q` are the same
//! rotation).

use std::f32::consts::FRAC_1_SQRT_2;

/// Largest 9-bit magnitude.
const MAG_MAX: u32 = (1 << 9) - 1;

/// Bits per stored component (sign + magnitude).
const COMPONENT_BITS: u32 = 10;

/// Worst-case per-component round-trip error.
pub const QUANTIZATION_BOUND: f32 = 0.0025;

/// Pack a unit quaternion `[x, y, z, w]` into 32 bits.
pub fn compress(q: [f32; 4]) -> u32 {
    let mut i_largest = 0;
    for i in 1..4 {
        if q[i].abs() > q[i_largest].abs() {
            i_largest = i;
        }
    }
    let negate = q[i_largest] < 0.0;

    let mut comp = i_largest as u32;
    for (i, value) in q.iter().enumerate() {
        if i == i_largest {
            continue;
        }
        let negbit = ((*value < 0.0) ^ negate) as u32;
        let mag = ((MAG_MAX as f32 * value.abs() / FRAC_1_SQRT_2 + 0.5) as u32).min(MAG_MAX);
        comp = (comp << COMPONENT_BITS) | (negbit << 9) | mag;
    }
    comp
}

/// Unpack a quaternion packed by [`compress`].
///
/// The rebuilt largest component is always non-negative.
pub fn decompress(comp: u32) -> [f32; 4] {
    let i_largest = (comp >> 30) as usize;
    let mut q = [0.0f32; 4];
    let mut bits = comp;
    let mut sum_squares = 0.0f32;

    for i in (0..4).rev() {
        if i == i_largest {
            continue;
        }
        let mag = bits & MAG_MAX;
        let negbit = (bits >> 9) & 0x1;
        bits >>= COMPONENT_BITS;

        let value = FRAC_1_SQRT_2 * mag as f32 / MAG_MAX as f32;
        q[i] = if negbit == 1 { -value } else { value };
        sum_squares += q[i] * q[i];
    }

    q[i_largest] = (1.0 - sum_squares).max(0.0).sqrt();
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn normalize(q: [f32; 4]) -> [f32; 4] {
        let norm = q.iter().map(|v| v * v).sum::<f32>().sqrt();
        q.map(|v| v / norm)
    }

    /// Flip `q` so its largest component is non-negative, matching what
    /// [`decompress`] produces.
    fn canonical(q: [f32; 4]) -> [f32; 4] {
        let largest = q
            .iter()
            .copied()
            .fold(0.0f32, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if largest < 0.0 { q.map(|v| -v) } else { q }
    }

    fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
        for i in 0..4 {
            assert!(
                (actual[i] - expected[i]).abs() <= QUANTIZATION_BOUND,
                "component {i}: {actual:?} vs {expected:?}"
            );
        }
        let norm = actual.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= QUANTIZATION_BOUND, "norm {norm}");
    }

    #[test]
    fn test_identity_selects_w() {
        let comp = compress([0.0, 0.0, 0.0, 1.0]);
        assert_eq!(comp >> 30, 3);
        assert_eq!(comp & 0x3FFF_FFFF, 0);
        assert_close(decompress(comp), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_x_axis_selects_x() {
        let comp = compress([1.0, 0.0, 0.0, 0.0]);
        assert_eq!(comp >> 30, 0);
        assert_close(decompress(comp), [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_negative_largest_is_flipped() {
        let q = normalize([0.1, -0.2, -0.9, 0.3]);
        let comp = compress(q);
        assert_eq!(comp >> 30, 2);

        let out = decompress(comp);
        assert!(out[2] > 0.0);
        assert_close(out, canonical(q));
    }

    #[test]
    fn test_component_order() {
        // x lands in the most significant group, w in the least.
        let comp = compress([0.6, 0.0, 0.8, 0.0]);
        assert_eq!(comp >> 30, 2);
        assert_eq!((comp >> 20) & MAG_MAX, 434);
        assert_eq!((comp >> 10) & 0x3FF, 0);
        assert_eq!(comp & 0x3FF, 0);
    }

    #[test]
    fn test_random_roundtrip_within_bound() {
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let q = normalize([
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ]);
            assert_close(decompress(compress(q)), canonical(q));
        }
    }

    #[test]
    fn test_equal_components() {
        let q = [0.5, -0.5, 0.5, -0.5];
        let out = decompress(compress(q));
        assert_close(out, canonical(q));
    }
}
