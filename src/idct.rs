//! Fixed-point 8x8 inverse DCT.
//!
//! Separable even/odd butterfly transform with 14-bit cosine constants and
//! 64-bit accumulators, so a full-range 10-bit block cannot saturate before
//! the output clamp. The row pass keeps four guard bits; rounding happens
//! once per pass.

// cos(n * pi / 16) scaled by 2^14
const C1: i64 = 16069;
const C2: i64 = 15137;
const C3: i64 = 13623;
const C4: i64 = 11585;
const C5: i64 = 9102;
const C6: i64 = 6270;
const C7: i64 = 3196;

const ROW_SHIFT: u32 = 11;
const COL_SHIFT: u32 = 19;

/// One-dimensional 8-point inverse transform, output scaled by 2^15
/// relative to its input.
#[inline]
fn transform(s: [i64; 8]) -> [i64; 8] {
    let t0 = (s[0] + s[4]) * C4;
    let t1 = (s[0] - s[4]) * C4;
    let t2 = s[2] * C6 - s[6] * C2;
    let t3 = s[2] * C2 + s[6] * C6;

    let e0 = t0 + t3;
    let e1 = t1 + t2;
    let e2 = t1 - t2;
    let e3 = t0 - t3;

    let o0 = s[1] * C1 + s[3] * C3 + s[5] * C5 + s[7] * C7;
    let o1 = s[1] * C3 - s[3] * C7 - s[5] * C1 - s[7] * C5;
    let o2 = s[1] * C5 - s[3] * C1 + s[5] * C7 + s[7] * C3;
    let o3 = s[1] * C7 - s[3] * C5 + s[5] * C3 - s[7] * C1;

    [
        e0 + o0,
        e1 + o1,
        e2 + o2,
        e3 + o3,
        e3 - o3,
        e2 - o2,
        e1 - o1,
        e0 - o0,
    ]
}

/// In-place 8x8 inverse DCT over dequantized coefficients.
pub(crate) fn idct_8x8(block: &mut [i32; 64]) {
    let mut rows = [0i64; 64];
    for row in 0..8 {
        let mut s = [0i64; 8];
        for (i, v) in s.iter_mut().enumerate() {
            *v = i64::from(block[row * 8 + i]);
        }
        let out = transform(s);
        for (i, v) in out.iter().enumerate() {
            rows[row * 8 + i] = (v + (1 << (ROW_SHIFT - 1))) >> ROW_SHIFT;
        }
    }

    for col in 0..8 {
        let mut s = [0i64; 8];
        for (i, v) in s.iter_mut().enumerate() {
            *v = rows[i * 8 + col];
        }
        let out = transform(s);
        for (i, v) in out.iter().enumerate() {
            block[i * 8 + col] = ((v + (1 << (COL_SHIFT - 1))) >> COL_SHIFT) as i32;
        }
    }
}
