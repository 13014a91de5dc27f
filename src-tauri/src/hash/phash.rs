// Perceptual hashing for images: a 64-bit DCT fingerprint over a grayscale
// 32x32 downsample, rendered as 16 hex characters. No perceptual-hash or
// image-decoding crate is in the dependency stack, so both the downsample
// (via the bundled ffmpeg helper, same as thumbnail/proxy generation) and
// the DCT itself are hand-rolled here.
//
// Invariant 6 of the data model: the first 4 hex characters of the result
// are used elsewhere as a Hamming-distance pre-filter bucket.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::constants::{PHASH_DOWNSAMPLE, PHASH_KEEP};
use crate::error::{CoreError, Result};

/// Decode an image to a raw grayscale `PHASH_DOWNSAMPLE x PHASH_DOWNSAMPLE`
/// buffer using the bundled ffmpeg helper. One byte per pixel, row-major.
fn decode_grayscale_square(path: &Path) -> Result<Vec<u8>> {
    let size = PHASH_DOWNSAMPLE;
    let scale_filter = format!("scale={}:{}:flags=bilinear,format=gray", size, size);

    let output = Command::new(crate::tools::ffmpeg_path())
        .args([
            "-y",
            "-i",
        ])
        .arg(path)
        .args([
            "-vframes",
            "1",
            "-vf",
            &scale_filter,
            "-f",
            "rawvideo",
            "-pix_fmt",
            "gray",
            "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| CoreError::Hash(format!("failed to launch ffmpeg for phash: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CoreError::Hash(format!(
            "ffmpeg phash decode failed: {}",
            stderr
        )));
    }

    let expected_len = (size * size) as usize;
    if output.stdout.len() < expected_len {
        return Err(CoreError::Hash(format!(
            "ffmpeg phash decode produced {} bytes, expected {}",
            output.stdout.len(),
            expected_len
        )));
    }

    Ok(output.stdout[..expected_len].to_vec())
}

/// 1-D DCT-II of a real-valued row/column, length `n`.
fn dct_1d(input: &[f64]) -> Vec<f64> {
    let n = input.len();
    let mut output = vec![0.0_f64; n];
    for (k, out_k) in output.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (i, &x) in input.iter().enumerate() {
            let angle = std::f64::consts::PI * (i as f64 + 0.5) * k as f64 / n as f64;
            sum += x * angle.cos();
        }
        *out_k = sum;
    }
    output
}

/// Separable 2-D DCT-II over an `n x n` grid: rows then columns.
fn dct_2d(grid: &[Vec<f64>], n: usize) -> Vec<Vec<f64>> {
    let mut rows_transformed: Vec<Vec<f64>> = Vec::with_capacity(n);
    for row in grid {
        rows_transformed.push(dct_1d(row));
    }

    let mut result = vec![vec![0.0_f64; n]; n];
    for col in 0..n {
        let column: Vec<f64> = rows_transformed.iter().map(|row| row[col]).collect();
        let transformed = dct_1d(&column);
        for row in 0..n {
            result[row][col] = transformed[row];
        }
    }
    result
}

/// Compute the 64-bit perceptual hash of an image, rendered as 16 hex chars.
pub fn compute_perceptual_hash(path: &Path) -> Result<String> {
    let n = PHASH_DOWNSAMPLE as usize;
    let pixels = decode_grayscale_square(path)?;

    let grid: Vec<Vec<f64>> = (0..n)
        .map(|row| {
            (0..n)
                .map(|col| pixels[row * n + col] as f64)
                .collect()
        })
        .collect();

    let spectrum = dct_2d(&grid, n);

    // Top-left PHASH_KEEP x PHASH_KEEP block, excluding the DC term at (0,0),
    // carries the low-frequency structure of the image.
    let keep = PHASH_KEEP;
    let mut coefficients = Vec::with_capacity(keep * keep - 1);
    for row in 0..keep {
        for col in 0..keep {
            if row == 0 && col == 0 {
                continue;
            }
            coefficients.push(spectrum[row][col]);
        }
    }

    let mut sorted = coefficients.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = sorted[sorted.len() / 2];

    let mut bits: u64 = 0;
    for (i, &c) in coefficients.iter().enumerate().take(64) {
        if c > median {
            bits |= 1 << i;
        }
    }

    Ok(format!("{:016x}", bits))
}

/// Hamming distance between two 16-hex-character perceptual hashes.
pub fn hamming_distance(a: &str, b: &str) -> Result<u32> {
    let a = u64::from_str_radix(a, 16)
        .map_err(|_| CoreError::Hash(format!("invalid perceptual hash: {}", a)))?;
    let b = u64::from_str_radix(b, 16)
        .map_err(|_| CoreError::Hash(format!("invalid perceptual hash: {}", b)))?;
    Ok((a ^ b).count_ones())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dct_1d_of_constant_row_has_zero_ac_energy() {
        let input = vec![10.0; 8];
        let out = dct_1d(&input);
        // DC term nonzero, every other coefficient ~0 for a flat signal.
        assert!(out[0].abs() > 0.0);
        for &v in &out[1..] {
            assert!(v.abs() < 1e-6);
        }
    }

    #[test]
    fn hamming_distance_identical_hashes_is_zero() {
        assert_eq!(hamming_distance("00ff00ff00ff00ff", "00ff00ff00ff00ff").unwrap(), 0);
    }

    #[test]
    fn hamming_distance_counts_differing_bits() {
        assert_eq!(hamming_distance("0000000000000000", "0000000000000001").unwrap(), 1);
        assert_eq!(hamming_distance("0000000000000000", "ffffffffffffffff").unwrap(), 64);
    }

    #[test]
    fn hamming_distance_rejects_malformed_hash() {
        assert!(hamming_distance("not-hex", "0000000000000000").is_err());
    }
}
