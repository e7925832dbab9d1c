//! Binarisation of probability maps.

use ndarray::{Array2, ArrayView2};

const ISODATA_BINS: usize = 256;

/// Isodata threshold of the map, computed on a 256-bin histogram.
///
/// Returns the smallest bin centre `t` for which `t` lies within one bin
/// width below the mean of the class means on either side of it.
pub fn isodata_threshold(image: &ArrayView2<f32>) -> f32 {
    let (min, max) = image
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        return 0.0;
    }
    if min == max {
        return min;
    }

    let (min, max) = (f64::from(min), f64::from(max));
    let bin_width = (max - min) / ISODATA_BINS as f64;
    let mut histogram = [0u64; ISODATA_BINS];
    for &v in image.iter().filter(|v| v.is_finite()) {
        let bin = ((f64::from(v) - min) / bin_width) as usize;
        histogram[bin.min(ISODATA_BINS - 1)] += 1;
    }
    let centre = |i: usize| min + bin_width * (i as f64 + 0.5);

    let total_count: u64 = histogram.iter().sum();
    let total_intensity: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &n)| n as f64 * centre(i))
        .sum();

    let mut low_count = 0u64;
    let mut low_intensity = 0.0;
    for (i, &n) in histogram.iter().enumerate().take(ISODATA_BINS - 1) {
        low_count += n;
        low_intensity += n as f64 * centre(i);
        let high_count = total_count - low_count;
        if low_count == 0 || high_count == 0 {
            continue;
        }
        let low_mean = low_intensity / low_count as f64;
        let high_mean = (total_intensity - low_intensity) / high_count as f64;
        let distance = (low_mean + high_mean) / 2.0 - centre(i);
        if (0.0..bin_width).contains(&distance) {
            return centre(i) as f32;
        }
    }

    ((min + max) / 2.0) as f32
}

/// Foreground wherever the map is strictly above the cutoff.
///
/// With `cutoff == None` the isodata threshold of the map is used.
pub fn threshold(probability: ArrayView2<f32>, cutoff: Option<f32>) -> Array2<bool> {
    let cutoff = cutoff.unwrap_or_else(|| isodata_threshold(&probability));
    probability.mapv(|v| v > cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    #[test]
    fn test_isodata_separates_two_modes() {
        let mut image = Array2::<f32>::from_elem((10, 10), 0.1);
        for r in 0..5 {
            for c in 0..10 {
                image[[r, c]] = 0.9;
            }
        }
        let t = isodata_threshold(&image.view());
        assert!(t > 0.1 && t < 0.9, "threshold {t}");
        let mask = threshold(image.view(), None);
        assert_eq!(mask.iter().filter(|&&v| v).count(), 50);
    }

    #[test]
    fn test_fixed_cutoff_is_strict() {
        let image = array![[0.5f32, 0.6], [0.4, 0.5]];
        let mask = threshold(image.view(), Some(0.5));
        assert_eq!(mask, array![[false, true], [false, false]]);
    }

    #[test]
    fn test_constant_image() {
        let image = Array2::<f32>::from_elem((4, 4), 0.3);
        assert_eq!(isodata_threshold(&image.view()), 0.3);
        assert!(!threshold(image.view(), None).iter().any(|&v| v));
    }
}
