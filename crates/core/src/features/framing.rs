/// Number of full frames of `frame_len` samples at `hop` spacing. A trailing
/// partial frame is never counted.
pub fn frame_count(signal_len: usize, frame_len: usize, hop: usize) -> usize {
    if frame_len == 0 || hop == 0 || signal_len < frame_len {
        return 0;
    }
    (signal_len - frame_len) / hop + 1
}

pub fn frames(signal: &[f32], frame_len: usize, hop: usize) -> impl Iterator<Item = &[f32]> {
    let n = frame_count(signal.len(), frame_len, hop);
    (0..n).map(move |i| {
        let start = i * hop;
        &signal[start..start + frame_len]
    })
}

pub(crate) fn to_f64(samples: &[f32]) -> Vec<f64> {
    samples.iter().map(|&s| f64::from(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_at_16k_gives_98_frames() {
        assert_eq!(frame_count(16_000, 400, 160), 98);
    }

    #[test]
    fn short_signal_gives_no_frames() {
        assert_eq!(frame_count(399, 400, 160), 0);
        assert_eq!(frame_count(0, 400, 160), 0);
        assert_eq!(frames(&[0.0; 10], 400, 160).count(), 0);
    }

    #[test]
    fn frames_overlap_and_drop_tail() {
        let signal: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let got: Vec<Vec<f32>> = frames(&signal, 4, 3).map(<[f32]>::to_vec).collect();
        assert_eq!(
            got,
            vec![
                vec![0.0, 1.0, 2.0, 3.0],
                vec![3.0, 4.0, 5.0, 6.0],
                vec![6.0, 7.0, 8.0, 9.0],
            ]
        );
    }
}
