//! Frame energy accumulation.

/// Full-scale value of a signed 16-bit sample.
const I16_SCALE: f64 = 32768.0;

/// Folds a sample stream into per-frame mean-square energies.
///
/// Chunks may split frames arbitrarily; frame boundaries are tracked
/// across calls to [`EnergyAccumulator::push`].
#[derive(Debug, Clone)]
pub struct EnergyAccumulator {
    frame_samples: usize,
    sum: f64,
    count: usize,
    energies: Vec<f64>,
}

impl EnergyAccumulator {
    pub fn new(frame_samples: usize) -> Self {
        Self {
            frame_samples: frame_samples.max(1),
            sum: 0.0,
            count: 0,
            energies: Vec::new(),
        }
    }

    /// Feed the next run of samples.
    pub fn push(&mut self, samples: &[i16]) {
        for &sample in samples {
            let s = sample as f64 / I16_SCALE;
            self.sum += s * s;
            self.count += 1;
            if self.count == self.frame_samples {
                self.energies.push(self.sum / self.frame_samples as f64);
                self.sum = 0.0;
                self.count = 0;
            }
        }
    }

    /// Completed frames so far.
    pub fn frames(&self) -> usize {
        self.energies.len()
    }

    /// Finish the stream. Never returns an empty vector: a stream without a
    /// single full frame yields `[0.0]`.
    pub fn finish(self) -> Vec<f64> {
        if self.energies.is_empty() {
            vec![0.0]
        } else {
            self.energies
        }
    }
}
