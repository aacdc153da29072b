use super::classifier::{HIDDEN_SIZE, INPUT_SIZE, OUTPUT_SIZE};
use super::ClassifierError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weights, biases and trained flag of the two-layer network.
///
/// `w1` is indexed `[input][hidden]` and `w2` is indexed `[hidden][output]`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelParameters {
    pub w1: Vec<Vec<f64>>,
    pub b1: Vec<f64>,
    pub w2: Vec<Vec<f64>>,
    pub b2: Vec<f64>,
    pub trained: bool,
}

impl ModelParameters {
    /// Glorot-uniform weights, zero biases, untrained.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            w1: glorot_matrix(rng, INPUT_SIZE, HIDDEN_SIZE),
            b1: vec![0.0; HIDDEN_SIZE],
            w2: glorot_matrix(rng, HIDDEN_SIZE, OUTPUT_SIZE),
            b2: vec![0.0; OUTPUT_SIZE],
            trained: false,
        }
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        check_matrix("w1", &self.w1, INPUT_SIZE, HIDDEN_SIZE)?;
        check_len("b1", self.b1.len(), HIDDEN_SIZE)?;
        check_matrix("w2", &self.w2, HIDDEN_SIZE, OUTPUT_SIZE)?;
        check_len("b2", self.b2.len(), OUTPUT_SIZE)?;
        Ok(())
    }

    pub fn to_blob(&self) -> Result<Vec<u8>, ClassifierError> {
        serde_json::to_vec(self).map_err(|e| ClassifierError::InvalidBlob(e.to_string()))
    }

    /// Parses and shape-checks a blob produced by [`ModelParameters::to_blob`].
    pub fn from_blob(bytes: &[u8]) -> Result<Self, ClassifierError> {
        let params: Self =
            serde_json::from_slice(bytes).map_err(|e| ClassifierError::InvalidBlob(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }
}

fn glorot_matrix<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize) -> Vec<Vec<f64>> {
    let limit = (6.0 / (rows + cols) as f64).sqrt();
    (0..rows)
        .map(|_| (0..cols).map(|_| rng.random_range(-limit..limit)).collect())
        .collect()
}

fn check_len(what: &str, actual: usize, expected: usize) -> Result<(), ClassifierError> {
    if actual != expected {
        return Err(ClassifierError::shape(what, expected, actual));
    }
    Ok(())
}

fn check_matrix(
    what: &str,
    m: &[Vec<f64>],
    rows: usize,
    cols: usize,
) -> Result<(), ClassifierError> {
    check_len(&format!("{what} rows"), m.len(), rows)?;
    for (i, row) in m.iter().enumerate() {
        check_len(&format!("{what} row {i}"), row.len(), cols)?;
    }
    Ok(())
}
