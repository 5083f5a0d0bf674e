/// One `≤` constraint row with sparse nonnegative coefficients.
#[derive(Debug, Clone)]
pub struct LinearRow {
    pub coeffs: Vec<(usize, f64)>,
    pub rhs: f64,
}

/// A bounded-integer maximization model:
/// maximize `objective · x` subject to every row and `0 ≤ x_j ≤ upper_j`,
/// `x` integer. Objective coefficients are assumed integral, which is what
/// justifies the `incumbent + 1` cutoff used by the engine.
#[derive(Debug, Clone)]
pub struct MipModel {
    pub name: String,
    pub objective: Vec<f64>,
    pub rows: Vec<LinearRow>,
    pub upper: Vec<u32>,
}

impl MipModel {
    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    /// Check an integral assignment against every row and variable bound.
    pub fn is_feasible(&self, x: &[u32]) -> bool {
        if x.len() != self.num_vars() {
            return false;
        }
        if x.iter().zip(&self.upper).any(|(&v, &u)| v > u) {
            return false;
        }
        self.rows.iter().all(|row| {
            let used: f64 = row
                .coeffs
                .iter()
                .map(|&(j, a)| a * f64::from(x[j]))
                .sum();
            used <= row.rhs + 1e-9
        })
    }

    pub fn objective_value(&self, x: &[u32]) -> f64 {
        self.objective
            .iter()
            .zip(x)
            .map(|(&c, &v)| c * f64::from(v))
            .sum()
    }
}
