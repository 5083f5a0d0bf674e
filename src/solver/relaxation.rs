use crate::solver::model::MipModel;

const INTEGRALITY_EPS: f64 = 1e-9;

/// Outcome of relaxing one node.
#[derive(Debug, Clone)]
pub enum Relaxation {
    /// The node's variable bounds already violate a row; prune it.
    Infeasible,
    Solved(RelaxedSolution),
}

/// Relaxed solution at a node: per-variable values, the dual bound they
/// attain, and the indices that came out fractional.
#[derive(Debug, Clone)]
pub struct RelaxedSolution {
    pub values: Vec<f64>,
    pub objective: f64,
    pub fractional: Vec<usize>,
}

impl RelaxedSolution {
    pub fn is_integral(&self) -> bool {
        self.fractional.is_empty()
    }

    /// Round an integral relaxed solution to an assignment.
    pub fn rounded(&self) -> Vec<u32> {
        self.values.iter().map(|v| v.round() as u32).collect()
    }
}

/// Aggregated-relaxation bound solver.
///
/// All rows are collapsed into a single surrogate row (coefficients and
/// capacities summed), then the surrogate is solved greedily by objective
/// density under the node's box bounds. The surrogate region contains every
/// point of the true feasible region, so the greedy optimum is a valid dual
/// bound; it is exact for single-row models.
#[derive(Debug, Clone)]
pub struct Relaxer {
    aggregate: Vec<f64>,
    capacity: f64,
    /// Variable indices ordered by decreasing objective density.
    order: Vec<usize>,
}

impl Relaxer {
    pub fn new(model: &MipModel) -> Self {
        let n = model.num_vars();
        let mut aggregate = vec![0.0; n];
        let mut capacity = 0.0;
        for row in &model.rows {
            capacity += row.rhs;
            for &(j, a) in &row.coeffs {
                aggregate[j] += a;
            }
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let da = density(model.objective[a], aggregate[a]);
            let db = density(model.objective[b], aggregate[b]);
            db.total_cmp(&da).then(a.cmp(&b))
        });

        Relaxer {
            aggregate,
            capacity,
            order,
        }
    }

    /// Relax one node under the given box bounds.
    pub fn solve(&self, model: &MipModel, lower: &[u32], upper: &[u32]) -> Relaxation {
        let n = model.num_vars();
        for j in 0..n {
            if lower[j] > upper[j] {
                return Relaxation::Infeasible;
            }
        }
        for row in &model.rows {
            let base: f64 = row
                .coeffs
                .iter()
                .map(|&(j, a)| a * f64::from(lower[j]))
                .sum();
            if base > row.rhs + 1e-9 {
                return Relaxation::Infeasible;
            }
        }

        let mut values: Vec<f64> = lower.iter().map(|&l| f64::from(l)).collect();
        let consumed: f64 = self
            .aggregate
            .iter()
            .zip(lower)
            .map(|(&a, &l)| a * f64::from(l))
            .sum();
        if consumed > self.capacity + 1e-9 {
            return Relaxation::Infeasible;
        }
        let mut remaining = (self.capacity - consumed).max(0.0);

        for &j in &self.order {
            let room = f64::from(upper[j]) - values[j];
            if room <= 0.0 || model.objective[j] <= 0.0 {
                continue;
            }
            if self.aggregate[j] <= 0.0 {
                // Costless in every row; take it whole.
                values[j] += room;
                continue;
            }
            let take = room.min(remaining / self.aggregate[j]);
            if take <= 0.0 {
                continue;
            }
            values[j] += take;
            remaining -= take * self.aggregate[j];
            if remaining <= 1e-12 {
                break;
            }
        }

        let objective: f64 = model
            .objective
            .iter()
            .zip(&values)
            .map(|(&c, &v)| c * v)
            .sum();
        let fractional: Vec<usize> = (0..n)
            .filter(|&j| {
                let frac = values[j] - values[j].floor();
                frac > INTEGRALITY_EPS && frac < 1.0 - INTEGRALITY_EPS
            })
            .collect();

        Relaxation::Solved(RelaxedSolution {
            values,
            objective,
            fractional,
        })
    }
}

fn density(objective: f64, weight: f64) -> f64 {
    if weight <= 0.0 {
        if objective > 0.0 {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        }
    } else {
        objective / weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::model::LinearRow;

    fn knapsack(values: &[f64], weights: &[f64], capacity: f64) -> MipModel {
        MipModel {
            name: "test".to_string(),
            objective: values.to_vec(),
            rows: vec![LinearRow {
                coeffs: weights.iter().copied().enumerate().collect(),
                rhs: capacity,
            }],
            upper: vec![10; values.len()],
        }
    }

    #[test]
    fn test_root_relaxation_is_greedy_by_density() {
        let model = knapsack(&[10.0, 7.0], &[4.0, 3.0], 9.0);
        let relaxer = Relaxer::new(&model);
        match relaxer.solve(&model, &[0, 0], &model.upper) {
            Relaxation::Solved(sol) => {
                // Density 2.5 beats 2.33: fill variable 0 to 9/4.
                assert!((sol.values[0] - 2.25).abs() < 1e-9);
                assert!((sol.objective - 22.5).abs() < 1e-9);
                assert_eq!(sol.fractional, vec![0]);
            }
            other => panic!("expected solved relaxation, got {:?}", other),
        }
    }

    #[test]
    fn test_lower_bounds_consume_capacity() {
        let model = knapsack(&[10.0, 7.0], &[4.0, 3.0], 9.0);
        let relaxer = Relaxer::new(&model);
        match relaxer.solve(&model, &[0, 2], &model.upper) {
            Relaxation::Solved(sol) => {
                // x1 pinned at its lower bound of 2; the 3 units left give
                // x0 = 0.75.
                assert!((sol.values[1] - 2.0).abs() < 1e-9);
                assert!((sol.values[0] - 0.75).abs() < 1e-9);
            }
            other => panic!("expected solved relaxation, got {:?}", other),
        }
    }

    #[test]
    fn test_infeasible_lower_bounds_detected() {
        let model = knapsack(&[10.0, 7.0], &[4.0, 3.0], 9.0);
        let relaxer = Relaxer::new(&model);
        assert!(matches!(
            relaxer.solve(&model, &[3, 0], &model.upper),
            Relaxation::Infeasible
        ));
    }

    #[test]
    fn test_crossed_bounds_detected() {
        let model = knapsack(&[10.0, 7.0], &[4.0, 3.0], 9.0);
        let relaxer = Relaxer::new(&model);
        assert!(matches!(
            relaxer.solve(&model, &[2, 0], &[1, 10]),
            Relaxation::Infeasible
        ));
    }

    #[test]
    fn test_integral_root_detected() {
        // Density fill lands exactly on an integer point.
        let model = knapsack(&[3.0, 1.0], &[5.0, 7.0], 15.0);
        let relaxer = Relaxer::new(&model);
        match relaxer.solve(&model, &[0, 0], &model.upper) {
            Relaxation::Solved(sol) => {
                assert!(sol.is_integral());
                assert_eq!(sol.rounded(), vec![3, 0]);
            }
            other => panic!("expected solved relaxation, got {:?}", other),
        }
    }
}
