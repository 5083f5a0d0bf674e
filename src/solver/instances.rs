use crate::error::SolverError;
use crate::solver::model::{LinearRow, MipModel};

/// A multiple-knapsack instance: `K` knapsacks, `N` item kinds, integer
/// copy counts. Variable `x[i * K + k]` is how many copies of item `i` go
/// into knapsack `k`; each item kind is limited to `per_item_limit` copies
/// across all knapsacks.
#[derive(Debug, Clone)]
pub struct KnapsackInstance {
    pub name: String,
    values: Vec<i64>,
    weights: Vec<i64>,
    capacities: Vec<i64>,
    per_item_limit: u32,
}

impl KnapsackInstance {
    pub fn new(
        name: &str,
        values: Vec<i64>,
        weights: Vec<i64>,
        capacities: Vec<i64>,
        per_item_limit: u32,
    ) -> Self {
        assert_eq!(values.len(), weights.len(), "values/weights length mismatch");
        KnapsackInstance {
            name: name.to_string(),
            values,
            weights,
            capacities,
            per_item_limit,
        }
    }

    /// Look up a built-in instance.
    pub fn by_name(name: &str) -> Result<Self, SolverError> {
        match name {
            "toy" => Ok(Self::toy()),
            "demo" => Ok(Self::demo()),
            "benchmark" => Ok(Self::benchmark()),
            other => Err(SolverError::UnknownInstance(other.to_string())),
        }
    }

    /// Two item kinds, one knapsack. Fractional at the root, solved within a
    /// handful of nodes; intended for tests and quick smoke runs.
    pub fn toy() -> Self {
        Self::new("toy", vec![10, 7], vec![4, 3], vec![9], 10)
    }

    /// Eight item kinds, one knapsack of capacity 15.
    pub fn demo() -> Self {
        Self::new(
            "demo",
            vec![10, 5, 18, 12, 15, 1, 2, 8],
            vec![4, 2, 5, 4, 5, 1, 3, 5],
            vec![15],
            10,
        )
    }

    /// 101 item kinds across five knapsacks of capacity 100 each.
    pub fn benchmark() -> Self {
        let values = vec![
            100, 94, 506, 416, 992, 649, 237, 457, 815, 446, 422, 791, 359, 667, 598, 7, 544, 334,
            766, 994, 893, 633, 131, 428, 700, 617, 874, 720, 419, 794, 196, 997, 116, 908, 539,
            707, 569, 537, 931, 726, 487, 772, 513, 81, 943, 58, 303, 764, 536, 724, 789, 479, 142,
            339, 641, 196, 494, 66, 824, 208, 711, 800, 314, 289, 401, 466, 689, 833, 225, 244,
            849, 113, 379, 361, 65, 486, 686, 286, 889, 24, 491, 891, 90, 181, 214, 17, 472, 418,
            419, 356, 682, 306, 201, 385, 952, 500, 194, 737, 324, 992, 224,
        ];
        let weights = vec![
            995, 485, 326, 248, 421, 322, 795, 43, 845, 955, 252, 9, 901, 122, 94, 738, 574, 715,
            882, 367, 984, 299, 433, 682, 72, 874, 138, 856, 145, 995, 529, 199, 277, 97, 719, 242,
            107, 122, 70, 98, 600, 645, 267, 972, 895, 213, 748, 487, 923, 29, 674, 540, 554, 467,
            46, 710, 553, 191, 724, 730, 988, 90, 340, 549, 196, 865, 678, 570, 936, 722, 651, 123,
            431, 508, 585, 853, 642, 992, 725, 286, 812, 859, 663, 88, 179, 187, 619, 261, 846,
            192, 261, 514, 886, 530, 849, 294, 799, 391, 330, 298, 790,
        ];
        Self::new("benchmark", values, weights, vec![100; 5], 10)
    }

    pub fn num_items(&self) -> usize {
        self.values.len()
    }

    pub fn num_knapsacks(&self) -> usize {
        self.capacities.len()
    }

    /// Expand the instance into a bounded-integer model.
    pub fn build_model(&self) -> MipModel {
        let n = self.num_items();
        let k = self.num_knapsacks();
        let num_vars = n * k;

        let mut objective = vec![0.0; num_vars];
        for i in 0..n {
            for j in 0..k {
                objective[i * k + j] = self.values[i] as f64;
            }
        }

        let mut rows = Vec::with_capacity(k + n);
        for j in 0..k {
            rows.push(LinearRow {
                coeffs: (0..n).map(|i| (i * k + j, self.weights[i] as f64)).collect(),
                rhs: self.capacities[j] as f64,
            });
        }
        // With one knapsack the per-item limit is already the variable
        // upper bound; the extra rows would only loosen the surrogate.
        if k > 1 {
            for i in 0..n {
                rows.push(LinearRow {
                    coeffs: (0..k).map(|j| (i * k + j, 1.0)).collect(),
                    rhs: f64::from(self.per_item_limit),
                });
            }
        }

        MipModel {
            name: self.name.clone(),
            objective,
            rows,
            upper: vec![self.per_item_limit; num_vars],
        }
    }
}
