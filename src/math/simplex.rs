//! Derivative-free minimisation (Nelder–Mead).
//!
//! Used by the static Nelson–Siegel fit, where the objective (sum of squared
//! yield residuals) is cheap and smooth but non-linear in the decay `λ`.
//! Standard coefficients: reflection 1, expansion 2, contraction 1/2, shrink 1/2.
//!
//! Termination requires both the spread of function values across the simplex
//! and the largest vertex distance from the best vertex to fall below their
//! tolerances. Running out of iterations is an error, not a silent result.

use crate::error::CurveError;

#[derive(Debug, Clone, Copy)]
pub struct SimplexOptions {
    pub max_iter: usize,
    /// Tolerance on `max f - min f` across the simplex.
    pub f_tol: f64,
    /// Tolerance on the largest coordinate distance to the best vertex.
    pub x_tol: f64,
    /// Relative size of the initial simplex around the start point.
    pub initial_step: f64,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            max_iter: 5_000,
            f_tol: 1e-16,
            x_tol: 1e-9,
            initial_step: 0.05,
        }
    }
}

/// Result of a converged minimisation.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

/// Minimise `f` starting from `x0`.
///
/// Non-finite objective values are treated as `+∞` so the simplex steps away
/// from them.
pub fn minimize<F>(f: F, x0: &[f64], opts: &SimplexOptions, model: &'static str) -> Result<Minimum, CurveError>
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    if n == 0 {
        return Err(CurveError::input_shape("empty start point for simplex"));
    }
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for i in 0..n {
        let mut v = x0.to_vec();
        let step = if v[i].abs() > 1e-8 {
            opts.initial_step * v[i].abs()
        } else {
            opts.initial_step * 0.01
        };
        v[i] += step;
        simplex.push(v);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut last_spread = f64::INFINITY;
    for iter in 0..opts.max_iter {
        // Order vertices best -> worst; ties keep insertion order.
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let f_spread = values[n] - values[0];
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(simplex[0].iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        last_spread = f_spread;
        if f_spread <= opts.f_tol && x_spread <= opts.x_tol {
            return Ok(Minimum {
                x: simplex[0].clone(),
                value: values[0],
                iterations: iter,
            });
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let along = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(simplex[n].iter())
                .map(|(c, w)| c + coef * (w - c))
                .collect()
        };

        let reflected = along(-1.0);
        let f_r = eval(&reflected);

        if f_r < values[0] {
            let expanded = along(-2.0);
            let f_e = eval(&expanded);
            if f_e < f_r {
                simplex[n] = expanded;
                values[n] = f_e;
            } else {
                simplex[n] = reflected;
                values[n] = f_r;
            }
        } else if f_r < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_r;
        } else {
            let (contracted, f_c) = if f_r < values[n] {
                let c = along(-0.5);
                let fc = eval(&c);
                (c, fc)
            } else {
                let c = along(0.5);
                let fc = eval(&c);
                (c, fc)
            };
            if f_c < values[n].min(f_r) {
                simplex[n] = contracted;
                values[n] = f_c;
            } else {
                for i in 1..=n {
                    let shrunk: Vec<f64> = simplex[i]
                        .iter()
                        .zip(simplex[0].iter())
                        .map(|(x, b)| b + 0.5 * (x - b))
                        .collect();
                    values[i] = eval(&shrunk);
                    simplex[i] = shrunk;
                }
            }
        }
    }

    Err(CurveError::NonConvergence {
        model,
        iterations: opts.max_iter,
        tolerance: opts.f_tol,
        last_change: last_spread,
    })
}
