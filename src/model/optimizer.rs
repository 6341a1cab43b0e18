//! Box-constrained limited-memory BFGS.
//!
//! A projected L-BFGS: the quasi-Newton direction is computed over the free
//! variables (those not pinned against a bound by their gradient), the step
//! is projected back onto the box, and a backtracking line search enforces
//! sufficient decrease along the projected path. Stopping rules mirror the
//! classic L-BFGS-B ones: projected-gradient infinity norm below `pgtol`, or
//! relative objective reduction below `ftol`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Armijo sufficient-decrease constant.
const C1: f64 = 1e-4;
const MAX_LINE_SEARCH_STEPS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Number of correction pairs kept for the inverse Hessian estimate
    pub memory: usize,
    pub max_iterations: usize,
    /// Projected gradient tolerance (infinity norm)
    pub pgtol: f64,
    /// Relative reduction tolerance: stop when
    /// `(f_k - f_{k+1}) / max(|f_k|, |f_{k+1}|, 1) <= ftol`
    pub ftol: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            memory: 10,
            max_iterations: 15_000,
            pgtol: 1e-5,
            ftol: 2.220_446_049_250_313e-9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// Projected gradient below `pgtol`
    ProjectedGradient,
    /// Relative objective reduction below `ftol`
    FunctionTolerance,
    MaxIterations,
    /// No step along the projected direction reduced the objective
    LineSearchFailed,
    /// The objective returned NaN or infinity at the starting point
    NonFinite,
}

impl Termination {
    pub fn converged(&self) -> bool {
        matches!(self, Termination::ProjectedGradient | Termination::FunctionTolerance)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Termination::ProjectedGradient => "projected gradient below tolerance",
            Termination::FunctionTolerance => "relative reduction below tolerance",
            Termination::MaxIterations => "iteration limit reached",
            Termination::LineSearchFailed => "line search could not reduce the objective",
            Termination::NonFinite => "objective is not finite at the starting point",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizeOutcome {
    /// Best iterate found
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

impl OptimizeOutcome {
    pub fn converged(&self) -> bool {
        self.termination.converged()
    }
}

struct Correction {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

/// Minimise `f` over the box `bounds` starting from `x0`.
///
/// `f` returns the objective value and writes its gradient into the second
/// argument. `x0` is projected onto the box first. Bounds are `(lower, upper)`
/// pairs, one per coordinate.
pub fn minimize<F>(mut f: F, x0: &[f64], bounds: &[(f64, f64)], config: &OptimizerConfig) -> OptimizeOutcome
where
    F: FnMut(&[f64], &mut [f64]) -> f64,
{
    debug_assert_eq!(x0.len(), bounds.len(), "one bound pair per coordinate");
    let n = x0.len();

    let mut x: Vec<f64> = x0.to_vec();
    project(&mut x, bounds);
    let mut g = vec![0.0; n];
    let mut fx = f(&x, &mut g);
    let mut evaluations = 1;

    let finish = |x: Vec<f64>, value, iterations, evaluations, termination| OptimizeOutcome {
        x,
        value,
        iterations,
        evaluations,
        termination,
    };

    if !fx.is_finite() {
        return finish(x, fx, 0, evaluations, Termination::NonFinite);
    }

    let mut history: VecDeque<Correction> = VecDeque::with_capacity(config.memory);
    let mut x_new = vec![0.0; n];
    let mut g_new = vec![0.0; n];

    for iter in 0..config.max_iterations {
        if projected_gradient_norm(&x, &g, bounds) <= config.pgtol {
            return finish(x, fx, iter, evaluations, Termination::ProjectedGradient);
        }

        let free: Vec<bool> = (0..n).map(|i| is_free(x[i], g[i], bounds[i])).collect();
        let mut d = search_direction(&g, &history, &free);
        if dot(&g, &d) >= 0.0 {
            history.clear();
            d = search_direction(&g, &history, &free);
        }

        // Without curvature information, start with a unit-length step.
        let mut alpha = if history.is_empty() {
            (1.0 / norm(&d)).min(1.0)
        } else {
            1.0
        };

        let mut accepted = None;
        for _ in 0..MAX_LINE_SEARCH_STEPS {
            for i in 0..n {
                x_new[i] = x[i] + alpha * d[i];
            }
            project(&mut x_new, bounds);
            let decrease: f64 = (0..n).map(|i| g[i] * (x_new[i] - x[i])).sum();
            if x_new == x {
                break;
            }
            let f_new = f(&x_new, &mut g_new);
            evaluations += 1;
            if f_new.is_finite() && f_new <= fx + C1 * decrease.min(0.0) {
                accepted = Some(f_new);
                break;
            }
            alpha *= 0.5;
        }

        let Some(f_new) = accepted else {
            if history.is_empty() {
                return finish(x, fx, iter, evaluations, Termination::LineSearchFailed);
            }
            // Stale curvature pairs can produce poor directions; retry as
            // projected steepest descent.
            history.clear();
            continue;
        };

        let s: Vec<f64> = (0..n).map(|i| x_new[i] - x[i]).collect();
        let y: Vec<f64> = (0..n).map(|i| g_new[i] - g[i]).collect();
        let sy = dot(&s, &y);
        if sy > f64::EPSILON * dot(&y, &y) {
            if history.len() == config.memory.max(1) {
                history.pop_front();
            }
            history.push_back(Correction { s, y, rho: 1.0 / sy });
        }

        let reduction = (fx - f_new) / fx.abs().max(f_new.abs()).max(1.0);
        std::mem::swap(&mut x, &mut x_new);
        std::mem::swap(&mut g, &mut g_new);
        fx = f_new;

        if iter % 100 == 0 {
            debug!("iteration {}: objective {:.6}, step {:.3e}", iter, fx, alpha);
        }

        if reduction <= config.ftol {
            return finish(x, fx, iter + 1, evaluations, Termination::FunctionTolerance);
        }
    }

    finish(x, fx, config.max_iterations, evaluations, Termination::MaxIterations)
}

fn project(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (xi, &(lower, upper)) in x.iter_mut().zip(bounds) {
        *xi = xi.clamp(lower, upper);
    }
}

/// `|| P(x - g) - x ||_inf`
fn projected_gradient_norm(x: &[f64], g: &[f64], bounds: &[(f64, f64)]) -> f64 {
    x.iter()
        .zip(g)
        .zip(bounds)
        .map(|((&xi, &gi), &(lower, upper))| ((xi - gi).clamp(lower, upper) - xi).abs())
        .fold(0.0, f64::max)
}

/// A coordinate is fixed when it sits on a bound and the gradient pushes it
/// further out.
fn is_free(x: f64, g: f64, (lower, upper): (f64, f64)) -> bool {
    !((x <= lower && g > 0.0) || (x >= upper && g < 0.0))
}

/// Two-loop recursion on the free coordinates, returning `-H g`.
fn search_direction(g: &[f64], history: &VecDeque<Correction>, free: &[bool]) -> Vec<f64> {
    let mut q: Vec<f64> = g
        .iter()
        .zip(free)
        .map(|(&gi, &f)| if f { gi } else { 0.0 })
        .collect();

    let mut alphas = Vec::with_capacity(history.len());
    for c in history.iter().rev() {
        let a = c.rho * dot(&c.s, &q);
        for (qi, yi) in q.iter_mut().zip(&c.y) {
            *qi -= a * yi;
        }
        alphas.push(a);
    }

    let gamma = history
        .back()
        .map(|c| dot(&c.s, &c.y) / dot(&c.y, &c.y))
        .unwrap_or(1.0);
    for qi in q.iter_mut() {
        *qi *= gamma;
    }

    for (c, a) in history.iter().zip(alphas.iter().rev()) {
        let b = c.rho * dot(&c.y, &q);
        for (qi, si) in q.iter_mut().zip(&c.s) {
            *qi += (a - b) * si;
        }
    }

    q.iter()
        .zip(free)
        .map(|(&qi, &f)| if f { -qi } else { 0.0 })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}
