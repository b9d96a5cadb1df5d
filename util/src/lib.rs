//! Test helpers shared by the crates in the workspace.
use nalgebra::DVector;

/// Asserts that two matrices agree entrywise up to an absolute tolerance.
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;
        let max_absdiff = diff.abs().max();
        assert!(
            max_absdiff <= $tol,
            "max abs difference {:e} exceeds {:e}\nleft: {}\nright: {}",
            max_absdiff,
            $tol,
            $x,
            $y
        );
    }};
}

/// Asserts that evaluating the expression panics.
#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        let result = std::panic::catch_unwind(|| $e);
        assert!(result.is_err(), "assert_panics!({}) did not panic", stringify!($e));
    }};
}

/// Concatenates the components of a vector field into one vector.
///
/// Returns `None` for an empty field.
pub fn flatten_vertically(components: &[DVector<f64>]) -> Option<DVector<f64>> {
    if components.is_empty() {
        return None;
    }
    let values: Vec<f64> = components
        .iter()
        .flat_map(|component| component.iter().copied())
        .collect();
    Some(DVector::from_vec(values))
}
