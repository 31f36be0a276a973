//! Test support for the urban-scenarios workspace.
//!
//! - [`fixtures`]: the San Antonio parcel, the synthetic Albers grids around
//!   it and the class values the scenario tests expect.
//! - [`generators`]: WKT polygons and class grids.
//! - [`paths`]: optional on-disk reference rasters and scratch directories.
//!
//! The assertion macros are exported at the crate root:
//!
//! ```ignore
//! use test_utils::{assert_fractions_eq, require_test_file};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Resolve a raster from [`test_data_dirs`], or end the test early.
///
/// Large rasters such as the NLCD reference are not checked in. A test that
/// needs one prints `SKIPPED` and returns when it is missing.
///
/// ```ignore
/// #[test]
/// fn test_nlcd_reference() {
///     let path = require_test_file!("NLCD_2016.tif");
///     let grid = GridReference::load(&[path]).unwrap();
/// }
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        let name: &str = $name;
        let Some(path) = $crate::find_test_file(name) else {
            eprintln!(
                "SKIPPED: {} not found (searched {:?}; set {})",
                name,
                $crate::test_data_dirs(),
                $crate::TEST_DATA_ENV
            );
            return;
        };
        path
    }};
}

/// `|actual - expected| <= epsilon`, compared as `f64`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $epsilon:expr) => {{
        let (actual, expected, epsilon) = ($actual as f64, $expected as f64, $epsilon as f64);
        assert!(
            (actual - expected).abs() <= epsilon,
            "{} = {} is not within {} of {}",
            stringify!($actual),
            actual,
            epsilon,
            expected
        );
    }};
}

/// [`assert_approx_eq!`] on both members of an `(x, y)` tuple.
#[macro_export]
macro_rules! assert_coords_approx_eq {
    ($actual:expr, $expected:expr, $epsilon:expr) => {{
        let (ax, ay) = $actual;
        let (ex, ey) = $expected;
        $crate::assert_approx_eq!(ax, ex, $epsilon);
        $crate::assert_approx_eq!(ay, ey, $epsilon);
    }};
}

/// Compare a class → fraction map against `[(class, fraction), ...]`.
///
/// The map must hold exactly the listed classes, each within `epsilon`.
///
/// ```ignore
/// assert_fractions_eq!(histogram.fractions(), [(262, 0.9756), (321, 0.0244)], 1e-4);
/// ```
#[macro_export]
macro_rules! assert_fractions_eq {
    ($actual:expr, [$(($class:expr, $fraction:expr)),+ $(,)?], $epsilon:expr) => {{
        let actual = &$actual;
        let expected: Vec<(u16, f64)> = vec![$(($class as u16, $fraction as f64)),+];
        assert_eq!(
            actual.len(),
            expected.len(),
            "class sets differ: got {:?}, expected {:?}",
            actual,
            expected
        );
        for (class, fraction) in expected {
            match actual.get(&class) {
                Some(value) => $crate::assert_approx_eq!(*value, fraction, $epsilon),
                None => panic!("class {} missing from {:?}", class, actual),
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    #[test]
    fn test_assert_approx_eq_within_epsilon() {
        assert_approx_eq!(30.0004, 30.0, 1e-3);
        assert_approx_eq!(-242_876.46_f32, -242_876.46, 0.1);
    }

    #[test]
    #[should_panic(expected = "is not within")]
    fn test_assert_approx_eq_outside_epsilon() {
        assert_approx_eq!(30.1, 30.0, 1e-3);
    }

    #[test]
    fn test_assert_coords_approx_eq_takes_tuples() {
        let origin = (-245_900.0, 711_650.0);
        assert_coords_approx_eq!(origin, (-245_900.0004, 711_649.9996), 1e-3);
    }

    #[test]
    fn test_assert_fractions_eq_passes() {
        let map = BTreeMap::from([(262u16, 0.9756), (321u16, 0.0244)]);
        assert_fractions_eq!(map, [(262, 0.9756), (321, 0.0244)], 1e-6);
    }

    #[test]
    #[should_panic(expected = "class sets differ")]
    fn test_assert_fractions_eq_rejects_extra_class() {
        let map = BTreeMap::from([(262u16, 0.5), (11u16, 0.5)]);
        assert_fractions_eq!(map, [(262, 0.5)], 1e-6);
    }
}
