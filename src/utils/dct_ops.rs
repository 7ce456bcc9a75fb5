use rustdct::{Dct2, DctPlanner};
use transpose::transpose_inplace;

/// Perform an (unnormalized) 2D DCT-II in place on a square, row-major matrix.
pub fn dct_2d(matrix: &mut [f64], dimension: usize) {
    assert_eq!(
        matrix.len(),
        dimension * dimension,
        "matrix length {} is not {dimension}x{dimension}",
        matrix.len()
    );

    //setup the DCT.....
    let mut planner = DctPlanner::new();
    let dct = planner.plan_dct2(dimension);

    //perform round 1 of the DCT (on rows):
    matrix.chunks_exact_mut(dimension).for_each(|row| {
        dct.process_dct2(row);
    });

    //now tranpose...
    let mut scratch = vec![0f64; dimension];
    transpose_inplace(matrix, &mut scratch, dimension, dimension);

    //perform round 2 of the DCT (on cols):
    matrix.chunks_exact_mut(dimension).for_each(|col| {
        dct.process_dct2(col);
    });

    //and restore orientation.
    transpose_inplace(matrix, &mut scratch, dimension, dimension);
}

/// Perform an (unnormalized) 1D DCT-II in place.
pub fn dct_1d(values: &mut [f64]) {
    if values.is_empty() {
        return;
    }
    let mut planner = DctPlanner::new();
    let dct = planner.plan_dct2(values.len());
    dct.process_dct2(values);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dc_component_of_constant_matrix() {
        let dimension = 8;
        let mut m = vec![1.0f64; dimension * dimension];
        dct_2d(&mut m, dimension);

        // all energy of a flat matrix lands in the DC bin.
        assert!(m[0] > 0.0);
        for val in &m[1..] {
            assert!(val.abs() < 1e-9, "{val}");
        }
    }

    #[test]
    fn test_dct_1d_matches_direct_sum() {
        let mut vals = vec![3.0, -1.0, 4.0, 1.0, -5.0, 9.0];
        let orig = vals.clone();
        dct_1d(&mut vals);

        let n = orig.len() as f64;
        for (k, got) in vals.iter().enumerate() {
            let expected = orig
                .iter()
                .enumerate()
                .map(|(i, x)| x * (std::f64::consts::PI * (2.0 * i as f64 + 1.0) * k as f64 / (2.0 * n)).cos())
                .sum::<f64>();
            assert!((got - expected).abs() < 1e-9, "k={k}: {got} vs {expected}");
        }
    }
}
