//! Property-based checks of the arena, transforms and mock edge sampling.

use proptest::prelude::*;

use kernel_adapter::{CurveDef, Kernel, MockKernel, ShapeArena, Transform};
use shape_types::ShapeKind;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_point() -> impl Strategy<Value = [f64; 3]> {
    prop::array::uniform3(-100.0f64..100.0)
}

fn arb_direction() -> impl Strategy<Value = [f64; 3]> {
    prop::array::uniform3(-1.0f64..1.0).prop_filter("non-degenerate direction", |v| {
        (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt() > 0.1
    })
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn views_are_unique_per_key(keys in prop::collection::vec(0u64..16, 1..200)) {
        let mut arena = ShapeArena::new();
        let owner = arena.insert("owner");
        let ids: Vec<_> = keys
            .iter()
            .map(|&k| arena.insert_view(owner, k, "view").unwrap())
            .collect();
        let mut distinct = keys.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(arena.len(), 1 + distinct.len());
        for (i, a) in keys.iter().enumerate() {
            for (j, b) in keys.iter().enumerate() {
                prop_assert_eq!(a == b, ids[i] == ids[j]);
            }
        }
        arena.release(owner).unwrap();
        prop_assert!(arena.is_empty());
    }

    #[test]
    fn repeated_explore_is_stable(
        size in prop::array::uniform3(0.1f64..20.0),
        rounds in 1usize..20,
    ) {
        let mut kernel = MockKernel::new();
        let b = kernel.make_box([0.0; 3], size).unwrap();
        let first = kernel.explore(b, ShapeKind::Face).unwrap();
        let stored = kernel.stored_shapes();
        for _ in 0..rounds {
            prop_assert_eq!(&kernel.explore(b, ShapeKind::Face).unwrap(), &first);
        }
        prop_assert_eq!(kernel.stored_shapes(), stored);
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn rotation_inverse_restores_points(
        axis in arb_direction(),
        angle in -6.0f64..6.0,
        center in arb_point(),
        p in arb_point(),
    ) {
        let t = Transform::rotation_about(axis, angle, center).unwrap();
        let back = t.inverse().unwrap();
        let q = back.transform_point(&t.transform_point(&p));
        prop_assert!(distance(p, q) < 1e-9 * (1.0 + distance(p, [0.0; 3])));
    }
}

// ---------------------------------------------------------------------------
// Edge sampling
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn circle_samples_stay_within_deflection(
        center in arb_point(),
        normal in arb_direction(),
        radius in 0.5f64..500.0,
        deflection in 0.001f64..10.0,
    ) {
        let mut kernel = MockKernel::new();
        let edge = kernel
            .make_edges(&CurveDef::Circle { center, normal, radius })
            .unwrap()[0];
        let points = kernel.discretize_edge(edge, deflection).unwrap();
        prop_assert!(points.len() >= 5);
        for p in &points {
            prop_assert!((distance(*p, center) - radius).abs() < 1e-9 * radius.max(1.0) * 100.0);
        }
        for w in points.windows(2) {
            let mid = [0, 1, 2].map(|i| 0.5 * (w[0][i] + w[1][i]));
            prop_assert!(radius - distance(mid, center) <= deflection + 1e-9 * radius);
        }
    }
}
