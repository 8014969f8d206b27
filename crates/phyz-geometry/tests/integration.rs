//! Integration tests for phyz-geometry.
//!
//! Validates curvature identities on the standard metrics and end-to-end
//! geodesic integration.

use approx::assert_relative_eq;
use phyz_expr::{Expr, ExprMatrix, NativeBackend, Substitution, Symbol};
use phyz_geometry::{
    DVec, GeodesicIntegrator, GeometryError, IntegrationMethod, IntegratorConfig, RiemannGeometry,
    SurfaceGeometry, metrics,
};

fn geometry(metric: metrics::StandardMetric) -> RiemannGeometry {
    let backend = NativeBackend::default();
    RiemannGeometry::new(&backend, metric.metric, metric.coordinates).unwrap()
}

fn equiv(a: &Expr, b: &Expr) -> bool {
    (a - b).is_identically_zero().unwrap()
}

fn syms(names: &[&str]) -> Vec<Symbol> {
    names.iter().map(|n| Symbol::new(n)).collect()
}

#[test]
fn test_sphere_gaussian_curvature() {
    let sphere = geometry(metrics::sphere(Expr::symbol("a")));
    let expected: Expr = "1/a^2".parse().unwrap();
    assert!(equiv(sphere.gaussian().unwrap(), &expected));
}

#[test]
fn test_gaussian_is_half_ricci_scalar() {
    for metric in [
        metrics::sphere(Expr::symbol("a")),
        metrics::saddle(),
        metrics::klein_disk(Expr::symbol("a")),
    ] {
        let name = metric.name;
        let geo = geometry(metric);
        let half_r = geo.ricci_scalar() * Expr::rational(1, 2);
        assert!(equiv(geo.gaussian().unwrap(), &half_r), "{name}");
    }
}

#[test]
fn test_gaussian_matches_ricci_on_radical_metric() {
    // ds^2 = dx^2 + f(x)^2 dy^2 with f = 1 + sqrt(x), so K = -f''/f.
    let backend = NativeBackend::default();
    let x = Expr::symbol("x");
    let f = Expr::one() + x.sqrt();
    let metric = ExprMatrix::diag([Expr::one(), f.powi(2)]);
    let geo = RiemannGeometry::new(&backend, metric, syms(&["x", "y"])).unwrap();

    let k = geo.gaussian().unwrap();
    let half_r = geo.ricci_scalar() * Expr::rational(1, 2);
    assert!(equiv(k, &half_r));

    let expected = x.pow(Expr::rational(-3, 2)) / (Expr::int(4) * f);
    assert!(equiv(k, &expected));
    let inputs = syms(&["x", "y"]);
    let value = k.eval(&inputs, &[0.7, 0.0]).unwrap();
    assert_relative_eq!(value, 0.7f64.powf(-1.5) / (4.0 * (1.0 + 0.7f64.sqrt())), max_relative = 1e-12);
}

#[test]
fn test_klein_disk_constant_negative_curvature() {
    let klein = geometry(metrics::klein_disk(Expr::symbol("a")));
    let inputs = syms(&["x1", "x2", "a"]);
    let k = klein.gaussian().unwrap();
    for point in [[0.0, 0.0, 1.0], [0.3, -0.2, 1.0], [0.5, 0.4, 2.0]] {
        let value = k.eval(&inputs, &point).unwrap();
        assert_relative_eq!(value, -1.0 / (point[2] * point[2]), epsilon = 1e-10);
    }
}

#[test]
fn test_flat_metric_has_vanishing_tensors() {
    let backend = NativeBackend::default();
    let metric = ExprMatrix::diag([Expr::int(2), Expr::int(3), Expr::rational(1, 2)]);
    let flat = RiemannGeometry::new(&backend, metric, syms(&["x", "y", "z"])).unwrap();
    assert!(flat.christoffel().is_zero());
    assert!(flat.riemann().is_zero());
    assert!(flat.ricci().is_zero());
    assert!(flat.ricci_scalar().is_zero());
    assert!(flat.einstein().is_zero());
}

#[test]
fn test_rindler_is_flat() {
    let rindler = geometry(metrics::rindler(Expr::symbol("a")));
    assert!(rindler.curvature().is_flat());
    assert!(rindler.gaussian().unwrap().is_zero());
}

#[test]
fn test_schwarzschild_is_ricci_flat() {
    let bh = geometry(metrics::schwarzschild(Expr::symbol("rs")));
    let inputs = syms(&["t", "r", "theta", "phi", "rs"]);
    let point = [0.0, 3.0, 0.7, 0.2, 1.0];
    for (_, entry) in bh.ricci().iter() {
        assert_relative_eq!(entry.eval(&inputs, &point).unwrap(), 0.0, epsilon = 1e-10);
    }
    // Vacuum, but not flat.
    assert!(!bh.riemann().is_zero());
}

#[test]
fn test_tensor_symmetries() {
    let geo = geometry(metrics::saddle());
    let n = geo.dim();
    for rho in 0..n {
        for lambda in 0..n {
            for nu in 0..n {
                assert_eq!(
                    geo.christoffel().get(rho, lambda, nu),
                    geo.christoffel().get(rho, nu, lambda)
                );
                for mu in 0..n {
                    let r = &geo.riemann()[[rho, lambda, mu, nu]];
                    let swapped = &geo.riemann()[[rho, lambda, nu, mu]];
                    assert!((r + swapped).is_identically_zero().unwrap());
                }
            }
        }
    }
    for mu in 0..n {
        for nu in 0..n {
            assert!(equiv(&geo.ricci()[[mu, nu]], &geo.ricci()[[nu, mu]]));
        }
    }
}

#[test]
fn test_surface_requires_two_dimensions() {
    let backend = NativeBackend::default();
    let bh = metrics::schwarzschild(Expr::symbol("rs"));
    let err = SurfaceGeometry::new(&backend, bh.metric, bh.coordinates).unwrap_err();
    assert!(matches!(err, GeometryError::Dimensionality { expected: 2, actual: 4, .. }));
}

#[test]
fn test_construction_errors() {
    let backend = NativeBackend::default();
    let singular = ExprMatrix::from_rows(vec![
        vec![Expr::symbol("x"), Expr::symbol("x")],
        vec![Expr::symbol("x"), Expr::symbol("x")],
    ])
    .unwrap();
    assert_eq!(
        RiemannGeometry::new(&backend, singular, syms(&["x", "y"])).unwrap_err(),
        GeometryError::SingularMetric
    );
    assert!(matches!(
        RiemannGeometry::new(&backend, ExprMatrix::identity(2), syms(&["x"])),
        Err(GeometryError::DimensionMismatch { rows: 2, cols: 2, coords: 1 })
    ));
}

#[test]
fn test_seeded_integration_is_reproducible() {
    let backend = NativeBackend::default();
    let sphere = geometry(metrics::sphere(Expr::symbol("a")));
    let flow = sphere
        .geodesic_system()
        .compile(&backend, &Substitution::new().with("a", 1))
        .unwrap();
    let integrator = GeodesicIntegrator::new(IntegratorConfig::default().t_end(2.0).samples(50)).unwrap();
    assert_eq!(integrator.solve_seeded(&flow, 104), integrator.solve_seeded(&flow, 104));
}

#[test]
fn test_default_config_on_unit_sphere() {
    let backend = NativeBackend::default();
    let sphere = geometry(metrics::sphere(Expr::symbol("a")));
    let flow = sphere
        .geodesic_system()
        .compile(&backend, &Substitution::new().with("a", 1))
        .unwrap();
    let integrator = GeodesicIntegrator::new(IntegratorConfig::default()).unwrap();
    let speed = |s: &[f64]| s[2] * s[2] + s[0].sin().powi(2) * s[3] * s[3];

    for seed in 100..=105 {
        let traj = integrator
            .solve_seeded(&flow, seed)
            .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
        assert_eq!(traj.len(), 1000);
        assert_eq!(traj.times()[999], 10.0);
        assert_eq!(integrator.solve_seeded(&flow, seed).unwrap(), traj);

        let initial = speed(traj.initial_state().unwrap());
        for state in traj.states() {
            assert_relative_eq!(speed(state), initial, max_relative = 1e-6);
        }
    }
}

#[test]
fn test_flat_geodesics_are_straight_lines() {
    let backend = NativeBackend::default();
    let plane = geometry(metrics::euclidean(2));
    let flow = plane.geodesic_system().compile(&backend, &Substitution::new()).unwrap();

    for method in [IntegrationMethod::CashKarp, IntegrationMethod::Rk4 { substeps: 4 }] {
        let config = IntegratorConfig::default().t_end(2.0).samples(5).method(method);
        let integrator = GeodesicIntegrator::new(config).unwrap();
        let start = DVec::from_vec(vec![0.1, 0.2, 0.3, -0.4]);
        let traj = integrator.solve_from(&flow, start).unwrap();
        assert_eq!(traj.len(), 5);
        for (&s, x) in traj.times().iter().zip(traj.positions()) {
            assert_relative_eq!(x[0], 0.1 + 0.3 * s, epsilon = 1e-12);
            assert_relative_eq!(x[1], 0.2 - 0.4 * s, epsilon = 1e-12);
        }
        assert_eq!(traj.final_state().unwrap()[2..], [0.3, -0.4]);
    }
}

#[test]
fn test_sphere_geodesic_conserves_speed() {
    let backend = NativeBackend::default();
    let sphere = geometry(metrics::sphere(Expr::symbol("a")));
    let flow = sphere
        .geodesic_system()
        .compile(&backend, &Substitution::new().with("a", 1))
        .unwrap();
    let integrator = GeodesicIntegrator::new(IntegratorConfig::default().t_end(5.0).samples(101)).unwrap();
    let traj = integrator
        .solve_from(&flow, DVec::from_vec(vec![1.0, 0.0, 0.2, 0.5]))
        .unwrap();

    // |v|^2 = x'^2 + sin^2(x) y'^2 along the geodesic.
    let speed = |s: &[f64]| s[2] * s[2] + s[0].sin().powi(2) * s[3] * s[3];
    let initial = speed(traj.initial_state().unwrap());
    for state in traj.states() {
        assert_relative_eq!(speed(state), initial, epsilon = 1e-6);
    }
}

#[test]
fn test_blowup_is_reported() {
    // g = exp(-2x) gives x'' = x'^2, which diverges at s = 1 / x'(0).
    let backend = NativeBackend::default();
    let metric = ExprMatrix::diag([(Expr::int(-2) * Expr::symbol("x")).exp()]);
    let line = RiemannGeometry::new(&backend, metric, syms(&["x"])).unwrap();
    let flow = line.geodesic_system().compile(&backend, &Substitution::new()).unwrap();

    for method in [IntegrationMethod::CashKarp, IntegrationMethod::Rk4 { substeps: 10 }] {
        let config = IntegratorConfig::default().t_end(3.0).samples(31).method(method);
        let integrator = GeodesicIntegrator::new(config).unwrap();
        let err = integrator
            .solve_from(&flow, DVec::from_vec(vec![0.0, 1.0]))
            .unwrap_err();
        match err {
            GeometryError::IntegrationDivergence { t, .. } => assert!(t <= 1.1, "diverged late at {t}"),
            other => panic!("expected divergence, got {other:?}"),
        }
    }
}

#[test]
fn test_wrong_initial_state_length() {
    let backend = NativeBackend::default();
    let plane = geometry(metrics::euclidean(2));
    let flow = plane.geodesic_system().compile(&backend, &Substitution::new()).unwrap();
    let integrator = GeodesicIntegrator::new(IntegratorConfig::default()).unwrap();
    assert!(matches!(
        integrator.solve_from(&flow, DVec::zeros(3)),
        Err(GeometryError::InvalidConfig(_))
    ));
}

#[test]
fn test_config_json_round_trip() {
    let config = IntegratorConfig::default()
        .t_end(4.0)
        .samples(64)
        .method(IntegrationMethod::Rk4 { substeps: 16 });
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains(r#""kind":"rk4""#));
    assert_eq!(IntegratorConfig::from_json(&json).unwrap(), config);
    assert!(matches!(
        IntegratorConfig::from_json(r#"{"rtol": -1.0}"#),
        Err(GeometryError::InvalidConfig(_))
    ));
}

#[test]
fn test_trajectory_json_export() {
    let backend = NativeBackend::default();
    let plane = geometry(metrics::euclidean(2));
    let flow = plane.geodesic_system().compile(&backend, &Substitution::new()).unwrap();
    let integrator = GeodesicIntegrator::new(IntegratorConfig::default().samples(3)).unwrap();
    let traj = integrator.solve_seeded(&flow, 7).unwrap();
    let value: serde_json::Value = serde_json::from_str(&traj.to_json().unwrap()).unwrap();
    assert_eq!(value["states"].as_array().unwrap().len(), 3);
    assert_eq!(value["states"][0].as_array().unwrap().len(), 4);
}
