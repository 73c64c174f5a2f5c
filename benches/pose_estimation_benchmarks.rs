//! Benchmarks for pose estimation and the per-frame pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use head_pose_tracker::{
    camera::{CameraInfo, CameraIntrinsics},
    correspondence::{resolve, Correspondence},
    model::MarkerModel,
    pipeline,
    pose_estimation::{solve_p3p, EulerAngles, PoseEstimator},
    utils::polynomial::real_roots,
};
use nalgebra::{Point2, Vector3};

fn test_estimator() -> PoseEstimator {
    let intrinsics = CameraIntrinsics::from_info(&CameraInfo::from_fov(640, 480, 60, 60.0));
    PoseEstimator::new(MarkerModel::default(), intrinsics)
}

fn test_points(estimator: &PoseEstimator) -> [Point2<f64>; 3] {
    let angles = EulerAngles {
        pitch: 3.0,
        yaw: 20.0,
        roll: -6.0,
    };
    estimator.project(&angles.to_rotation(), &Vector3::new(2.0, -1.0, 60.0))
}

fn benchmark_pose_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pose_estimation");

    let estimator = test_estimator();
    let correspondence = Correspondence::new(test_points(&estimator));

    group.bench_function("estimate_three_markers", |b| {
        b.iter(|| {
            let candidates = estimator.estimate(black_box(&correspondence));
            black_box(candidates);
        });
    });

    let bearings = correspondence.points().map(|pixel| {
        let normalized = estimator.intrinsics().normalize(&pixel);
        Vector3::new(normalized.x, normalized.y, 1.0).normalize()
    });
    group.bench_function("solve_p3p", |b| {
        b.iter(|| {
            let poses = solve_p3p(black_box(estimator.model().points()), black_box(&bearings));
            black_box(poses);
        });
    });

    // Benchmark Euler angle conversion
    group.bench_function("euler_angle_conversion", |b| {
        let rotation = EulerAngles {
            pitch: 12.0,
            yaw: -35.0,
            roll: 8.0,
        }
        .to_rotation();

        b.iter(|| {
            let angles = EulerAngles::from_rotation(black_box(&rotation));
            black_box(angles);
        });
    });

    group.bench_function("quartic_roots", |b| {
        // (x - 1)(x + 2)(x - 3)(x + 0.5)
        let coefficients = [3.0, 3.5, -6.0, -1.5, 1.0];
        b.iter(|| {
            let roots = real_roots(black_box(&coefficients));
            black_box(roots);
        });
    });

    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    let estimator = test_estimator();
    let [right, left, top] = test_points(&estimator);
    let detections = [top, right, left];

    group.bench_function("resolve_roles", |b| {
        b.iter(|| {
            let resolved = resolve(black_box(&detections));
            black_box(resolved);
        });
    });

    group.bench_function("estimate_from_detections", |b| {
        b.iter(|| {
            let estimate = pipeline::estimate(black_box(&detections), &estimator);
            black_box(estimate);
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_pose_estimation, benchmark_pipeline);
criterion_main!(benches);
