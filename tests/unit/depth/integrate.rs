use super::*;
use crate::depth::generation::RenderGeneration;
use crate::depth::planner::{FramePolicy, plan_angles, plan_start_frame};
use crate::foundation::grid::PixelGrid;

fn constant_field(width: u32, height: u32, rgba: [u8; 4]) -> GradientField {
    GradientField::from_grid(PixelGrid::filled(width, height, rgba).unwrap())
}

fn ramp_field(width: u32, height: u32) -> GradientField {
    GradientField::from_grid(
        PixelGrid::from_fn(width, height, |x, y| {
            [120 + (x % 9) as u8, 125 + (y % 5) as u8, 200, 255]
        })
        .unwrap(),
    )
}

#[test]
fn single_pair_on_a_scanline_is_a_linear_ramp() {
    // Horizontal slope 130 - 127.5 = 2.5; the 0/180 pair never samples green.
    let field = constant_field(4, 1, [130, 127, 255, 255]);
    let angles = plan_angles(4, 1, 0.0);
    let frame = plan_start_frame(4, 1, FramePolicy::Rectangular);
    let acc = IntegralAccumulator::new(4, 1);
    let done = integrate_angles_into(
        &field,
        angles.as_slice(),
        &frame,
        &acc,
        &GenerationToken::detached(),
    );
    assert_eq!(done, 2);
    // Left-to-right ray: -2.5, -5, -7.5, -10. Right-to-left: 10, 7.5, 5, 2.5.
    // Each ray rounds half away from zero before adding.
    assert_eq!(acc.sums(), vec![7, 3, -3, -7]);
    assert_eq!(acc.counts(), vec![2, 2, 2, 2]);
}

#[test]
fn invalid_pixels_contribute_no_slope() {
    let field = constant_field(5, 3, [200, 40, 0, 255]);
    let angles = plan_angles(5, 3, 0.5);
    let frame = plan_start_frame(5, 3, FramePolicy::Circular);
    let acc = IntegralAccumulator::new(5, 3);
    integrate_angles_into(
        &field,
        angles.as_slice(),
        &frame,
        &acc,
        &GenerationToken::detached(),
    );
    assert!(acc.sums().iter().all(|s| *s == 0));
    assert!(acc.counts().iter().all(|c| *c > 0));
}

#[test]
fn batch_order_does_not_matter() {
    let field = ramp_field(9, 7);
    let angles = plan_angles(9, 7, 0.5);
    let frame = plan_start_frame(9, 7, FramePolicy::Circular);
    let token = GenerationToken::detached();
    let batches = angles.partition(3);

    let forward = IntegralAccumulator::new(9, 7);
    for b in &batches {
        integrate_angles_into(&field, b, &frame, &forward, &token);
    }
    let backward = IntegralAccumulator::new(9, 7);
    for b in batches.iter().rev() {
        let mut rev = b.clone();
        rev.reverse();
        integrate_angles_into(&field, &rev, &frame, &backward, &token);
    }
    assert_eq!(forward.sums(), backward.sums());
    assert_eq!(forward.counts(), backward.counts());
}

#[test]
fn parallel_run_matches_sequential_run() {
    let field = ramp_field(12, 8);
    let angles = plan_angles(12, 8, 0.4);
    let frame = plan_start_frame(12, 8, FramePolicy::Circular);
    let token = GenerationToken::detached();

    let sequential = IntegralAccumulator::new(12, 8);
    integrate_angles_into(&field, angles.as_slice(), &frame, &sequential, &token);

    let threading = IntegrationThreading {
        threads: Some(3),
        ..IntegrationThreading::default()
    };
    let run = integrate(&field, &angles, &frame, &threading, &token)
        .unwrap()
        .expect("detached token never goes stale");
    assert_eq!(run.accumulator().sums(), sequential.sums());
    assert_eq!(run.accumulator().counts(), sequential.counts());

    let stats = run.stats();
    assert_eq!(stats.workers, 3);
    assert_eq!(stats.angles_planned, angles.len());
    assert_eq!(stats.angles_integrated, angles.len());
    assert_eq!(stats.start_points, frame.points().len());
    assert!(!stats.overflowed);
}

#[test]
fn workers_never_exceed_angles() {
    let field = ramp_field(3, 3);
    let angles = plan_angles(3, 3, 0.0);
    let frame = plan_start_frame(3, 3, FramePolicy::Rectangular);
    let threading = IntegrationThreading {
        threads: Some(16),
        ..IntegrationThreading::default()
    };
    let run = integrate(&field, &angles, &frame, &threading, &GenerationToken::detached())
        .unwrap()
        .unwrap();
    assert_eq!(run.stats().workers, 2);
}

#[test]
fn zero_threads_is_rejected() {
    let field = ramp_field(3, 3);
    let angles = plan_angles(3, 3, 0.0);
    let frame = plan_start_frame(3, 3, FramePolicy::Rectangular);
    let threading = IntegrationThreading {
        threads: Some(0),
        ..IntegrationThreading::default()
    };
    let err = integrate(&field, &angles, &frame, &threading, &GenerationToken::detached())
        .unwrap_err();
    assert!(err.to_string().starts_with("validation error:"));
}

#[test]
fn stale_token_yields_nothing() {
    let generation = RenderGeneration::new();
    let token = generation.token();
    generation.cancel_all();

    let field = ramp_field(6, 6);
    let angles = plan_angles(6, 6, 1.0);
    let frame = plan_start_frame(6, 6, FramePolicy::Circular);
    let out = integrate(&field, &angles, &frame, &IntegrationThreading::default(), &token).unwrap();
    assert!(out.is_none());

    let acc = IntegralAccumulator::new(6, 6);
    assert_eq!(
        integrate_angles_into(&field, angles.as_slice(), &frame, &acc, &token),
        0
    );
    assert!(acc.counts().iter().all(|c| *c == 0));
}

#[test]
fn cancelling_mid_run_stops_workers() {
    let generation = RenderGeneration::new();
    let token = generation.token();

    // Big enough that one worker needs far longer than the delay below.
    let field = ramp_field(192, 192);
    let angles = plan_angles(192, 192, 1.0);
    let frame = plan_start_frame(192, 192, FramePolicy::Circular);
    let threading = IntegrationThreading {
        threads: Some(1),
        ..IntegrationThreading::default()
    };

    let canceller = {
        let generation = generation.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            generation.cancel_all();
        })
    };
    let out = integrate(&field, &angles, &frame, &threading, &token).unwrap();
    canceller.join().unwrap();

    assert!(out.is_none());
    assert!(token.is_stale());
}
