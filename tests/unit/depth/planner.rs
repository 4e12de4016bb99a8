use super::*;

#[test]
fn step_vectors_snap_to_axis() {
    assert_eq!(Direction::from_degrees(0.0).step(), Vec2::new(1.0, 0.0));
    assert_eq!(Direction::from_degrees(90.0).step(), Vec2::new(0.0, 1.0));
    assert_eq!(Direction::from_degrees(180.0).step(), Vec2::new(-1.0, 0.0));
    assert_eq!(Direction::from_degrees(270.0).step(), Vec2::new(0.0, -1.0));
    let d = Direction::from_degrees(45.0).step();
    assert!((d.x - d.y).abs() < 1e-12);
    assert!((d.hypot() - 1.0).abs() < 1e-12);
}

#[test]
fn directions_wrap_and_flip() {
    assert_eq!(Direction::from_degrees(-90.0).degrees(), 270.0);
    assert_eq!(Direction::from_degrees(720.0).degrees(), 0.0);
    assert_eq!(Direction::from_degrees(300.0).opposite().degrees(), 120.0);
}

#[test]
fn minimum_plan_is_one_antipodal_pair() {
    let a = plan_angles(16, 16, 0.0);
    let degs: Vec<f64> = a.iter().map(Direction::degrees).collect();
    assert_eq!(degs, vec![0.0, 180.0]);
    assert_eq!(plan_angles(16, 16, f32::NAN).len(), 2);
    assert_eq!(plan_angles(16, 16, -3.0).len(), 2);
}

#[test]
fn refinement_order_is_dyadic() {
    let a = plan_angles(4, 1, 1.0);
    let degs: Vec<f64> = a.iter().map(Direction::degrees).collect();
    assert_eq!(
        degs,
        vec![0.0, 180.0, 90.0, 270.0, 45.0, 225.0, 135.0, 315.0, 22.5, 202.5]
    );
}

#[test]
fn every_angle_has_its_opposite() {
    for q in [0.05f32, 0.25, 0.6, 1.0] {
        let a = plan_angles(37, 21, q);
        assert_eq!(a.len() % 2, 0);
        for d in a.iter() {
            assert!(a.contains(d.opposite().degrees()), "{} lacks pair", d.degrees());
        }
        let mut bits: Vec<u64> = a.iter().map(|d| d.degrees().to_bits()).collect();
        bits.sort_unstable();
        bits.dedup();
        assert_eq!(bits.len(), a.len());
    }
}

#[test]
fn quality_is_monotone_and_capped() {
    let max = maximum_angle_count(30, 20);
    assert_eq!(max, 100);
    let mut last = 0;
    for i in 0..=20 {
        let n = plan_angles(30, 20, i as f32 / 20.0).len();
        assert!(n >= last);
        assert!(n <= max);
        last = n;
    }
    assert_eq!(plan_angles(30, 20, 1.0).len(), max);
    assert_eq!(plan_angles(30, 20, 7.0).len(), max);
    assert_eq!(plan_angles(30, 20, 0.25).len(), 26);
}

#[test]
fn partition_is_round_robin() {
    let a = plan_angles(8, 8, 0.25);
    let parts = a.partition(3);
    assert_eq!(parts.len(), 3);
    assert_eq!(parts.iter().map(Vec::len).sum::<usize>(), a.len());
    assert_eq!(parts[1][0], a.as_slice()[1]);
    assert_eq!(parts[0][1], a.as_slice()[3]);
    assert_eq!(a.partition(0).len(), 1);
}

#[test]
fn rectangular_frame_hugs_every_edge() {
    let f = plan_start_frame(4, 3, FramePolicy::Rectangular);
    assert_eq!(f.points().len(), 2 * 4 + 2 * 3);
    assert!(f.points().contains(&Point::new(-1.0, 2.0)));
    assert!(f.points().contains(&Point::new(4.0, 0.0)));
    assert!(f.points().contains(&Point::new(3.0, -1.0)));
    assert!(f.points().contains(&Point::new(0.0, 3.0)));
    assert!(f.in_march_region(Point::new(-1.0, -1.0)));
    assert!(!f.in_march_region(Point::new(-2.0, 0.0)));
    assert!(!f.in_march_region(Point::new(0.0, 4.0)));
}

#[test]
fn circular_frame_surrounds_the_image() {
    let f = plan_start_frame(10, 6, FramePolicy::Circular);
    assert_eq!(f.radius(), 10.0);
    assert_eq!(f.center(), Point::new(5.0, 3.0));
    assert_eq!(f.points().len(), (std::f64::consts::TAU * 10.0).ceil() as usize);
    for p in f.points() {
        assert!((p.distance(f.center()) - 10.0).abs() < 1e-9);
        assert!(f.in_march_region(*p));
    }
    assert!(!f.in_march_region(Point::new(5.0, 14.5)));
}

#[test]
fn empty_image_has_no_launch_points() {
    assert!(plan_start_frame(0, 0, FramePolicy::Circular).points().is_empty());
    assert!(plan_start_frame(0, 0, FramePolicy::Rectangular).points().is_empty());
}

#[test]
fn axis_aligned_rays_skip_the_parallel_edges() {
    let f = plan_start_frame(4, 3, FramePolicy::Rectangular);
    let east = Direction::from_degrees(0.0).step();
    let south = Direction::from_degrees(90.0).step();
    let diagonal = Direction::from_degrees(45.0).step();

    let reaching = |step: Vec2| f.points().iter().filter(|p| f.reaches_image(**p, step)).count();
    // Horizontal rays only start from the left and right columns.
    assert_eq!(reaching(east), 2 * 3);
    assert_eq!(reaching(south), 2 * 4);
    assert_eq!(reaching(diagonal), f.points().len());

    assert!(!f.reaches_image(Point::new(1.0, -1.0), east));
    assert!(f.reaches_image(Point::new(-1.0, 2.0), east));
}
