use super::*;
use crate::raster::graph::RasterContext;

const WHITE: Option<[u8; 4]> = Some([255, 255, 255, 255]);
const BLACK: Option<[u8; 4]> = Some([0, 0, 0, 255]);

fn cpu() -> RasterContext {
    RasterContext::new(Box::new(CpuBackend::new()))
}

#[test]
fn integer_math_wraps_and_division_by_zero_keeps_dividend() {
    let mut ctx = cpu();
    let g = ctx.bind(1, 1);
    let div = (g.integer(7) / g.integer(0)).eq(g.integer(7));
    let wrap = (g.integer(i32::MAX) + g.integer(1)).eq(g.integer(i32::MIN));
    let neg = (-g.integer(i32::MIN)).eq(g.integer(i32::MIN));
    let out = div.and(wrap).and(neg);
    assert_eq!(g.render(out).unwrap().pixel(0, 0), WHITE);
}

#[test]
fn step_includes_the_edge() {
    let mut ctx = cpu();
    let g = ctx.bind(1, 1);
    let on = g.step(g.float(0.5), g.float(0.5));
    assert_eq!(g.render(on).unwrap().pixel(0, 0), WHITE);
    let off = g.step(g.float(0.6), g.float(0.5));
    assert_eq!(g.render(off).unwrap().pixel(0, 0), BLACK);
}

#[test]
fn mix_and_select() {
    let mut ctx = cpu();
    let g = ctx.bind(1, 1);
    let m = g.mix(g.float(0.0), g.float(1.0), g.float(0.25));
    // 0.25 * 255 = 63.75
    assert_eq!(g.render(m).unwrap().pixel(0, 0), Some([64, 64, 64, 255]));

    let picked = g.select(g.boolean(true), g.float(1.0), g.float(0.0));
    assert_eq!(g.render(picked).unwrap().pixel(0, 0), WHITE);
    let picked = g.select(g.boolean(false), g.float(1.0), g.float(0.0));
    assert_eq!(g.render(picked).unwrap().pixel(0, 0), BLACK);
}

#[test]
fn outputs_promote_to_rgba() {
    let mut ctx = cpu();
    let g = ctx.bind(1, 1);
    let v2 = g.vec2(g.float(0.2), g.float(0.4));
    assert_eq!(g.render(v2).unwrap().pixel(0, 0), Some([51, 102, 0, 255]));

    let v3 = g.vec3(g.float(1.0), g.float(0.0), g.float(1.0));
    assert_eq!(g.render(v3).unwrap().pixel(0, 0), Some([255, 0, 255, 255]));

    let v4 = g.extend(v3, g.float(0.0));
    assert_eq!(g.render(v4).unwrap().pixel(0, 0), Some([255, 0, 255, 0]));

    assert_eq!(g.render(g.boolean(true)).unwrap().pixel(0, 0), WHITE);
    assert_eq!(g.render(g.integer(-3)).unwrap().pixel(0, 0), BLACK);
}

#[test]
fn frag_coord_is_pixel_center() {
    let mut ctx = cpu();
    let g = ctx.bind(2, 2);
    let uv = g.frag_coord() / g.resolution();
    let out = g.render(uv).unwrap();
    // (1.5 / 2, 0.5 / 2) = (0.75, 0.25)
    assert_eq!(out.pixel(1, 0), Some([191, 64, 0, 255]));
    assert_eq!(out.pixel(0, 1), Some([64, 191, 0, 255]));
}

#[test]
fn textures_sample_the_current_pixel() {
    let mut ctx = cpu();
    let g = ctx.bind(3, 1);
    let grid = PixelGrid::from_fn(3, 1, |x, _| [x as u8 * 10, 51, 102, 204]).unwrap();
    let t = g.texture(grid).unwrap();
    let out = g.render(t).unwrap();
    assert_eq!(out.pixel(0, 0), Some([0, 51, 102, 204]));
    assert_eq!(out.pixel(2, 0), Some([20, 51, 102, 204]));

    let swizzled = g.render(g.vec3(t.z(), t.y(), t.x())).unwrap();
    assert_eq!(swizzled.pixel(1, 0), Some([102, 51, 10, 255]));
}

#[test]
fn matrix_inverse_and_product() {
    let mut ctx = cpu();
    let g = ctx.bind(1, 1);
    let zero = g.float(0.0);
    let m = g.mat3(
        g.vec3(g.float(2.0), zero, zero),
        g.vec3(zero, g.float(4.0), zero),
        g.vec3(zero, zero, g.float(8.0)),
    );
    let one = g.float(1.0);
    let v = m.inverse() * g.vec3(one, one, one);
    // (0.5, 0.25, 0.125)
    assert_eq!(g.render(v).unwrap().pixel(0, 0), Some([128, 64, 32, 255]));

    let identity = (m * m.inverse()) * g.vec3(one, zero, one);
    assert_eq!(g.render(identity).unwrap().pixel(0, 0), Some([255, 0, 255, 255]));
}

#[test]
fn nan_quantizes_to_zero_and_casts_saturate() {
    let mut ctx = cpu();
    let g = ctx.bind(1, 1);
    let nan = g.float(-1.0).sqrt();
    assert_eq!(g.render(nan).unwrap().pixel(0, 0), BLACK);

    let big = g.float(1e10).to_integer().eq(g.integer(i32::MAX));
    assert_eq!(g.render(big).unwrap().pixel(0, 0), WHITE);
}

#[test]
fn vector_helpers() {
    let mut ctx = cpu();
    let g = ctx.bind(1, 1);
    let v = g.vec2(g.float(3.0), g.float(4.0));
    let len = v.length().eq(g.float(5.0));
    let unit = (v.normalize().dot(v) - g.float(5.0)).abs().lt(g.float(1e-5));
    let clamped = g.float(7.0).clamp(g.float(0.0), g.float(1.0)).eq(g.float(1.0));
    let out = len.and(unit).and(clamped);
    assert_eq!(g.render(out).unwrap().pixel(0, 0), WHITE);
}

#[test]
fn input_count_mismatch_is_rejected() {
    let mut ctx = cpu();
    let g = ctx.bind(2, 2);
    let t = g.texture(PixelGrid::filled(2, 2, [0; 4]).unwrap()).unwrap();
    let program = g.compile(t);

    let err = CpuBackend::new().execute(&program, &[]).unwrap_err();
    assert!(err.to_string().contains("program samples 1 inputs, 0 bound"));

    let wrong = PixelGrid::filled(1, 2, [0; 4]).unwrap();
    let err = CpuBackend::new().execute(&program, &[&wrong]).unwrap_err();
    assert!(err.to_string().contains("input is 1x2"));
}

#[test]
fn large_targets_match_row_by_row() {
    let mut ctx = cpu();
    let g = ctx.bind(37, 23);
    let out = g.render(g.frag_coord().y() / g.resolution().y()).unwrap();
    for y in 0..23 {
        let expected = unorm8((y as f32 + 0.5) / 23.0);
        for x in 0..37 {
            assert_eq!(out.pixel(x, y).map(|p| p[0]), Some(expected));
        }
    }
}
