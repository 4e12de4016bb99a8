use super::*;
use crate::raster::backend::BackendKind;

fn cpu() -> RasterContext {
    RasterContext::with_backend(BackendKind::Cpu).unwrap()
}

#[test]
fn slope_decodes_around_offset() {
    let grid = PixelGrid::from_fn(2, 1, |x, _| {
        if x == 0 {
            [130, 120, 10, 255]
        } else {
            [130, 120, 0, 255]
        }
    })
    .unwrap();
    let field = GradientField::from_grid(grid);
    assert_eq!(field.slope(0, 0), Some((2.5, -7.5)));
    assert_eq!(field.slope(1, 0), None);
    assert_eq!(field.slope(2, 0), None);
    assert_eq!((field.width(), field.height()), (2, 1));
}

#[test]
fn byte_extremes_decode_to_opposite_slopes() {
    let grid = PixelGrid::from_fn(2, 1, |x, _| {
        if x == 0 {
            [0, 0, 255, 255]
        } else {
            [255, 255, 255, 255]
        }
    })
    .unwrap();
    let field = GradientField::from_grid(grid);
    let (lo_x, lo_y) = field.slope(0, 0).unwrap();
    let (hi_x, hi_y) = field.slope(1, 0).unwrap();
    assert_eq!(lo_x, -hi_x);
    assert_eq!(lo_y, -hi_y);
    assert_eq!(hi_x, 127.5);
}

#[test]
fn opengl_extraction_divides_by_blue() {
    let mut ctx = cpu();
    let normal = Arc::new(
        PixelGrid::from_fn(2, 1, |x, _| {
            if x == 0 {
                [40, 200, 255, 255]
            } else {
                [128, 128, 255, 255]
            }
        })
        .unwrap(),
    );
    let field = extract_gradient(&mut ctx, &normal, NormalConvention::OpenGl).unwrap();
    assert_eq!(field.grid().pixel(0, 0), Some([40, 200, 40, 255]));
    assert_eq!(field.grid().pixel(1, 0), Some([128, 128, 128, 255]));
    assert_eq!(field.slope(1, 0), Some((0.5, 0.5)));
}

#[test]
fn directx_flips_green() {
    let mut ctx = cpu();
    let normal = Arc::new(PixelGrid::filled(1, 1, [40, 200, 255, 255]).unwrap());
    let field = extract_gradient(&mut ctx, &normal, NormalConvention::DirectX).unwrap();
    assert_eq!(field.grid().pixel(0, 0), Some([40, 55, 40, 255]));
}

#[test]
fn zero_blue_marks_pixel_invalid() {
    let mut ctx = cpu();
    let normal = Arc::new(PixelGrid::filled(3, 2, [128, 128, 0, 255]).unwrap());
    let field = extract_gradient(&mut ctx, &normal, NormalConvention::OpenGl).unwrap();
    for y in 0..2 {
        for x in 0..3 {
            assert_eq!(field.slope(x, y), None);
        }
    }
}

#[test]
fn program_samples_one_texture() {
    let mut ctx = cpu();
    let gl = gradient_program(&mut ctx, 16, 8, NormalConvention::OpenGl).unwrap();
    assert_eq!((gl.width(), gl.height()), (16, 8));
    assert_eq!(gl.input_count(), 1);
    let fs = gl.fragment_source();
    assert!(fs.contains("textureLoad(t_in0, px, 0)"));
    assert!(fs.contains("min("));
    assert!(fs.contains(": vec4<f32> = vec4<f32>("));

    let dx = gradient_program(&mut ctx, 16, 8, NormalConvention::DirectX).unwrap();
    assert!(dx.instruction_count() > gl.instruction_count());
    assert_ne!(dx.fingerprint(), gl.fingerprint());
}

#[test]
fn convention_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&NormalConvention::DirectX).unwrap(),
        "\"direct_x\""
    );
    let gl: NormalConvention = serde_json::from_str("\"open_gl\"").unwrap();
    assert_eq!(gl, NormalConvention::OpenGl);
}
