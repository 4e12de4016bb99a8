use super::*;

#[test]
fn new_rejects_length_mismatch() {
    let err = PixelGrid::new(2, 2, vec![0; 15]).unwrap_err();
    assert!(err.to_string().contains("validation error:"));
    assert!(PixelGrid::new(2, 2, vec![0; 16]).is_ok());
}

#[test]
fn zero_sized_grid_is_legal() {
    let g = PixelGrid::new(0, 7, Vec::new()).unwrap();
    assert!(g.is_empty());
    assert_eq!(g.pixel(0, 0), None);
}

#[test]
fn from_fn_is_row_major() {
    let g = PixelGrid::from_fn(3, 2, |x, y| [x as u8, y as u8, 0, 255]).unwrap();
    assert_eq!(g.pixel(2, 0), Some([2, 0, 0, 255]));
    assert_eq!(g.pixel(1, 1), Some([1, 1, 0, 255]));
    assert_eq!(&g.data()[4..8], &[1, 0, 0, 255]);
    assert_eq!(g.pixel(3, 0), None);
}

#[test]
fn png_roundtrip_through_image_crate() {
    let g = PixelGrid::from_fn(5, 3, |x, y| [x as u8 * 40, y as u8 * 80, 7, 255]).unwrap();
    let path = std::env::temp_dir().join(format!("normal_depth_grid_{}.png", std::process::id()));
    g.save_png(&path).unwrap();
    let back = PixelGrid::open(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(back, g);
}
