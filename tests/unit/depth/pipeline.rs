use super::*;

#[test]
fn options_default_from_empty_json() {
    let opts = ReconstructOpts::from_json_str("{}").unwrap();
    assert_eq!(opts, ReconstructOpts::default());
    assert_eq!(opts.quality, 0.25);
    assert_eq!(opts.frame, FramePolicy::Circular);
    assert!(opts.mask);
    assert!(!opts.alpha_from_mask);
    assert_eq!(opts.threading.poll_interval_ms, 4);
}

#[test]
fn options_accept_partial_json() {
    let opts = ReconstructOpts::from_json_str(
        r#"{"quality":0.5,"frame":"rectangular","convention":"direct_x","threading":{"threads":2}}"#,
    )
    .unwrap();
    assert_eq!(opts.quality, 0.5);
    assert_eq!(opts.frame, FramePolicy::Rectangular);
    assert_eq!(opts.convention, NormalConvention::DirectX);
    assert_eq!(opts.threading.threads, Some(2));
    assert_eq!(opts.threading.poll_interval_ms, 4);
}

#[test]
fn malformed_options_are_validation_errors() {
    let err = ReconstructOpts::from_json_str(r#"{"quality":"high"}"#).unwrap_err();
    assert!(err.to_string().starts_with("validation error:"));
}

#[test]
fn mismatched_mask_is_rejected() {
    let req = ReconstructRequest::new(PixelGrid::filled(4, 4, [128, 128, 255, 255]).unwrap())
        .with_mask(PixelGrid::filled(3, 4, [255; 4]).unwrap());
    let err = Reconstructor::new(BackendKind::Cpu)
        .reconstruct(&req)
        .unwrap_err();
    assert!(err.to_string().contains("mask is 3x4"));
}

#[test]
fn empty_normal_map_yields_empty_depth() {
    let req = ReconstructRequest::new(PixelGrid::new(0, 5, Vec::new()).unwrap());
    let out = Reconstructor::new(BackendKind::Cpu)
        .reconstruct(&req)
        .unwrap()
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(out.height(), 5);
}

#[test]
fn cancelled_reconstructor_still_serves_new_jobs() {
    let r = Reconstructor::new(BackendKind::Cpu);
    let stale = r.generation().token();
    r.cancel_all();
    let req = ReconstructRequest::new(PixelGrid::filled(6, 6, [128, 128, 255, 255]).unwrap());
    assert!(r.reconstruct_with_token(&req, &stale).unwrap().is_none());
    let fresh = r.reconstruct_with_stats(&req).unwrap().unwrap();
    assert_eq!(fresh.depth.width(), 6);
    assert_eq!(fresh.stats.angles_integrated, fresh.stats.angles_planned);
}
