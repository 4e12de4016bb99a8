use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        DepthError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        DepthError::backend("x")
            .to_string()
            .contains("backend error:")
    );
    assert!(
        DepthError::evaluation("x")
            .to_string()
            .contains("evaluation error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = DepthError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
