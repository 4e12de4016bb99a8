use super::*;

#[test]
fn fresh_token_is_current() {
    let g = RenderGeneration::new();
    assert_eq!(g.current(), 0);
    let t = g.token();
    assert!(t.is_current());
    assert_eq!(t.captured(), 0);
}

#[test]
fn cancel_all_stales_every_outstanding_token() {
    let g = RenderGeneration::new();
    let a = g.token();
    let b = g.clone().token();
    g.cancel_all();
    assert!(a.is_stale());
    assert!(b.is_stale());

    let c = g.token();
    assert_eq!(c.captured(), 1);
    assert!(c.is_current());
}

#[test]
fn detached_token_never_goes_stale() {
    let g = RenderGeneration::new();
    let t = GenerationToken::detached();
    g.cancel_all();
    assert!(t.is_current());
}

#[test]
fn tokens_cross_threads() {
    let g = RenderGeneration::new();
    let t = g.token();
    let h = std::thread::spawn(move || {
        while t.is_current() {
            std::thread::yield_now();
        }
        t.captured()
    });
    g.cancel_all();
    assert_eq!(h.join().unwrap(), 0);
}
