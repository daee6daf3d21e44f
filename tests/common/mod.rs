#![allow(dead_code)]
use quadslice_rs::{Particle, Particles, Reference};

pub const E_TOL: f64 = 1e-12;
pub const ELECTRON_MASS_EV: f64 = 0.51099895e6;

pub fn electron_reference() -> Reference {
    Reference {
        p0c: 5e9,
        mass0: ELECTRON_MASS_EV,
        q0: 1.0,
    }
}

pub fn setup_particles(num: usize) -> Particles {
    // This is a function that sets up a small batch with spread out
    // coordinates so that it can be used in testing
    let mut prtls = Particles::new(electron_reference(), num);
    for (i, p) in prtls.prtls.iter_mut().enumerate() {
        let f = i as f64 / num.max(1) as f64;
        p.x = 0.1 - 0.2 * f;
        p.px = 0.2 * f;
        p.y = 0.3 * f - 0.05;
        p.py = 0.4 - 0.1 * f;
        p.delta = 0.03 * (f - 0.5);
        p.rng_state = 0x5eed_0000 + i as u64;
    }
    prtls
}

pub fn assert_same_coords(a: &Particles, b: &Particles, tol: f64) {
    assert_eq!(a.len(), b.len());
    for (p, q) in a.prtls.iter().zip(b.prtls.iter()) {
        assert_eq!(p.particle_id, q.particle_id);
        assert!((p.x - q.x).abs() <= tol, "x {} vs {}", p.x, q.x);
        assert!((p.px - q.px).abs() <= tol, "px {} vs {}", p.px, q.px);
        assert!((p.y - q.y).abs() <= tol, "y {} vs {}", p.y, q.y);
        assert!((p.py - q.py).abs() <= tol, "py {} vs {}", p.py, q.py);
        assert!((p.delta - q.delta).abs() <= tol, "delta {} vs {}", p.delta, q.delta);
        assert_eq!(p.state, q.state);
    }
}

// Bitwise, so NaN coordinates of lost particles compare equal to themselves.
pub fn assert_same_bits(p: &Particle, q: &Particle) {
    assert_eq!(p.particle_id, q.particle_id);
    for (name, a, b) in &[
        ("x", p.x, q.x),
        ("px", p.px, q.px),
        ("y", p.y, q.y),
        ("py", p.py, q.py),
        ("zeta", p.zeta, q.zeta),
        ("delta", p.delta, q.delta),
        ("chi", p.chi, q.chi),
    ] {
        assert_eq!(a.to_bits(), b.to_bits(), "{} {} vs {}", name, a, b);
    }
    assert_eq!(
        (p.state, p.at_element, p.at_turn, p.rng_state),
        (q.state, q.at_element, q.at_turn, q.rng_state)
    );
}
