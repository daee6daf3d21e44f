use crate::{
    kick::{EmissionSideChannel, KickArgs, RadiationMode},
    prtls::Particle,
    record::{PhotonEvent, RadiationRecord},
};
use rand::prelude::*;
use rand_distr::{Gamma, Poisson};

pub const CLASSICAL_ELECTRON_RADIUS: f64 = 2.8179403262e-15; // m
pub const ELECTRON_MASS_EV: f64 = 0.51099895000e6;
pub const FINE_STRUCTURE: f64 = 7.2973525693e-3;
pub const HBAR_C_EV_M: f64 = 197.3269804e-9;

// Photon energies are drawn in units of the critical energy from a
// Gamma(1/3) law rescaled so its mean matches the exact synchrotron mean
// 8 / (15 sqrt 3).
const PHOTON_SHAPE: f64 = 1.0 / 3.0;
const PHOTON_SCALE: f64 = 0.923_760_430_703_401; // 8 / (5 sqrt 3)
const PHOTONS_PER_RADIAN: f64 = 1.443_375_672_974_064_4; // 5 / (2 sqrt 3)

struct Emitter {
    curvature: f64,
    half_length: f64,
    r_cl: f64,
    gamma0: f64,
    energy0: f64,
}

impl Emitter {
    fn gamma(&self, delta: f64) -> f64 {
        self.gamma0 * (1.0 + delta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Side {
    Entry,
    Exit,
}

// kick_x, kick_y are the multipole momentum kicks and set the curvature.
pub(crate) fn radiate_half(
    part: &mut Particle,
    args: &KickArgs<'_>,
    kick_x: f64,
    kick_y: f64,
    side: Side,
    side_channel: &mut EmissionSideChannel,
    record: Option<&dyn RadiationRecord>,
) {
    if args.radiation_mode == RadiationMode::Off || args.backtrack_sign < 0.0 || args.length <= 0.0 {
        return;
    }
    let reference = args.reference;
    let opd = 1.0 + part.delta;
    let curvature = (kick_x * kick_x + kick_y * kick_y).sqrt() / (opd * args.length);
    if curvature == 0.0 {
        return;
    }
    let emitter = Emitter {
        curvature,
        half_length: 0.5 * args.length,
        r_cl: CLASSICAL_ELECTRON_RADIUS * reference.q0 * reference.q0 * ELECTRON_MASS_EV
            / reference.mass0,
        gamma0: reference.gamma0(),
        energy0: reference.energy0(),
    };

    let (delta_in, px_in, py_in) = (part.delta, part.px, part.py);
    match args.radiation_mode {
        RadiationMode::Off => {}
        RadiationMode::MeanLoss => mean_loss(part, &emitter),
        RadiationMode::StochasticRecorded => {
            stochastic_loss(part, &emitter, record)
        }
    }
    let (dp, dpx, dpy) = (part.delta - delta_in, part.px - px_in, part.py - py_in);
    match side {
        Side::Entry => {
            side_channel.dp_entry += dp;
            side_channel.dpx_entry += dpx;
            side_channel.dpy_entry += dpy;
        }
        Side::Exit => {
            side_channel.dp_exit += dp;
            side_channel.dpx_exit += dpx;
            side_channel.dpy_exit += dpy;
        }
    }
}

fn mean_loss(part: &mut Particle, em: &Emitter) {
    let gamma = em.gamma(part.delta);
    let rel_loss = 2.0 / 3.0 * em.r_cl * gamma.powi(3) * em.curvature.powi(2) * em.half_length;
    let new_delta = (1.0 + part.delta) * (1.0 - rel_loss) - 1.0;
    part.update_delta(new_delta);
}

fn stochastic_loss(
    part: &mut Particle,
    em: &Emitter,
    record: Option<&dyn RadiationRecord>,
) {
    let mut rng = StdRng::seed_from_u64(part.rng_state);
    let gamma = em.gamma(part.delta);
    let mean_photons = PHOTONS_PER_RADIAN * FINE_STRUCTURE * gamma * em.curvature * em.half_length;

    // both constructors only fail for non-positive or non-finite inputs
    let n_photons = match Poisson::new(mean_photons) {
        Ok(dist) => dist.sample(&mut rng) as u64,
        Err(_) => 0,
    };
    if n_photons > 0 {
        if let Ok(spectrum) = Gamma::new(PHOTON_SHAPE, PHOTON_SCALE) {
            for _ in 0..n_photons {
                let gamma = em.gamma(part.delta);
                let critical = 1.5 * HBAR_C_EV_M * gamma.powi(3) * em.curvature;
                let photon_energy = critical * spectrum.sample(&mut rng);
                let energy = em.energy0 * (1.0 + part.delta);
                let new_delta = (1.0 + part.delta) * (1.0 - photon_energy / energy) - 1.0;
                part.update_delta(new_delta);
                if let Some(rec) = record {
                    rec.append(PhotonEvent {
                        photon_energy,
                        at_element: part.at_element,
                        at_turn: part.at_turn,
                        particle_id: part.particle_id,
                        particle_delta: part.delta,
                    });
                }
            }
        }
    }
    part.rng_state = rng.gen();
}
