use crate::{BeamConfig, ReferenceConfig};
use itertools::izip;
use rand::prelude::*;
use rand_distr::StandardNormal;

pub const ALIVE: i64 = 1;
// state <= 0 is lost
pub const LOST_NON_FINITE: i64 = -31;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reference {
    pub p0c: f64,   // eV
    pub mass0: f64, // eV
    pub q0: f64,    // elementary charges
}

impl Reference {
    pub fn gamma0(&self) -> f64 {
        let bg = self.p0c / self.mass0;
        (1.0 + bg * bg).sqrt()
    }

    pub fn energy0(&self) -> f64 {
        self.gamma0() * self.mass0
    }
}

impl From<&ReferenceConfig> for Reference {
    fn from(cfg: &ReferenceConfig) -> Self {
        Reference {
            p0c: cfg.p0c,
            mass0: cfg.mass0,
            q0: cfg.q0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub particle_id: i64,
    pub x: f64,
    pub px: f64,
    pub y: f64,
    pub py: f64,
    pub zeta: f64,
    pub delta: f64,
    pub chi: f64, // (q/q0) / (m/m0)
    pub state: i64,
    pub at_element: i64,
    pub at_turn: i64,
    pub rng_state: u64,
}

impl Particle {
    pub fn new(particle_id: i64) -> Particle {
        Particle {
            particle_id,
            x: 0.0,
            px: 0.0,
            y: 0.0,
            py: 0.0,
            zeta: 0.0,
            delta: 0.0,
            chi: 1.0,
            state: ALIVE,
            at_element: 0,
            at_turn: 0,
            rng_state: particle_id as u64,
        }
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.state > 0
    }

    #[inline(always)]
    pub fn update_delta(&mut self, new_delta: f64) {
        let rescale = (1.0 + new_delta) / (1.0 + self.delta);
        self.px *= rescale;
        self.py *= rescale;
        self.delta = new_delta;
    }
}

#[derive(Debug, Clone)]
pub struct Particles {
    pub reference: Reference,
    pub prtls: Vec<Particle>,
}

impl Particles {
    pub fn new(reference: Reference, num: usize) -> Particles {
        Particles {
            reference,
            prtls: (0..num as i64).map(Particle::new).collect(),
        }
    }

    pub fn gaussian(reference: Reference, beam: &BeamConfig) -> Particles {
        let mut prtls = Particles::new(reference, beam.num_particles);
        prtls.initialize_coordinates(beam);
        prtls.initialize_rng(beam.seed);
        prtls
    }

    fn initialize_coordinates(&mut self, beam: &BeamConfig) {
        let mut rng = StdRng::seed_from_u64(beam.seed);
        let sigmas = [
            beam.sigma_x,
            beam.sigma_px,
            beam.sigma_y,
            beam.sigma_py,
            beam.sigma_delta,
        ];
        for prtl in self.prtls.iter_mut() {
            let mut coords = [0.0; 5];
            for (c, sigma) in izip!(&mut coords, &sigmas) {
                let r: f64 = rng.sample(StandardNormal);
                *c = r * sigma;
            }
            prtl.x = coords[0];
            prtl.px = coords[1];
            prtl.y = coords[2];
            prtl.py = coords[3];
            prtl.delta = coords[4];
        }
    }

    fn initialize_rng(&mut self, seed: u64) {
        // separate stream from the coordinates so changing sigmas does not
        // reshuffle the photon sampling
        let mut rng = StdRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);
        for prtl in self.prtls.iter_mut() {
            prtl.rng_state = rng.gen();
        }
    }

    pub fn len(&self) -> usize {
        self.prtls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prtls.is_empty()
    }

    pub fn num_active(&self) -> usize {
        self.prtls.iter().filter(|p| p.is_active()).count()
    }

    pub fn particle_ids(&self) -> Vec<i64> {
        self.prtls.iter().map(|p| p.particle_id).collect()
    }
}
