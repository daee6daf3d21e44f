use crate::{
    error::ConfigError,
    kick::{KickArgs, RadiationMode},
    prtls::{Particle, Particles, Reference},
    record::{RadiationRecord, RecordId, RecordResolver},
};
use serde::Deserialize;

pub mod tracker;

pub use tracker::{apply_kick, SliceTracker, TrackReport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Taper {
    Fixed(f64),
    Derived,
}

impl Default for Taper {
    fn default() -> Self {
        Taper::Fixed(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliceParameters {
    pub weight: f64,
    pub k1: f64,
    pub k1s: f64,
    pub length: f64, // m
    pub radiation_mode: RadiationMode,
    pub taper: Taper,
    pub backtrack: bool,
    pub record_id: Option<RecordId>,
}

impl Default for SliceParameters {
    fn default() -> Self {
        SliceParameters {
            weight: 1.0,
            k1: 0.0,
            k1s: 0.0,
            length: 0.0,
            radiation_mode: RadiationMode::Off,
            taper: Taper::default(),
            backtrack: false,
            record_id: None,
        }
    }
}

impl SliceParameters {
    pub fn reversed(&self) -> SliceParameters {
        SliceParameters {
            backtrack: !self.backtrack,
            ..self.clone()
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Capabilities {
    #[serde(default = "default_true")]
    pub radiation: bool,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            radiation: true,
            parallel: true,
        }
    }
}

impl Capabilities {
    pub fn resolve_radiation(&self, requested: RadiationMode) -> RadiationMode {
        if self.radiation {
            requested
        } else {
            RadiationMode::Off
        }
    }

    pub fn resolve_taper(&self, requested: Taper) -> Taper {
        match requested {
            Taper::Derived => Taper::Derived,
            Taper::Fixed(_) if !self.radiation => Taper::Fixed(0.0),
            fixed => fixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedKick {
    pub effective_length: f64,
    pub backtrack_sign: f64,
    pub weight: f64,
    pub knl: [f64; 2],
    pub ksl: [f64; 2],
    pub radiation_mode: RadiationMode,
    pub taper: Taper,
}

// knl, ksl are divided by the weight and the integrator multiplies it back,
// so the slices of one parent only add up when sum(weight) == 1. Not checked.
impl DerivedKick {
    pub fn new(params: &SliceParameters, caps: &Capabilities) -> Result<DerivedKick, ConfigError> {
        // also rejects NaN
        if !(params.weight > 0.0) {
            return Err(ConfigError::NonPositiveWeight(params.weight));
        }
        for &(name, value) in &[
            ("k1", params.k1),
            ("k1s", params.k1s),
            ("length", params.length),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteParameter { name, value });
            }
        }
        if let Taper::Fixed(value) = params.taper {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteParameter {
                    name: "taper",
                    value,
                });
            }
        }

        let (effective_length, backtrack_sign) = if params.backtrack {
            (-params.length, -1.0)
        } else {
            (params.length, 1.0)
        };

        Ok(DerivedKick {
            effective_length,
            backtrack_sign,
            weight: params.weight,
            knl: [0.0, params.k1 * effective_length / params.weight],
            ksl: [0.0, params.k1s * effective_length / params.weight],
            radiation_mode: caps.resolve_radiation(params.radiation_mode),
            taper: caps.resolve_taper(params.taper),
        })
    }

    #[inline(always)]
    pub fn taper_for(&self, part: &Particle) -> f64 {
        match self.taper {
            Taper::Fixed(value) => value,
            Taper::Derived => part.delta,
        }
    }

    #[inline(always)]
    pub fn args<'a>(&'a self, reference: &'a Reference, delta_taper: f64) -> KickArgs<'a> {
        KickArgs {
            offset_x: 0.0,
            offset_y: 0.0,
            length: self.effective_length,
            weight: self.weight,
            knl: &self.knl,
            ksl: &self.ksl,
            backtrack_sign: self.backtrack_sign,
            delta_taper,
            radiation_mode: self.radiation_mode,
            reference,
        }
    }
}

pub fn build_slice_kick<'r, R: RecordResolver + ?Sized>(
    params: &SliceParameters,
    caps: &Capabilities,
    resolver: &'r R,
    particles: &Particles,
) -> Result<(DerivedKick, Option<&'r dyn RadiationRecord>), ConfigError> {
    let kick = DerivedKick::new(params, caps)?;
    let record = if kick.radiation_mode == RadiationMode::StochasticRecorded {
        resolver.resolve(params, particles)
    } else {
        None
    };
    Ok((kick, record))
}
