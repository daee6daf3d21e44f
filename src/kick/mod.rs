use crate::{
    error::KickError,
    prtls::{Particle, Reference},
    record::RadiationRecord,
};
use serde::Deserialize;

pub mod multipole;
pub mod synrad;

pub use multipole::ThinMultipole;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RadiationMode {
    Off,
    MeanLoss,
    StochasticRecorded,
}

impl Default for RadiationMode {
    fn default() -> Self {
        RadiationMode::Off
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EmissionSideChannel {
    pub dp_entry: f64,
    pub dpx_entry: f64,
    pub dpy_entry: f64,
    pub dp_exit: f64,
    pub dpx_exit: f64,
    pub dpy_exit: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct KickArgs<'a> {
    pub offset_x: f64,
    pub offset_y: f64,
    pub length: f64,
    pub weight: f64,
    pub knl: &'a [f64],
    pub ksl: &'a [f64],
    pub backtrack_sign: f64,
    pub delta_taper: f64,
    pub radiation_mode: RadiationMode,
    pub reference: &'a Reference,
}

impl<'a> KickArgs<'a> {
    pub fn thin(reference: &'a Reference, knl: &'a [f64], ksl: &'a [f64]) -> KickArgs<'a> {
        KickArgs {
            offset_x: 0.0,
            offset_y: 0.0,
            length: 0.0,
            weight: 1.0,
            knl,
            ksl,
            backtrack_sign: 1.0,
            delta_taper: 0.0,
            radiation_mode: RadiationMode::Off,
            reference,
        }
    }
}

// Deterministic for identical inputs, called concurrently on distinct particles.
pub trait MultipoleKick: Sync {
    fn kick(
        &self,
        part: &mut Particle,
        args: &KickArgs<'_>,
        side_channel: &mut EmissionSideChannel,
        record: Option<&dyn RadiationRecord>,
    ) -> Result<(), KickError>;
}

impl<K: MultipoleKick + ?Sized> MultipoleKick for &K {
    fn kick(
        &self,
        part: &mut Particle,
        args: &KickArgs<'_>,
        side_channel: &mut EmissionSideChannel,
        record: Option<&dyn RadiationRecord>,
    ) -> Result<(), KickError> {
        (**self).kick(part, args, side_channel, record)
    }
}
