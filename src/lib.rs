use serde::Deserialize;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

pub mod error;
pub mod kick;
pub mod prtls;
pub mod record;
pub mod save;
pub mod slice;

pub use error::{ConfigError, KickError, TrackError};
pub use kick::{EmissionSideChannel, KickArgs, MultipoleKick, RadiationMode, ThinMultipole};
pub use prtls::{Particle, Particles, Reference};
pub use record::{
    NoRecords, PhotonEvent, RadiationRecord, RecordId, RecordRegistry, RecordResolver,
    SynchrotronRadiationRecord,
};
pub use slice::{
    apply_kick, build_slice_kick, Capabilities, DerivedKick, SliceParameters, SliceTracker, Taper,
    TrackReport,
};

// Particles handed to one rayon task at a time.
pub const PRTL_CHUNK_SIZE: usize = 512;

#[derive(Deserialize)]
pub struct Config {
    pub reference: ReferenceConfig,
    pub beam: BeamConfig,
    #[serde(default)]
    pub capabilities: Capabilities,
    pub setup: Setup,
    pub output: Output,
    pub slices: Vec<SliceConfig>,
}

fn default_charge() -> f64 {
    1.0
}

#[derive(Deserialize)]
pub struct ReferenceConfig {
    pub p0c: f64,   // eV
    pub mass0: f64, // eV
    #[serde(default = "default_charge")]
    pub q0: f64,
}

#[derive(Deserialize)]
pub struct BeamConfig {
    pub num_particles: usize,
    pub sigma_x: f64,
    pub sigma_px: f64,
    pub sigma_y: f64,
    pub sigma_py: f64,
    pub sigma_delta: f64,
    pub seed: u64,
}

#[derive(Deserialize)]
pub struct Setup {
    pub num_turns: u32,
    #[serde(default)]
    pub backtrack: bool,
}

fn default_output_dir() -> String {
    "output".to_string()
}

#[derive(Deserialize)]
pub struct Output {
    pub write_output: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    pub output_interval: u32,
    pub stride: usize,
    pub record_capacity: usize,
}

// taper = 0.001 or taper = "derived"
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TaperConfig {
    Value(f64),
    Name(String),
}

impl Default for TaperConfig {
    fn default() -> Self {
        TaperConfig::Value(0.0)
    }
}

#[derive(Deserialize)]
pub struct SliceConfig {
    pub weight: f64,
    pub k1: f64,
    #[serde(default)]
    pub k1s: f64,
    pub length: f64,
    #[serde(default)]
    pub radiation_mode: RadiationMode,
    #[serde(default)]
    pub taper: TaperConfig,
    #[serde(default)]
    pub record: bool,
}

impl SliceConfig {
    pub fn to_params(&self, record_id: RecordId) -> Result<SliceParameters, ConfigError> {
        let taper = match &self.taper {
            TaperConfig::Value(v) => Taper::Fixed(*v),
            TaperConfig::Name(name) if name == "derived" => Taper::Derived,
            TaperConfig::Name(name) => return Err(ConfigError::UnknownTaper(name.clone())),
        };
        Ok(SliceParameters {
            weight: self.weight,
            k1: self.k1,
            k1s: self.k1s,
            length: self.length,
            radiation_mode: self.radiation_mode,
            taper,
            backtrack: false,
            record_id: if self.record { Some(record_id) } else { None },
        })
    }
}

impl Config {
    pub fn new() -> Result<Config> {
        Config::from_file("config.toml")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Could not open the {} file", path.display()))?;
        Config::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Config> {
        toml::from_str(contents).with_context(|| "Could not parse Config file")
    }

    pub fn slice_params(&self) -> Result<Vec<SliceParameters>> {
        self.slices
            .iter()
            .enumerate()
            .map(|(i, s)| {
                s.to_params(i)
                    .with_context(|| format!("Invalid slice number {}", i))
            })
            .collect()
    }
}

pub fn track_turn<K: MultipoleKick, R: RecordResolver>(
    tracker: &SliceTracker<K, R>,
    slices: &[SliceParameters],
    prtls: &mut Particles,
    backtrack: bool,
) -> Result<usize> {
    let mut num_faulted = 0;
    if backtrack {
        for p in prtls.prtls.iter_mut().filter(|p| p.is_active()) {
            p.at_turn -= 1;
        }
        for (i, params) in slices.iter().enumerate().rev() {
            set_at_element(prtls, i);
            let report = tracker
                .track_slice(&params.reversed(), prtls)
                .with_context(|| format!("Backtracking slice {} failed", i))?;
            num_faulted += report.num_faulted;
        }
    } else {
        for (i, params) in slices.iter().enumerate() {
            set_at_element(prtls, i);
            let report = tracker
                .track_slice(params, prtls)
                .with_context(|| format!("Tracking slice {} failed", i))?;
            num_faulted += report.num_faulted;
        }
        for p in prtls.prtls.iter_mut().filter(|p| p.is_active()) {
            p.at_turn += 1;
        }
    }
    Ok(num_faulted)
}

fn set_at_element(prtls: &mut Particles, element: usize) {
    for p in prtls.prtls.iter_mut().filter(|p| p.is_active()) {
        p.at_element = element as i64;
    }
}

// Index of the dump written after the last turn, one past the periodic ones.
fn output_index_after(num_turns: u32, output_interval: u32) -> u32 {
    if num_turns == 0 {
        0
    } else {
        (num_turns - 1) / output_interval + 1
    }
}

pub fn run(cfg: Config) -> Result<()> {
    if cfg.slices.is_empty() {
        return Err(anyhow::Error::msg(
            "At least one [[slices]] entry is required",
        ));
    }
    if cfg.output.output_interval == 0 {
        return Err(anyhow::Error::msg("output_interval must be positive"));
    }
    let slices = cfg.slice_params()?;

    let mut registry = RecordRegistry::new();
    for (i, slice) in cfg.slices.iter().enumerate() {
        if slice.record {
            registry.start_internal_logging(i, cfg.output.record_capacity);
        }
    }

    info!(num = cfg.beam.num_particles, "initializing prtls");
    let mut prtls = Particles::gaussian(Reference::from(&cfg.reference), &cfg.beam);
    let tracker = SliceTracker::new(ThinMultipole, registry, cfg.capabilities);

    for t in 0..cfg.setup.num_turns {
        if cfg.output.write_output && t % cfg.output.output_interval == 0 {
            save::save_output(t / cfg.output.output_interval, &cfg.output, &prtls)?;
        }
        let num_faulted = track_turn(&tracker, &slices, &mut prtls, cfg.setup.backtrack)?;
        info!(turn = t, active = prtls.num_active(), num_faulted, "tracked turn");
    }

    if cfg.output.write_output {
        let last = output_index_after(cfg.setup.num_turns, cfg.output.output_interval);
        save::save_output(last, &cfg.output, &prtls)?;
        save::save_records(&cfg.output, tracker.resolver())?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) const E_TOL: f64 = 1e-12;

#[cfg(test)]
pub(crate) fn build_test_particles(num: usize) -> Particles {
    let reference = Reference {
        p0c: 5e9,
        mass0: kick::synrad::ELECTRON_MASS_EV,
        q0: 1.0,
    };
    Particles::new(reference, num)
}
