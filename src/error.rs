use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("slice weight must be strictly positive, got {0}")]
    NonPositiveWeight(f64),

    #[error("slice parameter `{name}` must be finite, got {value}")]
    NonFiniteParameter { name: &'static str, value: f64 },

    #[error("unknown taper `{0}`, expected a number or \"derived\"")]
    UnknownTaper(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KickError {
    #[error("particle {particle_id} produced non-finite coordinates")]
    NonFinite { particle_id: i64 },

    #[error("knl has {knl} coefficients but ksl has {ksl}")]
    CoefficientMismatch { knl: usize, ksl: usize },
}

impl KickError {
    pub fn is_fatal(&self) -> bool {
        match self {
            KickError::NonFinite { .. } => false,
            KickError::CoefficientMismatch { .. } => true,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    #[error("invalid slice configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("integrator aborted the batch: {0}")]
    Kick(#[from] KickError),
}
