use crate::{
    error::{KickError, TrackError},
    kick::{EmissionSideChannel, MultipoleKick, RadiationMode, ThinMultipole},
    prtls::{Particle, Particles, Reference},
    record::{NoRecords, RadiationRecord, RecordResolver},
    slice::{build_slice_kick, Capabilities, DerivedKick, SliceParameters},
    PRTL_CHUNK_SIZE,
};
use rayon::prelude::*;
use tracing::{debug, warn};

#[inline(always)]
// The taper is read before the integrator touches the particle.
pub fn apply_kick<K: MultipoleKick + ?Sized>(
    integrator: &K,
    kick: &DerivedKick,
    part: &mut Particle,
    reference: &Reference,
    record: Option<&dyn RadiationRecord>,
) -> Result<(), KickError> {
    let delta_taper = kick.taper_for(part);
    let mut side_channel = EmissionSideChannel::default();
    let args = kick.args(reference, delta_taper);
    integrator.kick(part, &args, &mut side_channel, record)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackReport {
    pub num_particles: usize,
    pub num_faulted: usize,
    pub recorded: bool,
}

pub struct SliceTracker<K = ThinMultipole, R = NoRecords> {
    integrator: K,
    resolver: R,
    capabilities: Capabilities,
}

impl Default for SliceTracker {
    fn default() -> Self {
        SliceTracker::new(ThinMultipole, NoRecords, Capabilities::default())
    }
}

impl<K: MultipoleKick, R: RecordResolver> SliceTracker<K, R> {
    pub fn new(integrator: K, resolver: R, capabilities: Capabilities) -> SliceTracker<K, R> {
        SliceTracker {
            integrator,
            resolver,
            capabilities,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn integrator(&self) -> &K {
        &self.integrator
    }

    pub fn track_slice(
        &self,
        params: &SliceParameters,
        particles: &mut Particles,
    ) -> Result<TrackReport, TrackError> {
        let (kick, record) =
            build_slice_kick(params, &self.capabilities, &self.resolver, particles)?;
        debug!(
            knl = kick.knl[1],
            ksl = kick.ksl[1],
            length = kick.effective_length,
            mode = ?kick.radiation_mode,
            recorded = record.is_some(),
            "derived slice kick"
        );
        if !cfg!(feature = "unchecked") {
            assert!(record.is_none() || kick.radiation_mode == RadiationMode::StochasticRecorded);
        }

        let reference = particles.reference;
        let integrator = &self.integrator;
        let kick = &kick;
        let run_chunk = |chunk: &mut [Particle]| -> Result<usize, KickError> {
            let mut faulted = 0;
            for part in chunk.iter_mut() {
                match apply_kick(integrator, kick, part, &reference, record) {
                    Ok(()) => {}
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(_) => faulted += 1,
                }
            }
            Ok(faulted)
        };

        let num_faulted = if self.capabilities.parallel {
            particles
                .prtls
                .par_chunks_mut(PRTL_CHUNK_SIZE)
                .map(&run_chunk)
                .try_reduce(|| 0, |a, b| Ok(a + b))?
        } else {
            particles
                .prtls
                .chunks_mut(PRTL_CHUNK_SIZE)
                .map(&run_chunk)
                .sum::<Result<usize, KickError>>()?
        };

        if num_faulted > 0 {
            warn!(num_faulted, "particles faulted in slice kick");
        }
        Ok(TrackReport {
            num_particles: particles.len(),
            num_faulted,
            recorded: record.is_some(),
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::kick::KickArgs;
    use crate::{build_test_particles, E_TOL};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Spy {
        calls: Mutex<Vec<(i64, f64, bool)>>,
    }

    impl MultipoleKick for Spy {
        fn kick(
            &self,
            part: &mut Particle,
            args: &KickArgs<'_>,
            side_channel: &mut EmissionSideChannel,
            record: Option<&dyn RadiationRecord>,
        ) -> Result<(), KickError> {
            assert_eq!(*side_channel, EmissionSideChannel::default());
            assert_eq!((args.offset_x, args.offset_y), (0.0, 0.0));
            self.calls
                .lock()
                .unwrap()
                .push((part.particle_id, args.delta_taper, record.is_some()));
            // dirty the channel: the next particle must still see zeros
            side_channel.dp_entry = 1.0;
            Ok(())
        }
    }

    struct Faulty {
        bad_id: i64,
        fatal: bool,
    }

    impl MultipoleKick for Faulty {
        fn kick(
            &self,
            part: &mut Particle,
            _: &KickArgs<'_>,
            _: &mut EmissionSideChannel,
            _: Option<&dyn RadiationRecord>,
        ) -> Result<(), KickError> {
            if part.particle_id != self.bad_id {
                part.px += 1.0;
                Ok(())
            } else if self.fatal {
                Err(KickError::CoefficientMismatch { knl: 2, ksl: 1 })
            } else {
                part.state = 0;
                Err(KickError::NonFinite {
                    particle_id: part.particle_id,
                })
            }
        }
    }

    #[test]
    fn every_particle_gets_a_fresh_side_channel() {
        let mut prtls = build_test_particles(3 * PRTL_CHUNK_SIZE + 5);
        let tracker = SliceTracker::new(Spy::default(), NoRecords, Capabilities::default());
        let report = tracker
            .track_slice(&SliceParameters::default(), &mut prtls)
            .unwrap();
        assert_eq!(report.num_particles, prtls.len());
        assert_eq!(tracker.integrator().calls.lock().unwrap().len(), prtls.len());
    }

    #[test]
    fn config_fault_touches_nothing() {
        let mut prtls = build_test_particles(4);
        let tracker = SliceTracker::new(Spy::default(), NoRecords, Capabilities::default());
        let params = SliceParameters {
            weight: 0.0,
            ..SliceParameters::default()
        };
        let err = tracker.track_slice(&params, &mut prtls).unwrap_err();
        assert_eq!(err, TrackError::Config(ConfigError::NonPositiveWeight(0.0)));
        assert!(tracker.integrator().calls.lock().unwrap().is_empty());
    }

    #[test]
    fn non_fatal_faults_are_counted() {
        let mut prtls = build_test_particles(10);
        let tracker = SliceTracker::new(
            Faulty {
                bad_id: 3,
                fatal: false,
            },
            NoRecords,
            Capabilities::default(),
        );
        let report = tracker
            .track_slice(&SliceParameters::default(), &mut prtls)
            .unwrap();
        assert_eq!(report.num_faulted, 1);
        assert_eq!(prtls.num_active(), 9);
        for p in prtls.prtls.iter().filter(|p| p.particle_id != 3) {
            assert!((p.px - 1.0).abs() < E_TOL);
        }
    }

    #[test]
    fn fatal_faults_abort() {
        let mut prtls = build_test_particles(10);
        for &parallel in &[true, false] {
            let tracker = SliceTracker::new(
                Faulty {
                    bad_id: 7,
                    fatal: true,
                },
                NoRecords,
                Capabilities {
                    parallel,
                    ..Capabilities::default()
                },
            );
            let err = tracker
                .track_slice(&SliceParameters::default(), &mut prtls)
                .unwrap_err();
            assert!(matches!(err, TrackError::Kick(KickError::CoefficientMismatch { .. })));
        }
    }

    #[test]
    fn default_tracker_kicks() {
        let mut prtls = build_test_particles(1);
        prtls.prtls[0].x = 0.1;
        let params = SliceParameters {
            k1: 0.3,
            length: 2.0,
            weight: 0.5,
            ..SliceParameters::default()
        };
        let tracker: SliceTracker = SliceTracker::default();
        tracker.track_slice(&params, &mut prtls).unwrap();
        // weight * knl = k1 * length
        assert!((prtls.prtls[0].px + 0.3 * 2.0 * 0.1).abs() < E_TOL);
    }
}
