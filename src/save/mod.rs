use crate::{prtls::Particles, record::RecordRegistry, Output};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

fn save_coord<F>(prtls: &Particles, stride: usize, dir: &Path, name: &str, get: F) -> Result<()>
where
    F: Fn(&crate::prtls::Particle) -> f64,
{
    let data: Vec<f64> = prtls.prtls.iter().step_by(stride).map(get).collect();
    npy::to_file(dir.join(format!("{}.npy", name)), data)
        .context(format!("Could not save {} data to file", name))?;
    Ok(())
}

pub fn save_output(index: u32, cfg: &Output, prtls: &Particles) -> Result<PathBuf> {
    let stride = cfg.stride.max(1);
    let output_prefix = Path::new(&cfg.output_dir).join(format!("dat_{:05}", index));
    std::fs::create_dir_all(&output_prefix).context("Unable to create output directory")?;
    info!(dir = %output_prefix.display(), "saving prtls");

    save_coord(prtls, stride, &output_prefix, "x", |p| p.x)?;
    save_coord(prtls, stride, &output_prefix, "px", |p| p.px)?;
    save_coord(prtls, stride, &output_prefix, "y", |p| p.y)?;
    save_coord(prtls, stride, &output_prefix, "py", |p| p.py)?;
    save_coord(prtls, stride, &output_prefix, "zeta", |p| p.zeta)?;
    save_coord(prtls, stride, &output_prefix, "delta", |p| p.delta)?;

    let state: Vec<i64> = prtls.prtls.iter().step_by(stride).map(|p| p.state).collect();
    npy::to_file(output_prefix.join("state.npy"), state)
        .context("Could not save particle state to file")?;

    Ok(output_prefix)
}

pub fn save_records(cfg: &Output, registry: &RecordRegistry) -> Result<()> {
    let dir = Path::new(&cfg.output_dir);
    std::fs::create_dir_all(dir).context("Unable to create output directory")?;
    for (id, record) in registry.iter() {
        info!(
            id,
            capacity = record.capacity(),
            recorded = record.num_recorded(),
            dropped = record.num_dropped(),
            "saving radiation record"
        );
        npy::to_file(dir.join(format!("record_{}.npy", id)), record.events())
            .context(format!("Could not save radiation record {}", id))?;
    }
    Ok(())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::build_test_particles;
    use crate::record::{PhotonEvent, RadiationRecord};

    fn test_output(dir: &Path) -> Output {
        Output {
            write_output: true,
            output_dir: dir.to_string_lossy().into_owned(),
            output_interval: 1,
            stride: 2,
            record_capacity: 4,
        }
    }

    #[test]
    fn writes_strided_coordinates() {
        let dir = std::env::temp_dir().join(format!("quadslice_save_{}", std::process::id()));
        let mut prtls = build_test_particles(5);
        for (i, p) in prtls.prtls.iter_mut().enumerate() {
            p.x = i as f64;
        }
        let prefix = save_output(3, &test_output(&dir), &prtls).unwrap();
        assert!(prefix.ends_with("dat_00003"));

        let bytes = std::fs::read(prefix.join("x.npy")).unwrap();
        let x: Vec<f64> = npy::NpyData::from_bytes(&bytes).unwrap().to_vec();
        assert_eq!(x, vec![0.0, 2.0, 4.0]);
        for name in &["px", "y", "py", "zeta", "delta", "state"] {
            assert!(prefix.join(format!("{}.npy", name)).exists());
        }

        let mut registry = RecordRegistry::new();
        let rec = registry.start_internal_logging(0, 4);
        rec.append(PhotonEvent {
            photon_energy: 1.0,
            at_element: 0,
            at_turn: 0,
            particle_id: 0,
            particle_delta: 0.0,
        });
        save_records(&test_output(&dir), &registry).unwrap();
        assert!(dir.join("record_0.npy").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
