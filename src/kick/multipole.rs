use crate::{
    error::KickError,
    kick::{
        synrad::{radiate_half, Side},
        EmissionSideChannel, KickArgs, MultipoleKick,
    },
    prtls::{Particle, LOST_NON_FINITE},
    record::RadiationRecord,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct ThinMultipole;

impl ThinMultipole {
    #[inline(always)]
    pub fn field_kick(part: &Particle, args: &KickArgs<'_>) -> (f64, f64) {
        let order = args.knl.len() - 1;
        let zre = part.x - args.offset_x;
        let zim = part.y - args.offset_y;

        let mut inv_factorial = 1.0;
        for n in 1..=order {
            inv_factorial /= n as f64;
        }

        // Horner from the highest order down
        let mut b_re = args.knl[order] * inv_factorial;
        let mut b_im = args.ksl[order] * inv_factorial;
        for n in (0..order).rev() {
            inv_factorial *= (n + 1) as f64;
            let re = b_re * zre - b_im * zim + args.knl[n] * inv_factorial;
            let im = b_re * zim + b_im * zre + args.ksl[n] * inv_factorial;
            b_re = re;
            b_im = im;
        }

        let factor = part.chi * args.weight * (1.0 + args.delta_taper);
        (-factor * b_re, factor * b_im)
    }
}

impl MultipoleKick for ThinMultipole {
    fn kick(
        &self,
        part: &mut Particle,
        args: &KickArgs<'_>,
        side_channel: &mut EmissionSideChannel,
        record: Option<&dyn RadiationRecord>,
    ) -> Result<(), KickError> {
        if args.knl.len() != args.ksl.len() || args.knl.is_empty() {
            return Err(KickError::CoefficientMismatch {
                knl: args.knl.len(),
                ksl: args.ksl.len(),
            });
        }
        if !part.is_active() {
            return Ok(());
        }

        let (dpx, dpy) = ThinMultipole::field_kick(part, args);

        radiate_half(part, args, dpx, dpy, Side::Entry, side_channel, record);
        part.px += dpx;
        part.py += dpy;
        radiate_half(part, args, dpx, dpy, Side::Exit, side_channel, record);

        if !(part.px.is_finite() && part.py.is_finite() && part.delta.is_finite()) {
            part.state = LOST_NON_FINITE;
            return Err(KickError::NonFinite {
                particle_id: part.particle_id,
            });
        }
        Ok(())
    }
}
