#[macro_use]
extern crate log;

pub mod bsdf;
pub mod camera;
pub mod color;
pub mod film;
pub mod geometry;
pub mod index;
pub mod math;
pub mod output;
pub mod prelude;
pub mod scene;
pub mod technique;
pub mod tracer;

pub use color::{DoubleRgb, RGBColor};

use technique::{
    BiasedGather, BptBase, FixedBeta, PathTracing, Technique, UnbiasedGather, UpgBase,
    VariableBeta,
};

/// Parameters shared by the estimator constructors.
#[derive(Debug, Clone)]
pub struct TechniqueSettings {
    pub min_subpath: usize,
    pub roulette: f32,
    pub num_photons: usize,
    pub num_gather: usize,
    pub radius: f32,
    pub beta: f32,
}

impl Default for TechniqueSettings {
    fn default() -> Self {
        TechniqueSettings {
            min_subpath: 3,
            roulette: 0.75,
            num_photons: 100_000,
            num_gather: 100,
            radius: 0.02,
            beta: 1.0,
        }
    }
}

/// Resolve a technique name from the CLI into an estimator. This is the
/// only place runtime dispatch happens; everything inside the returned
/// object is static.
pub fn technique_from_name(
    name: &str,
    settings: &TechniqueSettings,
) -> Result<Box<dyn Technique>, String> {
    let s = settings;
    let t: Box<dyn Technique> = match name {
        "PT" => Box::new(PathTracing::new(s.min_subpath, s.roulette)),
        "BPT0" => Box::new(BptBase::new(s.min_subpath, s.roulette, FixedBeta::<0>)),
        "BPT1" => Box::new(BptBase::new(s.min_subpath, s.roulette, FixedBeta::<1>)),
        "BPT2" => Box::new(BptBase::new(s.min_subpath, s.roulette, FixedBeta::<2>)),
        "BPTb" => Box::new(BptBase::new(
            s.min_subpath,
            s.roulette,
            VariableBeta::new(s.beta),
        )),
        "VCM0" => Box::new(UpgBase::<_, BiasedGather>::new(
            s.min_subpath,
            s.roulette,
            s.num_photons,
            s.num_gather,
            s.radius,
            FixedBeta::<0>,
        )),
        "VCM1" => Box::new(UpgBase::<_, BiasedGather>::new(
            s.min_subpath,
            s.roulette,
            s.num_photons,
            s.num_gather,
            s.radius,
            FixedBeta::<1>,
        )),
        "VCM2" => Box::new(UpgBase::<_, BiasedGather>::new(
            s.min_subpath,
            s.roulette,
            s.num_photons,
            s.num_gather,
            s.radius,
            FixedBeta::<2>,
        )),
        "VCMb" => Box::new(UpgBase::<_, BiasedGather>::new(
            s.min_subpath,
            s.roulette,
            s.num_photons,
            s.num_gather,
            s.radius,
            VariableBeta::new(s.beta),
        )),
        "UPG" => Box::new(UpgBase::<_, UnbiasedGather>::new(
            s.min_subpath,
            s.roulette,
            s.num_photons,
            s.num_gather,
            s.radius,
            FixedBeta::<1>,
        )),
        _ => return Err(format!("unknown technique \"{}\"", name)),
    };
    Ok(t)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_every_listed_technique_resolves() {
        let settings = TechniqueSettings::default();
        for name in [
            "PT", "BPT0", "BPT1", "BPT2", "BPTb", "VCM0", "VCM1", "VCM2", "VCMb", "UPG",
        ] {
            let technique = technique_from_name(name, &settings).unwrap();
            assert!(!technique.name().is_empty());
        }
        assert!(technique_from_name("MLT", &settings).is_err());
    }
}
