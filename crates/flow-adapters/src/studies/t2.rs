//! Estudio T2: hereda la tabla MRI, redeclara la extracción de cerebro con
//! sus propios defaults de BET y agrega la máscara manual de
//! hiperintensidades.

use flow_core::{ArtifactSpec, Multiplicity, SpecTable};

use super::mri::BrainExtraction;
use crate::formats::NIFTI_GZ;

pub const TABLE: &str = "t2";

pub fn brain_extraction() -> BrainExtraction {
    BrainExtraction { robust: true,
                      f_threshold: 0.5,
                      reduce_bias: false }
}

/// Se compone después de `mri::table()`; las entradas de acá reemplazan a
/// las homónimas.
pub fn table() -> SpecTable {
    let overrides = super::mri::table_with(brain_extraction());
    let mut table = SpecTable::new(TABLE);
    for name in ["brain", "brain_mask"] {
        if let Some(spec) = overrides.get(name) {
            table = table.with(spec.clone());
        }
    }
    table.with(ArtifactSpec::primary("manual_wmh_mask", &NIFTI_GZ, Multiplicity::Session)
               .with_description("Manually drawn white matter hyperintensity mask"))
}
