//! Estudios concretos y sus constructores.

pub mod mri;
pub mod t2;

use std::sync::Arc;

use flow_core::{Archive, FlowResult, OptionSet, Study, StudySchema};

use crate::converters::ConverterTable;

pub const MRI_STUDY: &str = "mri";
pub const T2_STUDY: &str = "t2";

pub fn mri_schema() -> FlowResult<StudySchema> {
    StudySchema::compose(MRI_STUDY, [mri::table()])
}

pub fn t2_schema() -> FlowResult<StudySchema> {
    StudySchema::compose(T2_STUDY, [mri::table(), t2::table()])
}

/// Nombres de estudio reconocidos por `study_by_name`.
pub fn known() -> [&'static str; 2] {
    [MRI_STUDY, T2_STUDY]
}

pub fn schema_by_name(name: &str) -> Option<FlowResult<StudySchema>> {
    match name {
        MRI_STUDY => Some(mri_schema()),
        T2_STUDY => Some(t2_schema()),
        _ => None,
    }
}

fn assemble(schema: StudySchema, project_id: &str, archive: Arc<dyn Archive>, options: OptionSet) -> Study {
    let name = schema.name().to_string();
    Study::new(name,
               project_id,
               Arc::new(schema),
               archive,
               Arc::new(ConverterTable::standard())).with_options(options)
}

pub fn mri_study(project_id: &str, archive: Arc<dyn Archive>, options: OptionSet) -> FlowResult<Study> {
    Ok(assemble(mri_schema()?, project_id, archive, options))
}

pub fn t2_study(project_id: &str, archive: Arc<dyn Archive>, options: OptionSet) -> FlowResult<Study> {
    Ok(assemble(t2_schema()?, project_id, archive, options))
}

/// Construye el estudio `name` o `None` si no es un estudio conocido.
pub fn study_by_name(name: &str,
                     project_id: &str,
                     archive: Arc<dyn Archive>,
                     options: OptionSet)
                     -> Option<FlowResult<Study>> {
    schema_by_name(name).map(|schema| schema.map(|s| assemble(s, project_id, archive, options)))
}
