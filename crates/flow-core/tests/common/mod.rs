#![allow(dead_code)]
//! Estudio mínimo para los tests de integración del core.
//!
//! primary ─prep→ preproc ─extract→ brain ─mean→ mean_brain (sujeto)
//!                                        ├─qc→ qc (visita)
//!                                        └─template→ template (proyecto)

use std::sync::Arc;

use flow_core::{Archive, ArtifactSpec, FileFormat, FlowResult, FormatConverter, InMemoryArchive, Interface, Multiplicity,
                Node, NodeId, NodeKind, OptionSet, Project, Resources, SpecTable, StepBuilder, StepDeclaration,
                StepFactory, StepSpec, Study, StudySchema};

pub const STUDY: &str = "S";
pub const PROJECT: &str = "P";

pub fn nifti() -> FileFormat {
    FileFormat::new("nifti", ".nii")
}

pub fn nifti_gz() -> FileFormat {
    FileFormat::new("nifti_gz", ".nii.gz")
}

#[derive(Debug)]
pub struct MrConvert;

impl FormatConverter for MrConvert {
    fn convert(&self, artifact: &str, from: &FileFormat, to: &FileFormat, node: NodeId) -> FlowResult<Node> {
        Ok(Node::new(node,
                     NodeKind::Conversion { artifact: artifact.to_string(),
                                            from: from.clone(),
                                            to: to.clone(),
                                            tool: "mrconvert".into() }))
    }
}

/// Step de un solo nodo: todos los inputs entran a `{name}_main` y todos los
/// outputs salen de él. `join` elige el tipo de nodo.
#[derive(Debug, Clone)]
pub struct SimpleStep {
    pub name: &'static str,
    pub inputs: Vec<(&'static str, FileFormat)>,
    pub outputs: Vec<(&'static str, FileFormat)>,
    pub defaults: Vec<(&'static str, serde_json::Value)>,
    pub join: Option<Multiplicity>,
}

impl SimpleStep {
    pub fn new(name: &'static str) -> Self {
        Self { name,
               inputs: vec![],
               outputs: vec![],
               defaults: vec![],
               join: None }
    }

    pub fn input(mut self, name: &'static str, format: FileFormat) -> Self {
        self.inputs.push((name, format));
        self
    }

    pub fn output(mut self, name: &'static str, format: FileFormat) -> Self {
        self.outputs.push((name, format));
        self
    }

    pub fn default(mut self, key: &'static str, value: serde_json::Value) -> Self {
        self.defaults.push((key, value));
        self
    }

    pub fn join(mut self, level: Multiplicity) -> Self {
        self.join = Some(level);
        self
    }

    pub fn declaration(&self) -> StepDeclaration {
        let mut decl = StepDeclaration::new(self.name).description(format!("{} step", self.name));
        for (n, f) in &self.inputs {
            decl = decl.input(*n, f);
        }
        for (n, f) in &self.outputs {
            decl = decl.output(*n, f);
        }
        for (k, v) in &self.defaults {
            decl = decl.default_option(*k, v.clone());
        }
        decl
    }
}

impl StepFactory for SimpleStep {
    fn name(&self) -> &str {
        self.name
    }

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec> {
        let mut b = StepBuilder::new(study, self.declaration(), options)?;
        let iface = Interface::new(format!("test.{}", self.name));
        let main = match self.join {
            Some(Multiplicity::Subject) => {
                b.create_join_sessions_node("main", iface, &["in_files"], Resources::default())?
            }
            Some(Multiplicity::Visit) | Some(Multiplicity::Project) => {
                b.create_join_subjects_node("main", iface, &["in_files"], Resources::default())?
            }
            _ => b.create_node("main", iface, Resources::default())?,
        };
        for (n, _) in &self.inputs {
            b.connect_input(n, &main, n)?;
        }
        for (n, _) in &self.outputs {
            b.connect_output(n, &main, n)?;
        }
        b.build()
    }
}

pub fn prep() -> SimpleStep {
    SimpleStep::new("prep").input("primary", nifti())
                           .output("preproc", nifti())
                           .default("smooth", serde_json::json!(2))
}

pub fn extract() -> SimpleStep {
    SimpleStep::new("extract").input("preproc", nifti())
                              .output("brain", nifti())
                              .default("threshold", serde_json::json!(0.5))
}

pub fn base_table() -> SpecTable {
    let prep: Arc<dyn StepFactory> = Arc::new(prep());
    let extract: Arc<dyn StepFactory> = Arc::new(extract());
    let mean: Arc<dyn StepFactory> = Arc::new(SimpleStep::new("mean").input("brain", nifti())
                                                                    .output("mean_brain", nifti())
                                                                    .join(Multiplicity::Subject));
    let qc: Arc<dyn StepFactory> = Arc::new(SimpleStep::new("qc").input("brain", nifti())
                                                                .output("qc", nifti())
                                                                .join(Multiplicity::Visit));
    let template: Arc<dyn StepFactory> = Arc::new(SimpleStep::new("template").input("brain", nifti())
                                                                            .output("template", nifti())
                                                                            .join(Multiplicity::Project));
    let summary: Arc<dyn StepFactory> = Arc::new(SimpleStep::new("summary").input("mean_brain", nifti())
                                                                          .input("qc", nifti())
                                                                          .output("summary", nifti()));
    SpecTable::new("base").with(ArtifactSpec::primary("primary", &nifti_gz(), Multiplicity::Session))
                          .with(ArtifactSpec::derived("preproc", &nifti(), Multiplicity::Session, prep))
                          .with(ArtifactSpec::derived("brain", &nifti(), Multiplicity::Session, extract))
                          .with(ArtifactSpec::derived("mean_brain", &nifti(), Multiplicity::Subject, mean))
                          .with(ArtifactSpec::derived("qc", &nifti(), Multiplicity::Visit, qc))
                          .with(ArtifactSpec::derived("template", &nifti(), Multiplicity::Project, template))
                          .with(ArtifactSpec::derived("summary", &nifti(), Multiplicity::Session, summary))
}

/// Dos dependientes de `prep` que lo piden con opciones distintas.
pub fn conflict_table() -> SpecTable {
    let left: Arc<dyn StepFactory> = Arc::new(SimpleStep::new("left").input("preproc", nifti())
                                                                    .output("left_out", nifti())
                                                                    .default("smooth", serde_json::json!(2)));
    let right: Arc<dyn StepFactory> = Arc::new(SimpleStep::new("right").input("preproc", nifti())
                                                                      .output("right_out", nifti())
                                                                      .default("smooth", serde_json::json!(4)));
    let combine: Arc<dyn StepFactory> = Arc::new(SimpleStep::new("combine").input("left_out", nifti())
                                                                          .input("right_out", nifti())
                                                                          .output("combined", nifti()));
    SpecTable::new("conflict").with(ArtifactSpec::derived("left_out", &nifti(), Multiplicity::Session, left))
                              .with(ArtifactSpec::derived("right_out", &nifti(), Multiplicity::Session, right))
                              .with(ArtifactSpec::derived("combined", &nifti(), Multiplicity::Session, combine))
}

/// `ping` necesita `pong_out` y `pong` necesita `ping_out`.
pub fn cyclic_table() -> SpecTable {
    let ping: Arc<dyn StepFactory> = Arc::new(SimpleStep::new("ping").input("pong_out", nifti())
                                                                    .output("ping_out", nifti()));
    let pong: Arc<dyn StepFactory> = Arc::new(SimpleStep::new("pong").input("ping_out", nifti())
                                                                    .output("pong_out", nifti()));
    SpecTable::new("cyclic").with(ArtifactSpec::derived("ping_out", &nifti(), Multiplicity::Session, ping))
                            .with(ArtifactSpec::derived("pong_out", &nifti(), Multiplicity::Session, pong))
}

/// Proyecto 2 sujetos × 2 visitas con `primary` archivado en todas las sesiones.
pub fn grid_with_primary() -> Project {
    let mut project = Project::grid(PROJECT, &["A", "B"], &["1", "2"]);
    for r in project.session_refs().collect::<Vec<_>>() {
        project.mark_session(&r.subject_id, &r.visit_id, "primary");
    }
    project
}

pub fn study_with(project: Project, tables: Vec<SpecTable>) -> Study {
    let schema = StudySchema::compose(STUDY, tables).expect("schema");
    let archive: Arc<dyn Archive> = Arc::new(InMemoryArchive::new().with_project(project));
    Study::new(STUDY, PROJECT, Arc::new(schema), archive, Arc::new(MrConvert))
}

pub fn study(project: Project) -> Study {
    study_with(project, vec![base_table()])
}
