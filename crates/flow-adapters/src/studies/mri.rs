//! Estudio de MRI estructural.
//!
//! primary (dicom) ─preproc→ preproc ─brain_extraction→ brain, brain_mask
//! brain ─linear_coreg→ coreg_brain, coreg_matrix (contra coreg_ref_brain)
//! brain ─segmentation→ wm_seg
//! primary ─header_info→ dcm_info
//! brain ─subject_mean→ mean_brain (por sujeto)
//! brain ─visit_qc→ brain_qc (por visita)
//! brain ─brain_template→ template (proyecto)

use serde_json::Value;
use std::sync::Arc;

use flow_core::{ArtifactSpec, FlowError, FlowResult, Interface, Multiplicity, OptionSet, Resources, SpecTable, StepBuilder,
                StepDeclaration, StepFactory, StepSpec, Study};

use crate::formats::{DICOM, GIF, NIFTI_GZ, TEXT, TEXT_MATRIX};

pub const TABLE: &str = "mri";

const FSL_CITE: &str = "Jenkinson M, et al. FSL. NeuroImage 62:782-90, 2012";
const BET_CITE: &str = "Smith SM. Fast robust automated brain extraction. HBM 17:143-155, 2002";
const MRTRIX_CITE: &str = "Tournier J-D, et al. MRtrix3. NeuroImage 202:116137, 2019";
const ANTS_CITE: &str = "Avants BB, et al. A reproducible evaluation of ANTs. NeuroImage 54:2033-44, 2011";

const FSL_REQ: &str = "fsl>=5.0.9";
const MRTRIX_REQ: &str = "mrtrix>=3.0";
const ANTS_REQ: &str = "ants>=2.0";

fn opt(b: &StepBuilder, key: &str) -> Value {
    b.option(key).cloned().unwrap_or(Value::Null)
}

/// Reorientación estándar y, si `preproc_resolution` no es null, remuestreo.
#[derive(Debug)]
pub struct Preproc;

impl StepFactory for Preproc {
    fn name(&self) -> &str {
        "preproc"
    }

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec> {
        let decl = StepDeclaration::new(self.name()).description("Swap dimensions into standard orientation")
                                                    .input("primary", &NIFTI_GZ)
                                                    .output("preproc", &NIFTI_GZ)
                                                    .default_option("preproc_resolution", Value::Null)
                                                    .citation(FSL_CITE);
        let mut b = StepBuilder::new(study, decl, options)?;
        let swap = b.create_node("fslreorient2std",
                                 Interface::new("fsl.Reorient2Std"),
                                 Resources::default().requirement(FSL_REQ))?;
        b.connect_input("primary", &swap, "in_file")?;
        let resolution = opt(&b, "preproc_resolution");
        if resolution.is_null() {
            b.connect_output("preproc", &swap, "out_file")?;
        } else {
            let resample = b.create_node("resample",
                                         Interface::new("mrtrix.MRResize").param("voxel", resolution),
                                         Resources::default().requirement(MRTRIX_REQ))?;
            b.connect(&swap, "out_file", &resample, "in_file")?;
            b.connect_output("preproc", &resample, "out_file")?;
        }
        b.build()
    }
}

/// BET de FSL. Cada estudio fija sus propios defaults.
#[derive(Debug, Clone)]
pub struct BrainExtraction {
    pub robust: bool,
    pub f_threshold: f64,
    pub reduce_bias: bool,
}

impl Default for BrainExtraction {
    fn default() -> Self {
        Self { robust: true,
               f_threshold: 0.5,
               reduce_bias: false }
    }
}

impl StepFactory for BrainExtraction {
    fn name(&self) -> &str {
        "brain_extraction"
    }

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec> {
        let decl = StepDeclaration::new(self.name()).description("Generate brain mask from mr_scan")
                                                    .input("preproc", &NIFTI_GZ)
                                                    .output("brain", &NIFTI_GZ)
                                                    .output("brain_mask", &NIFTI_GZ)
                                                    .default_option("bet_robust", self.robust)
                                                    .default_option("bet_f_threshold", self.f_threshold)
                                                    .default_option("bet_reduce_bias", self.reduce_bias)
                                                    .default_option("bet_g_threshold", 0.0)
                                                    .citation(FSL_CITE)
                                                    .citation(BET_CITE);
        let mut b = StepBuilder::new(study, decl, options)?;
        let iface = Interface::new("fsl.BET").param("mask", true)
                                             .param("output_type", "NIFTI_GZ")
                                             .param("robust", opt(&b, "bet_robust"))
                                             .param("reduce_bias", opt(&b, "bet_reduce_bias"))
                                             .param("frac", opt(&b, "bet_f_threshold"))
                                             .param("vertical_gradient", opt(&b, "bet_g_threshold"));
        let bet = b.create_node("bet", iface, Resources::default().requirement(FSL_REQ))?;
        b.connect_input("preproc", &bet, "in_file")?;
        b.connect_output("brain", &bet, "out_file")?;
        b.connect_output("brain_mask", &bet, "mask_file")?;
        b.build()
    }
}

/// Registro lineal de `brain` contra `coreg_ref_brain` (FLIRT o ANTs).
#[derive(Debug)]
pub struct LinearCoreg;

impl StepFactory for LinearCoreg {
    fn name(&self) -> &str {
        "linear_coreg"
    }

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec> {
        let decl = StepDeclaration::new(self.name()).description("Registers a MR scan against a reference image")
                                                    .input("brain", &NIFTI_GZ)
                                                    .input("coreg_ref_brain", &NIFTI_GZ)
                                                    .output("coreg_brain", &NIFTI_GZ)
                                                    .output("coreg_matrix", &TEXT_MATRIX)
                                                    .default_option("linear_reg_method", "flirt")
                                                    .default_option("flirt_degrees_of_freedom", 6)
                                                    .default_option("flirt_cost_func", "normmi");
        let method = options.get("linear_reg_method")
                            .and_then(Value::as_str)
                            .unwrap_or("flirt")
                            .to_string();
        let (decl, node, iface, req, ports) = match method.as_str() {
            "flirt" => (decl.citation(FSL_CITE),
                        "flirt",
                        Interface::new("fsl.FLIRT").param("output_type", "NIFTI_GZ"),
                        FSL_REQ,
                        ("in_file", "reference", "out_file", "out_matrix_file")),
            "ants" => (decl.citation(ANTS_CITE),
                       "ants_linear_reg",
                       Interface::new("ants.RegistrationSynQuick").param("transformation", "r")
                                                                  .param("out_prefix", "reg2hires"),
                       ANTS_REQ,
                       ("input_file", "ref_file", "reg_file", "regmat")),
            other => {
                return Err(FlowError::construction(self.name(), format!("unsupported linear_reg_method '{other}'")));
            }
        };
        let mut b = StepBuilder::new(study, decl, options)?;
        let iface = if method == "flirt" {
            iface.param("dof", opt(&b, "flirt_degrees_of_freedom"))
                 .param("cost", opt(&b, "flirt_cost_func"))
        } else {
            iface
        };
        let reg = b.create_node(node, iface, Resources::default().wall_time(5).requirement(req))?;
        let (in_port, ref_port, out_port, mat_port) = ports;
        b.connect_input("brain", &reg, in_port)?;
        b.connect_input("coreg_ref_brain", &reg, ref_port)?;
        b.connect_output("coreg_brain", &reg, out_port)?;
        b.connect_output("coreg_matrix", &reg, mat_port)?;
        b.build()
    }
}

/// Segmentación FAST; `fast_img_type` elige la salida de materia blanca.
#[derive(Debug)]
pub struct Segmentation;

impl StepFactory for Segmentation {
    fn name(&self) -> &str {
        "segmentation"
    }

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec> {
        let decl = StepDeclaration::new(self.name()).description("White matter segmentation of the reference image")
                                                    .input("brain", &NIFTI_GZ)
                                                    .output("wm_seg", &NIFTI_GZ)
                                                    .default_option("fast_img_type", 2)
                                                    .citation(FSL_CITE);
        let mut b = StepBuilder::new(study, decl, options)?;
        let img_type = opt(&b, "fast_img_type");
        let wm_port = match img_type.as_u64() {
            Some(1) => "out3",
            Some(2) => "out2",
            _ => {
                return Err(FlowError::construction(self.name(),
                                                   format!("'fast_img_type' can either be 1 or 2 (not {img_type})")));
            }
        };
        let fast = b.create_node("fast",
                                 Interface::new("fsl.FAST").param("img_type", img_type)
                                                           .param("segments", true),
                                 Resources::default().requirement(FSL_REQ))?;
        let split = b.create_node("split",
                                  Interface::new("utility.Split").param("splits", serde_json::json!([1, 1, 1])),
                                  Resources::plumbing())?;
        b.connect_input("brain", &fast, "in_files")?;
        b.connect(&fast, "tissue_class_files", &split, "inlist")?;
        b.connect_output("wm_seg", &split, wm_port)?;
        b.build()
    }
}

/// Extracción de información de cabecera DICOM.
#[derive(Debug)]
pub struct HeaderInfo;

impl StepFactory for HeaderInfo {
    fn name(&self) -> &str {
        "header_info_extraction"
    }

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec> {
        let decl = StepDeclaration::new(self.name()).description("Extract scan information from the image header")
                                                    .input("primary", &DICOM)
                                                    .output("dcm_info", &TEXT)
                                                    .default_option("multivol", false);
        let mut b = StepBuilder::new(study, decl, options)?;
        let hd = b.create_node("hd_info_extraction",
                               Interface::new("custom.DicomHeaderInfoExtraction").param("multivol", opt(&b, "multivol")),
                               Resources::plumbing())?;
        b.connect_input("primary", &hd, "dicom_folder")?;
        b.connect_output("dcm_info", &hd, "dcm_info")?;
        b.build()
    }
}

/// Promedio por sujeto de las imágenes `brain` de todas sus visitas.
#[derive(Debug)]
pub struct SubjectMean;

impl StepFactory for SubjectMean {
    fn name(&self) -> &str {
        "subject_mean"
    }

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec> {
        let decl = StepDeclaration::new(self.name()).description("Average brain image across a subject's visits")
                                                    .input("brain", &NIFTI_GZ)
                                                    .output("mean_brain", &NIFTI_GZ)
                                                    .citation(MRTRIX_CITE);
        let mut b = StepBuilder::new(study, decl, options)?;
        let merge = b.create_join_sessions_node("merge",
                                                Interface::new("utility.Merge"),
                                                &["in_files"],
                                                Resources::plumbing())?;
        let mean = b.create_node("mean",
                                 Interface::new("mrtrix.MRMath").param("operation", "mean"),
                                 Resources::default().requirement(MRTRIX_REQ))?;
        b.connect_input("brain", &merge, "in_files")?;
        b.connect(&merge, "out", &mean, "in_files")?;
        b.connect_output("mean_brain", &mean, "out_file")?;
        b.build()
    }
}

/// Montaje de control de calidad por visita sobre todos los sujetos.
#[derive(Debug)]
pub struct VisitQc;

impl StepFactory for VisitQc {
    fn name(&self) -> &str {
        "visit_qc"
    }

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec> {
        let decl = StepDeclaration::new(self.name()).description("Brain extraction QC montage per visit")
                                                    .input("brain", &NIFTI_GZ)
                                                    .output("brain_qc", &GIF)
                                                    .citation(FSL_CITE);
        let mut b = StepBuilder::new(study, decl, options)?;
        let merge = b.create_join_subjects_node("merge",
                                                Interface::new("utility.Merge"),
                                                &["in_files"],
                                                Resources::plumbing())?;
        let slices = b.create_node("slices",
                                   Interface::new("fsl.FSLSlices").param("outname", "brain_qc"),
                                   Resources::default().requirement(FSL_REQ))?;
        b.connect_input("brain", &merge, "in_files")?;
        b.connect(&merge, "out", &slices, "im1")?;
        b.connect_output("brain_qc", &slices, "report")?;
        b.build()
    }
}

/// Template de proyecto a partir de todas las imágenes `brain`.
#[derive(Debug)]
pub struct BrainTemplate;

impl StepFactory for BrainTemplate {
    fn name(&self) -> &str {
        "brain_template"
    }

    fn build(&self, study: &Study, options: &OptionSet) -> FlowResult<StepSpec> {
        let decl = StepDeclaration::new(self.name()).description("Unbiased population template")
                                                    .input("brain", &NIFTI_GZ)
                                                    .output("template", &NIFTI_GZ)
                                                    .default_option("template_iterations", 4)
                                                    .citation(ANTS_CITE);
        let mut b = StepBuilder::new(study, decl, options)?;
        let merge = b.create_join_subjects_node("merge",
                                                Interface::new("utility.Merge"),
                                                &["in_files"],
                                                Resources::plumbing())?;
        let build = b.create_node("build_template",
                                  Interface::new("ants.BuildTemplate").param("iterations", opt(&b, "template_iterations")),
                                  Resources::default().wall_time(240).memory(16000).threads(4).requirement(ANTS_REQ))?;
        b.connect_input("brain", &merge, "in_files")?;
        b.connect(&merge, "out", &build, "in_files")?;
        b.connect_output("template", &build, "template")?;
        b.build()
    }
}

/// Tabla base del estudio MRI. `brain_extraction` permite variar los
/// defaults de BET (lo usa el estudio T2).
pub fn table_with(brain_extraction: BrainExtraction) -> SpecTable {
    let preproc: Arc<dyn StepFactory> = Arc::new(Preproc);
    let bet: Arc<dyn StepFactory> = Arc::new(brain_extraction);
    let coreg: Arc<dyn StepFactory> = Arc::new(LinearCoreg);
    let seg: Arc<dyn StepFactory> = Arc::new(Segmentation);
    let header: Arc<dyn StepFactory> = Arc::new(HeaderInfo);

    SpecTable::new(TABLE)
        .with(ArtifactSpec::primary("primary", &DICOM, Multiplicity::Session))
        .with(ArtifactSpec::primary("coreg_ref_brain", &NIFTI_GZ, Multiplicity::Session)
              .with_description("A reference scan to coregister the primary scan to. Should be brain extracted"))
        .with(ArtifactSpec::derived("preproc", &NIFTI_GZ, Multiplicity::Session, preproc))
        .with(ArtifactSpec::derived("brain", &NIFTI_GZ, Multiplicity::Session, bet.clone())
              .with_description("The brain masked image"))
        .with(ArtifactSpec::derived("brain_mask", &NIFTI_GZ, Multiplicity::Session, bet)
              .with_description("Mask of the brain"))
        .with(ArtifactSpec::derived("coreg_brain", &NIFTI_GZ, Multiplicity::Session, coreg.clone()))
        .with(ArtifactSpec::derived("coreg_matrix", &TEXT_MATRIX, Multiplicity::Session, coreg))
        .with(ArtifactSpec::derived("wm_seg", &NIFTI_GZ, Multiplicity::Session, seg))
        .with(ArtifactSpec::derived("dcm_info", &TEXT, Multiplicity::Session, header))
        .with(ArtifactSpec::derived("mean_brain", &NIFTI_GZ, Multiplicity::Subject, Arc::new(SubjectMean)))
        .with(ArtifactSpec::derived("brain_qc", &GIF, Multiplicity::Visit, Arc::new(VisitQc)))
        .with(ArtifactSpec::derived("template", &NIFTI_GZ, Multiplicity::Project, Arc::new(BrainTemplate)))
}

pub fn table() -> SpecTable {
    table_with(BrainExtraction::default())
}
