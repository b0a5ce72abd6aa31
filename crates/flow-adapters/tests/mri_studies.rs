use std::sync::Arc;

use flow_adapters::formats::{DICOM, NIFTI_GZ};
use flow_adapters::studies::{mri_study, t2_study};
use flow_adapters::ConverterTable;
use flow_core::{Archive, ConnectRequest, FlowError, InMemoryArchive, InvocationState, NodeKind, OptionSet,
                PipelineAssembler, Project, Study};
use serde_json::json;

const PROJECT: &str = "P";

/// 2 sujetos × 2 visitas con DICOM y referencia de registro en cada sesión.
fn scanned() -> Project {
    let mut project = Project::grid(PROJECT, &["s1", "s2"], &["v1", "v2"]);
    for r in project.session_refs().collect::<Vec<_>>() {
        project.mark_session(&r.subject_id, &r.visit_id, "primary");
        project.mark_session(&r.subject_id, &r.visit_id, "coreg_ref_brain");
    }
    project
}

fn archive(project: Project) -> Arc<dyn Archive> {
    Arc::new(InMemoryArchive::new().with_project(project))
}

fn mri(options: OptionSet) -> Study {
    mri_study(PROJECT, archive(scanned()), options).unwrap()
}

fn interface_param<'a>(asm: &'a flow_core::Assembly, node: &str, key: &str) -> Option<&'a serde_json::Value> {
    asm.graph.nodes().find(|n| n.id.as_str() == node).and_then(|n| match &n.kind {
                                                           NodeKind::Interface { interface } => interface.params.get(key),
                                                           _ => None,
                                                       })
}

#[test]
fn dicom_primary_is_converted_before_preproc() {
    let asm = PipelineAssembler::new(mri(OptionSet::new())).connect_output("preproc", &ConnectRequest::new())
                                                           .unwrap();
    let conversion = asm.graph
                        .nodes()
                        .find(|n| n.id.as_str() == "preproc_primary_input_conversion")
                        .expect("conversion node");
    match &conversion.kind {
        NodeKind::Conversion { from, to, tool, .. } => {
            assert_eq!(from, &*DICOM);
            assert_eq!(to, &*NIFTI_GZ);
            assert_eq!(tool, "dcm2niix");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(asm.graph.contains("preproc_fslreorient2std"));
    assert!(!asm.graph.contains("preproc_resample"));
}

#[test]
fn resolution_option_adds_a_resample_node() {
    let study = mri(OptionSet::new().with("preproc_resolution", json!([1.0, 1.0, 1.0])));
    let asm = PipelineAssembler::new(study).connect_output("preproc", &ConnectRequest::new())
                                           .unwrap();
    assert!(asm.graph.has_edge("preproc_fslreorient2std", "preproc_resample"));
    assert_eq!(interface_param(&asm, "preproc_resample", "voxel"), Some(&json!([1.0, 1.0, 1.0])));
}

#[test]
fn header_extraction_reads_dicom_without_conversion() {
    let asm = PipelineAssembler::new(mri(OptionSet::new())).connect_output("dcm_info", &ConnectRequest::new())
                                                           .unwrap();
    assert!(!asm.graph.contains("header_info_extraction_primary_input_conversion"));
    assert!(asm.graph.has_edge("header_info_extraction_source", "header_info_extraction_inputnode"));
}

#[test]
fn t2_brain_extraction_keeps_bet_defaults_but_is_its_own_step() {
    let mri = mri(OptionSet::new());
    let t2 = t2_study(PROJECT, archive(scanned()), OptionSet::new()).unwrap();
    let a = mri.step_for("brain").unwrap();
    let b = t2.step_for("brain").unwrap();
    assert_eq!(a.name(), b.name());
    assert_eq!(a.options(), b.options());
    assert_eq!(b.options().get("bet_reduce_bias"), Some(&json!(false)));
    assert_eq!(b.options().get("bet_robust"), Some(&json!(true)));
    // la identidad incluye el estudio
    assert_ne!(a.identity(), b.identity());
    // mismo artifact, mismo factory: brain y brain_mask comparten step
    assert_eq!(t2.step_for("brain_mask").unwrap().identity(), b.identity());

    let biased = t2_study(PROJECT, archive(scanned()), OptionSet::new().with("bet_reduce_bias", true)).unwrap();
    assert_ne!(biased.step_for("brain").unwrap().identity(), b.identity());
}

#[test]
fn coreg_method_selects_the_registration_node() {
    let flirt = PipelineAssembler::new(mri(OptionSet::new())).connect_output("coreg_matrix", &ConnectRequest::new())
                                                             .unwrap();
    assert!(flirt.graph.contains("linear_coreg_flirt"));
    assert_eq!(interface_param(&flirt, "linear_coreg_flirt", "dof"), Some(&json!(6)));
    assert_eq!(flirt.traces.keys().map(String::as_str).collect::<Vec<_>>(),
               vec!["preproc", "brain_extraction", "linear_coreg"]);

    let ants = PipelineAssembler::new(mri(OptionSet::new().with("linear_reg_method", "ants")))
        .connect_output("coreg_brain", &ConnectRequest::new())
        .unwrap();
    assert!(ants.graph.contains("linear_coreg_ants_linear_reg"));
    assert!(!ants.graph.contains("linear_coreg_flirt"));

    let err = mri(OptionSet::new().with("linear_reg_method", "spm")).step_for("coreg_brain")
                                                                    .unwrap_err();
    assert!(matches!(err, FlowError::Construction { ref step, .. } if step == "linear_coreg"), "{err}");
}

#[test]
fn segmentation_rejects_unknown_image_type() {
    let study = mri(OptionSet::new().with("fast_img_type", 3));
    assert!(matches!(study.step_for("wm_seg"), Err(FlowError::Construction { .. })));
    let t1 = mri(OptionSet::new().with("fast_img_type", 1)).step_for("wm_seg").unwrap();
    assert!(t1.graph().edges().iter().any(|e| e.from_port == "out3"));
}

#[test]
fn archived_brain_skips_extraction_for_the_template() {
    let mut project = scanned();
    for r in project.session_refs().collect::<Vec<_>>() {
        project.mark_session(&r.subject_id, &r.visit_id, "brain__mri");
        project.mark_session(&r.subject_id, &r.visit_id, "brain_mask__mri");
    }
    let study = mri_study(PROJECT, archive(project), OptionSet::new()).unwrap();
    let asm = PipelineAssembler::new(study).connect_output("template", &ConnectRequest::new())
                                           .unwrap();
    assert_eq!(asm.state(), InvocationState::Scheduled);
    assert_eq!(asm.trace("brain_extraction").unwrap().state(), InvocationState::Skipped);
    assert!(asm.trace("preproc").is_none());
    assert!(asm.graph.has_edge("brain_template_per_project_sink", "brain_template_report"));
}

#[test]
fn missing_conversion_surfaces_as_conversion_error() {
    let study = Study::new("mri",
                           PROJECT,
                           Arc::new(flow_adapters::studies::mri_schema().unwrap()),
                           archive(scanned()),
                           Arc::new(ConverterTable::new()));
    let err = PipelineAssembler::new(study).connect_output("preproc", &ConnectRequest::new())
                                           .unwrap_err();
    assert!(matches!(err, FlowError::Conversion { ref artifact, .. } if artifact == "primary"), "{err}");
}

#[test]
fn missing_reference_is_reported_with_the_coreg_chain() {
    let mut project = Project::grid(PROJECT, &["s1"], &["v1"]);
    project.mark_session("s1", "v1", "primary");
    let study = mri_study(PROJECT, archive(project), OptionSet::new()).unwrap();
    let err = PipelineAssembler::new(study).connect_output("coreg_brain", &ConnectRequest::new())
                                           .unwrap_err();
    match err {
        FlowError::MissingData { artifact, chain, .. } => {
            assert_eq!(artifact, "coreg_ref_brain");
            assert_eq!(chain, vec!["linear_coreg".to_string()]);
        }
        other => panic!("unexpected {other:?}"),
    }
}
