//! Registro de conversiones de formato.

use indexmap::IndexMap;

use flow_core::{FileFormat, FlowError, FlowResult, FormatConverter, Node, NodeId, NodeKind, Resources};

use crate::formats::{DICOM, MRTRIX, NIFTI, NIFTI_GZ};

/// Tabla (origen, destino) → herramienta. Sin entrada para un par, la
/// conversión falla con `FlowError::Conversion`.
#[derive(Debug, Clone, Default)]
pub struct ConverterTable {
    tools: IndexMap<(String, String), String>,
}

impl ConverterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversiones de neuroimagen habituales (dcm2niix, mrconvert).
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(&DICOM, &NIFTI_GZ, "dcm2niix");
        table.register(&DICOM, &NIFTI, "dcm2niix");
        table.register(&DICOM, &MRTRIX, "mrconvert");
        for (from, to) in [(&*NIFTI_GZ, &*NIFTI), (&*NIFTI, &*NIFTI_GZ), (&*NIFTI_GZ, &*MRTRIX), (&*MRTRIX, &*NIFTI_GZ)] {
            table.register(from, to, "mrconvert");
        }
        table
    }

    pub fn register(&mut self, from: &FileFormat, to: &FileFormat, tool: impl Into<String>) {
        self.tools.insert((from.name.clone(), to.name.clone()), tool.into());
    }

    pub fn tool(&self, from: &FileFormat, to: &FileFormat) -> Option<&str> {
        self.tools.get(&(from.name.clone(), to.name.clone())).map(String::as_str)
    }
}

impl FormatConverter for ConverterTable {
    fn convert(&self, artifact: &str, from: &FileFormat, to: &FileFormat, node: NodeId) -> FlowResult<Node> {
        let tool = self.tool(from, to).ok_or_else(|| FlowError::Conversion { artifact: artifact.to_string(),
                                                                             from: from.name.clone(),
                                                                             to: to.name.clone() })?;
        log::debug!("'{}': {} -> {} via {}", artifact, from, to, tool);
        let kind = NodeKind::Conversion { artifact: artifact.to_string(),
                                          from: from.clone(),
                                          to: to.clone(),
                                          tool: tool.to_string() };
        Ok(Node::new(node, kind).with_resources(Resources::default().wall_time(5).requirement(tool)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::GIF;

    #[test]
    fn registered_pair_yields_conversion_node() {
        let table = ConverterTable::standard();
        let node = table.convert("primary", &DICOM, &NIFTI_GZ, NodeId::new("prep_primary_input_conversion"))
                        .unwrap();
        match node.kind {
            NodeKind::Conversion { tool, .. } => assert_eq!(tool, "dcm2niix"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(node.resources.requirements, vec!["dcm2niix".to_string()]);
    }

    #[test]
    fn unknown_pair_is_a_conversion_error() {
        let table = ConverterTable::standard();
        let err = table.convert("qc", &GIF, &NIFTI, NodeId::new("x")).unwrap_err();
        assert_eq!(err,
                   FlowError::Conversion { artifact: "qc".into(),
                                           from: "gif".into(),
                                           to: "nifti".into() });
    }
}
