//! Formatos de archivo conocidos.

use flow_core::FileFormat;
use once_cell::sync::Lazy;

pub static DICOM: Lazy<FileFormat> = Lazy::new(|| FileFormat::new("dicom", ""));
pub static NIFTI: Lazy<FileFormat> = Lazy::new(|| FileFormat::new("nifti", ".nii"));
pub static NIFTI_GZ: Lazy<FileFormat> = Lazy::new(|| FileFormat::new("nifti_gz", ".nii.gz"));
pub static MRTRIX: Lazy<FileFormat> = Lazy::new(|| FileFormat::new("mrtrix", ".mif"));
pub static TEXT_MATRIX: Lazy<FileFormat> = Lazy::new(|| FileFormat::new("text_matrix", ".mat"));
pub static TEXT: Lazy<FileFormat> = Lazy::new(|| FileFormat::new("text", ".txt"));
pub static GIF: Lazy<FileFormat> = Lazy::new(|| FileFormat::new("gif", ".gif"));

pub fn all() -> [&'static FileFormat; 7] {
    [&*DICOM, &*NIFTI, &*NIFTI_GZ, &*MRTRIX, &*TEXT_MATRIX, &*TEXT, &*GIF]
}

pub fn by_name(name: &str) -> Option<&'static FileFormat> {
    all().into_iter().find(|f| f.name == name)
}
