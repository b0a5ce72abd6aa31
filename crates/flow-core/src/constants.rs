//! Constantes del builder.
//!
//! Algunos valores participan en el cálculo de identidades de steps: cambiar
//! `BUILDER_VERSION` invalida todas las identidades previas aunque la
//! definición del step no cambie.

/// Versión lógica del builder. Forma parte del input de `StepIdentity`.
pub const BUILDER_VERSION: &str = "G1.0";

/// Campo de iteración reservado para el id de sujeto.
pub const SUBJECT_ID_FIELD: &str = "subject_id";

/// Campo de iteración reservado para el id de visita.
pub const VISIT_ID_FIELD: &str = "visit_id";

/// Campos de iteración (orden estable: sujeto, visita).
pub const ITER_FIELDS: [&str; 2] = [SUBJECT_ID_FIELD, VISIT_ID_FIELD];

/// Sufijo de los puertos de escritura de un sink (`brain_in`).
pub const INPUT_SUFFIX: &str = "_in";

/// Sufijo de los puertos de lectura de un source (`brain_out`).
pub const OUTPUT_SUFFIX: &str = "_out";

/// Puerto del nodo de reporte que agrega pares (sujeto, sesión).
pub const SUBJECT_SESSION_PAIRS_PORT: &str = "subject_session_pairs";

/// Puerto del iterador de sujetos que recibe los reportes de prerequisitos.
pub const PREREQ_REPORTS_PORT: &str = "prereq_reports";

/// Recursos por defecto de un nodo (minutos / MB).
pub const DEFAULT_WALL_TIME_MINS: u32 = 20;
pub const DEFAULT_MEMORY_MB: u32 = 4000;

/// Recursos de los nodos de plumbing (iteradores, joins, reportes).
pub const PLUMBING_WALL_TIME_MINS: u32 = 1;
pub const PLUMBING_MEMORY_MB: u32 = 1000;

/// Separador entre nombre de artifact y estudio en la clave de archivo de un
/// artifact derivado (`brain__mri`).
pub const ARCHIVE_KEY_SEPARATOR: &str = "__";

/// Puertos estándar de un nodo de conversión de formato.
pub const CONVERSION_IN_PORT: &str = "in_file";
pub const CONVERSION_OUT_PORT: &str = "out_file";
