//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable (`CONFIG`).
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

use flow_core::BackendSettings;

/// Backend usado si no se indica otro.
pub const DEFAULT_BACKEND: &str = "linear";

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Directorio de trabajo del engine (scripts, logs de jobs).
    pub work_dir: PathBuf,
    /// Nombre del backend de ejecución (`linear`, `multiproc`, `slurm`).
    pub backend: String,
    /// Si está, se exporta el grafo en formato DOT a esta ruta.
    pub graph_path: Option<PathBuf>,
    /// Snapshot JSON del archivo.
    pub snapshot: Option<PathBuf>,
    pub max_parallel: Option<usize>,
    /// Email para notificaciones de backends batch.
    pub email: Option<String>,
}

impl AppConfig {
    /// Construye la configuración consultando `lookup` por cada variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self { work_dir: non_empty("STUDYFLOW_WORK_DIR").map(PathBuf::from)
                                                         .unwrap_or_else(|| env::temp_dir().join("studyflow")),
               backend: non_empty("STUDYFLOW_BACKEND").unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
               graph_path: non_empty("STUDYFLOW_GRAPH_PATH").map(PathBuf::from),
               snapshot: non_empty("STUDYFLOW_SNAPSHOT").map(PathBuf::from),
               max_parallel: non_empty("STUDYFLOW_MAX_PARALLEL").and_then(|v| v.parse().ok()),
               email: non_empty("EMAIL") }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings { max_parallel: self.max_parallel,
                          email: self.email.clone(),
                          mail_on: None }
    }
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
    AppConfig::from_env()
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.backend, "linear");
        assert!(cfg.graph_path.is_none());
        assert!(cfg.email.is_none());
        assert!(cfg.work_dir.ends_with("studyflow"));
    }

    #[test]
    fn reads_backend_settings() {
        let cfg = AppConfig::from_lookup(lookup(&[("STUDYFLOW_BACKEND", "slurm"),
                                                  ("STUDYFLOW_MAX_PARALLEL", "4"),
                                                  ("EMAIL", "lab@example.org"),
                                                  ("STUDYFLOW_GRAPH_PATH", "")]));
        assert_eq!(cfg.backend, "slurm");
        assert!(cfg.graph_path.is_none());
        let settings = cfg.backend_settings();
        assert_eq!(settings.max_parallel, Some(4));
        assert_eq!(settings.email.as_deref(), Some("lab@example.org"));
    }
}
