//! Verb-intent detection for search queries.
//!
//! The resolver maps free text to the HTTP verbs it most likely asks for,
//! using per-verb trigger words matched as substrings of the lowercased
//! text. Substring matching means `"eliminar"` also fires inside
//! `"eliminarlos"`, and occasionally inside unrelated words; the query engine
//! only uses the result as a soft bias so such false positives are tolerated.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::config::IntentConfig;

/// HTTP verbs the resolver can express a preference for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Patch, Verb::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "get" => Ok(Verb::Get),
            "post" => Ok(Verb::Post),
            "put" => Ok(Verb::Put),
            "patch" => Ok(Verb::Patch),
            "delete" => Ok(Verb::Delete),
            other => anyhow::bail!("unsupported verb: {}", other),
        }
    }
}

const GET_TRIGGERS: &[&str] = &[
    "consultar", "ver", "buscar", "obtener", "recuperar", "listar", "mostrar", "leer",
    "detallar", "verificar", "visualizar", "acceder", "explorar", "fetch", "retrieve", "list",
    "show", "view",
];

const POST_TRIGGERS: &[&str] = &[
    "crear", "registrar", "agregar", "añadir", "insertar", "generar", "guardar", "subir",
    "producir", "create", "register", "insert", "upload",
];

// Shared by PUT and PATCH: both mean "modify".
const MODIFY_TRIGGERS: &[&str] = &[
    "actualizar", "editar", "modificar", "cambiar", "corregir", "reemplazar", "ajustar",
    "update", "edit", "modify", "change", "replace",
];

const DELETE_TRIGGERS: &[&str] = &[
    "eliminar", "borrar", "remover", "quitar", "suprimir", "descartar", "limpiar", "delete",
    "remove", "erase",
];

/// Set of verbs a query prefers.
pub type IntentLabels = BTreeSet<Verb>;

/// Fixed verb → trigger-word table.
#[derive(Debug, Clone)]
pub struct IntentResolver {
    groups: BTreeMap<Verb, Vec<String>>,
}

impl Default for IntentResolver {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        let mut groups = BTreeMap::new();
        groups.insert(Verb::Get, owned(GET_TRIGGERS));
        groups.insert(Verb::Post, owned(POST_TRIGGERS));
        groups.insert(Verb::Put, owned(MODIFY_TRIGGERS));
        groups.insert(Verb::Patch, owned(MODIFY_TRIGGERS));
        groups.insert(Verb::Delete, owned(DELETE_TRIGGERS));
        Self { groups }
    }
}

impl IntentResolver {
    /// Built-in table with per-verb overrides applied.
    ///
    /// Overriding only one of `put` / `patch` applies the list to both, so
    /// modification queries keep biasing toward the two verbs equally. When
    /// both are given and differ, `put` wins.
    pub fn from_config(config: &IntentConfig) -> Self {
        let mut resolver = Self::default();
        let normalize = |words: &Vec<String>| {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
        };

        if let Some(words) = &config.get {
            resolver.groups.insert(Verb::Get, normalize(words));
        }
        if let Some(words) = &config.post {
            resolver.groups.insert(Verb::Post, normalize(words));
        }
        if let Some(words) = config.put.as_ref().or(config.patch.as_ref()) {
            let words = normalize(words);
            resolver.groups.insert(Verb::Put, words.clone());
            resolver.groups.insert(Verb::Patch, words);
        }
        if let Some(words) = &config.delete {
            resolver.groups.insert(Verb::Delete, normalize(words));
        }
        resolver
    }

    /// Verbs whose trigger words occur in `text`, or `None` when nothing
    /// matched and no bias should be applied.
    pub fn resolve(&self, text: &str) -> Option<IntentLabels> {
        let lower = text.to_lowercase();
        let found: IntentLabels = self
            .groups
            .iter()
            .filter(|(_, triggers)| triggers.iter().any(|t| lower.contains(t.as_str())))
            .map(|(verb, _)| *verb)
            .collect();

        if found.is_empty() {
            None
        } else {
            Some(found)
        }
    }

    pub fn triggers(&self, verb: Verb) -> &[String] {
        self.groups.get(&verb).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Whether a result's method (any case) is among the preferred verbs.
pub fn method_matches(labels: &IntentLabels, method: &str) -> bool {
    method
        .parse::<Verb>()
        .map(|verb| labels.contains(&verb))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_intent() {
        let resolver = IntentResolver::default();
        let labels = resolver.resolve("quiero eliminar un usuario").unwrap();
        assert!(labels.contains(&Verb::Delete));
    }

    #[test]
    fn test_no_intent_is_none() {
        let resolver = IntentResolver::default();
        assert_eq!(resolver.resolve("hola mundo"), None);
        assert_eq!(resolver.resolve(""), None);
    }

    #[test]
    fn test_put_and_patch_move_together() {
        let resolver = IntentResolver::default();
        let labels = resolver.resolve("Actualizar el correo del cliente").unwrap();
        assert!(labels.contains(&Verb::Put));
        assert!(labels.contains(&Verb::Patch));
        assert_eq!(resolver.triggers(Verb::Put), resolver.triggers(Verb::Patch));
    }

    #[test]
    fn test_case_insensitive() {
        let resolver = IntentResolver::default();
        let labels = resolver.resolve("CREAR FACTURA").unwrap();
        assert_eq!(labels.into_iter().collect::<Vec<_>>(), vec![Verb::Post]);
    }

    #[test]
    fn test_substring_match_is_accepted() {
        // "ver" hides inside "server"; the heuristic keeps that false positive.
        let resolver = IntentResolver::default();
        let labels = resolver.resolve("server status").unwrap();
        assert!(labels.contains(&Verb::Get));
    }

    #[test]
    fn test_multiple_verbs() {
        let resolver = IntentResolver::default();
        let labels = resolver.resolve("buscar y borrar pedidos").unwrap();
        assert!(labels.contains(&Verb::Get));
        assert!(labels.contains(&Verb::Delete));
    }

    #[test]
    fn test_override_put_applies_to_patch() {
        let config = IntentConfig {
            put: Some(vec!["Tweak".to_string()]),
            ..Default::default()
        };
        let resolver = IntentResolver::from_config(&config);
        let labels = resolver.resolve("tweak the profile").unwrap();
        assert!(labels.contains(&Verb::Put));
        assert!(labels.contains(&Verb::Patch));
        assert_eq!(resolver.resolve("actualizar perfil"), None);
    }

    #[test]
    fn test_method_matches() {
        let labels: IntentLabels = [Verb::Delete].into_iter().collect();
        assert!(method_matches(&labels, "DELETE"));
        assert!(!method_matches(&labels, "get"));
        assert!(!method_matches(&labels, "HEAD"));
    }
}
