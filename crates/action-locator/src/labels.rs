//! Data-driven label table keyed by logical action.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::LocatorError;

/// Localized strings the locator matches against. Comparisons are exact,
/// except info labels which also match as a substring of `aria-label`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelTable {
    pub delete: Vec<String>,
    pub confirm: Vec<String>,
    pub info: Vec<String>,
    pub back: Vec<String>,
    pub empty_inbox: Vec<String>,
}

fn owned(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

impl Default for LabelTable {
    fn default() -> Self {
        let delete = owned(&["Sohbeti sil", "Delete chat", "Sil", "Delete"]);
        Self {
            confirm: delete.clone(),
            delete,
            info: owned(&[
                "Konuşma Bilgileri",
                "Chat info",
                "Conversation information",
                "Bilgi",
                "Info",
                "info",
                "Detail",
                "Details",
                "Ayrıntılar",
                "Thread details",
                "View thread details",
            ]),
            back: owned(&["Geri", "Back"]),
            empty_inbox: owned(&[
                "Chats will appear here",
                "Sohbetler burada görünecek",
                "No messages yet",
                "Henüz mesaj yok",
                "Start a conversation",
                "Send a message",
                "Mesaj gönder",
            ]),
        }
    }
}

impl LabelTable {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, LocatorError> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|err| {
            LocatorError::LabelTable(format!("{}: {}", path.as_ref().display(), err))
        })?;
        Self::parse_str(&raw)
    }

    /// JSON first, then YAML. Keys left out keep their defaults.
    pub fn parse_str(raw: &str) -> Result<Self, LocatorError> {
        let table: LabelTable = match serde_json::from_str(raw) {
            Ok(table) => table,
            Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
                LocatorError::LabelTable(format!(
                    "json error: {}; yaml error: {}",
                    json_err, yaml_err
                ))
            })?,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), LocatorError> {
        for (key, labels) in [
            ("delete", &self.delete),
            ("confirm", &self.confirm),
            ("info", &self.info),
        ] {
            if labels.iter().all(|label| label.trim().is_empty()) {
                return Err(LocatorError::LabelTable(format!(
                    "'{key}' needs at least one label"
                )));
            }
        }
        Ok(())
    }

    pub fn is_delete(&self, text: &str) -> bool {
        self.delete.iter().any(|label| label == text)
    }

    pub fn is_confirm(&self, text: &str) -> bool {
        self.confirm.iter().any(|label| label == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_locales() {
        let table = LabelTable::default();
        assert!(table.is_delete("Delete chat"));
        assert!(table.is_delete("Sohbeti sil"));
        assert!(!table.is_delete("delete chat"));
        assert_eq!(table.confirm, table.delete);
        assert_eq!(table.info[0], "Konuşma Bilgileri");
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let table = LabelTable::parse_str("delete: [\"Supprimer\"]\nconfirm: [\"Supprimer\"]\n").unwrap();
        assert_eq!(table.delete, vec!["Supprimer".to_string()]);
        assert_eq!(table.back, vec!["Geri".to_string(), "Back".to_string()]);
    }

    #[test]
    fn empty_required_list_is_rejected() {
        assert!(LabelTable::parse_str(r#"{"info": []}"#).is_err());
    }
}
