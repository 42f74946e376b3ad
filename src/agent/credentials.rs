use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Orders candidate credentials: override, model-keyed, primary, backups.
///
/// Blank entries are dropped and repeats keep their first position.
pub fn build_credential_list<'a, I>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(c.to_string()))
        .map(str::to_string)
        .collect()
}

/// Parses `model=key` entries. Malformed entries are skipped.
pub fn parse_model_keys<S: AsRef<str>>(entries: &[S]) -> HashMap<String, String> {
    entries
        .iter()
        .filter_map(|entry| {
            let (model, key) = entry.as_ref().split_once('=')?;
            let model = model.trim();
            let key = key.trim();
            if model.is_empty() || key.is_empty() {
                return None;
            }
            Some((model.to_ascii_lowercase(), key.to_string()))
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    override_key: RwLock<Option<String>>,
    model_keys: HashMap<String, String>,
    primary: Option<String>,
    backups: Vec<String>,
}

impl CredentialStore {
    pub fn new(
        primary: Option<String>,
        backups: Vec<String>,
        model_keys: HashMap<String, String>,
    ) -> Self {
        Self {
            override_key: RwLock::new(None),
            model_keys,
            primary,
            backups,
        }
    }

    pub fn set_override(&self, key: Option<String>) {
        let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        match self.override_key.write() {
            Ok(mut guard) => *guard = key,
            Err(poisoned) => *poisoned.into_inner() = key,
        }
    }

    pub fn has_override(&self) -> bool {
        self.current_override().is_some()
    }

    fn current_override(&self) -> Option<String> {
        match self.override_key.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Snapshot of the candidates for one request against `model`.
    pub fn credentials_for(&self, model: &str) -> Vec<String> {
        let override_key = self.current_override();
        let model_key = self.model_keys.get(&model.trim().to_ascii_lowercase());

        let candidates = [
            override_key.as_deref(),
            model_key.map(String::as_str),
            self.primary.as_deref(),
        ]
        .into_iter()
        .chain(self.backups.iter().map(|k| Some(k.as_str())));

        build_credential_list(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_blanks_and_duplicates_in_priority_order() {
        let list = build_credential_list([
            Some("override"),
            None,
            Some("  "),
            Some("primary"),
            Some("override"),
            Some(" backup "),
        ]);
        assert_eq!(list, vec!["override", "primary", "backup"]);
    }

    #[test]
    fn parses_model_keys() {
        let keys = parse_model_keys(&["GPT-4=abc", "bad", "=x", "claude = def "]);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys["gpt-4"], "abc");
        assert_eq!(keys["claude"], "def");
    }

    #[test]
    fn store_orders_override_model_primary_backups() {
        let store = CredentialStore::new(
            Some("primary".into()),
            vec!["b1".into(), "".into(), "b2".into()],
            parse_model_keys(&["gpt-4=model-key"]),
        );
        assert_eq!(
            store.credentials_for("gpt-4"),
            vec!["model-key", "primary", "b1", "b2"]
        );
        assert_eq!(store.credentials_for("other"), vec!["primary", "b1", "b2"]);

        store.set_override(Some("runtime".into()));
        assert!(store.has_override());
        assert_eq!(
            store.credentials_for("GPT-4"),
            vec!["runtime", "model-key", "primary", "b1", "b2"]
        );

        store.set_override(Some("   ".into()));
        assert!(!store.has_override());
    }

    #[test]
    fn empty_store_has_no_candidates() {
        assert!(CredentialStore::default().credentials_for("any").is_empty());
    }
}
