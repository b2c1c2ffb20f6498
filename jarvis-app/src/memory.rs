//! Learning small facts about the user from plain conversation.

use jarvis_tools::MemoryStore;

const PREFERENCE_CUES: &[&str] = &["i like", "i prefer", "i love"];

/// "my name is Tony" / "I'm Tony" / "I am Tony" with a capitalised name.
pub fn extract_name(command: &str) -> Option<String> {
    let lower = command.to_lowercase();
    if !(lower.contains("my name is") || lower.contains("i'm") || lower.contains("i am")) {
        return None;
    }
    let words: Vec<&str> = command.split_whitespace().collect();
    words.windows(2).find_map(|pair| {
        let marker = pair[0].to_lowercase();
        if !matches!(marker.as_str(), "is" | "i'm" | "am") {
            return None;
        }
        let name = pair[1].trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?'));
        name.chars()
            .next()
            .is_some_and(char::is_uppercase)
            .then(|| name.to_string())
    })
}

pub fn states_preference(command: &str) -> bool {
    let lower = command.to_lowercase();
    PREFERENCE_CUES.iter().any(|c| lower.contains(c))
}

/// Store whatever the command reveals. Failures are logged, never surfaced.
pub async fn learn_from(store: &MemoryStore, command: &str) {
    if let Some(name) = extract_name(command) {
        match store.set_user_info("name", &name).await {
            Ok(()) => tracing::info!(%name, "learned user name"),
            Err(e) => tracing::warn!(error = %e, "could not store user name"),
        }
    }
    if states_preference(command) {
        if let Err(e) = store.remember_fact(command).await {
            tracing::warn!(error = %e, "could not store fact");
        }
    }
}

pub fn greeting(assistant_name: &str, user_name: Option<&str>) -> String {
    match user_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hello {name}, I'm {assistant_name}. How may I assist you today?"),
        None => format!("Hello, I'm {assistant_name}. How may I assist you today?"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_tools::JsonStore;

    #[test]
    fn names_need_a_capital_letter() {
        assert_eq!(extract_name("My name is Tony.").as_deref(), Some("Tony"));
        assert_eq!(extract_name("hi, I'm Pepper!").as_deref(), Some("Pepper"));
        assert_eq!(extract_name("I am tired"), None);
        assert_eq!(extract_name("open safari"), None);
    }

    #[tokio::test]
    async fn learning_updates_the_store() {
        let tmp = tempfile::tempdir().unwrap();
        let store: MemoryStore = JsonStore::new(tmp.path().join("memory.json"));
        learn_from(&store, "My name is Tony and I like jazz").await;
        learn_from(&store, "what time is it").await;

        let record = store.load().await;
        assert_eq!(record.user_name(), Some("Tony"));
        assert_eq!(record.facts, vec!["My name is Tony and I like jazz"]);
    }

    #[test]
    fn greeting_uses_known_name() {
        assert_eq!(
            greeting("Jarvis", Some("Tony")),
            "Hello Tony, I'm Jarvis. How may I assist you today?"
        );
        assert_eq!(greeting("Jarvis", None), "Hello, I'm Jarvis. How may I assist you today?");
    }
}
