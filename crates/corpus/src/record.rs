use serde::{Deserialize, Serialize};

/// One raw record from the dataset.
///
/// Sources may carry other columns (title, url, ...); only `text` is read, the
/// rest is ignored during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRecord {
    pub text: String,
}

impl TextRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Character count of the record text.
    pub fn char_len(&self) -> u64 {
        self.text.chars().count() as u64
    }
}

impl From<String> for TextRecord {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for TextRecord {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_extra_columns() {
        let rec: TextRecord =
            serde_json::from_str(r#"{"id":"12","title":"Anarchism","text":"body"}"#).unwrap();
        assert_eq!(rec.text, "body");
    }

    #[test]
    fn char_len_counts_scalars_not_bytes() {
        let rec = TextRecord::from("héllo");
        assert_eq!(rec.char_len(), 5);
        assert_eq!(rec.text.len(), 6);
    }
}
