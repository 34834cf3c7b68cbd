use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One candidate notification pulled from the data source.
///
/// The source query is expected to project these columns (each one
/// optional): `frequency`, `slack_channel`, `message_template`,
/// `message_params`. A row lives only for the duration of its own
/// processing; nothing is carried across rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    /// Comma-separated schedule tags, e.g. `"daily"` or `"monday, monthly"`
    pub frequency: Option<String>,

    /// Destination channel; overridden by the CLI's `--slack-channel`
    pub slack_channel: Option<String>,

    /// Template file name, or the message text itself in literal mode
    pub message_template: Option<String>,

    /// JSON object with substitution parameters for the template
    pub message_params: Option<String>,
}

impl MessageRow {
    /// Parse the `message_params` column into a parameter map.
    ///
    /// An absent column, or anything that does not parse as a JSON object,
    /// yields an empty map rather than an error.
    pub fn params(&self) -> Map<String, Value> {
        self.message_params
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_parses_object() {
        let row = MessageRow {
            message_params: Some(r#"{"name": "courier", "count": 3}"#.to_string()),
            ..Default::default()
        };
        let params = row.params();
        assert_eq!(params.get("name"), Some(&Value::from("courier")));
        assert_eq!(params.get("count"), Some(&Value::from(3)));
    }

    #[test]
    fn test_params_absent_column_is_empty() {
        assert!(MessageRow::default().params().is_empty());
    }

    #[test]
    fn test_params_invalid_json_is_empty() {
        let row = MessageRow {
            message_params: Some("{not json".to_string()),
            ..Default::default()
        };
        assert!(row.params().is_empty());
    }

    #[test]
    fn test_params_non_object_json_is_empty() {
        let row = MessageRow {
            message_params: Some("[1, 2, 3]".to_string()),
            ..Default::default()
        };
        assert!(row.params().is_empty());
    }
}
