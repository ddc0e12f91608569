use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(usize),
    Text(String),
}

/// Accepts `250` or `"250"`.
///
/// Substituted values are always strings, so a numeric field that holds a
/// `${...}` reference arrives as text. A blank string reads as `0`, which the
/// resolver treats as unset.
pub fn usize_from_number_or_string<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(0);
            }
            text.parse()
                .map_err(|e| D::Error::custom(format!("invalid number '{text}': {e}")))
        }
    }
}
