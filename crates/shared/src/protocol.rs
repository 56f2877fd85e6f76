use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{OptionValue, SelectOption};

/// Body returned by every option-list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub results: Vec<OptionItem>,
}

impl OptionsResponse {
    pub fn into_options(self) -> Vec<SelectOption> {
        self.results.into_iter().map(SelectOption::from).collect()
    }
}

/// One entry of `results`. Endpoints disagree on the display key: the
/// enrollment views send `text`, the class notice view sends `label`.
/// When both are present `label` wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawOptionItem")]
pub struct OptionItem {
    pub id: OptionValue,
    pub label: String,
}

#[derive(Deserialize)]
struct RawOptionItem {
    #[serde(deserialize_with = "deserialize_option_id")]
    id: OptionValue,
    label: Option<String>,
    text: Option<String>,
}

impl TryFrom<RawOptionItem> for OptionItem {
    type Error = String;

    fn try_from(raw: RawOptionItem) -> Result<Self, Self::Error> {
        let label = raw
            .label
            .or(raw.text)
            .ok_or_else(|| format!("option {} has neither `label` nor `text`", raw.id))?;
        Ok(Self { id: raw.id, label })
    }
}

impl From<OptionItem> for SelectOption {
    fn from(item: OptionItem) -> Self {
        SelectOption {
            value: item.id,
            label: item.label,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOptionId {
    Number(serde_json::Number),
    Text(String),
}

fn deserialize_option_id<'de, D>(deserializer: D) -> Result<OptionValue, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawOptionId::deserialize(deserializer)?;
    Ok(match raw {
        RawOptionId::Number(number) => OptionValue(number_to_value(&number)),
        RawOptionId::Text(text) => OptionValue(text),
    })
}

/// Integral floats render without a fraction (`2.0` -> `"2"`), matching how
/// the browser stringifies them into `<option value>`.
fn number_to_value(number: &serde_json::Number) -> String {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    match number.as_f64() {
        Some(float)
            if number.is_f64() && float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER =>
        {
            format!("{}", float as i64)
        }
        _ => number.to_string(),
    }
}
