//! Form field state mutated by the cascade.

use serde::Serialize;
use shared::domain::{FieldKey, Generation, OptionValue, SelectOption};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FieldState {
    Unbound,
    Idle,
    Loading { generation: Generation },
    Populated,
    Error,
}

/// One selection control. Built by the host from rendered page state and
/// handed to the controller at bind time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub key: FieldKey,
    pub options: Vec<SelectOption>,
    pub value: OptionValue,
    pub enabled: bool,
    pub data_url: Option<String>,
    pub state: FieldState,
    #[serde(skip)]
    remembered: Option<OptionValue>,
}

impl Field {
    pub fn new(key: impl Into<FieldKey>) -> Self {
        Self {
            key: key.into(),
            options: vec![SelectOption::blank()],
            value: OptionValue::blank(),
            enabled: true,
            data_url: None,
            state: FieldState::Unbound,
            remembered: None,
        }
    }

    /// Rendered options, after the blank option.
    pub fn with_options(mut self, options: impl IntoIterator<Item = SelectOption>) -> Self {
        self.options = blank_prefixed(options);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = OptionValue(value.into());
        self
    }

    pub fn with_data_url(mut self, data_url: impl Into<String>) -> Self {
        self.data_url = Some(data_url.into());
        self
    }

    pub fn option_values(&self) -> Vec<&str> {
        self.options.iter().map(|option| option.value.as_str()).collect()
    }

    pub fn is_blank_only(&self) -> bool {
        self.options.len() == 1 && self.options[0].value.is_blank() && self.value.is_blank()
    }

    pub(crate) fn bind(&mut self) {
        self.state = FieldState::Idle;
    }

    pub(crate) fn select(&mut self, value: OptionValue) {
        self.value = value;
        self.remembered = None;
    }

    /// Drops options that belonged to a previous upstream value.
    pub(crate) fn clear(&mut self) {
        if !self.value.is_blank() {
            self.remembered = Some(std::mem::take(&mut self.value));
        }
        self.options = vec![SelectOption::blank()];
        self.enabled = true;
        self.state = FieldState::Idle;
    }

    pub(crate) fn start_loading(&mut self, generation: Generation, placeholder: bool) {
        if placeholder {
            self.options = vec![SelectOption::loading()];
            self.enabled = false;
        }
        self.state = FieldState::Loading { generation };
    }

    /// Returns whether the prior selection survived.
    pub(crate) fn populate(&mut self, options: Vec<SelectOption>) -> bool {
        let prior = if self.value.is_blank() {
            self.remembered.take()
        } else {
            self.remembered = None;
            Some(std::mem::take(&mut self.value))
        };

        self.options = blank_prefixed(options);
        self.enabled = true;
        self.state = FieldState::Populated;

        match prior {
            Some(prior) if self.options.iter().any(|option| option.value == prior) => {
                self.value = prior;
                true
            }
            _ => {
                self.value = OptionValue::blank();
                false
            }
        }
    }

    pub(crate) fn reset_after_failure(&mut self) {
        self.options = vec![SelectOption::blank()];
        self.value = OptionValue::blank();
        self.enabled = true;
        self.state = FieldState::Error;
    }
}

fn blank_prefixed(options: impl IntoIterator<Item = SelectOption>) -> Vec<SelectOption> {
    std::iter::once(SelectOption::blank())
        .chain(options.into_iter().filter(|option| !option.value.is_blank()))
        .collect()
}
