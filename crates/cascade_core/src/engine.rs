//! Synchronous cascade state machine. It owns the form fields, decides what
//! to clear and what to fetch, and applies responses. It performs no I/O.

use std::collections::HashMap;

use shared::{
    domain::{FieldKey, Generation, OptionValue, SelectOption},
    error::FetchError,
};
use tracing::debug;
use url::Url;

use crate::{
    definition::{Cascade, CascadeDefinition, Endpoint},
    error::{BindError, EngineError},
    form::Field,
    paths::PageContext,
};

/// A request the engine wants issued for `field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub field: FieldKey,
    pub generation: Generation,
    pub url: Url,
}

/// Effects of a change notification on one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeOutcome {
    pub source: Option<FieldKey>,
    pub cleared: Vec<FieldKey>,
    pub fetches: Vec<FetchPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Applied {
        field: FieldKey,
        option_count: usize,
        restored: bool,
        follow_up: ChangeOutcome,
    },
    Failed {
        field: FieldKey,
        error: FetchError,
    },
    /// A newer request was issued for the field, or the field was cleared,
    /// after this one.
    Stale {
        field: FieldKey,
        generation: Generation,
        latest: Generation,
    },
}

#[derive(Debug)]
pub struct CascadeEngine {
    cascade: Cascade,
    fields: HashMap<FieldKey, Field>,
    endpoints: HashMap<FieldKey, Url>,
    generations: HashMap<FieldKey, Generation>,
}

impl CascadeEngine {
    pub fn bind(
        definition: CascadeDefinition,
        page: &PageContext,
        fields: Vec<Field>,
    ) -> Result<Self, BindError> {
        let cascade = Cascade::new(definition)?;

        if !cascade.activation().matches(&page.path) {
            return Err(BindError::Inactive {
                cascade: cascade.name().to_string(),
                path: page.path.clone(),
            });
        }

        let mut fields: HashMap<FieldKey, Field> = fields
            .into_iter()
            .map(|field| (field.key.clone(), field))
            .collect();
        for key in cascade.fields() {
            let field = fields
                .get_mut(key)
                .ok_or_else(|| BindError::MissingField { field: key.clone() })?;
            field.bind();
        }
        fields.retain(|key, _| cascade.fields().contains(key));

        let mut endpoints = HashMap::new();
        for dependency in cascade.dependencies() {
            let endpoint = match &dependency.endpoint {
                Endpoint::Relative { suffix } => page.relative_endpoint(suffix),
                Endpoint::DataAttribute => {
                    let data_url = fields
                        .get(&dependency.field)
                        .and_then(|field| field.data_url.as_deref())
                        .filter(|url| !url.trim().is_empty())
                        .ok_or_else(|| BindError::MissingDataUrl {
                            field: dependency.field.clone(),
                        })?;
                    page.attribute_endpoint(data_url)
                }
            }
            .map_err(|source| BindError::InvalidEndpoint {
                field: dependency.field.clone(),
                source,
            })?;
            endpoints.insert(dependency.field.clone(), endpoint);
        }

        Ok(Self {
            cascade,
            fields,
            endpoints,
            generations: HashMap::new(),
        })
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    pub fn field(&self, key: &FieldKey) -> Option<&Field> {
        self.fields.get(key)
    }

    /// Fields in chain order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.cascade
            .fields()
            .iter()
            .filter_map(|key| self.fields.get(key))
    }

    pub fn generation(&self, key: &FieldKey) -> Generation {
        self.generations.get(key).copied().unwrap_or_default()
    }

    /// A user picked `value` in `key`.
    pub fn set_value(
        &mut self,
        key: &FieldKey,
        value: OptionValue,
    ) -> Result<ChangeOutcome, EngineError> {
        self.field_mut(key)?.select(value);
        self.notify_change(key)
    }

    /// Re-derive everything below `key` from its current value.
    pub fn notify_change(&mut self, key: &FieldKey) -> Result<ChangeOutcome, EngineError> {
        let value = self.field_mut(key)?.value.clone();

        let cleared = self.cascade.downstream_of(key);
        for downstream in &cleared {
            let generation = self.generation(downstream).next();
            self.generations.insert(downstream.clone(), generation);
            if let Some(field) = self.fields.get_mut(downstream) {
                field.clear();
            }
        }

        let mut outcome = ChangeOutcome {
            source: Some(key.clone()),
            cleared,
            fetches: Vec::new(),
        };
        if value.is_blank() {
            return Ok(outcome);
        }

        let dependencies: Vec<_> = self.cascade.immediate_dependents(key).cloned().collect();
        for dependency in dependencies {
            let mut query = Vec::with_capacity(dependency.params.len());
            for param in &dependency.params {
                match self.fields.get(&param.source) {
                    Some(source) if !source.value.is_blank() => {
                        query.push((param.name.as_str(), source.value.as_str()));
                    }
                    _ => break,
                }
            }
            if query.len() != dependency.params.len() {
                debug!(
                    field = %dependency.field,
                    "cascade: upstream parameter blank, skipping fetch"
                );
                continue;
            }

            let Some(endpoint) = self.endpoints.get(&dependency.field) else {
                continue;
            };
            let mut url = endpoint.clone();
            url.query_pairs_mut().extend_pairs(query);

            let generation = self.generation(&dependency.field);
            if let Some(field) = self.fields.get_mut(&dependency.field) {
                field.start_loading(generation, dependency.loading_placeholder);
            }
            outcome.fetches.push(FetchPlan {
                field: dependency.field.clone(),
                generation,
                url,
            });
        }

        Ok(outcome)
    }

    /// Change notifications for every field with dependents, in chain order,
    /// so saved values are re-validated against current server data.
    pub fn initial_sync(&mut self) -> Vec<ChangeOutcome> {
        let roots: Vec<FieldKey> = self
            .cascade
            .fields()
            .iter()
            .filter(|key| self.cascade.has_dependents(key))
            .cloned()
            .collect();

        roots
            .iter()
            .filter_map(|key| self.notify_change(key).ok())
            .collect()
    }

    pub fn resolve(
        &mut self,
        plan: &FetchPlan,
        result: Result<Vec<SelectOption>, FetchError>,
    ) -> Resolution {
        let latest = self.generation(&plan.field);
        if latest != plan.generation {
            return Resolution::Stale {
                field: plan.field.clone(),
                generation: plan.generation,
                latest,
            };
        }

        let Some(field) = self.fields.get_mut(&plan.field) else {
            return Resolution::Stale {
                field: plan.field.clone(),
                generation: plan.generation,
                latest,
            };
        };

        match result {
            Ok(options) => {
                let option_count = options.len();
                let restored = field.populate(options);
                let follow_up = self.notify_change(&plan.field).unwrap_or_default();
                Resolution::Applied {
                    field: plan.field.clone(),
                    option_count,
                    restored,
                    follow_up,
                }
            }
            Err(error) => {
                field.reset_after_failure();
                Resolution::Failed {
                    field: plan.field.clone(),
                    error,
                }
            }
        }
    }

    fn field_mut(&mut self, key: &FieldKey) -> Result<&mut Field, EngineError> {
        self.fields
            .get_mut(key)
            .ok_or_else(|| EngineError::UnknownField { field: key.clone() })
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
