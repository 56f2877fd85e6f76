//! Declarative cascade definitions and their validated, indexed form.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use shared::domain::FieldKey;

use crate::error::DefinitionError;

/// Where a dependency's option list is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    /// Joined onto the page's base path, e.g. `related/slots/`.
    Relative { suffix: String },
    /// Read from the dependent field's `data-url` attribute.
    DataAttribute,
}

/// Pages on which a definition may bind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivationRule {
    #[default]
    Always,
    /// Only the "add new record" page of `model`, e.g. `/admin/portal/classnotice/add/`.
    AddPage { model: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub source: FieldKey,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, source: impl Into<FieldKey>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// `field` takes its options from `endpoint`, queried with the values of
/// `params`, whenever `depends_on` changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub field: FieldKey,
    pub depends_on: FieldKey,
    pub endpoint: Endpoint,
    pub params: Vec<QueryParam>,
    #[serde(default)]
    pub loading_placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeDefinition {
    pub name: String,
    #[serde(default)]
    pub activation: ActivationRule,
    pub dependencies: Vec<Dependency>,
}

impl CascadeDefinition {
    /// Enrollment admin form: `parent → student` and
    /// `course → semester → course_slot → sub_group`, on add and change pages.
    pub fn enrollment() -> Self {
        Self {
            name: "enrollment".into(),
            activation: ActivationRule::Always,
            dependencies: vec![
                relative("student", "parent", "related/students/", &[("parent_id", "parent")]),
                relative("semester", "course", "related/semesters/", &[("course_id", "course")]),
                relative(
                    "course_slot",
                    "semester",
                    "related/slots/",
                    &[("course_id", "course"), ("semester_id", "semester")],
                ),
                relative("sub_group", "course_slot", "related/subgroups/", &[("slot_id", "course_slot")]),
            ],
        }
    }

    /// Class notice add form: `course_slot → sub_group`, endpoint taken from
    /// the sub-group control's `data-url`.
    pub fn class_notice() -> Self {
        Self {
            name: "class_notice".into(),
            activation: ActivationRule::AddPage {
                model: "classnotice".into(),
            },
            dependencies: vec![Dependency {
                field: "sub_group".into(),
                depends_on: "course_slot".into(),
                endpoint: Endpoint::DataAttribute,
                params: vec![QueryParam::new("slot_id", "course_slot")],
                loading_placeholder: true,
            }],
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "enrollment" => Some(Self::enrollment()),
            "class_notice" => Some(Self::class_notice()),
            _ => None,
        }
    }
}

fn relative(field: &str, depends_on: &str, suffix: &str, params: &[(&str, &str)]) -> Dependency {
    Dependency {
        field: field.into(),
        depends_on: depends_on.into(),
        endpoint: Endpoint::Relative {
            suffix: suffix.into(),
        },
        params: params
            .iter()
            .map(|(name, source)| QueryParam::new(*name, *source))
            .collect(),
        loading_placeholder: false,
    }
}

/// A definition that passed validation, indexed for walking the chain.
#[derive(Debug, Clone)]
pub struct Cascade {
    name: String,
    activation: ActivationRule,
    dependencies: Vec<Dependency>,
    upstream: HashMap<FieldKey, usize>,
    dependents: HashMap<FieldKey, Vec<usize>>,
    order: Vec<FieldKey>,
}

impl Cascade {
    pub fn new(definition: CascadeDefinition) -> Result<Self, DefinitionError> {
        let CascadeDefinition {
            name,
            activation,
            dependencies,
        } = definition;

        if dependencies.is_empty() {
            return Err(DefinitionError::Empty { name });
        }

        let mut upstream = HashMap::new();
        let mut dependents: HashMap<FieldKey, Vec<usize>> = HashMap::new();
        for (index, dependency) in dependencies.iter().enumerate() {
            if dependency.field == dependency.depends_on {
                return Err(DefinitionError::SelfDependency {
                    field: dependency.field.clone(),
                });
            }
            if upstream.insert(dependency.field.clone(), index).is_some() {
                return Err(DefinitionError::DuplicateUpstream {
                    field: dependency.field.clone(),
                });
            }
            if dependency.params.is_empty() {
                return Err(DefinitionError::MissingParams {
                    field: dependency.field.clone(),
                });
            }
            dependents
                .entry(dependency.depends_on.clone())
                .or_default()
                .push(index);
        }

        for dependency in &dependencies {
            let mut seen = HashSet::new();
            let mut cursor = dependency.field.clone();
            while let Some(&index) = upstream.get(&cursor) {
                if !seen.insert(cursor.clone()) {
                    return Err(DefinitionError::Cycle {
                        field: dependency.field.clone(),
                    });
                }
                cursor = dependencies[index].depends_on.clone();
            }
        }

        let mut cascade = Self {
            name,
            activation,
            dependencies,
            upstream,
            dependents,
            order: Vec::new(),
        };

        for dependency in &cascade.dependencies {
            for param in &dependency.params {
                if param.source != dependency.depends_on
                    && !cascade.ancestors(&dependency.depends_on).contains(&param.source)
                {
                    return Err(DefinitionError::ParamSourceNotUpstream {
                        field: dependency.field.clone(),
                        source_field: param.source.clone(),
                    });
                }
            }
        }

        cascade.order = cascade.chain_order();
        Ok(cascade)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn activation(&self) -> &ActivationRule {
        &self.activation
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Every field the cascade touches, roots first, each dependent after
    /// its upstream.
    pub fn fields(&self) -> &[FieldKey] {
        &self.order
    }

    pub fn upstream_of(&self, field: &FieldKey) -> Option<&Dependency> {
        self.upstream
            .get(field)
            .map(|&index| &self.dependencies[index])
    }

    pub fn immediate_dependents(&self, field: &FieldKey) -> impl Iterator<Item = &Dependency> {
        self.dependents
            .get(field)
            .into_iter()
            .flatten()
            .map(|&index| &self.dependencies[index])
    }

    pub fn has_dependents(&self, field: &FieldKey) -> bool {
        self.dependents.contains_key(field)
    }

    /// Transitive dependents of `field` in chain order.
    pub fn downstream_of(&self, field: &FieldKey) -> Vec<FieldKey> {
        let mut out = Vec::new();
        self.collect_downstream(field, &mut out);
        out
    }

    fn collect_downstream(&self, field: &FieldKey, out: &mut Vec<FieldKey>) {
        for dependency in self.immediate_dependents(field) {
            out.push(dependency.field.clone());
            self.collect_downstream(&dependency.field, out);
        }
    }

    fn ancestors(&self, field: &FieldKey) -> Vec<FieldKey> {
        let mut out = Vec::new();
        let mut cursor = field;
        while let Some(dependency) = self.upstream_of(cursor) {
            out.push(dependency.depends_on.clone());
            cursor = &dependency.depends_on;
        }
        out
    }

    fn chain_order(&self) -> Vec<FieldKey> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        for dependency in &self.dependencies {
            let root = &dependency.depends_on;
            if self.upstream.contains_key(root) || !seen.insert(root.clone()) {
                continue;
            }
            order.push(root.clone());
            order.extend(self.downstream_of(root));
        }
        order
    }
}

#[cfg(test)]
#[path = "tests/definition_tests.rs"]
mod tests;
