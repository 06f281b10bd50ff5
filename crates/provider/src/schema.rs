//! Resource schemas
//!
//! A schema describes the attributes and nested blocks of a resource, data
//! source or the provider block. Besides advertising itself to Terraform it
//! drives planning: defaults, unknown computed values, suppressed diffs and
//! attributes whose change forces a new resource.

use std::collections::BTreeMap;
use std::sync::Arc;

use azurerm_common::normalize_location;

use crate::diagnostics::{self, PathStep};
use crate::state::DynamicValue;
use crate::tfplugin6::{self, schema as proto, Diagnostic, StringKind};

/// Validation function: value and attribute name in, error messages out
pub type ValidateFn = Arc<dyn Fn(&DynamicValue, &str) -> Vec<String> + Send + Sync>;

/// Value type of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrType {
    String,
    Number,
    Bool,
    List(Box<AttrType>),
    Set(Box<AttrType>),
    Map(Box<AttrType>),
}

impl AttrType {
    pub fn list_of(t: AttrType) -> Self {
        AttrType::List(Box::new(t))
    }

    pub fn set_of(t: AttrType) -> Self {
        AttrType::Set(Box::new(t))
    }

    pub fn map_of(t: AttrType) -> Self {
        AttrType::Map(Box::new(t))
    }

    /// Type constraint in cty's JSON notation
    pub fn to_cty_json(&self) -> serde_json::Value {
        match self {
            AttrType::String => serde_json::json!("string"),
            AttrType::Number => serde_json::json!("number"),
            AttrType::Bool => serde_json::json!("bool"),
            AttrType::List(t) => serde_json::json!(["list", t.to_cty_json()]),
            AttrType::Set(t) => serde_json::json!(["set", t.to_cty_json()]),
            AttrType::Map(t) => serde_json::json!(["map", t.to_cty_json()]),
        }
    }

    fn is_set(&self) -> bool {
        matches!(self, AttrType::Set(_))
    }
}

/// Ways two differing values can still count as equal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppress {
    CaseInsensitive,
    /// `West Europe` and `westeurope` are the same region
    Location,
    /// Same instant written differently
    Rfc3339Time,
}

impl Suppress {
    pub fn equivalent(&self, old: &DynamicValue, new: &DynamicValue) -> bool {
        let (Some(old), Some(new)) = (old.as_string(), new.as_string()) else {
            return old == new;
        };
        match self {
            Suppress::CaseInsensitive => old.eq_ignore_ascii_case(new),
            Suppress::Location => normalize_location(old) == normalize_location(new),
            Suppress::Rfc3339Time => {
                match (
                    chrono::DateTime::parse_from_rfc3339(old),
                    chrono::DateTime::parse_from_rfc3339(new),
                ) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => old == new,
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct Attribute {
    pub name: &'static str,
    pub attr_type: AttrType,
    pub description: &'static str,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub deprecated: Option<&'static str>,
    pub force_new: bool,
    pub default: Option<DynamicValue>,
    pub validate: Vec<ValidateFn>,
    /// Validators applied to each element of a list or set
    pub validate_elements: Vec<ValidateFn>,
    pub suppress: Option<Suppress>,
    pub conflicts_with: Vec<&'static str>,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("attr_type", &self.attr_type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("force_new", &self.force_new)
            .finish()
    }
}

impl Attribute {
    fn new(name: &'static str, attr_type: AttrType) -> Self {
        Self {
            name,
            attr_type,
            description: "",
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            deprecated: None,
            force_new: false,
            default: None,
            validate: Vec::new(),
            validate_elements: Vec::new(),
            suppress: None,
            conflicts_with: Vec::new(),
        }
    }

    pub fn required(name: &'static str, attr_type: AttrType) -> Self {
        Self {
            required: true,
            ..Self::new(name, attr_type)
        }
    }

    pub fn optional(name: &'static str, attr_type: AttrType) -> Self {
        Self {
            optional: true,
            ..Self::new(name, attr_type)
        }
    }

    pub fn computed(name: &'static str, attr_type: AttrType) -> Self {
        Self {
            computed: true,
            ..Self::new(name, attr_type)
        }
    }

    /// Optional, filled in by the remote side when left out
    pub fn optional_computed(name: &'static str, attr_type: AttrType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(name, attr_type)
        }
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default(mut self, value: DynamicValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn validate(mut self, f: ValidateFn) -> Self {
        self.validate.push(f);
        self
    }

    pub fn validate_elements(mut self, f: ValidateFn) -> Self {
        self.validate_elements.push(f);
        self
    }

    pub fn suppress(mut self, suppress: Suppress) -> Self {
        self.suppress = Some(suppress);
        self
    }

    pub fn conflicts_with(mut self, names: &[&'static str]) -> Self {
        self.conflicts_with.extend_from_slice(names);
        self
    }

    pub fn deprecated(mut self, message: &'static str) -> Self {
        self.deprecated = Some(message);
        self
    }

    fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    fn equivalent(&self, old: &DynamicValue, new: &DynamicValue) -> bool {
        if old == new {
            return true;
        }
        if self.attr_type.is_set() {
            if let (Some(a), Some(b)) = (old.as_list(), new.as_list()) {
                return same_elements(a, b);
            }
        }
        match self.suppress {
            Some(s) if !old.is_unknown() && !new.is_unknown() => s.equivalent(old, new),
            _ => false,
        }
    }

    pub fn to_proto(&self) -> proto::Attribute {
        let has_default = self.default.is_some();
        proto::Attribute {
            name: self.name.to_string(),
            r#type: serde_json::to_vec(&self.attr_type.to_cty_json()).unwrap_or_default(),
            description: self.description.to_string(),
            required: self.required,
            optional: self.optional || has_default,
            computed: self.computed || has_default,
            sensitive: self.sensitive,
            description_kind: StringKind::Plain as i32,
            deprecated: self.deprecated.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    List,
    Set,
}

#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub name: &'static str,
    pub nesting: Nesting,
    pub block: Block,
    pub min_items: i64,
    pub max_items: i64,
    pub force_new: bool,
}

impl NestedBlock {
    pub fn list(name: &'static str, block: Block) -> Self {
        Self {
            name,
            nesting: Nesting::List,
            block,
            min_items: 0,
            max_items: 0,
            force_new: false,
        }
    }

    pub fn set(name: &'static str, block: Block) -> Self {
        Self {
            nesting: Nesting::Set,
            ..Self::list(name, block)
        }
    }

    pub fn min_items(mut self, n: i64) -> Self {
        self.min_items = n;
        self
    }

    pub fn max_items(mut self, n: i64) -> Self {
        self.max_items = n;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn to_proto(&self) -> proto::NestedBlock {
        let nesting = match self.nesting {
            Nesting::List => proto::nested_block::NestingMode::List,
            Nesting::Set => proto::nested_block::NestingMode::Set,
        };
        proto::NestedBlock {
            type_name: self.name.to_string(),
            block: Some(self.block.to_proto()),
            nesting: nesting as i32,
            min_items: self.min_items,
            max_items: self.max_items,
        }
    }

    fn equivalent(&self, old: &[DynamicValue], new: &[DynamicValue]) -> bool {
        match self.nesting {
            Nesting::List => old == new,
            Nesting::Set => same_elements(old, new),
        }
    }
}

/// Attributes and nested blocks of one object
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<NestedBlock>,
    pub description: &'static str,
}

impl Block {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            blocks: Vec::new(),
            description: "",
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<NestedBlock>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn to_proto(&self) -> proto::Block {
        proto::Block {
            version: 0,
            attributes: self.attributes.iter().map(Attribute::to_proto).collect(),
            block_types: self.blocks.iter().map(NestedBlock::to_proto).collect(),
            description: self.description.to_string(),
            description_kind: StringKind::Plain as i32,
            deprecated: false,
        }
    }

    /// Keep exactly this block's attributes and blocks, filling the gaps
    pub fn conform(&self, value: &DynamicValue) -> DynamicValue {
        if value.is_null() {
            return DynamicValue::Null;
        }

        let mut out = BTreeMap::new();
        for attr in &self.attributes {
            let v = value.get(attr.name).cloned().unwrap_or_default();
            out.insert(attr.name.to_string(), v);
        }
        for nested in &self.blocks {
            let items = value
                .get(nested.name)
                .and_then(|v| v.as_list())
                .map(|items| items.iter().map(|i| nested.block.conform(i)).collect())
                .unwrap_or_default();
            out.insert(nested.name.to_string(), DynamicValue::List(items));
        }
        DynamicValue::Map(out)
    }

    /// Plan a new object: defaults applied, unset computed values unknown
    pub fn plan_create(&self, proposed: &DynamicValue) -> DynamicValue {
        let mut out = BTreeMap::new();
        for attr in &self.attributes {
            let mut planned = proposed.get(attr.name).cloned().unwrap_or_default();
            if planned.is_null() {
                if let Some(default) = &attr.default {
                    planned = default.clone();
                } else if attr.computed {
                    planned = DynamicValue::Unknown;
                }
            }
            if attr.suppress == Some(Suppress::Location) {
                planned = normalized_location(planned);
            }
            out.insert(attr.name.to_string(), planned);
        }
        for nested in &self.blocks {
            let items = proposed_items(proposed, nested.name)
                .iter()
                .map(|item| nested.block.plan_create(item))
                .collect();
            out.insert(nested.name.to_string(), DynamicValue::List(items));
        }
        DynamicValue::Map(out)
    }

    /// Plan a change to an existing object.
    ///
    /// `config` is what the user wrote; a null attribute there resets to its
    /// default. Returns the planned value and the attributes that force
    /// replacement.
    pub fn plan_update(
        &self,
        prior: &DynamicValue,
        proposed: &DynamicValue,
        config: &DynamicValue,
    ) -> (DynamicValue, Vec<String>) {
        let mut planned = self.plan_existing(prior, proposed, Some(config));
        let replace = self.replace_paths(prior, &planned);

        if !replace.is_empty() {
            self.plan_replacement(config, &mut planned);
        }
        (planned, replace)
    }

    /// Values the remote side fills in become unknown for a replacement
    pub fn plan_replacement(&self, config: &DynamicValue, planned: &mut DynamicValue) {
        for attr in &self.attributes {
            let user_set = config.get(attr.name).map(|v| !v.is_null()).unwrap_or(false);
            if attr.is_computed_only() || (attr.computed && !user_set && attr.default.is_none()) {
                planned.set(attr.name, DynamicValue::Unknown);
            }
        }
    }

    /// Attributes and blocks whose change cannot be applied in place
    pub fn replace_paths(&self, prior: &DynamicValue, planned: &DynamicValue) -> Vec<String> {
        let mut replace = Vec::new();
        for attr in self.attributes.iter().filter(|a| a.force_new) {
            let old = prior.get(attr.name).cloned().unwrap_or_default();
            let new = planned.get(attr.name).cloned().unwrap_or_default();
            if !attr.equivalent(&old, &new) {
                replace.push(attr.name.to_string());
            }
        }
        for nested in self.blocks.iter().filter(|b| b.force_new) {
            let old = proposed_items(prior, nested.name);
            let new = proposed_items(planned, nested.name);
            if !nested.equivalent(old, new) {
                replace.push(nested.name.to_string());
            }
        }
        replace
    }

    fn plan_existing(
        &self,
        prior: &DynamicValue,
        proposed: &DynamicValue,
        config: Option<&DynamicValue>,
    ) -> DynamicValue {
        let mut out = BTreeMap::new();
        for attr in &self.attributes {
            let old = prior.get(attr.name).cloned().unwrap_or_default();
            let mut planned = proposed.get(attr.name).cloned().unwrap_or_default();
            let configured = match config {
                Some(config) => config.get(attr.name).map(|v| !v.is_null()).unwrap_or(false),
                None => !planned.is_null(),
            };

            if attr.is_computed_only() {
                planned = old.clone();
            } else if !configured {
                if let Some(default) = &attr.default {
                    planned = default.clone();
                } else if attr.computed && planned.is_null() {
                    planned = old.clone();
                }
            }

            if attr.equivalent(&old, &planned) {
                planned = old;
            } else if attr.suppress == Some(Suppress::Location) {
                planned = normalized_location(planned);
            }
            out.insert(attr.name.to_string(), planned);
        }

        for nested in &self.blocks {
            let old = proposed_items(prior, nested.name);
            let new = proposed_items(proposed, nested.name);
            let items = match nested.nesting {
                Nesting::List => new
                    .iter()
                    .enumerate()
                    .map(|(i, item)| match old.get(i) {
                        Some(prev) => nested.block.plan_existing(prev, item, None),
                        None => nested.block.plan_create(item),
                    })
                    .collect(),
                Nesting::Set => new
                    .iter()
                    .map(|item| match old.iter().find(|prev| nested.block.matches(prev, item)) {
                        Some(prev) => nested.block.plan_existing(prev, item, None),
                        None => nested.block.plan_create(item),
                    })
                    .collect(),
            };
            out.insert(nested.name.to_string(), DynamicValue::List(items));
        }
        DynamicValue::Map(out)
    }

    /// Whether a set element corresponds to a prior one, ignoring values the
    /// remote side fills in
    fn matches(&self, prior: &DynamicValue, proposed: &DynamicValue) -> bool {
        let attrs_match = self.attributes.iter().all(|attr| {
            let new = proposed.get(attr.name).cloned().unwrap_or_default();
            if attr.is_computed_only() || (attr.computed && new.is_null()) {
                return true;
            }
            let old = prior.get(attr.name).cloned().unwrap_or_default();
            attr.equivalent(&old, &new)
        });
        attrs_match
            && self.blocks.iter().all(|nested| {
                let old = proposed_items(prior, nested.name);
                let new = proposed_items(proposed, nested.name);
                old.len() == new.len()
                    && new
                        .iter()
                        .all(|n| old.iter().any(|o| nested.block.matches(o, n)))
            })
    }

    /// Run validators over a configuration
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        self.validate_at(config, &[], &mut diags);
        diags
    }

    fn validate_at(&self, config: &DynamicValue, path: &[PathStep], diags: &mut Vec<Diagnostic>) {
        for attr in &self.attributes {
            let value = config.get(attr.name).cloned().unwrap_or_default();
            if value.is_null() {
                continue;
            }

            let mut attr_path = path.to_vec();
            attr_path.push(PathStep::Attribute(attr.name.to_string()));

            if let Some(message) = attr.deprecated {
                diags.push(diagnostics::at(
                    diagnostics::warning(format!("Argument {:?} is deprecated", attr.name), message),
                    &attr_path,
                ));
            }

            for other in &attr.conflicts_with {
                let conflicting = config.get(other).map(|v| !v.is_null()).unwrap_or(false);
                if conflicting {
                    diags.push(diagnostics::at(
                        diagnostics::error(
                            "Conflicting configuration arguments",
                            format!("{:?}: conflicts with {}", attr.name, other),
                        ),
                        &attr_path,
                    ));
                }
            }

            if value.is_unknown() {
                continue;
            }

            for f in &attr.validate {
                for message in f(&value, attr.name) {
                    diags.push(diagnostics::at(diagnostics::error("Invalid value", message), &attr_path));
                }
            }

            if !attr.validate_elements.is_empty() {
                for (i, item) in value.as_list().unwrap_or(&[]).iter().enumerate() {
                    if item.is_null() || item.is_unknown() {
                        continue;
                    }
                    let key = format!("{}.{}", attr.name, i);
                    for f in &attr.validate_elements {
                        for message in f(item, &key) {
                            diags.push(diagnostics::at(
                                diagnostics::error("Invalid value", message),
                                &attr_path,
                            ));
                        }
                    }
                }
            }
        }

        for nested in &self.blocks {
            for (i, item) in proposed_items(config, nested.name).iter().enumerate() {
                let mut item_path = path.to_vec();
                item_path.push(PathStep::Attribute(nested.name.to_string()));
                item_path.push(PathStep::Index(i as i64));
                nested.block.validate_at(item, &item_path, diags);
            }
        }
    }
}

/// A complete schema as advertised to Terraform
pub fn to_proto(block: &Block) -> tfplugin6::Schema {
    tfplugin6::Schema {
        version: 0,
        block: Some(block.to_proto()),
    }
}

fn proposed_items<'a>(value: &'a DynamicValue, name: &str) -> &'a [DynamicValue] {
    value.get(name).and_then(|v| v.as_list()).unwrap_or(&[])
}

fn normalized_location(value: DynamicValue) -> DynamicValue {
    match value {
        DynamicValue::String(s) => DynamicValue::String(normalize_location(&s)),
        other => other,
    }
}

/// Set equality: same elements regardless of order
fn same_elements(a: &[DynamicValue], b: &[DynamicValue]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<String> = a.iter().map(|v| format!("{:?}", v)).collect();
    let mut right: Vec<String> = b.iter().map(|v| format!("{:?}", v)).collect();
    left.sort();
    right.sort();
    left == right
}
