//! Schema model: dimensions, variables and attributes, independent of any
//! file format.
//!
//! `Schema` mirrors a file header without touching the file: a dimension
//! table, a variable table, and file-level attributes. Both tables keep a
//! side vector of names so iteration — and therefore writing — happens in
//! registration order, the same map-plus-order idiom the value store uses.

use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::store::values::ElementType;

/// A scalar attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Text.
    Str(String),
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
}

impl AttrValue {
    /// The element type tag of this value.
    pub fn element_type(&self) -> ElementType {
        match self {
            AttrValue::Str(_) => ElementType::Str,
            AttrValue::Int(_) => ElementType::Int,
            AttrValue::Float(_) => ElementType::Float,
            AttrValue::Double(_) => ElementType::Double,
        }
    }

    /// The text payload, if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// One variable: element type, ordered dimension list, named attributes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Variable {
    element_type: ElementType,
    dims: Vec<(String, usize)>,
    attrs: HashMap<String, AttrValue>,
    attr_order: Vec<String>,
}

impl Variable {
    /// Creates a variable of the given element type with no dimensions yet.
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            dims: Vec::new(),
            attrs: HashMap::new(),
            attr_order: Vec::new(),
        }
    }

    /// The element type tag.
    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Appends a dimension. Order is significant: the innermost (fastest
    /// varying) dimension comes last, as on disk.
    pub fn push_dim(&mut self, name: &str, size: usize) {
        self.dims.push((name.to_owned(), size));
    }

    /// The ordered `(name, size)` dimension list.
    #[inline]
    pub fn dims(&self) -> &[(String, usize)] {
        &self.dims
    }

    /// Dimension names in order.
    pub fn dim_names(&self) -> impl Iterator<Item = &str> {
        self.dims.iter().map(|(n, _)| n.as_str())
    }

    /// Whether the variable references the named dimension.
    pub fn has_dim(&self, name: &str) -> bool {
        self.dims.iter().any(|(n, _)| n == name)
    }

    /// Total element count: the product of all dimension sizes.
    pub fn total_size(&self) -> usize {
        self.dims.iter().map(|(_, s)| s).product()
    }

    /// Attaches an attribute. No-op if `name` is already present.
    pub fn add_attribute(&mut self, name: &str, value: AttrValue) {
        if self.attrs.contains_key(name) {
            return;
        }
        self.attrs.insert(name.to_owned(), value);
        self.attr_order.push(name.to_owned());
    }

    /// Looks up an attribute.
    ///
    /// # Errors
    /// [`BridgeError::UnknownAttribute`] if absent.
    pub fn try_attribute(&self, name: &str) -> Result<&AttrValue, BridgeError> {
        self.attrs
            .get(name)
            .ok_or_else(|| BridgeError::UnknownAttribute(name.to_owned()))
    }

    /// `(name, value)` attribute pairs in attachment order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attr_order
            .iter()
            .map(move |n| (n.as_str(), &self.attrs[n]))
    }

    fn strip_dim(&mut self, name: &str) {
        self.dims.retain(|(n, _)| n != name);
    }
}

/// Equality compares type, dimension list and attributes.
impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.element_type == other.element_type
            && self.dims == other.dims
            && self.attrs == other.attrs
    }
}

/// In-memory description of a file: dimensions, variables, global attributes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Schema {
    dims: HashMap<String, usize>,
    dim_order: Vec<String>,
    vars: HashMap<String, Variable>,
    var_order: Vec<String>,
    global_attrs: HashMap<String, AttrValue>,
    global_attr_order: Vec<String>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dimension. No-op if `name` is already present, whatever
    /// the recorded size; repeated ingests of the same header must not fail.
    pub fn add_dimension(&mut self, name: &str, size: usize) {
        if self.dims.contains_key(name) {
            debug!("dimension `{name}` already registered; keeping existing size");
            return;
        }
        self.dims.insert(name.to_owned(), size);
        self.dim_order.push(name.to_owned());
    }

    /// Size of a named dimension.
    ///
    /// # Errors
    /// [`BridgeError::UnknownDimension`] if absent.
    pub fn dimension_size(&self, name: &str) -> Result<usize, BridgeError> {
        self.dims
            .get(name)
            .copied()
            .ok_or_else(|| BridgeError::UnknownDimension(name.to_owned()))
    }

    /// Whether the named dimension is registered.
    pub fn has_dimension(&self, name: &str) -> bool {
        self.dims.contains_key(name)
    }

    /// `(name, size)` dimension pairs in registration order.
    pub fn dimensions(&self) -> impl Iterator<Item = (&str, usize)> {
        self.dim_order
            .iter()
            .map(move |n| (n.as_str(), self.dims[n]))
    }

    /// Reverse lookup: the dimension whose size equals `size`.
    ///
    /// Auto-naming during writes uses this. Two dimensions sharing a size
    /// make the answer arbitrary, so that case fails loudly instead of
    /// picking whichever happened to be registered first.
    ///
    /// # Errors
    /// - [`BridgeError::NoDimensionForSize`] if nothing matches.
    /// - [`BridgeError::AmbiguousDimensionSize`] if more than one matches.
    pub fn find_dimension_for_size(&self, size: usize) -> Result<&str, BridgeError> {
        let mut matches = self
            .dim_order
            .iter()
            .filter(|n| self.dims[n.as_str()] == size);
        let first = matches
            .next()
            .ok_or(BridgeError::NoDimensionForSize(size))?;
        if let Some(second) = matches.next() {
            return Err(BridgeError::AmbiguousDimensionSize {
                size,
                first: first.clone(),
                second: second.clone(),
            });
        }
        Ok(first)
    }

    /// Removes a dimension, stripping it from every variable referencing it.
    /// Variables that do not reference it are untouched.
    ///
    /// # Errors
    /// [`BridgeError::UnknownDimension`] if absent.
    pub fn delete_dimension(&mut self, name: &str) -> Result<(), BridgeError> {
        if self.dims.remove(name).is_none() {
            return Err(BridgeError::UnknownDimension(name.to_owned()));
        }
        self.dim_order.retain(|n| n != name);
        for var in self.vars.values_mut() {
            var.strip_dim(name);
        }
        Ok(())
    }

    /// Registers a variable. No-op if `name` is already present.
    ///
    /// Every dimension the variable references must already be registered;
    /// this is checked here, not deferred to write time.
    ///
    /// # Errors
    /// [`BridgeError::UndefinedDimension`] naming the first missing dimension.
    pub fn add_variable(&mut self, name: &str, var: Variable) -> Result<(), BridgeError> {
        if self.vars.contains_key(name) {
            debug!("variable `{name}` already registered; keeping existing definition");
            return Ok(());
        }
        for dim in var.dim_names() {
            if !self.dims.contains_key(dim) {
                return Err(BridgeError::UndefinedDimension {
                    variable: name.to_owned(),
                    dimension: dim.to_owned(),
                });
            }
        }
        self.vars.insert(name.to_owned(), var);
        self.var_order.push(name.to_owned());
        Ok(())
    }

    /// Looks up a variable.
    ///
    /// # Errors
    /// [`BridgeError::UnknownVariable`] if absent.
    pub fn try_variable(&self, name: &str) -> Result<&Variable, BridgeError> {
        self.vars
            .get(name)
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))
    }

    /// Looks up a variable mutably.
    pub fn try_variable_mut(&mut self, name: &str) -> Result<&mut Variable, BridgeError> {
        self.vars
            .get_mut(name)
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))
    }

    /// Whether the named variable is registered.
    pub fn has_variable(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Removes a variable.
    ///
    /// # Errors
    /// [`BridgeError::UnknownVariable`] if absent.
    pub fn delete_variable(&mut self, name: &str) -> Result<Variable, BridgeError> {
        let var = self
            .vars
            .remove(name)
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))?;
        self.var_order.retain(|n| n != name);
        Ok(var)
    }

    /// `(name, variable)` pairs in registration order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.var_order
            .iter()
            .map(move |n| (n.as_str(), &self.vars[n]))
    }

    /// Names of variables whose name contains `substring`, in registration
    /// order.
    pub fn variable_names_matching(&self, substring: &str) -> Vec<String> {
        self.var_order
            .iter()
            .filter(|n| n.contains(substring))
            .cloned()
            .collect_vec()
    }

    /// Attaches a file-level attribute. No-op if `name` is already present.
    pub fn add_global_attribute(&mut self, name: &str, value: AttrValue) {
        if self.global_attrs.contains_key(name) {
            return;
        }
        self.global_attrs.insert(name.to_owned(), value);
        self.global_attr_order.push(name.to_owned());
    }

    /// Looks up a file-level attribute.
    ///
    /// # Errors
    /// [`BridgeError::UnknownAttribute`] if absent.
    pub fn try_global_attribute(&self, name: &str) -> Result<&AttrValue, BridgeError> {
        self.global_attrs
            .get(name)
            .ok_or_else(|| BridgeError::UnknownAttribute(name.to_owned()))
    }

    /// `(name, value)` file-level attribute pairs in attachment order.
    pub fn global_attributes(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.global_attr_order
            .iter()
            .map(move |n| (n.as_str(), &self.global_attrs[n]))
    }
}

/// Equality compares dimensions and variables but deliberately excludes
/// file-level attributes: equivalent files differ in provenance strings.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims && self.vars == other.vars
    }
}
