//! The on-disk format engine interface, plus an in-memory implementation.
//!
//! The real byte layout of the files belongs to an external engine (NetCDF
//! in production); this crate only ever talks through [`FormatEngine`].
//! [`MemoryEngine`] implements the same contract against a shared in-memory
//! store so the round-trip and orchestration tests can run without touching
//! a filesystem or linking a format library.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::BridgeError;
use crate::store::schema::AttrValue;
use crate::store::values::{ElementType, Values};

/// Mode a file handle was opened in.
///
/// A handle never switches modes; changing direction requires a close and a
/// fresh open.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileMode {
    /// Read-only access to an existing file.
    Read,
    /// Truncate-and-replace write access.
    Write,
}

impl FileMode {
    fn name(self) -> &'static str {
        match self {
            FileMode::Read => "reading",
            FileMode::Write => "writing",
        }
    }
}

/// Header facts for one variable as the engine reports them.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableInfo {
    /// Variable name.
    pub name: String,
    /// Element type tag.
    pub element_type: ElementType,
    /// Dimension names, outermost first (innermost varies fastest).
    pub dims: Vec<String>,
    /// Attributes in declaration order.
    pub attrs: Vec<(String, AttrValue)>,
}

/// Typed access to one on-disk file at a time.
///
/// Write-side registration calls (`add_dimension`, `add_variable`,
/// `add_attribute`) skip names that are already present, so repeated flushes
/// into the same open file are incremental rather than an error.
pub trait FormatEngine {
    /// Opens `path` in the given mode. Write mode truncates.
    fn open(&mut self, path: &Path, mode: FileMode) -> Result<(), BridgeError>;

    /// Closes the current handle, committing pending writes.
    fn close(&mut self) -> Result<(), BridgeError>;

    /// The mode of the currently open handle, if any.
    fn mode(&self) -> Option<FileMode>;

    /// `(name, size)` for every dimension in declaration order.
    fn dimensions(&self) -> Result<Vec<(String, usize)>, BridgeError>;

    /// Header facts for every variable in declaration order.
    fn variables(&self) -> Result<Vec<VariableInfo>, BridgeError>;

    /// File-level attributes in declaration order.
    fn global_attributes(&self) -> Result<Vec<(String, AttrValue)>, BridgeError>;

    /// Reads a variable's full contents.
    fn read_full(&self, name: &str) -> Result<Values, BridgeError>;

    /// Reads a hyperslab: `offsets[d]..offsets[d]+counts[d]` per dimension,
    /// innermost dimension varying fastest in the returned buffer.
    fn read_slice(
        &self,
        name: &str,
        offsets: &[usize],
        counts: &[usize],
    ) -> Result<Values, BridgeError>;

    /// Registers a dimension. No-op if already present.
    fn add_dimension(&mut self, name: &str, size: usize) -> Result<(), BridgeError>;

    /// Registers a variable over already-registered dimensions. No-op if a
    /// variable of this name is already present.
    fn add_variable(
        &mut self,
        name: &str,
        ty: ElementType,
        dims: &[String],
    ) -> Result<(), BridgeError>;

    /// Attaches an attribute to a variable (`Some(name)`) or to the file
    /// itself (`None`). No-op if already present in that scope.
    fn add_attribute(
        &mut self,
        variable: Option<&str>,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BridgeError>;

    /// Writes a variable's full contents.
    fn write_full(&mut self, name: &str, values: &Values) -> Result<(), BridgeError>;
}

#[derive(Clone, Debug)]
struct MemVar {
    info: VariableInfo,
    data: Option<Values>,
}

#[derive(Clone, Debug, Default)]
struct MemFile {
    dims: Vec<(String, usize)>,
    vars: Vec<MemVar>,
    global_attrs: Vec<(String, AttrValue)>,
}

impl MemFile {
    fn var(&self, name: &str) -> Result<&MemVar, BridgeError> {
        self.vars
            .iter()
            .find(|v| v.info.name == name)
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))
    }

    fn var_mut(&mut self, name: &str) -> Result<&mut MemVar, BridgeError> {
        self.vars
            .iter_mut()
            .find(|v| v.info.name == name)
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))
    }

    fn dim_size(&self, name: &str) -> Result<usize, BridgeError> {
        self.dims
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, s)| s)
            .ok_or_else(|| BridgeError::UnknownDimension(name.to_owned()))
    }
}

/// Shared path-keyed backing for [`MemoryEngine`] instances.
///
/// Cloning shares the underlying map, so a file written through one engine
/// can be reopened through another — which is exactly what the round-trip
/// tests do.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<PathBuf, MemFile>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a file of this path has been committed.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().expect("store lock").contains_key(path)
    }
}

/// In-memory [`FormatEngine`] over a [`MemoryStore`].
#[derive(Debug, Default)]
pub struct MemoryEngine {
    store: MemoryStore,
    open: Option<(PathBuf, FileMode)>,
    scratch: MemFile,
}

impl MemoryEngine {
    /// Creates an engine over its own private store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine over a shared store.
    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            store,
            open: None,
            scratch: MemFile::default(),
        }
    }

    /// The backing store, for sharing with another engine.
    pub fn store(&self) -> MemoryStore {
        self.store.clone()
    }

    fn require_mode(&self, want: FileMode, operation: &'static str) -> Result<(), BridgeError> {
        match self.open {
            None => Err(BridgeError::NotOpen(operation)),
            Some((_, mode)) if mode != want => Err(BridgeError::ModeViolation {
                operation,
                mode: mode.name(),
            }),
            Some(_) => Ok(()),
        }
    }
}

impl FormatEngine for MemoryEngine {
    fn open(&mut self, path: &Path, mode: FileMode) -> Result<(), BridgeError> {
        if self.open.is_some() {
            self.close()?;
        }
        self.scratch = match mode {
            FileMode::Read => {
                let files = self.store.files.lock().expect("store lock");
                files
                    .get(path)
                    .cloned()
                    .ok_or_else(|| BridgeError::FileNotFound(path.display().to_string()))?
            }
            // Truncate semantics: a write handle starts from an empty file.
            FileMode::Write => MemFile::default(),
        };
        self.open = Some((path.to_owned(), mode));
        Ok(())
    }

    fn close(&mut self) -> Result<(), BridgeError> {
        if let Some((path, mode)) = self.open.take() {
            if mode == FileMode::Write {
                let mut files = self.store.files.lock().expect("store lock");
                files.insert(path, std::mem::take(&mut self.scratch));
            } else {
                self.scratch = MemFile::default();
            }
        }
        Ok(())
    }

    fn mode(&self) -> Option<FileMode> {
        self.open.as_ref().map(|&(_, mode)| mode)
    }

    fn dimensions(&self) -> Result<Vec<(String, usize)>, BridgeError> {
        self.require_mode(FileMode::Read, "dimensions")?;
        Ok(self.scratch.dims.clone())
    }

    fn variables(&self) -> Result<Vec<VariableInfo>, BridgeError> {
        self.require_mode(FileMode::Read, "variables")?;
        Ok(self.scratch.vars.iter().map(|v| v.info.clone()).collect())
    }

    fn global_attributes(&self) -> Result<Vec<(String, AttrValue)>, BridgeError> {
        self.require_mode(FileMode::Read, "global_attributes")?;
        Ok(self.scratch.global_attrs.clone())
    }

    fn read_full(&self, name: &str) -> Result<Values, BridgeError> {
        self.require_mode(FileMode::Read, "read_full")?;
        let var = self.scratch.var(name)?;
        var.data
            .clone()
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))
    }

    fn read_slice(
        &self,
        name: &str,
        offsets: &[usize],
        counts: &[usize],
    ) -> Result<Values, BridgeError> {
        self.require_mode(FileMode::Read, "read_slice")?;
        let var = self.scratch.var(name)?;
        let data = var
            .data
            .as_ref()
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))?;

        let ndims = var.info.dims.len();
        if offsets.len() != ndims || counts.len() != ndims {
            return Err(BridgeError::SizeMismatch {
                expected: ndims,
                found: offsets.len().max(counts.len()),
            });
        }
        let mut sizes = Vec::with_capacity(ndims);
        for dim in &var.info.dims {
            sizes.push(self.scratch.dim_size(dim)?);
        }
        for d in 0..ndims {
            if offsets[d] + counts[d] > sizes[d] {
                return Err(BridgeError::IndexOutOfRange {
                    index: offsets[d] + counts[d],
                    len: sizes[d],
                });
            }
        }

        // Row-major strides: the last dimension varies fastest.
        let mut strides = vec![1usize; ndims];
        for d in (0..ndims.saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * sizes[d + 1];
        }
        let total: usize = counts.iter().product();
        let mut indices = Vec::with_capacity(total);
        let mut cursor = vec![0usize; ndims];
        for _ in 0..total {
            let flat: usize = cursor
                .iter()
                .zip(offsets)
                .zip(&strides)
                .map(|((&c, &o), &s)| (c + o) * s)
                .sum();
            indices.push(flat);
            for d in (0..ndims).rev() {
                cursor[d] += 1;
                if cursor[d] < counts[d] {
                    break;
                }
                cursor[d] = 0;
            }
        }

        Ok(match data {
            Values::Double(v) => Values::Double(indices.iter().map(|&i| v[i]).collect()),
            Values::Float(v) => Values::Float(indices.iter().map(|&i| v[i]).collect()),
            Values::Int(v) => Values::Int(indices.iter().map(|&i| v[i]).collect()),
        })
    }

    fn add_dimension(&mut self, name: &str, size: usize) -> Result<(), BridgeError> {
        self.require_mode(FileMode::Write, "add_dimension")?;
        if self.scratch.dims.iter().any(|(n, _)| n == name) {
            return Ok(());
        }
        self.scratch.dims.push((name.to_owned(), size));
        Ok(())
    }

    fn add_variable(
        &mut self,
        name: &str,
        ty: ElementType,
        dims: &[String],
    ) -> Result<(), BridgeError> {
        self.require_mode(FileMode::Write, "add_variable")?;
        if self.scratch.vars.iter().any(|v| v.info.name == name) {
            return Ok(());
        }
        for dim in dims {
            self.scratch.dim_size(dim)?;
        }
        self.scratch.vars.push(MemVar {
            info: VariableInfo {
                name: name.to_owned(),
                element_type: ty,
                dims: dims.to_vec(),
                attrs: Vec::new(),
            },
            data: None,
        });
        Ok(())
    }

    fn add_attribute(
        &mut self,
        variable: Option<&str>,
        name: &str,
        value: AttrValue,
    ) -> Result<(), BridgeError> {
        self.require_mode(FileMode::Write, "add_attribute")?;
        let attrs = match variable {
            Some(var) => &mut self.scratch.var_mut(var)?.info.attrs,
            None => &mut self.scratch.global_attrs,
        };
        if attrs.iter().any(|(n, _)| n == name) {
            return Ok(());
        }
        attrs.push((name.to_owned(), value));
        Ok(())
    }

    fn write_full(&mut self, name: &str, values: &Values) -> Result<(), BridgeError> {
        self.require_mode(FileMode::Write, "write_full")?;
        let expected: usize = {
            let var = self.scratch.var(name)?;
            let mut total = 1usize;
            for dim in &var.info.dims {
                total *= self.scratch.dim_size(dim)?;
            }
            if var.info.element_type != values.element_type() {
                return Err(BridgeError::TypeMismatch {
                    expected: var.info.element_type,
                    found: values.element_type(),
                });
            }
            total
        };
        if values.len() != expected {
            return Err(BridgeError::SizeMismatch {
                expected,
                found: values.len(),
            });
        }
        self.scratch.var_mut(name)?.data = Some(values.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_sample(engine: &mut MemoryEngine, path: &Path) {
        engine.open(path, FileMode::Write).unwrap();
        engine.add_dimension("level", 2).unwrap();
        engine.add_dimension("cell", 3).unwrap();
        engine
            .add_variable("temp", ElementType::Double, &["level".into(), "cell".into()])
            .unwrap();
        engine
            .add_attribute(Some("temp"), "units", AttrValue::Str("K".into()))
            .unwrap();
        engine
            .add_attribute(None, "history", AttrValue::Str("test".into()))
            .unwrap();
        engine
            .write_full("temp", &Values::Double(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
            .unwrap();
        engine.close().unwrap();
    }

    #[test]
    fn write_then_read_back() {
        let mut engine = MemoryEngine::new();
        let path = Path::new("sample.nc");
        write_sample(&mut engine, path);

        engine.open(path, FileMode::Read).unwrap();
        assert_eq!(
            engine.dimensions().unwrap(),
            vec![("level".to_owned(), 2), ("cell".to_owned(), 3)]
        );
        let vars = engine.variables().unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "temp");
        assert_eq!(vars[0].element_type, ElementType::Double);
        assert_eq!(
            engine.read_full("temp").unwrap(),
            Values::Double(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );
        engine.close().unwrap();
    }

    #[test]
    fn slab_read_respects_row_major_order() {
        let mut engine = MemoryEngine::new();
        let path = Path::new("slab.nc");
        write_sample(&mut engine, path);

        engine.open(path, FileMode::Read).unwrap();
        // Second level only: elements [3, 4, 5] of the flat layout.
        let slab = engine.read_slice("temp", &[1, 0], &[1, 3]).unwrap();
        assert_eq!(slab, Values::Double(vec![4.0, 5.0, 6.0]));
        // One cell column across both levels.
        let column = engine.read_slice("temp", &[0, 1], &[2, 1]).unwrap();
        assert_eq!(column, Values::Double(vec![2.0, 5.0]));
        engine.close().unwrap();
    }

    #[test]
    fn slab_out_of_range_fails() {
        let mut engine = MemoryEngine::new();
        let path = Path::new("oob.nc");
        write_sample(&mut engine, path);
        engine.open(path, FileMode::Read).unwrap();
        assert!(engine.read_slice("temp", &[1, 0], &[2, 3]).is_err());
        assert!(engine.read_slice("temp", &[0], &[1]).is_err());
    }

    #[test]
    fn mode_violations_are_errors() {
        let mut engine = MemoryEngine::new();
        let path = Path::new("mode.nc");
        engine.open(path, FileMode::Write).unwrap();
        let err = engine.read_full("temp").unwrap_err();
        assert_eq!(
            err,
            BridgeError::ModeViolation {
                operation: "read_full",
                mode: "writing",
            }
        );
        engine.close().unwrap();

        engine.open(path, FileMode::Read).unwrap();
        let err = engine.add_dimension("cell", 3).unwrap_err();
        assert_eq!(
            err,
            BridgeError::ModeViolation {
                operation: "add_dimension",
                mode: "reading",
            }
        );
        engine.close().unwrap();

        assert_eq!(
            engine.dimensions().unwrap_err(),
            BridgeError::NotOpen("dimensions")
        );
    }

    #[test]
    fn missing_file_fails() {
        let mut engine = MemoryEngine::new();
        let err = engine.open(Path::new("absent.nc"), FileMode::Read).unwrap_err();
        assert!(matches!(err, BridgeError::FileNotFound(_)));
    }

    #[test]
    fn reopening_for_write_truncates() {
        let mut engine = MemoryEngine::new();
        let path = Path::new("trunc.nc");
        write_sample(&mut engine, path);
        engine.open(path, FileMode::Write).unwrap();
        engine.close().unwrap();
        engine.open(path, FileMode::Read).unwrap();
        assert!(engine.dimensions().unwrap().is_empty());
        engine.close().unwrap();
    }

    #[test]
    fn registration_is_incremental() {
        let mut engine = MemoryEngine::new();
        let path = Path::new("incr.nc");
        engine.open(path, FileMode::Write).unwrap();
        engine.add_dimension("cell", 3).unwrap();
        engine.add_dimension("cell", 99).unwrap();
        engine
            .add_variable("a", ElementType::Int, &["cell".into()])
            .unwrap();
        engine
            .add_variable("a", ElementType::Double, &["cell".into()])
            .unwrap();
        engine.write_full("a", &Values::Int(vec![1, 2, 3])).unwrap();
        engine.close().unwrap();

        engine.open(path, FileMode::Read).unwrap();
        assert_eq!(engine.dimensions().unwrap(), vec![("cell".to_owned(), 3)]);
        assert_eq!(engine.variables().unwrap()[0].element_type, ElementType::Int);
        engine.close().unwrap();
    }

    #[test]
    fn shared_store_is_visible_across_engines() {
        let store = MemoryStore::new();
        let mut writer = MemoryEngine::with_store(store.clone());
        let path = Path::new("shared.nc");
        write_sample(&mut writer, path);
        assert!(store.contains(path));

        let mut reader = MemoryEngine::with_store(store);
        reader.open(path, FileMode::Read).unwrap();
        assert_eq!(reader.variables().unwrap()[0].name, "temp");
        reader.close().unwrap();
    }
}
