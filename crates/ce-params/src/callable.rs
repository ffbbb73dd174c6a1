//! Registry backing callable-set parameters.
//!
//! Dotted paths (`module.attribute`) are looked up in an allow-list populated
//! at startup. Lookups happen while a schema is built, so a misconfigured
//! experiment fails before any trial runs.

use ce_types::{CeResult, SchemaError, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Function pointer stored for a registered callable.
pub type CallableFn = Arc<dyn Fn(&[Value]) -> CeResult<Value> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    /// A constructor; the only kind accepted under class-only resolution.
    Class,
}

#[derive(Clone)]
enum Attribute {
    Callable { kind: CallableKind, func: CallableFn },
    Constant(Value),
}

/// A callable resolved from the registry.
#[derive(Clone)]
pub struct Callable {
    path: String,
    kind: CallableKind,
    func: CallableFn,
}

impl Callable {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    pub fn call(&self, args: &[Value]) -> CeResult<Value> {
        (self.func)(args)
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callable")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.kind == other.kind
    }
}

/// Allow-list of callables addressable by dotted path.
#[derive(Clone, Default)]
pub struct CallableRegistry {
    modules: BTreeMap<String, BTreeMap<String, Attribute>>,
}

impl std::fmt::Debug for CallableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let paths: Vec<String> = self
            .modules
            .iter()
            .flat_map(|(module, attrs)| attrs.keys().map(move |a| format!("{module}.{a}")))
            .collect();
        f.debug_struct("CallableRegistry").field("paths", &paths).finish()
    }
}

fn split_path(path: &str) -> CeResult<(&str, &str)> {
    match path.rsplit_once('.') {
        Some((module, attribute)) if !module.is_empty() && !attribute.is_empty() => {
            Ok((module, attribute))
        }
        _ => Err(SchemaError::BuiltinCallable {
            path: path.to_string(),
        }
        .into()),
    }
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function<F>(&mut self, path: &str, func: F) -> CeResult<&mut Self>
    where
        F: Fn(&[Value]) -> CeResult<Value> + Send + Sync + 'static,
    {
        self.insert(
            path,
            Attribute::Callable {
                kind: CallableKind::Function,
                func: Arc::new(func),
            },
        )
    }

    pub fn register_class<F>(&mut self, path: &str, constructor: F) -> CeResult<&mut Self>
    where
        F: Fn(&[Value]) -> CeResult<Value> + Send + Sync + 'static,
    {
        self.insert(
            path,
            Attribute::Callable {
                kind: CallableKind::Class,
                func: Arc::new(constructor),
            },
        )
    }

    /// Register a non-callable module attribute. Resolving it always fails.
    pub fn register_constant(&mut self, path: &str, value: Value) -> CeResult<&mut Self> {
        self.insert(path, Attribute::Constant(value))
    }

    fn insert(&mut self, path: &str, attribute: Attribute) -> CeResult<&mut Self> {
        let (module, name) = split_path(path)?;
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(name.to_string(), attribute);
        Ok(self)
    }

    pub fn contains(&self, path: &str) -> bool {
        split_path(path)
            .ok()
            .and_then(|(module, name)| self.modules.get(module)?.get(name))
            .is_some()
    }

    /// Resolve `path` to a callable.
    ///
    /// When `allowed_modules` is given, the module part of the path must be
    /// listed. With `class_only`, only constructors registered through
    /// [`CallableRegistry::register_class`] resolve.
    pub fn resolve(
        &self,
        path: &str,
        allowed_modules: Option<&[String]>,
        class_only: bool,
    ) -> CeResult<Callable> {
        let (module, name) = split_path(path)?;

        if let Some(allowed) = allowed_modules {
            if !allowed.is_empty() && !allowed.iter().any(|m| m == module) {
                return Err(SchemaError::ModuleNotAllowed {
                    module: module.to_string(),
                }
                .into());
            }
        }

        let attributes = self
            .modules
            .get(module)
            .ok_or_else(|| SchemaError::ModuleNotFound {
                module: module.to_string(),
            })?;

        let attribute = attributes
            .get(name)
            .ok_or_else(|| SchemaError::AttributeNotFound {
                module: module.to_string(),
                attribute: name.to_string(),
            })?;

        match attribute {
            Attribute::Constant(_) => Err(SchemaError::NotCallable {
                path: path.to_string(),
            }
            .into()),
            Attribute::Callable { kind, .. } if class_only && *kind != CallableKind::Class => {
                Err(SchemaError::NotAClass {
                    path: path.to_string(),
                }
                .into())
            }
            Attribute::Callable { kind, func } => Ok(Callable {
                path: path.to_string(),
                kind: *kind,
                func: Arc::clone(func),
            }),
        }
    }
}
