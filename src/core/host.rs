//! Host values bound into expressions, and the member resolver that looks
//! inside them.
//!
//! Expressions can capture arbitrary host data as object constants (arrays,
//! records, matrices). The symbolic core never inspects that data directly:
//! type-level questions ("what does `x.F` evaluate to?") and value-level
//! lookups ("fetch element 1 of this array") both go through a
//! [`MemberResolver`]. [`ReflectResolver`] is the default implementation over
//! [`HostType`] descriptors and the [`HostObject`] trait.

use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::core::domain::Domain;
use crate::error::ResolveError;
use crate::functions::Function;
use crate::matrix::Matrix;
use crate::Number;

// =============================================================================
// HOST TYPES
// =============================================================================

/// Declared type of a host value or of an expression parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    Any,
    Integer,
    Real,
    Matrix,
    Function,
    Array(Arc<HostType>),
    Record(Arc<RecordType>),
}

impl HostType {
    #[must_use]
    pub fn array(element: HostType) -> Self {
        Self::Array(Arc::new(element))
    }

    /// Whether a runtime value may be passed where this type is declared.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _)
            | (Self::Integer, Value::Int(_))
            | (Self::Real, Value::Int(_) | Value::Float(_))
            | (Self::Matrix, Value::Matrix(_) | Value::Int(_) | Value::Float(_))
            | (Self::Function, Value::Function(_)) => true,
            (Self::Integer, Value::Float(x)) => x.fract() == 0.0,
            (Self::Array(element), Value::Array(array)) => {
                **element == HostType::Any || array.element == **element
            }
            (Self::Record(_), Value::Object(object)) => object.host_type() == *self,
            _ => false,
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Integer => f.write_str("int"),
            Self::Real => f.write_str("real"),
            Self::Matrix => f.write_str("matrix"),
            Self::Function => f.write_str("fn"),
            Self::Array(element) => write!(f, "[{element}]"),
            Self::Record(record) => f.write_str(&record.name),
        }
    }
}

/// Descriptor of a named record type: its fields and positional indexers.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RecordType {
    name: Arc<str>,
    fields: Vec<(Arc<str>, HostType)>,
    indexers: Vec<(usize, HostType)>,
}

impl RecordType {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            indexers: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<Arc<str>>, ty: HostType) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// Declares a positional indexer taking `arity` arguments.
    #[must_use]
    pub fn indexer(mut self, arity: usize, result: HostType) -> Self {
        self.indexers.push((arity, result));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn into_type(self) -> HostType {
        HostType::Record(Arc::new(self))
    }
}

// =============================================================================
// HOST VALUES
// =============================================================================

/// A host object with named fields, usable as an object constant.
pub trait HostObject: fmt::Debug + Send + Sync {
    fn host_type(&self) -> HostType;

    fn field(&self, name: &str) -> Option<Value>;

    /// Positional access; `None` when the object is not indexable.
    fn index(&self, arguments: &[Value]) -> Option<Result<Value, ResolveError>> {
        let _ = arguments;
        None
    }
}

/// Typed, immutable host array.
#[derive(Debug, Clone)]
pub struct HostArray {
    pub(crate) element: HostType,
    pub(crate) items: Arc<[Value]>,
}

impl HostArray {
    pub fn element_type(&self) -> &HostType {
        &self.element
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

/// A concrete value: what constants hold and what compiled code computes.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Array(HostArray),
    Matrix(Arc<Matrix>),
    Tuple(Arc<[Value]>),
    Object(Arc<dyn HostObject>),
    Function(Function),
    Field(Arc<str>),
}

impl Value {
    pub fn array(element: HostType, items: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(HostArray {
            element,
            items: items.into_iter().collect(),
        })
    }

    /// Integer array shorthand.
    pub fn ints(items: impl IntoIterator<Item = i64>) -> Self {
        Self::array(HostType::Integer, items.into_iter().map(Value::Int))
    }

    pub fn reals(items: impl IntoIterator<Item = f64>) -> Self {
        Self::array(HostType::Real, items.into_iter().map(Value::Float))
    }

    pub fn object(object: impl HostObject + 'static) -> Self {
        Self::Object(Arc::new(object))
    }

    #[must_use]
    pub fn host_type(&self) -> HostType {
        match self {
            Self::Int(_) => HostType::Integer,
            Self::Float(_) => HostType::Real,
            Self::Array(array) => HostType::array(array.element.clone()),
            Self::Matrix(_) => HostType::Matrix,
            Self::Object(object) => object.host_type(),
            Self::Function(_) => HostType::Function,
            Self::Tuple(_) | Self::Field(_) => HostType::Any,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<Number> {
        match *self {
            Self::Int(n) => Some(Number::Int(n)),
            Self::Float(x) => Some(Number::Float(x)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(Number::to_f64)
    }

    /// Address of the shared payload, for values compared by identity.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Self::Array(array) => Some(Arc::as_ptr(&array.items).cast::<()>().addr()),
            Self::Matrix(matrix) => Some(Arc::as_ptr(matrix).addr()),
            Self::Tuple(items) => Some(Arc::as_ptr(items).cast::<()>().addr()),
            Self::Object(object) => Some(Arc::as_ptr(object).cast::<()>().addr()),
            Self::Int(_) | Self::Float(_) | Self::Function(_) | Self::Field(_) => None,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(n) => Self::Int(n),
            Number::Float(x) => Self::Float(x),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<Matrix> for Value {
    fn from(m: Matrix) -> Self {
        Self::Matrix(Arc::new(m))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.element == b.element && a.items == b.items,
            (Self::Matrix(a), Self::Matrix(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => a == b,
            (Self::Field(a), Self::Field(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(_) | Self::Float(_) => {
                write!(f, "{}", self.as_number().unwrap_or(Number::Int(0)))
            }
            Self::Array(array) => {
                f.write_str("[")?;
                for (k, item) in array.items.iter().enumerate() {
                    if k > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Matrix(m) => write!(f, "<{}x{} matrix>", m.nrows(), m.ncols()),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (k, item) in items.iter().enumerate() {
                    if k > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Self::Object(object) => write!(f, "<{}>", object.host_type()),
            Self::Function(function) => f.write_str(function.name()),
            Self::Field(name) => write!(f, ".{name}"),
        }
    }
}

// =============================================================================
// MEMBER RESOLUTION
// =============================================================================

/// Resolves member access on host types and values.
///
/// Type-level methods are asked while expressions are constructed (to type an
/// access); value-level methods while constant accesses are folded and while
/// compiled code runs.
pub trait MemberResolver: Send + Sync {
    /// Type of field `name` on values of type `ty`.
    ///
    /// # Errors
    /// [`ResolveError::UnknownMember`] if the type has no such field.
    fn field_type(&self, ty: &HostType, name: &str) -> Result<HostType, ResolveError>;

    /// Result type of indexing `ty` with arguments of the given domains.
    ///
    /// # Errors
    /// When no indexer accepts the arguments, or several do.
    fn index_type(&self, ty: &HostType, arguments: &[Domain]) -> Result<HostType, ResolveError>;

    /// Reads field `name` of `target`.
    ///
    /// # Errors
    /// [`ResolveError::UnknownMember`] if the value has no such field.
    fn field(&self, target: &Value, name: &str) -> Result<Value, ResolveError>;

    /// Positional access `target[arguments]`.
    ///
    /// # Errors
    /// Out-of-range indices and non-indexable targets.
    fn index(&self, target: &Value, arguments: &[Value]) -> Result<Value, ResolveError>;
}

/// Default resolver over [`HostType`] descriptors and [`HostObject`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectResolver;

static REFLECT: LazyLock<Arc<dyn MemberResolver>> = LazyLock::new(|| Arc::new(ReflectResolver));

/// Shared handle to [`ReflectResolver`].
pub(crate) fn reflect() -> &'static Arc<dyn MemberResolver> {
    &REFLECT
}

impl MemberResolver for ReflectResolver {
    fn field_type(&self, ty: &HostType, name: &str) -> Result<HostType, ResolveError> {
        if let HostType::Record(record) = ty
            && let Some((_, field)) = record.fields.iter().find(|(n, _)| &**n == name)
        {
            return Ok(field.clone());
        }
        Err(ResolveError::UnknownMember {
            ty: ty.to_string(),
            member: name.to_owned(),
        })
    }

    fn index_type(&self, ty: &HostType, arguments: &[Domain]) -> Result<HostType, ResolveError> {
        match ty {
            HostType::Array(element)
                if arguments.len() == 1 && arguments[0].is_contained_in(&Domain::Reals) =>
            {
                Ok((**element).clone())
            }
            HostType::Record(record) => {
                let mut matching = record
                    .indexers
                    .iter()
                    .filter(|(arity, _)| *arity == arguments.len());
                match (matching.next(), matching.next()) {
                    (Some((_, result)), None) => Ok(result.clone()),
                    (Some(_), Some(_)) => Err(ResolveError::Ambiguous {
                        ty: ty.to_string(),
                        member: "[]".to_owned(),
                        arity: arguments.len(),
                    }),
                    (None, _) => Err(not_indexable(ty, arguments.len())),
                }
            }
            _ => Err(not_indexable(ty, arguments.len())),
        }
    }

    fn field(&self, target: &Value, name: &str) -> Result<Value, ResolveError> {
        let unknown = || ResolveError::UnknownMember {
            ty: target.host_type().to_string(),
            member: name.to_owned(),
        };
        match target {
            Value::Object(object) => object.field(name).ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }

    fn index(&self, target: &Value, arguments: &[Value]) -> Result<Value, ResolveError> {
        match (target, arguments) {
            (Value::Array(array), [index]) => {
                let position = index
                    .as_number()
                    .and_then(Number::to_i64)
                    .ok_or_else(|| not_indexable(&target.host_type(), 1))?;
                usize::try_from(position)
                    .ok()
                    .and_then(|k| array.items.get(k))
                    .cloned()
                    .ok_or(ResolveError::IndexOutOfRange {
                        index: position,
                        len: array.items.len(),
                    })
            }
            (Value::Object(object), _) => object
                .index(arguments)
                .unwrap_or_else(|| Err(not_indexable(&object.host_type(), arguments.len()))),
            _ => Err(not_indexable(&target.host_type(), arguments.len())),
        }
    }
}

fn not_indexable(ty: &HostType, arity: usize) -> ResolveError {
    ResolveError::NotIndexable {
        ty: ty.to_string(),
        arguments: format!("{arity} argument(s)"),
    }
}
