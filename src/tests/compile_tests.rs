#![allow(clippy::unwrap_used, reason = "Standard test relaxations")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::{
    BytecodeToolchain, Diagnostic, Domain, ErrorKind, Expr, ExprError, ExpressionCompiler,
    HostObject, HostType, Job, MemberResolver, Module, Normalizer, RecordType, ReflectResolver,
    ResolveError, SourceUnit, Toolchain, Value,
};

#[derive(Debug)]
struct Account {
    balance: i64,
}

fn account_type() -> HostType {
    RecordType::new("Account")
        .field("Balance", HostType::Integer)
        .into_type()
}

impl HostObject for Account {
    fn host_type(&self) -> HostType {
        account_type()
    }

    fn field(&self, name: &str) -> Option<Value> {
        (name == "Balance").then_some(Value::Int(self.balance))
    }
}

/// Forwards to the bundled toolchain, keeping the text of every unit built.
#[derive(Default)]
struct Recording {
    inner: BytecodeToolchain,
    units: Mutex<Vec<(String, usize)>>,
}

impl Toolchain for Recording {
    fn build(&self, unit: &SourceUnit) -> Result<Box<dyn Module>, Vec<Diagnostic>> {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((unit.text().to_owned(), unit.data().len()));
        self.inner.build(unit)
    }
}

struct Offline;

impl Toolchain for Offline {
    fn build(&self, unit: &SourceUnit) -> Result<Box<dyn Module>, Vec<Diagnostic>> {
        Err(unit
            .functions()
            .iter()
            .map(|f| Diagnostic::error(Some(f.name.as_str()), "backend offline"))
            .collect())
    }
}

#[derive(Default)]
struct Counting {
    fields: AtomicUsize,
}

impl MemberResolver for Counting {
    fn field_type(&self, ty: &HostType, name: &str) -> Result<HostType, ResolveError> {
        ReflectResolver.field_type(ty, name)
    }

    fn index_type(&self, ty: &HostType, arguments: &[Domain]) -> Result<HostType, ResolveError> {
        ReflectResolver.index_type(ty, arguments)
    }

    fn field(&self, target: &Value, name: &str) -> Result<Value, ResolveError> {
        self.fields.fetch_add(1, Ordering::Relaxed);
        ReflectResolver.field(target, name)
    }

    fn index(&self, target: &Value, arguments: &[Value]) -> Result<Value, ResolveError> {
        ReflectResolver.index(target, arguments)
    }
}

/// Adds a computed `Doubled` member that the record descriptor does not list.
struct Doubling;

impl MemberResolver for Doubling {
    fn field_type(&self, ty: &HostType, name: &str) -> Result<HostType, ResolveError> {
        match name {
            "Doubled" if *ty == account_type() => Ok(HostType::Integer),
            _ => ReflectResolver.field_type(ty, name),
        }
    }

    fn index_type(&self, ty: &HostType, arguments: &[Domain]) -> Result<HostType, ResolveError> {
        ReflectResolver.index_type(ty, arguments)
    }

    fn field(&self, target: &Value, name: &str) -> Result<Value, ResolveError> {
        if name != "Doubled" {
            return ReflectResolver.field(target, name);
        }
        match ReflectResolver.field(target, "Balance")? {
            Value::Int(balance) => Ok(Value::Int(2 * balance)),
            other => Ok(other),
        }
    }

    fn index(&self, target: &Value, arguments: &[Value]) -> Result<Value, ResolveError> {
        ReflectResolver.index(target, arguments)
    }
}

#[test_log::test]
fn test_shared_subexpression_is_emitted_once() {
    let x = Expr::symbol("x", Domain::Reals);
    let y = Expr::symbol("y", Domain::Reals);
    let s = (&x + &y).sin();
    let e = &s + s.exp();

    let recording = Arc::new(Recording::default());
    let mut compiler = ExpressionCompiler::new().toolchain(recording.clone());
    let key = compiler.add(Job::new(e, [x, y])).unwrap();
    let f = compiler.compile_all().unwrap().remove(key).unwrap();

    let units = recording.units.lock().unwrap();
    assert_eq!(units.len(), 1);
    let (text, _) = &units[0];
    assert_eq!(text.matches("let t").count(), 1, "{text}");

    let value = f.evaluate(&[Value::Int(0), Value::Int(0)]).unwrap();
    assert_eq!(value.as_f64(), Some(1.0));
}

#[test_log::test]
fn test_record_parameter_uses_configured_resolver() {
    let r = Expr::symbol("r", Domain::of(&account_type()));
    let e = r.member("Balance").unwrap() * 3;

    let counting = Arc::new(Counting::default());
    let recording = Arc::new(Recording::default());
    let mut compiler = ExpressionCompiler::new()
        .resolver(counting.clone())
        .toolchain(recording.clone());
    let key = compiler.add(Job::new(e.clone(), [r.clone()])).unwrap();
    let functions = compiler.compile_all().unwrap();

    // The custom toolchain was built without the resolver, so the bundled
    // default does the lookup.
    let f = &functions[key];
    assert_eq!(f.params()[0].ty, account_type());
    let account = Value::object(Account { balance: 5 });
    assert_eq!(f.evaluate(&[account.clone()]).unwrap(), Value::Int(15));
    assert_eq!(counting.fields.load(Ordering::Relaxed), 0);
    assert_eq!(recording.units.lock().unwrap()[0].1, 1);

    let mut compiler = ExpressionCompiler::new().resolver(counting.clone());
    let key = compiler.add(Job::new(e, [r])).unwrap();
    let f = compiler.compile_all().unwrap().remove(key).unwrap();
    assert_eq!(f.evaluate(&[account]).unwrap(), Value::Int(15));
    assert_eq!(counting.fields.load(Ordering::Relaxed), 1);

    assert!(matches!(
        f.evaluate(&[Value::Int(5)]),
        Err(ExprError::ArgumentType { index: 0, .. })
    ));
}

#[test]
fn test_resolver_types_members_at_construction() {
    let plain = Expr::symbol("p", Domain::of(&account_type()));
    let err = plain.member("Doubled").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    let doubling: Arc<dyn MemberResolver> = Arc::new(Doubling);
    let domain = Domain::resolved_by(&account_type(), &doubling);
    assert_eq!(domain, Domain::of(&account_type()));
    let r = Expr::symbol("r", domain);
    let doubled = r.member("Doubled").unwrap();
    assert_eq!(*doubled.domain(), Domain::Integers);

    let e = &doubled + r.member("Balance").unwrap();
    let mut compiler = ExpressionCompiler::new().resolver(doubling.clone());
    let key = compiler.add(Job::new(e.clone(), [r.clone()])).unwrap();
    let f = compiler.compile_all().unwrap().remove(key).unwrap();
    let account = Value::object(Account { balance: 5 });
    assert_eq!(f.evaluate(&[account.clone()]).unwrap(), Value::Int(15));

    // a constant bound with the default resolver cannot take the member
    assert!(e.substitute(&[(r.clone(), Expr::constant(account.clone()))]).is_err());
    let constant = Expr::constant_resolved_by(account, &doubling);
    let bound = Normalizer::new()
        .resolver(doubling)
        .normalize(&e.substitute(&[(r, constant)]).unwrap())
        .unwrap();
    assert_eq!(bound, Expr::int(15));
}

#[test]
fn test_toolchain_diagnostics_fail_the_batch() {
    let x = Expr::symbol("x", Domain::Reals);
    let mut compiler = ExpressionCompiler::new().toolchain(Arc::new(Offline));
    compiler.add(Job::new(x.sin(), [x.clone()])).unwrap();
    compiler.add(Job::new(x.cos(), [x.clone()])).unwrap();
    assert_eq!(compiler.len(), 2);

    let err = compiler.compile_all().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compilation);
    let ExprError::Compilation { diagnostics } = err else {
        unreachable!();
    };
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics.iter().all(|d| d.message == "backend offline"));
}

#[test]
fn test_batch_shares_captured_constants() {
    let k = Expr::symbol("k", Domain::Integers);
    let table = Expr::constant(Value::ints([10, 20, 30]));
    let at = table.at([k.clone()]).unwrap();

    let recording = Arc::new(Recording::default());
    let mut compiler = ExpressionCompiler::new().toolchain(recording.clone());
    let first = compiler.add(Job::new(&at + 1, [k.clone()])).unwrap();
    let second = compiler.add(Job::new(&at * 2, [k])).unwrap();
    let functions = compiler.compile_all().unwrap();

    assert_eq!(recording.units.lock().unwrap()[0].1, 1);
    assert_eq!(functions[first].evaluate(&[Value::Int(2)]).unwrap(), Value::Int(31));
    assert_eq!(functions[second].evaluate(&[Value::Int(0)]).unwrap(), Value::Int(20));
    assert_ne!(functions[first].name(), functions[second].name());
}

#[test]
fn test_summation_over_array_parameter() {
    let a = Expr::symbol("a", Domain::of(&HostType::array(HostType::Real)));
    let x = Expr::symbol("x", Domain::Reals);
    let e = Expr::collection_sum(a.clone(), |v| Ok(v * &x)).unwrap();
    let f = e.compile(&[a, x]).unwrap();
    let value = f
        .evaluate(&[Value::reals([1.0, 2.0, 3.5]), Value::Int(2)])
        .unwrap();
    assert_eq!(value.as_f64(), Some(13.0));
}
