#![allow(dead_code)]

use std::cell::Cell;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use sqlite_stepper::foreign::{
    EngineException, ForeignDatabase, ForeignEngine, ForeignParams, ForeignResult,
    ForeignStatement, ForeignValue, RuntimeException, Thrown,
};
use sqlite_stepper::prelude::*;

pub const FIXTURE: &str = "test.db";

/// Serialized image of a database with `test(id, name)` holding (1, Bob) and (2, Alice).
pub fn fixture_image() -> Result<Vec<u8>, DriverError> {
    let driver = Driver::default();
    let conn = driver.open("")?;
    conn.run(
        "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO test (id, name) VALUES (1, 'Bob'), (2, 'Alice');",
    )?;
    conn.export()
}

/// A driver with the fixture registered under [`FIXTURE`].
pub fn fixture_driver() -> Result<Driver, DriverError> {
    let driver = Driver::default();
    driver.registry().register_source(FIXTURE, fixture_image()?)?;
    Ok(driver)
}

/// What a scripted engine call does instead of succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throw {
    Engine,
    Runtime,
    Unknown,
    Panic,
    OpaquePanic,
}

#[derive(Debug)]
struct Opaque;

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("opaque engine object")
    }
}

impl Error for Opaque {}

fn throw<T>(kind: Throw) -> Result<T, Thrown> {
    match kind {
        Throw::Engine => Err(EngineException::new(1, "scripted engine failure").into()),
        Throw::Runtime => Err(RuntimeException("scripted runtime failure".to_string()).into()),
        Throw::Unknown => Err(Box::new(Opaque)),
        Throw::Panic => panic!("scripted panic"),
        Throw::OpaquePanic => std::panic::panic_any(42_u32),
    }
}

/// Rows to serve and failures to inject.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ForeignValue>>,
    pub fail_prepare: Option<Throw>,
    /// Zero-based step call on which the statement throws.
    pub fail_step_at: Option<(usize, Throw)>,
    pub fail_get: Option<Throw>,
    pub bind_refuses: bool,
    pub free_refuses: bool,
    pub fail_close: Option<Throw>,
}

impl Script {
    pub fn rows(columns: &[&str], rows: Vec<Vec<ForeignValue>>) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
            ..Self::default()
        }
    }

    /// `count` single-column integer rows 1..=count under column `n`.
    pub fn counting(count: i64) -> Self {
        Self::rows(
            &["n"],
            (1..=count).map(|n| vec![ForeignValue::Integer(n)]).collect(),
        )
    }
}

/// Engine calls observed by a scripted engine.
#[derive(Debug, Default)]
pub struct Calls {
    pub prepares: Cell<usize>,
    pub steps: Cell<usize>,
    pub column_names: Cell<usize>,
    pub resets: Cell<usize>,
    pub frees: Cell<usize>,
}

pub struct ScriptedEngine {
    script: Script,
    calls: Rc<Calls>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> (Self, Rc<Calls>) {
        let calls = Rc::new(Calls::default());
        (
            Self {
                script,
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }

    /// A driver over a scripted engine, plus the calls it records.
    pub fn driver(script: Script) -> (Driver, Rc<Calls>) {
        let (engine, calls) = Self::new(script);
        (Driver::with_engine(SourceRegistry::new(), engine), calls)
    }
}

impl ForeignEngine for ScriptedEngine {
    fn create(&self) -> Result<Box<dyn ForeignDatabase>, Thrown> {
        Ok(Box::new(ScriptedDatabase {
            script: self.script.clone(),
            calls: Rc::clone(&self.calls),
        }))
    }

    fn load(&self, _image: Vec<u8>) -> Result<Box<dyn ForeignDatabase>, Thrown> {
        self.create()
    }
}

struct ScriptedDatabase {
    script: Script,
    calls: Rc<Calls>,
}

impl ForeignDatabase for ScriptedDatabase {
    fn prepare(&mut self, _sql: &str) -> Result<Box<dyn ForeignStatement>, Thrown> {
        if let Some(kind) = self.script.fail_prepare {
            return throw(kind);
        }
        self.calls.prepares.set(self.calls.prepares.get() + 1);
        Ok(Box::new(ScriptedStatement {
            script: self.script.clone(),
            calls: Rc::clone(&self.calls),
            next: 0,
            current: None,
            step_calls: 0,
        }))
    }

    fn run(&mut self, _sql: &str, _params: Option<&ForeignParams>) -> Result<(), Thrown> {
        Ok(())
    }

    fn exec(&mut self, _sql: &str) -> Result<Vec<ForeignResult>, Thrown> {
        Ok(Vec::new())
    }

    fn rows_modified(&self) -> Result<i64, Thrown> {
        Ok(0)
    }

    fn export(&mut self) -> Result<Vec<u8>, Thrown> {
        Ok(Vec::new())
    }

    fn close(&mut self) -> Result<(), Thrown> {
        match self.script.fail_close {
            Some(kind) => throw(kind),
            None => Ok(()),
        }
    }
}

struct ScriptedStatement {
    script: Script,
    calls: Rc<Calls>,
    next: usize,
    current: Option<usize>,
    step_calls: usize,
}

impl ForeignStatement for ScriptedStatement {
    fn parameter_names(&self) -> Result<Vec<Option<String>>, Thrown> {
        Ok(Vec::new())
    }

    fn modifies_rows(&self) -> Result<bool, Thrown> {
        Ok(false)
    }

    fn bind(&mut self, _params: &ForeignParams) -> Result<bool, Thrown> {
        self.next = 0;
        self.current = None;
        Ok(!self.script.bind_refuses)
    }

    fn step(&mut self) -> Result<bool, Thrown> {
        self.calls.steps.set(self.calls.steps.get() + 1);
        let call = self.step_calls;
        self.step_calls += 1;
        if let Some((at, kind)) = self.script.fail_step_at {
            if at == call {
                return throw(kind);
            }
        }
        if self.next < self.script.rows.len() {
            self.current = Some(self.next);
            self.next += 1;
            Ok(true)
        } else {
            self.current = None;
            Ok(false)
        }
    }

    fn get(&mut self) -> Result<Vec<ForeignValue>, Thrown> {
        if let Some(kind) = self.script.fail_get {
            return throw(kind);
        }
        let index = self
            .current
            .ok_or_else(|| RuntimeException("not positioned at a row".to_string()))?;
        Ok(self.script.rows[index].clone())
    }

    fn column_names(&mut self) -> Result<Vec<String>, Thrown> {
        self.calls.column_names.set(self.calls.column_names.get() + 1);
        Ok(self.script.columns.clone())
    }

    fn reset(&mut self) -> Result<(), Thrown> {
        self.calls.resets.set(self.calls.resets.get() + 1);
        self.next = 0;
        self.current = None;
        Ok(())
    }

    fn freemem(&mut self) -> Result<(), Thrown> {
        Ok(())
    }

    fn free(&mut self) -> Result<bool, Thrown> {
        self.calls.frees.set(self.calls.frees.get() + 1);
        Ok(!self.script.free_refuses)
    }
}
