// SQLite engine behind the foreign traits.
//
// `rusqlite` owns the connection; statements are driven through `rusqlite::ffi` so that
// stepping, binding and column access happen one call at a time, the way the traits
// expose them. Every live statement is recorded in a `StatementTable` shared with the
// database so that closing the database can finalize them and later calls on a dead
// statement throw instead of touching freed memory.

mod raw;

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CString;
use std::rc::Rc;

use rusqlite::Connection;

use super::{
    EngineException, ForeignDatabase, ForeignEngine, ForeignParams, ForeignResult,
    ForeignStatement, ForeignValue, RuntimeException, Thrown,
};
use raw::{Finalizing, RawDb, RawStmt};

/// Opens in-memory SQLite databases, empty or from a serialized image.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteEngine;

impl ForeignEngine for SqliteEngine {
    fn create(&self) -> Result<Box<dyn ForeignDatabase>, Thrown> {
        Ok(Box::new(SqliteDatabase::open()?))
    }

    fn load(&self, image: Vec<u8>) -> Result<Box<dyn ForeignDatabase>, Thrown> {
        let db = SqliteDatabase::open()?;
        // an empty image is an empty database
        if !image.is_empty() {
            db.raw()?.deserialize(&image)?;
        }
        Ok(Box::new(db))
    }
}

#[derive(Debug)]
struct StatementTable {
    db: Option<RawDb>,
    live: HashMap<u64, RawStmt>,
    next_id: u64,
}

impl StatementTable {
    fn insert(&mut self, stmt: RawStmt) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, stmt);
        id
    }

    fn finalize_all(&mut self) {
        for (_, stmt) in self.live.drain() {
            stmt.finalize();
        }
        self.db = None;
    }
}

fn closed() -> Thrown {
    RuntimeException("database is closed".to_string()).into()
}

fn thrown(err: rusqlite::Error) -> Thrown {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            let message = message.unwrap_or_else(|| code.to_string());
            EngineException::new(code.extended_code, message).into()
        }
        other => RuntimeException(other.to_string()).into(),
    }
}

/// True when the first keyword of `sql`, past whitespace and comments, starts a DML
/// statement. `WITH` only precedes DML in a statement that is not read-only.
fn is_row_write(sql: &str) -> bool {
    let mut rest = sql.trim_start();
    loop {
        if let Some(line) = rest.strip_prefix("--") {
            rest = line.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(block) = rest.strip_prefix("/*") {
            rest = block.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else {
            break;
        }
    }
    let keyword: String = rest
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE" | "WITH"
    )
}

fn sql_cstring(sql: &str) -> Result<CString, Thrown> {
    CString::new(sql).map_err(|_| RuntimeException("SQL contains a NUL byte".to_string()).into())
}

/// One in-memory SQLite database.
pub struct SqliteDatabase {
    conn: Option<Connection>,
    table: Rc<RefCell<StatementTable>>,
}

impl SqliteDatabase {
    fn open() -> Result<Self, Thrown> {
        let conn = Connection::open_in_memory().map_err(thrown)?;
        let db = RawDb::new(unsafe { conn.handle() })
            .ok_or_else(|| RuntimeException("SQLite returned a null connection handle".to_string()))?;
        Ok(Self {
            conn: Some(conn),
            table: Rc::new(RefCell::new(StatementTable {
                db: Some(db),
                live: HashMap::new(),
                next_id: 0,
            })),
        })
    }

    fn raw(&self) -> Result<RawDb, Thrown> {
        self.table.borrow().db.ok_or_else(closed)
    }

    /// Prepare, bind and step each statement of `sql` in turn, handing every row to `on_row`.
    fn each_statement<F>(&mut self, sql: &str, params: Option<&ForeignParams>, mut on_row: F) -> Result<(), Thrown>
    where
        F: FnMut(usize, RawStmt) -> Result<(), Thrown>,
    {
        let db = self.raw()?;
        let sql = sql_cstring(sql)?;
        let mut rest = sql.as_c_str();
        let mut index = 0;
        while !rest.is_empty() {
            let (stmt, tail) = db.prepare(rest)?;
            rest = tail;
            let Some(stmt) = stmt else {
                continue;
            };
            let _finalize = Finalizing(stmt);
            if let Some(params) = params {
                stmt.bind(db, params)?;
            }
            while stmt.step(db)? {
                on_row(index, stmt)?;
            }
            index += 1;
            // parameters only ever apply to the first statement
            if params.is_some() {
                break;
            }
        }
        Ok(())
    }
}

impl ForeignDatabase for SqliteDatabase {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn ForeignStatement>, Thrown> {
        let db = self.raw()?;
        let sql = sql_cstring(sql)?;
        let (stmt, _) = db.prepare(&sql)?;
        let stmt = stmt.ok_or_else(|| RuntimeException("Nothing to prepare".to_string()))?;
        let id = self.table.borrow_mut().insert(stmt);
        Ok(Box::new(SqliteStatement {
            id,
            table: Rc::clone(&self.table),
        }))
    }

    fn run(&mut self, sql: &str, params: Option<&ForeignParams>) -> Result<(), Thrown> {
        self.each_statement(sql, params, |_, _| Ok(()))
    }

    fn exec(&mut self, sql: &str) -> Result<Vec<ForeignResult>, Thrown> {
        let mut results: Vec<ForeignResult> = Vec::new();
        let mut current: Option<usize> = None;
        self.each_statement(sql, None, |index, stmt| {
            if current != Some(index) {
                current = Some(index);
                results.push(ForeignResult {
                    columns: stmt.column_names(),
                    values: Vec::new(),
                });
            }
            let row = stmt.row()?;
            if let Some(result) = results.last_mut() {
                result.values.push(row);
            }
            Ok(())
        })?;
        Ok(results)
    }

    fn rows_modified(&self) -> Result<i64, Thrown> {
        Ok(self.raw()?.changes())
    }

    fn export(&mut self) -> Result<Vec<u8>, Thrown> {
        self.raw()?.serialize()
    }

    fn close(&mut self) -> Result<(), Thrown> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.table.borrow_mut().finalize_all();
        conn.close().map_err(|(_, err)| thrown(err))
    }
}

impl Drop for SqliteDatabase {
    fn drop(&mut self) {
        // rusqlite refuses to close a connection with unfinalized statements
        self.table.borrow_mut().finalize_all();
    }
}

/// A statement compiled by a [`SqliteDatabase`].
pub struct SqliteStatement {
    id: u64,
    table: Rc<RefCell<StatementTable>>,
}

impl SqliteStatement {
    fn handles(&self) -> Result<(RawDb, RawStmt), Thrown> {
        let table = self.table.borrow();
        let db = table.db.ok_or_else(closed)?;
        let stmt = table
            .live
            .get(&self.id)
            .copied()
            .ok_or_else(|| RuntimeException("Statement closed".to_string()))?;
        Ok((db, stmt))
    }
}

impl ForeignStatement for SqliteStatement {
    fn parameter_names(&self) -> Result<Vec<Option<String>>, Thrown> {
        let (_, stmt) = self.handles()?;
        Ok(stmt.parameter_names())
    }

    fn modifies_rows(&self) -> Result<bool, Thrown> {
        let (_, stmt) = self.handles()?;
        Ok(!stmt.is_readonly() && is_row_write(&stmt.sql()))
    }

    fn bind(&mut self, params: &ForeignParams) -> Result<bool, Thrown> {
        let (db, stmt) = self.handles()?;
        stmt.reset();
        stmt.clear_bindings();
        stmt.bind(db, params)?;
        Ok(true)
    }

    fn step(&mut self) -> Result<bool, Thrown> {
        let (db, stmt) = self.handles()?;
        stmt.step(db)
    }

    fn get(&mut self) -> Result<Vec<ForeignValue>, Thrown> {
        let (_, stmt) = self.handles()?;
        stmt.row()
    }

    fn column_names(&mut self) -> Result<Vec<String>, Thrown> {
        let (_, stmt) = self.handles()?;
        Ok(stmt.column_names())
    }

    fn reset(&mut self) -> Result<(), Thrown> {
        let (_, stmt) = self.handles()?;
        stmt.reset();
        Ok(())
    }

    fn freemem(&mut self) -> Result<(), Thrown> {
        let (_, stmt) = self.handles()?;
        stmt.clear_bindings();
        Ok(())
    }

    fn free(&mut self) -> Result<bool, Thrown> {
        // finalize's result code repeats the last step failure; the statement is gone either way
        if let Some(stmt) = self.table.borrow_mut().live.remove(&self.id) {
            stmt.finalize();
        }
        Ok(true)
    }
}
