use std::ffi::{CStr, c_char, c_int, c_uint, c_void};
use std::ptr::{self, NonNull};

use rusqlite::ffi;

use crate::foreign::{EngineException, ForeignParams, ForeignValue, RuntimeException, Thrown};

// Pointers wrapped here are only handed out by `StatementTable` while the database is
// open and the statement has not been finalized.

#[derive(Clone, Copy, Debug)]
pub(super) struct RawDb(NonNull<ffi::sqlite3>);

impl RawDb {
    pub(super) fn new(db: *mut ffi::sqlite3) -> Option<Self> {
        NonNull::new(db).map(Self)
    }

    fn as_ptr(self) -> *mut ffi::sqlite3 {
        self.0.as_ptr()
    }

    pub(super) fn error(self, code: c_int) -> Thrown {
        let message = unsafe { ffi::sqlite3_errmsg(self.as_ptr()) };
        let message = if message.is_null() {
            format!("SQLite error {code}")
        } else {
            unsafe { CStr::from_ptr(message) }
                .to_string_lossy()
                .into_owned()
        };
        EngineException::new(code, message).into()
    }

    /// Compile the first statement of `sql`, returning it with the unparsed remainder.
    /// Whitespace or comments alone compile to no statement.
    pub(super) fn prepare<'a>(self, sql: &'a CStr) -> Result<(Option<RawStmt>, &'a CStr), Thrown> {
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();
        let code = unsafe {
            ffi::sqlite3_prepare_v2(
                self.as_ptr(),
                sql.as_ptr(),
                -1,
                &raw mut stmt,
                &raw mut tail,
            )
        };
        if code != ffi::SQLITE_OK {
            return Err(self.error(code));
        }
        let rest = if tail.is_null() {
            c""
        } else {
            // tail points into `sql`, at or before its terminator
            unsafe { CStr::from_ptr(tail) }
        };
        Ok((NonNull::new(stmt).map(RawStmt), rest))
    }

    pub(super) fn changes(self) -> i64 {
        unsafe { ffi::sqlite3_changes64(self.as_ptr()) }
    }

    pub(super) fn serialize(self) -> Result<Vec<u8>, Thrown> {
        let mut size: i64 = -1;
        let data = unsafe { ffi::sqlite3_serialize(self.as_ptr(), c"main".as_ptr(), &raw mut size, 0) };
        if data.is_null() {
            // a database without pages serializes to nothing
            if size == 0 {
                return Ok(Vec::new());
            }
            return Err(RuntimeException("failed to serialize database".to_string()).into());
        }
        let len = usize::try_from(size).unwrap_or_default();
        let image = unsafe { std::slice::from_raw_parts(data, len) }.to_vec();
        unsafe { ffi::sqlite3_free(data.cast::<c_void>()) };
        Ok(image)
    }

    /// Replace the main schema with `image`. The engine keeps its own copy.
    pub(super) fn deserialize(self, image: &[u8]) -> Result<(), Thrown> {
        let len = i64::try_from(image.len())
            .map_err(|_| RuntimeException("database image is too large".to_string()))?;
        let buf = unsafe { ffi::sqlite3_malloc64(image.len() as u64) }.cast::<u8>();
        if buf.is_null() {
            return Err(RuntimeException("out of memory loading database image".to_string()).into());
        }
        unsafe { ptr::copy_nonoverlapping(image.as_ptr(), buf, image.len()) };
        let flags = (ffi::SQLITE_DESERIALIZE_FREEONCLOSE | ffi::SQLITE_DESERIALIZE_RESIZEABLE) as c_uint;
        // on failure the engine frees `buf` itself
        let code = unsafe {
            ffi::sqlite3_deserialize(self.as_ptr(), c"main".as_ptr(), buf, len, len, flags)
        };
        if code != ffi::SQLITE_OK {
            return Err(self.error(code));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct RawStmt(NonNull<ffi::sqlite3_stmt>);

impl RawStmt {
    fn as_ptr(self) -> *mut ffi::sqlite3_stmt {
        self.0.as_ptr()
    }

    pub(super) fn step(self, db: RawDb) -> Result<bool, Thrown> {
        match unsafe { ffi::sqlite3_step(self.as_ptr()) } {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => Ok(false),
            code => Err(db.error(code)),
        }
    }

    pub(super) fn reset(self) {
        // the return code repeats the last step failure, which was already reported
        let _ = unsafe { ffi::sqlite3_reset(self.as_ptr()) };
    }

    pub(super) fn clear_bindings(self) {
        let _ = unsafe { ffi::sqlite3_clear_bindings(self.as_ptr()) };
    }

    pub(super) fn finalize(self) {
        let _ = unsafe { ffi::sqlite3_finalize(self.as_ptr()) };
    }

    pub(super) fn is_readonly(self) -> bool {
        unsafe { ffi::sqlite3_stmt_readonly(self.as_ptr()) != 0 }
    }

    pub(super) fn sql(self) -> String {
        let sql = unsafe { ffi::sqlite3_sql(self.as_ptr()) };
        if sql.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(sql) }.to_string_lossy().into_owned()
    }

    fn column_count(self) -> c_int {
        unsafe { ffi::sqlite3_column_count(self.as_ptr()) }
    }

    pub(super) fn column_names(self) -> Vec<String> {
        (0..self.column_count())
            .map(|i| {
                let name = unsafe { ffi::sqlite3_column_name(self.as_ptr(), i) };
                if name.is_null() {
                    String::new()
                } else {
                    unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
                }
            })
            .collect()
    }

    pub(super) fn row(self) -> Result<Vec<ForeignValue>, Thrown> {
        (0..self.column_count()).map(|i| self.value(i)).collect()
    }

    fn value(self, i: c_int) -> Result<ForeignValue, Thrown> {
        let stmt = self.as_ptr();
        let value = match unsafe { ffi::sqlite3_column_type(stmt, i) } {
            ffi::SQLITE_INTEGER => ForeignValue::Integer(unsafe { ffi::sqlite3_column_int64(stmt, i) }),
            ffi::SQLITE_FLOAT => ForeignValue::Real(unsafe { ffi::sqlite3_column_double(stmt, i) }),
            ffi::SQLITE_TEXT => {
                let text = unsafe { ffi::sqlite3_column_text(stmt, i) };
                // invalid UTF-8 reads back with replacement characters
                let text = String::from_utf8_lossy(self.column_bytes(text, i)).into_owned();
                ForeignValue::Text(text)
            }
            ffi::SQLITE_BLOB => {
                let blob = unsafe { ffi::sqlite3_column_blob(stmt, i) }.cast::<u8>();
                ForeignValue::Blob(self.column_bytes(blob, i).to_vec())
            }
            _ => ForeignValue::Null,
        };
        Ok(value)
    }

    // Must run after the text/blob accessor so the length matches the converted value.
    fn column_bytes<'a>(self, data: *const u8, i: c_int) -> &'a [u8] {
        let len = usize::try_from(unsafe { ffi::sqlite3_column_bytes(self.as_ptr(), i) })
            .unwrap_or_default();
        if data.is_null() || len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(data, len) }
    }

    pub(super) fn parameter_names(self) -> Vec<Option<String>> {
        let count = unsafe { ffi::sqlite3_bind_parameter_count(self.as_ptr()) };
        (1..=count)
            .map(|i| {
                let name = unsafe { ffi::sqlite3_bind_parameter_name(self.as_ptr(), i) };
                if name.is_null() {
                    None
                } else {
                    Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
                }
            })
            .collect()
    }

    pub(super) fn bind(self, db: RawDb, params: &ForeignParams) -> Result<(), Thrown> {
        match params {
            ForeignParams::Positional(values) => {
                for (offset, value) in values.iter().enumerate() {
                    let index = c_int::try_from(offset + 1).map_err(|_| {
                        RuntimeException("binding index did not fit in c_int".to_string())
                    })?;
                    self.bind_value(db, index, value)?;
                }
            }
            ForeignParams::Named(values) => {
                for (name, value) in values {
                    let index = self.named_index(name)?;
                    self.bind_value(db, index, value)?;
                }
            }
        }
        Ok(())
    }

    fn named_index(self, name: &str) -> Result<c_int, Thrown> {
        for candidate in binding_name_candidates(name) {
            let candidate = std::ffi::CString::new(candidate)
                .map_err(|_| RuntimeException("binding name contains a NUL byte".to_string()))?;
            let index =
                unsafe { ffi::sqlite3_bind_parameter_index(self.as_ptr(), candidate.as_ptr()) };
            if index > 0 {
                return Ok(index);
            }
        }
        Err(EngineException::new(ffi::SQLITE_RANGE, format!("unknown named parameter: {name}")).into())
    }

    fn bind_value(self, db: RawDb, index: c_int, value: &ForeignValue) -> Result<(), Thrown> {
        let stmt = self.as_ptr();
        let code = match value {
            ForeignValue::Null => unsafe { ffi::sqlite3_bind_null(stmt, index) },
            ForeignValue::Integer(v) => unsafe { ffi::sqlite3_bind_int64(stmt, index, *v) },
            ForeignValue::Real(v) => unsafe { ffi::sqlite3_bind_double(stmt, index, *v) },
            ForeignValue::Text(v) => {
                let len = c_int::try_from(v.len())
                    .map_err(|_| RuntimeException("text parameter is too large".to_string()))?;
                unsafe {
                    ffi::sqlite3_bind_text(
                        stmt,
                        index,
                        v.as_ptr().cast::<c_char>(),
                        len,
                        ffi::SQLITE_TRANSIENT(),
                    )
                }
            }
            ForeignValue::Blob(v) => {
                let len = c_int::try_from(v.len())
                    .map_err(|_| RuntimeException("blob parameter is too large".to_string()))?;
                unsafe {
                    ffi::sqlite3_bind_blob(
                        stmt,
                        index,
                        v.as_ptr().cast::<c_void>(),
                        len,
                        ffi::SQLITE_TRANSIENT(),
                    )
                }
            }
        };
        if code == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(db.error(code))
        }
    }
}

/// Finalizes a statement that never leaves the function that prepared it.
pub(super) struct Finalizing(pub(super) RawStmt);

impl Drop for Finalizing {
    fn drop(&mut self) {
        self.0.finalize();
    }
}

fn binding_name_candidates(name: &str) -> Vec<String> {
    if name.starts_with([':', '@', '$', '?']) {
        return vec![name.to_string()];
    }
    vec![format!(":{name}"), format!("@{name}"), format!("${name}")]
}
