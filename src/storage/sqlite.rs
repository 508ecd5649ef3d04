//! Read-only access to SQLite 3 shard units.
//!
//! Each partition file `<i>.sql3` holds a table `t(key TEXT PRIMARY KEY, val BLOB)`.
//! `val` starts with a 16-byte header (vnode, last update, clock, expiry; big-endian
//! u32) followed by the value. A bare header marks a deleted key.

use super::engine::{StorageBackend, StorageOptions, VnodeDump, partition_for};
use super::format::StorageFormat;
use crate::core::{RecoverError, Result, VnodeId};
use crate::protocol::record::VnodeRecord;
use bytes::{Buf, Bytes};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, params};
use std::collections::VecDeque;
use tracing::debug;

/// Length of the header in front of every stored value.
pub const VALUE_HEADER_LEN: usize = 16;

/// Rows fetched per query while dumping.
const PAGE_SIZE: i64 = 512;

pub struct Sqlite3Storage {
    options: StorageOptions,
    partitions: Vec<Connection>,
}

impl Sqlite3Storage {
    pub fn new(options: StorageOptions) -> Self {
        Self {
            options,
            partitions: Vec::new(),
        }
    }

    fn partition(&self, vnode: VnodeId) -> Result<&Connection> {
        let index = partition_for(vnode, self.options.partition_count);
        self.partitions.get(index).ok_or_else(|| {
            RecoverError::Storage(format!(
                "{}: storage is not open",
                self.options.path.display()
            ))
        })
    }
}

impl StorageBackend for Sqlite3Storage {
    fn format(&self) -> StorageFormat {
        StorageFormat::Sqlite3
    }

    fn open(&mut self) -> Result<()> {
        if self.options.partition_count == 0 {
            return Err(RecoverError::Storage(format!(
                "{}: no partition files",
                self.options.path.display()
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let mut partitions = Vec::with_capacity(self.options.partition_count);
        for index in 0..self.options.partition_count {
            let file = StorageFormat::Sqlite3.partition_file(&self.options.path, index);
            let conn = Connection::open_with_flags(&file, flags).map_err(|e| {
                RecoverError::Storage(format!("cannot open {}: {}", file.display(), e))
            })?;
            partitions.push(conn);
        }
        debug!(path = %self.options.path.display(), partitions = partitions.len(), "opened sqlite3 storage");
        self.partitions = partitions;
        Ok(())
    }

    fn each_vn_dump(&mut self, vnode: VnodeId) -> Result<VnodeDump<'_>> {
        let conn = self.partition(vnode)?;
        Ok(Box::new(SqliteVnodeDump {
            conn,
            vnode,
            after_rowid: 0,
            page: VecDeque::new(),
            exhausted: false,
        }))
    }

    fn close(&mut self) -> Result<()> {
        for conn in self.partitions.drain(..) {
            conn.close().map_err(|(_, e)| RecoverError::from(e))?;
        }
        Ok(())
    }
}

/// Pages through one partition by rowid, keeping only rows of `vnode`.
struct SqliteVnodeDump<'a> {
    conn: &'a Connection,
    vnode: VnodeId,
    after_rowid: i64,
    page: VecDeque<Bytes>,
    exhausted: bool,
}

impl SqliteVnodeDump<'_> {
    fn fetch_page(&mut self) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT rowid, key, val FROM t WHERE rowid > ?1 ORDER BY rowid LIMIT ?2")?;
        let rows = stmt.query_map(params![self.after_rowid, PAGE_SIZE], |row| {
            let rowid: i64 = row.get(0)?;
            let key = column_bytes(row.get_ref(1)?, 1)?;
            let val = column_bytes(row.get_ref(2)?, 2)?;
            Ok((rowid, key, val))
        })?;

        let mut fetched = 0;
        for row in rows {
            let (rowid, key, val) = row?;
            fetched += 1;
            self.after_rowid = rowid;
            if let Some(record) = stored_record(key, &val) {
                if record.vnode == self.vnode {
                    self.page.push_back(record.to_dump_bytes());
                }
            }
        }
        if fetched < PAGE_SIZE {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for SqliteVnodeDump<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.page.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.page.pop_front().map(Ok)
    }
}

fn column_bytes(value: ValueRef<'_>, index: usize) -> rusqlite::Result<Vec<u8>> {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Ok(bytes.to_vec()),
        other => Err(rusqlite::Error::InvalidColumnType(
            index,
            "key/val".to_string(),
            other.data_type(),
        )),
    }
}

/// Builds the dump record of one stored row. Rows with a short header are
/// skipped as corrupt.
fn stored_record(key: Vec<u8>, val: &[u8]) -> Option<VnodeRecord> {
    if val.len() < VALUE_HEADER_LEN {
        return None;
    }
    let mut header = &val[..VALUE_HEADER_LEN];
    let vnode = header.get_u32();
    let last_update = header.get_u32();
    let clock = header.get_u32();
    let expiry = header.get_u32();
    let value = (val.len() > VALUE_HEADER_LEN).then(|| Bytes::copy_from_slice(&val[VALUE_HEADER_LEN..]));

    Some(VnodeRecord {
        vnode,
        last_update,
        clock,
        expiry,
        key: Bytes::from(key),
        value,
    })
}
