use super::engine::{StorageBackend, VnodeDump};
use super::format::StorageFormat;
use crate::core::{RecoverError, Result, VnodeId};
use crate::protocol::record::VnodeRecord;
use std::collections::BTreeMap;

/// In-memory backend holding decoded records per vnode.
///
/// Useful for rehearsing a recovery and for tests.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    format: StorageFormat,
    records: BTreeMap<VnodeId, Vec<VnodeRecord>>,
    open: bool,
    dumps: Vec<VnodeId>,
}

impl MemoryStorage {
    pub fn new(format: StorageFormat) -> Self {
        Self {
            format,
            records: BTreeMap::new(),
            open: false,
            dumps: Vec::new(),
        }
    }

    pub fn insert(&mut self, record: VnodeRecord) {
        self.records.entry(record.vnode).or_default().push(record);
    }

    pub fn with_records(mut self, records: impl IntoIterator<Item = VnodeRecord>) -> Self {
        for record in records {
            self.insert(record);
        }
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Vnodes dumped so far, in call order.
    pub fn dumps(&self) -> &[VnodeId] {
        &self.dumps
    }
}

impl StorageBackend for MemoryStorage {
    fn format(&self) -> StorageFormat {
        self.format
    }

    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn each_vn_dump(&mut self, vnode: VnodeId) -> Result<VnodeDump<'_>> {
        if !self.open {
            return Err(RecoverError::Storage("memory storage is not open".to_string()));
        }
        self.dumps.push(vnode);
        let records = self.records.get(&vnode).map(Vec::as_slice).unwrap_or_default();
        Ok(Box::new(records.iter().map(|record| Ok(record.to_dump_bytes()))))
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}
