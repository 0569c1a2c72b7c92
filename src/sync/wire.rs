//! Append-only binary buffer shipped from the synchronizer to the render bridge.
//!
//! Scalars are little-endian. Strings never appear inline: [`WireBuffer::write_string`] interns
//! the string and writes its `u32` table index. Handles never appear in the byte stream at all;
//! they are appended to a side table and consumed in the same order by the reader.

use std::collections::HashMap;

use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::HandleId;

const MIN_CAPACITY: usize = 256;
const END_OF_FILE: u8 = 0;

/// Deduplicated string table. Equal strings share one index.
#[derive(Debug, Default, Clone)]
pub struct StringTable {
    ids_by_str: HashMap<String, u32>,
    strs_by_id: Vec<String>,
}

impl StringTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `s`, adding it on first use.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.ids_by_str.get(s) {
            return id;
        }
        let id = self.strs_by_id.len() as u32;
        self.strs_by_id.push(s.to_owned());
        self.ids_by_str.insert(s.to_owned(), id);
        id
    }

    /// String at `id`, if present.
    pub fn get(&self, id: u32) -> Option<&str> {
        self.strs_by_id.get(id as usize).map(String::as_str)
    }

    /// Number of distinct strings.
    pub fn len(&self) -> usize {
        self.strs_by_id.len()
    }

    /// Returns `true` when no string was interned.
    pub fn is_empty(&self) -> bool {
        self.strs_by_id.is_empty()
    }

    /// Strings in index order.
    pub fn as_slice(&self) -> &[String] {
        &self.strs_by_id
    }

    fn clear(&mut self) {
        self.ids_by_str.clear();
        self.strs_by_id.clear();
    }

    fn from_vec(strs: Vec<String>) -> Self {
        let ids_by_str = strs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        Self {
            ids_by_str,
            strs_by_id: strs,
        }
    }
}

/// Growable message buffer plus its string and handle side tables.
///
/// A finished buffer ends with exactly one end-of-stream byte. The buffer is reused across
/// frames: [`WireBuffer::reset`] keeps the allocation, [`WireBuffer::shrink_to_fit`] releases it
/// after a one-off spike.
#[derive(Debug, Clone)]
pub struct WireBuffer {
    bytes: Vec<u8>,
    strings: StringTable,
    handles: Vec<HandleId>,
    finished: bool,
}

impl Default for WireBuffer {
    fn default() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }
}

impl WireBuffer {
    /// Create an empty buffer with the default initial capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity.max(MIN_CAPACITY)),
            strings: StringTable::new(),
            handles: Vec::new(),
            finished: false,
        }
    }

    // Doubling growth; `Vec::reserve` gives no such guarantee on its own.
    fn grow_for(&mut self, additional: usize) {
        let needed = self.bytes.len() + additional;
        let cap = self.bytes.capacity();
        if needed <= cap {
            return;
        }
        let target = needed.max(cap.saturating_mul(2)).max(MIN_CAPACITY);
        self.bytes.reserve_exact(target - self.bytes.len());
    }

    fn put(&mut self, bytes: &[u8]) {
        debug_assert!(!self.finished, "write after finish");
        self.grow_for(bytes.len());
        self.bytes.extend_from_slice(bytes);
    }

    /// Append one byte.
    pub fn write_u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    /// Append a `u32`.
    pub fn write_u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }

    /// Append an `f32`.
    pub fn write_f32(&mut self, v: f32) {
        self.put(&v.to_le_bytes());
    }

    /// Append a boolean as one byte.
    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    /// Intern `s` and append its table index.
    pub fn write_string(&mut self, s: &str) {
        let id = self.strings.intern(s);
        self.write_u32(id);
    }

    /// Append `handle` to the handle table. Writes nothing to the byte stream.
    pub fn write_handle(&mut self, handle: HandleId) {
        debug_assert!(!self.finished, "write after finish");
        self.handles.push(handle);
    }

    /// Terminate the stream. Calling it again changes nothing.
    pub fn finish(&mut self) {
        if !self.finished {
            self.put(&[END_OF_FILE]);
            self.finished = true;
        }
    }

    /// Returns `true` once [`WireBuffer::finish`] ran.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Clear contents and tables, keeping the allocation.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.strings.clear();
        self.handles.clear();
        self.finished = false;
    }

    /// Release spare capacity down to the initial minimum.
    pub fn shrink_to_fit(&mut self) {
        self.bytes.shrink_to(MIN_CAPACITY);
        self.handles.shrink_to_fit();
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the byte stream.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` when nothing was written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Current byte capacity.
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// String side table.
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Handle side table in write order.
    pub fn handles(&self) -> &[HandleId] {
        &self.handles
    }

    /// Start reading from the beginning.
    pub fn reader(&self) -> WireReader<'_> {
        WireReader {
            bytes: &self.bytes,
            pos: 0,
            strings: &self.strings,
            handles: &self.handles,
            handle_pos: 0,
        }
    }

    /// Serializable snapshot of the buffer.
    pub fn to_capture(&self) -> WireCapture {
        WireCapture {
            bytes: self.bytes.clone(),
            strings: self.strings.as_slice().to_vec(),
            handles: self.handles.iter().map(|h| h.to_bits()).collect(),
        }
    }

    /// Rebuild a buffer from a snapshot. The result is read-only in practice: it counts as
    /// finished when the last byte is an end-of-stream marker.
    pub fn from_capture(capture: WireCapture) -> Self {
        let finished = capture.bytes.last() == Some(&END_OF_FILE);
        Self {
            bytes: capture.bytes,
            strings: StringTable::from_vec(capture.strings),
            handles: capture
                .handles
                .into_iter()
                .map(HandleId::from_bits)
                .collect(),
            finished,
        }
    }
}

/// Serde form of a [`WireBuffer`]: base64 bytes, the string table, and raw handle bits.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WireCapture {
    /// Encoded byte stream.
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    /// String table in index order.
    pub strings: Vec<String>,
    /// Handle table as [`HandleId::to_bits`] values.
    pub handles: Vec<u64>,
}

impl WireCapture {
    /// Parse a JSON capture.
    pub fn from_json_str(s: &str) -> StageResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Render as pretty JSON.
    pub fn to_json_string(&self) -> StageResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Cursor over a [`WireBuffer`]. Every read is bounds-checked against the written length.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    strings: &'a StringTable,
    handles: &'a [HandleId],
    handle_pos: usize,
}

impl<'a> WireReader<'a> {
    fn take<const N: usize>(&mut self) -> StageResult<[u8; N]> {
        let end = self.pos + N;
        let Some(chunk) = self.bytes.get(self.pos..end) else {
            return Err(StageError::protocol(format!(
                "unexpected end of stream at offset {} (need {N} bytes, have {})",
                self.pos,
                self.remaining()
            )));
        };
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        Ok(out)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> StageResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    /// Read a `u32`.
    pub fn read_u32(&mut self) -> StageResult<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    /// Read an `f32`.
    pub fn read_f32(&mut self) -> StageResult<f32> {
        Ok(f32::from_le_bytes(self.take()?))
    }

    /// Read a one-byte boolean. Any non-zero value is `true`.
    pub fn read_bool(&mut self) -> StageResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a string table index and resolve it.
    pub fn read_string(&mut self) -> StageResult<&'a str> {
        let id = self.read_u32()?;
        self.strings
            .get(id)
            .ok_or_else(|| StageError::protocol(format!("string index {id} out of range")))
    }

    /// Take the next entry from the handle table.
    pub fn read_handle(&mut self) -> StageResult<HandleId> {
        let h = self
            .handles
            .get(self.handle_pos)
            .copied()
            .ok_or_else(|| StageError::protocol("handle table exhausted"))?;
        self.handle_pos += 1;
        Ok(h)
    }

    /// Byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Unread bytes.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sync/wire.rs"]
mod tests;
