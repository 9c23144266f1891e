use crate::errors::DbError;
use crate::types::{CollectionName, DocumentId};
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

// Upper bound on a single framed record; anything larger is treated as corruption.
const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Journal operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Insert,
    Update,
    Delete,
}

/// One journal record, bincode-encoded.
/// `value_json` holds the full document as canonical extended JSON bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    pub op: OpKind,
    pub collection: CollectionName,
    pub id: String,
    pub value_json: Option<Vec<u8>>,
    pub ts_ms: u64,
}

impl JournalRecord {
    pub fn new(op: OpKind, collection: &str, id: &DocumentId, doc: Option<&BsonDocument>) -> Result<Self, DbError> {
        let value_json = match doc {
            Some(d) => Some(serde_json::to_vec(&Bson::Document(d.clone()).into_canonical_extjson())?),
            None => None,
        };
        let ts_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
        Ok(Self { op, collection: collection.to_string(), id: id.to_hex(), value_json, ts_ms })
    }

    /// Decode the embedded document, if any.
    pub fn document(&self) -> Result<Option<BsonDocument>, DbError> {
        let Some(bytes) = &self.value_json else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        match Bson::try_from(value) {
            Ok(Bson::Document(d)) => Ok(Some(d)),
            Ok(other) => Err(DbError::Io(format!("journal value is not a document: {other}"))),
            Err(e) => Err(DbError::Io(format!("journal value: {e}"))),
        }
    }
}

/// Frame: `[len: u32 LE][crc32: u32 LE][payload]`.
pub fn write_record<W: Write>(writer: &mut W, rec: &JournalRecord) -> Result<(), DbError> {
    let bytes = encode_to_vec(rec, standard())?;
    let len = u32::try_from(bytes.len()).map_err(|_| DbError::Io("journal record too large".into()))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&crc32fast::hash(&bytes).to_le_bytes())?;
    writer.write_all(&bytes)?;
    Ok(())
}

/// Read the next record. A clean or truncated end of input yields `None`.
pub fn read_record<R: Read>(reader: &mut R) -> Result<Option<JournalRecord>, DbError> {
    Ok(read_frame(reader)?.map(|(rec, _)| rec))
}

// Returns the record with the number of bytes its frame occupies.
fn read_frame<R: Read>(reader: &mut R) -> Result<Option<(JournalRecord, u64)>, DbError> {
    let mut header = [0u8; 8];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let [l0, l1, l2, l3, c0, c1, c2, c3] = header;
    let len = u32::from_le_bytes([l0, l1, l2, l3]) as usize;
    let crc = u32::from_le_bytes([c0, c1, c2, c3]);
    if len > MAX_RECORD_LEN {
        return Err(DbError::Io(format!("journal record length {len} exceeds limit")));
    }
    let mut buf = vec![0u8; len];
    match reader.read_exact(&mut buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            log::warn!("journal ends with a truncated record ({len} bytes expected); ignoring it");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }
    if crc32fast::hash(&buf) != crc {
        return Err(DbError::Io("journal record checksum mismatch".into()));
    }
    let (rec, _) = decode_from_slice::<JournalRecord, _>(&buf, standard())?;
    Ok(Some((rec, 8 + len as u64)))
}

/// Append-only journal backing a file store.
///
/// `end` is the offset just past the last complete frame; the file never holds bytes beyond it
/// once an append has returned.
pub struct Journal {
    path: PathBuf,
    file: Option<File>,
    end: u64,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("path", &self.path)
            .field("open", &self.file.is_some())
            .field("end", &self.end)
            .finish()
    }
}

impl Journal {
    /// Open (or create) the journal at `path` and return it with every record replayed from disk.
    /// A torn trailing frame is cut off so later appends follow the last good record.
    pub fn open(path: &Path) -> Result<(Self, Vec<JournalRecord>), DbError> {
        let file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
        let mut records = Vec::new();
        let mut end = 0u64;
        {
            let mut reader = BufReader::new(File::open(path)?);
            while let Some((rec, frame_len)) = read_frame(&mut reader)? {
                records.push(rec);
                end += frame_len;
            }
        }
        let on_disk = file.metadata()?.len();
        if on_disk > end {
            log::warn!("journal {}: dropping {} trailing bytes", path.display(), on_disk - end);
            file.set_len(end)?;
        }
        log::debug!("journal {} replayed {} records", path.display(), records.len());
        Ok((Self { path: path.to_path_buf(), file: Some(file), end }, records))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. On a failed write the partial frame is truncated away; if that also
    /// fails the journal closes and every later append is refused.
    pub fn append(&mut self, rec: &JournalRecord) -> Result<(), DbError> {
        let file = self.file.as_mut().ok_or_else(|| DbError::Connection("journal is closed".into()))?;
        let mut frame = Vec::new();
        write_record(&mut frame, rec)?;
        if let Err(e) = file.write_all(&frame) {
            if let Err(undo) = file.set_len(self.end) {
                log::error!("journal {}: rollback failed ({undo}), closing it", self.path.display());
                self.file = None;
            }
            return Err(e.into());
        }
        self.end += frame.len() as u64;
        Ok(())
    }

    /// Sync and release the file handle; later appends fail.
    pub fn close(&mut self) -> Result<(), DbError> {
        if let Some(file) = self.file.take() {
            file.sync_data()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::numbered_id;
    use bson::doc;
    use std::io::Cursor;

    #[test]
    fn record_roundtrip_keeps_types() {
        let d = doc! {"_id": numbered_id(3), "title": "t", "n": 5i64};
        let rec = JournalRecord::new(OpKind::Insert, "notes", &numbered_id(3), Some(&d)).unwrap();
        let mut buf = Vec::new();
        write_record(&mut buf, &rec).unwrap();
        let back = read_record(&mut Cursor::new(buf)).unwrap().unwrap();
        assert_eq!(back.op, OpKind::Insert);
        assert_eq!(back.document().unwrap().unwrap(), d);
    }

    #[test]
    fn truncated_tail_is_ignored() {
        let rec = JournalRecord::new(OpKind::Delete, "notes", &numbered_id(1), None).unwrap();
        let mut buf = Vec::new();
        write_record(&mut buf, &rec).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(read_record(&mut Cursor::new(buf)).unwrap().is_none());
    }

    #[test]
    fn open_cuts_a_torn_tail_before_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.journal");
        let (mut j, _) = Journal::open(&path).unwrap();
        j.append(&JournalRecord::new(OpKind::Delete, "notes", &numbered_id(1), None).unwrap()).unwrap();
        j.close().unwrap();
        let good = std::fs::metadata(&path).unwrap().len();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[200, 0, 0, 0, 1, 2, 3, 4, 9, 9]).unwrap();
        drop(f);

        let (mut j, records) = Journal::open(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), good);
        j.append(&JournalRecord::new(OpKind::Delete, "notes", &numbered_id(2), None).unwrap()).unwrap();
        j.close().unwrap();

        let (_, records) = Journal::open(&path).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![numbered_id(1).to_hex(), numbered_id(2).to_hex()]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_write_that_cannot_be_undone_closes_the_journal() {
        let file = OpenOptions::new().write(true).open("/dev/full").unwrap();
        let mut j = Journal { path: PathBuf::from("/dev/full"), file: Some(file), end: 0 };
        let rec = JournalRecord::new(OpKind::Delete, "notes", &numbered_id(1), None).unwrap();
        assert!(matches!(j.append(&rec), Err(DbError::Io(_))));
        assert!(matches!(j.append(&rec), Err(DbError::Connection(_))));
    }

    #[test]
    fn checksum_mismatch_is_an_error() {
        let rec = JournalRecord::new(OpKind::Delete, "notes", &numbered_id(1), None).unwrap();
        let mut buf = Vec::new();
        write_record(&mut buf, &rec).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xff;
        assert!(read_record(&mut Cursor::new(buf)).is_err());
    }
}
