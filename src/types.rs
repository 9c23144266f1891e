use crate::errors::DbError;
use bson::oid::ObjectId;

pub type CollectionName = String;

/// Document identifiers are BSON object ids; their 24-digit hex form sorts the same as the raw bytes.
pub type DocumentId = ObjectId;

/// Parse a 24-digit hex string into a [`DocumentId`].
///
/// # Errors
/// Returns `InvalidQuery` when the input is not a valid object id.
pub fn parse_id(s: &str) -> Result<DocumentId, DbError> {
    ObjectId::parse_str(s).map_err(|e| DbError::InvalidQuery(format!("invalid _id {s:?}: {e}")))
}

/// Id whose hex form is `n` zero-padded to 24 decimal digits, e.g. `7` -> `000000000000000000000007`.
///
/// Numbers up to 24 decimal digits always form valid hex, so ordering by id follows ordering by `n`.
#[must_use]
pub fn numbered_id(n: u32) -> DocumentId {
    let digits = format!("{n:024}");
    let mut bytes = [0u8; 12];
    for (i, pair) in digits.as_bytes().chunks(2).enumerate() {
        bytes[i] = ((pair[0] - b'0') << 4) | (pair[1] - b'0');
    }
    ObjectId::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_id_matches_hex_form() {
        assert_eq!(numbered_id(7).to_hex(), "000000000000000000000007");
        assert_eq!(numbered_id(17).to_hex(), "000000000000000000000017");
        assert_eq!(numbered_id(20), parse_id("000000000000000000000020").unwrap());
    }

    #[test]
    fn numbered_ids_sort_numerically() {
        assert!(numbered_id(9) < numbered_id(10));
        assert!(numbered_id(19) < numbered_id(20));
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(matches!(parse_id("not-an-id"), Err(DbError::InvalidQuery(_))));
    }
}
