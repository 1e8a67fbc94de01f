use std::fmt::{Display, Formatter};

use super::encode::WireEncoder;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
/// A raw `ra_svn` wire protocol item.
///
/// The protocol's data language has exactly four atom kinds; every item is
/// one of them, and the accessors for the other kinds return `None` rather
/// than a default that could be mistaken for real data. Booleans are plain
/// words (`true` / `false`), not a separate kind.
pub enum SvnItem {
    /// A protocol word token.
    Word(String),
    /// A protocol number token.
    Number(i64),
    /// A protocol string token (raw bytes; may not be valid UTF-8).
    String(Vec<u8>),
    /// A protocol list token.
    List(Vec<SvnItem>),
}

impl SvnItem {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            SvnItem::Word(_) => "word",
            SvnItem::Number(_) => "number",
            SvnItem::String(_) => "string",
            SvnItem::List(_) => "list",
        }
    }

    /// Returns this item as a `word`, if it is a word.
    ///
    /// This clones the underlying string.
    pub fn as_word(&self) -> Option<String> {
        match self {
            SvnItem::Word(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Returns this item as an `i64`, if it is a number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SvnItem::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns this item as a `bool`, if it is a boolean word.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SvnItem::Word(w) if w == "true" => Some(true),
            SvnItem::Word(w) if w == "false" => Some(false),
            _ => None,
        }
    }

    /// Returns this item as a UTF-8 string, if it is a `string` and is valid UTF-8.
    ///
    /// For binary strings, use [`SvnItem::as_bytes_string`].
    pub fn as_string(&self) -> Option<String> {
        match self {
            SvnItem::String(bytes) => String::from_utf8(bytes.clone()).ok(),
            _ => None,
        }
    }

    /// Returns this item as raw bytes, if it is a `string`.
    ///
    /// This clones the underlying byte buffer.
    pub fn as_bytes_string(&self) -> Option<Vec<u8>> {
        match self {
            SvnItem::String(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Returns this item as a list, if it is a `list`.
    ///
    /// This clones the underlying vector.
    pub fn as_list(&self) -> Option<Vec<SvnItem>> {
        match self {
            SvnItem::List(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl Display for SvnItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SvnItem::Word(w) => write!(f, "{w}"),
            SvnItem::Number(n) => write!(f, "{n}"),
            SvnItem::String(s) => write!(f, "<{} bytes>", s.len()),
            SvnItem::List(items) => write!(f, "({} items)", items.len()),
        }
    }
}

pub(crate) fn encode_item(item: &SvnItem, out: &mut Vec<u8>) {
    let mut enc = WireEncoder::new(out);
    encode_item_with(&mut enc, item);
}

fn encode_item_with(enc: &mut WireEncoder<'_>, item: &SvnItem) {
    match item {
        SvnItem::Word(w) => enc.word(w),
        SvnItem::Number(n) => enc.number(*n),
        SvnItem::String(s) => enc.string_bytes(s),
        SvnItem::List(items) => {
            enc.list_start();
            for item in items {
                encode_item_with(enc, item);
            }
            enc.list_end();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn codec_encodes_expected_bytes() {
        let item = SvnItem::List(vec![
            SvnItem::Word("word".to_string()),
            SvnItem::Number(22),
            SvnItem::String(b"string".to_vec()),
            SvnItem::List(vec![SvnItem::Word("sublist".to_string())]),
        ]);

        let mut bytes = Vec::new();
        encode_item(&item, &mut bytes);
        assert_eq!(bytes, b"( word 22 6:string ( sublist ) ) ");
    }

    #[test]
    fn negative_numbers_carry_a_leading_minus() {
        let mut bytes = Vec::new();
        encode_item(&SvnItem::Number(-1), &mut bytes);
        assert_eq!(bytes, b"-1 ");

        let mut bytes = Vec::new();
        encode_item(&SvnItem::Number(i64::MIN), &mut bytes);
        assert_eq!(bytes, b"-9223372036854775808 ");

        let mut bytes = Vec::new();
        encode_item(&SvnItem::Number(i64::MAX), &mut bytes);
        assert_eq!(bytes, b"9223372036854775807 ");
    }

    #[test]
    fn string_length_prefix_counts_bytes_not_characters() {
        // "héllo" is 5 characters but 6 bytes in UTF-8.
        let mut bytes = Vec::new();
        encode_item(&SvnItem::String("héllo".as_bytes().to_vec()), &mut bytes);
        assert_eq!(bytes, "6:héllo ".as_bytes());
    }

    #[test]
    fn binary_strings_pass_through_raw_bytes() {
        let mut bytes = Vec::new();
        encode_item(&SvnItem::String(vec![0, 0xff, b'x', 0x80]), &mut bytes);

        let mut expected = b"4:".to_vec();
        expected.extend_from_slice(&[0, 0xff, b'x', 0x80]);
        expected.push(b' ');
        assert_eq!(bytes, expected);
    }

    #[test]
    fn success_response_encodes_trailing_empty_params_list() {
        let item = SvnItem::List(vec![
            SvnItem::Word("success".to_string()),
            SvnItem::List(Vec::new()),
        ]);

        let mut bytes = Vec::new();
        encode_item(&item, &mut bytes);
        assert_eq!(bytes, b"( success ( ) ) ");
    }

    #[test]
    fn file_rev_entry_encodes_nested_proplists() {
        let item = SvnItem::List(vec![
            SvnItem::String(b"/trunk/a.txt".to_vec()),
            SvnItem::Number(4),
            SvnItem::List(vec![SvnItem::List(vec![
                SvnItem::String(b"svn:author".to_vec()),
                SvnItem::String(b"alice".to_vec()),
            ])]),
            SvnItem::List(Vec::new()),
            SvnItem::Word("false".to_string()),
        ]);

        let mut bytes = Vec::new();
        encode_item(&item, &mut bytes);
        assert_eq!(
            bytes,
            b"( 12:/trunk/a.txt 4 ( ( 10:svn:author 5:alice ) ) ( ) false ) "
        );
    }

    #[test]
    fn accessors_return_none_for_other_kinds() {
        let word = SvnItem::Word("done".to_string());
        assert_eq!(word.as_word().as_deref(), Some("done"));
        assert_eq!(word.as_i64(), None);
        assert_eq!(word.as_bytes_string(), None);
        assert_eq!(word.as_list(), None);

        let number = SvnItem::Number(0);
        assert_eq!(number.as_i64(), Some(0));
        assert_eq!(number.as_word(), None);
        assert_eq!(number.as_bool(), None);

        assert_eq!(SvnItem::Word("true".to_string()).as_bool(), Some(true));
        assert_eq!(SvnItem::Word("false".to_string()).as_bool(), Some(false));
        assert_eq!(SvnItem::Word("maybe".to_string()).as_bool(), None);
    }
}
