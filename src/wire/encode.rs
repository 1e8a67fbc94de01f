//! Low-level token emission for the `ra_svn` data language.
//!
//! Every atom is followed by exactly one space, including list markers, so
//! concatenating encoded tokens always yields a well-formed stream.

pub(crate) struct WireEncoder<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> WireEncoder<'a> {
    pub(crate) fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out }
    }

    pub(crate) fn word(&mut self, word: &str) {
        self.out.extend_from_slice(word.as_bytes());
        self.out.push(b' ');
    }

    pub(crate) fn number(&mut self, n: i64) {
        encode_decimal_i64(n, self.out);
        self.out.push(b' ');
    }

    pub(crate) fn string_bytes(&mut self, bytes: &[u8]) {
        encode_decimal_u64(bytes.len() as u64, self.out);
        self.out.push(b':');
        self.out.extend_from_slice(bytes);
        self.out.push(b' ');
    }

    pub(crate) fn list_start(&mut self) {
        self.out.extend_from_slice(b"( ");
    }

    pub(crate) fn list_end(&mut self) {
        self.out.extend_from_slice(b") ");
    }
}

pub(crate) fn encode_decimal_u64(mut n: u64, out: &mut Vec<u8>) {
    let mut digits = [0u8; 20];
    let mut i = digits.len();
    loop {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    out.extend_from_slice(&digits[i..]);
}

pub(crate) fn encode_decimal_i64(n: i64, out: &mut Vec<u8>) {
    if n < 0 {
        out.push(b'-');
    }
    encode_decimal_u64(n.unsigned_abs(), out);
}
