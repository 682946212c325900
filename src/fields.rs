/// Field extraction for flat inbound records.
///
/// Inbound commands are single-level JSON objects with string and integer
/// members. [`Fields`] walks the top-level members of such an object with a
/// small cursor-based tokenizer and looks values up by key. It is not a
/// general JSON decoder:
///
/// - string values are returned raw; escapes are skipped over here and
///   decoded by the caller that keeps the value
/// - nested objects and arrays are skipped, their members are not visible
/// - unknown keys are ignored; the first occurrence of a key wins
/// - a structural error ends the walk, members before it stay visible
///
/// Integers accept an optional sign and leading digits; a fractional or
/// exponent tail is skipped. `true`/`false` read as 1/0.

/// A top-level member value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Str(&'a str),
    Int(i32),
    Bool(bool),
    Null,
    /// Object, array, or a number that does not fit `i32`
    Other,
}

/// Read-only view over the members of one flat record.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    line: &'a [u8],
}

impl<'a> Fields<'a> {
    pub fn new(line: &'a [u8]) -> Self {
        Self { line }
    }

    /// Iterate the top-level members in order.
    pub fn members(&self) -> Members<'a> {
        let mut cursor = Cursor {
            buf: self.line,
            pos: 0,
        };
        cursor.skip_ws();
        let done = !cursor.eat(b'{');
        Members {
            cursor,
            done,
            first: true,
        }
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value<'a>> {
        self.members().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        match self.get(key)? {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.get(key)? {
            Value::Int(n) => Some(n),
            Value::Bool(b) => Some(b as i32),
            _ => None,
        }
    }
}

pub struct Members<'a> {
    cursor: Cursor<'a>,
    done: bool,
    first: bool,
}

impl<'a> Iterator for Members<'a> {
    type Item = (&'a str, Value<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.step();
        if item.is_none() {
            self.done = true;
        }
        item
    }
}

impl<'a> Members<'a> {
    fn step(&mut self) -> Option<(&'a str, Value<'a>)> {
        let c = &mut self.cursor;
        c.skip_ws();
        if c.eat(b'}') {
            return None;
        }
        if !self.first && !c.eat(b',') {
            return None;
        }
        self.first = false;
        c.skip_ws();
        let key = c.string()?;
        c.skip_ws();
        if !c.eat(b':') {
            return None;
        }
        c.skip_ws();
        let value = c.value()?;
        Some((key, value))
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// A quoted string, returned without the quotes and undecoded.
    fn string(&mut self) -> Option<&'a str> {
        if !self.eat(b'"') {
            return None;
        }
        let start = self.pos;
        loop {
            match self.peek()? {
                b'"' => break,
                b'\\' => self.pos += 2,
                _ => self.pos += 1,
            }
        }
        let raw = self.buf.get(start..self.pos)?;
        self.pos += 1;
        core::str::from_utf8(raw).ok()
    }

    fn value(&mut self) -> Option<Value<'a>> {
        match self.peek()? {
            b'"' => self.string().map(Value::Str),
            b'{' | b'[' => {
                self.skip_nested()?;
                Some(Value::Other)
            }
            b'-' | b'0'..=b'9' => Some(self.number()),
            b't' => self.literal(b"true", Value::Bool(true)),
            b'f' => self.literal(b"false", Value::Bool(false)),
            b'n' => self.literal(b"null", Value::Null),
            _ => None,
        }
    }

    fn literal(&mut self, word: &[u8], value: Value<'a>) -> Option<Value<'a>> {
        if self.buf.get(self.pos..self.pos + word.len())? == word {
            self.pos += word.len();
            Some(value)
        } else {
            None
        }
    }

    fn number(&mut self) -> Value<'a> {
        let negative = self.eat(b'-');
        let mut acc: Option<i32> = Some(0);
        let mut digits = 0;
        while let Some(d @ b'0'..=b'9') = self.peek() {
            let d = (d - b'0') as i32;
            acc = acc
                .and_then(|a| a.checked_mul(10))
                .and_then(|a| if negative { a.checked_sub(d) } else { a.checked_add(d) });
            digits += 1;
            self.pos += 1;
        }
        // fractional / exponent tail
        while matches!(self.peek(), Some(b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-')) {
            self.pos += 1;
        }
        match acc {
            Some(n) if digits > 0 => Value::Int(n),
            _ => Value::Other,
        }
    }

    /// Skip a balanced object or array, string-aware.
    fn skip_nested(&mut self) -> Option<()> {
        let mut depth = 0usize;
        loop {
            match self.peek()? {
                b'{' | b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' | b']' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Some(());
                    }
                }
                b'"' => {
                    self.string()?;
                }
                _ => self.pos += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_strings_and_ints() {
        let f = Fields::new(br#"{"type":"cmd","cmd":"FPV_TUNE_FREQ","req_id":"9","vrx_id":2,"freq_mhz":3300}"#);
        assert_eq!(f.get_str("type"), Some("cmd"));
        assert_eq!(f.get_str("cmd"), Some("FPV_TUNE_FREQ"));
        assert_eq!(f.get_str("req_id"), Some("9"));
        assert_eq!(f.get_int("vrx_id"), Some(2));
        assert_eq!(f.get_int("freq_mhz"), Some(3300));
        assert_eq!(f.get("missing"), None);
    }

    #[test]
    fn tolerates_whitespace() {
        let f = Fields::new(b"  { \"cmd\" : \"X\" ,\t\"hold\":  1 }  ");
        assert_eq!(f.get_str("cmd"), Some("X"));
        assert_eq!(f.get_int("hold"), Some(1));
    }

    #[test]
    fn type_mismatch_reads_as_absent() {
        let f = Fields::new(br#"{"sel":"2","cmd":5}"#);
        assert_eq!(f.get_int("sel"), None);
        assert_eq!(f.get_str("cmd"), None);
    }

    #[test]
    fn nested_members_are_skipped() {
        let f = Fields::new(br#"{"args":{"sel":3,"x":[1,{"y":"}"}]},"sel":1}"#);
        assert_eq!(f.get("args"), Some(Value::Other));
        assert_eq!(f.get_int("sel"), Some(1));
    }

    #[test]
    fn first_occurrence_wins() {
        let f = Fields::new(br#"{"sel":1,"sel":3}"#);
        assert_eq!(f.get_int("sel"), Some(1));
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let f = Fields::new(br#"{"req_id":"a\"b","sel":2}"#);
        assert_eq!(f.get_str("req_id"), Some(r#"a\"b"#));
        assert_eq!(f.get_int("sel"), Some(2));
    }

    #[test]
    fn numbers_negative_fraction_and_overflow() {
        let f = Fields::new(br#"{"a":-7,"b":12.9,"c":99999999999,"d":1e3}"#);
        assert_eq!(f.get_int("a"), Some(-7));
        assert_eq!(f.get_int("b"), Some(12));
        assert_eq!(f.get("c"), Some(Value::Other));
        assert_eq!(f.get_int("d"), Some(1));
    }

    #[test]
    fn booleans_and_null() {
        let f = Fields::new(br#"{"mute":true,"hold":false,"x":null}"#);
        assert_eq!(f.get_int("mute"), Some(1));
        assert_eq!(f.get_int("hold"), Some(0));
        assert_eq!(f.get("x"), Some(Value::Null));
    }

    #[test]
    fn structural_error_keeps_earlier_members() {
        let f = Fields::new(br#"{"cmd":"TEST_BEEP","req_id" "5"}"#);
        assert_eq!(f.get_str("cmd"), Some("TEST_BEEP"));
        assert_eq!(f.get_str("req_id"), None);
    }

    #[test]
    fn truncated_record_keeps_complete_members() {
        let f = Fields::new(br#"{"cmd":"TEST_BEEP","req_id":"12"#);
        assert_eq!(f.get_str("cmd"), Some("TEST_BEEP"));
        assert_eq!(f.get_str("req_id"), None);
    }

    #[test]
    fn non_object_has_no_members() {
        assert_eq!(Fields::new(b"hello").members().count(), 0);
        assert_eq!(Fields::new(b"[1,2]").members().count(), 0);
    }
}
