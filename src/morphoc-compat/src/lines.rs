// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Shared scanning for the collaborator file formats, which are all
//! line-oriented with `#` comments.

use std::io::BufRead;

use crate::Result;

pub(crate) struct DataLines<'a> {
    reader: &'a mut dyn BufRead,
    line_num: usize,
    buf: String,
}

impl<'a> DataLines<'a> {
    pub(crate) fn new(reader: &'a mut dyn BufRead) -> Self {
        DataLines {
            reader,
            line_num: 0,
            buf: String::new(),
        }
    }

    /// Next line with comments stripped and whitespace trimmed, paired with
    /// its 1-based line number.  Lines left empty by stripping are skipped;
    /// `None` means end of input.
    pub(crate) fn next_data(&mut self) -> Result<Option<(usize, String)>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_num += 1;
            let data = match self.buf.find('#') {
                Some(pos) => &self.buf[..pos],
                None => self.buf.as_str(),
            };
            let data = data.trim();
            if !data.is_empty() {
                return Ok(Some((self.line_num, data.to_string())));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blanks() {
        let source = "# header\n\n  3  \nv_Soma mV 3 0.5 # units\n#v_Soma\n-65.0\n";
        let mut reader = source.as_bytes();
        let mut lines = DataLines::new(&mut reader);

        assert_eq!(Some((3, "3".to_string())), lines.next_data().unwrap());
        assert_eq!(
            Some((4, "v_Soma mV 3 0.5".to_string())),
            lines.next_data().unwrap()
        );
        assert_eq!(Some((6, "-65.0".to_string())), lines.next_data().unwrap());
        assert_eq!(None, lines.next_data().unwrap());
    }
}
