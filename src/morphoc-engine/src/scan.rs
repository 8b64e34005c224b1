// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Lexical helpers shared by the startup and geometry parsers: both formats
//! are line-oriented with `#` comments and `<tag>`/`</tag>` bracket tokens.

/// Strips a `#` comment off the end of a line.
pub(crate) fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum TagEvent {
    Open(String),
    Close(String),
}

/// Classifies a token as a tag bracket.  Returns `None` for data tokens,
/// `Some(Err(msg))` for tokens that start a bracket but do not form one.
pub(crate) fn tag_event(token: &str) -> Option<std::result::Result<TagEvent, String>> {
    if !token.starts_with('<') {
        return None;
    }
    if !token.ends_with('>') || token.len() < 3 {
        return Some(Err(format!("malformed tag token '{token}'")));
    }

    if let Some(rest) = token.strip_prefix("</") {
        let name = &rest[..rest.len() - 1];
        if name.is_empty() {
            return Some(Err(format!("malformed tag token '{token}'")));
        }
        Some(Ok(TagEvent::Close(name.to_string())))
    } else {
        let name = &token[1..token.len() - 1];
        Some(Ok(TagEvent::Open(name.to_string())))
    }
}
