/// Extracts top-level `fn name(...) { ... }` definitions from a script so
/// the function namespace can be persisted as source text. The scan skips
/// string literals and comments and tracks brace depth with a cursor walk.
pub(crate) fn extract_function_sources(source: &str) -> Vec<(String, String)> {
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    let mut cursor = 0usize;
    let mut depth = 0usize;

    while cursor < bytes.len() {
        match bytes[cursor] {
            b'"' | b'\'' | b'`' => {
                cursor = skip_string(bytes, cursor);
            }
            b'/' if bytes.get(cursor + 1) == Some(&b'/') => {
                cursor = skip_line(bytes, cursor);
            }
            b'/' if bytes.get(cursor + 1) == Some(&b'*') => {
                cursor = skip_block_comment(bytes, cursor);
            }
            b'{' => {
                depth += 1;
                cursor += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                cursor += 1;
            }
            b'f' if depth == 0 && is_keyword_at(bytes, cursor, b"fn") => {
                if let Some((name, end)) = scan_function(source, cursor) {
                    out.push((name, source[cursor..end].to_string()));
                    cursor = end;
                } else {
                    cursor += 2;
                }
            }
            _ => {
                cursor += 1;
            }
        }
    }

    out
}

fn is_keyword_at(bytes: &[u8], cursor: usize, keyword: &[u8]) -> bool {
    if !bytes[cursor..].starts_with(keyword) {
        return false;
    }
    let before = cursor.checked_sub(1).map(|index| bytes[index]);
    let after = bytes.get(cursor + keyword.len()).copied();
    !matches!(before, Some(b) if is_ident_byte(b)) && !matches!(after, Some(b) if is_ident_byte(b))
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Starting at the `fn` keyword, returns the function name and the byte
/// offset just past its closing brace. Returns `None` for anything that
/// does not look like a complete definition.
fn scan_function(source: &str, start: usize) -> Option<(String, usize)> {
    let bytes = source.as_bytes();
    let mut cursor = start + 2;

    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }

    let name_start = cursor;
    while cursor < bytes.len() && is_ident_byte(bytes[cursor]) {
        cursor += 1;
    }
    if cursor == name_start {
        return None;
    }
    let name = source[name_start..cursor].to_string();

    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    if bytes.get(cursor) != Some(&b'(') {
        return None;
    }
    cursor = skip_balanced(bytes, cursor, b'(', b')')?;

    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    if bytes.get(cursor) != Some(&b'{') {
        return None;
    }
    let end = skip_balanced(bytes, cursor, b'{', b'}')?;

    Some((name, end))
}

fn skip_balanced(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut cursor = start;
    while cursor < bytes.len() {
        match bytes[cursor] {
            b'"' | b'\'' | b'`' => {
                cursor = skip_string(bytes, cursor);
                continue;
            }
            b'/' if bytes.get(cursor + 1) == Some(&b'/') => {
                cursor = skip_line(bytes, cursor);
                continue;
            }
            b'/' if bytes.get(cursor + 1) == Some(&b'*') => {
                cursor = skip_block_comment(bytes, cursor);
                continue;
            }
            byte if byte == open => depth += 1,
            byte if byte == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(cursor + 1);
                }
            }
            _ => {}
        }
        cursor += 1;
    }
    None
}

fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut cursor = start + 1;
    while cursor < bytes.len() {
        match bytes[cursor] {
            b'\\' => cursor += 2,
            byte if byte == quote => return cursor + 1,
            _ => cursor += 1,
        }
    }
    cursor
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    let mut cursor = start;
    while cursor < bytes.len() && bytes[cursor] != b'\n' {
        cursor += 1;
    }
    cursor
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut cursor = start + 2;
    while cursor + 1 < bytes.len() {
        if bytes[cursor] == b'*' && bytes[cursor + 1] == b'/' {
            return cursor + 2;
        }
        cursor += 1;
    }
    bytes.len()
}
