//! Byte-precise PDF repair transforms, the automated half of the repair engine.
//!
//! Each function mutates a full-file buffer in place and returns `Err` with a short description
//! when the expected structure isn't present; the planner only schedules these against findings
//! that already proved the relevant keyword exists, so failure here means the file changed
//! between scan and apply, not a planning bug.

use crate::pdf::bytes;

/// Append `\n%%EOF\n` unless the last 1024 bytes already contain an `%%EOF` marker.
pub fn append_eof_marker(buffer: &mut Vec<u8>) {
    let tail_start = buffer.len().saturating_sub(1024);
    if bytes::find(&buffer[tail_start..], b"%%EOF").is_some() {
        return;
    }
    buffer.extend_from_slice(b"\n%%EOF\n");
}

/// Rewrite the numeric literal after the last `startxref` keyword to the byte offset of the last
/// standalone `xref` keyword (i.e. not the one embedded inside `startxref` itself).
pub fn recompute_startxref(buffer: &mut Vec<u8>) -> Result<(), String> {
    let xref_offset = rfind_standalone_xref(buffer).ok_or_else(|| "no xref keyword found".to_owned())?;
    let startxref_marker = bytes::rfind(buffer, b"startxref").ok_or_else(|| "no startxref keyword found".to_owned())?;

    let digits_start = bytes::skip_whitespace(buffer, startxref_marker + b"startxref".len());
    let mut digits_end = digits_start;
    while digits_end < buffer.len() && buffer[digits_end].is_ascii_digit() {
        digits_end += 1;
    }

    buffer.splice(digits_start..digits_end, xref_offset.to_string().into_bytes());
    Ok(())
}

fn rfind_standalone_xref(buffer: &[u8]) -> Option<usize> {
    let mut search_end = buffer.len();
    loop {
        let found = bytes::rfind(&buffer[..search_end], b"xref")?;
        let is_startxref = found >= b"start".len() && &buffer[found - b"start".len()..found] == b"start";
        if !is_startxref {
            return Some(found);
        }
        search_end = found;
    }
}

/// Scoped substitutions restricted to dictionary keys inside the `trailer << ... >>` block:
/// `/Sise` → `/Size`, `/root` → `/Root`. Never touches occurrences outside that range.
pub fn fix_trailer_typos(buffer: &mut Vec<u8>) -> Result<(), String> {
    const SUBSTITUTIONS: [(&[u8], &[u8]); 2] = [(b"/Sise", b"/Size"), (b"/root", b"/Root")];

    let trailer_keyword = bytes::find(buffer, b"trailer").ok_or_else(|| "no trailer keyword found".to_owned())?;
    let (open, close) =
        bytes::dict_bounds(buffer, trailer_keyword).ok_or_else(|| "trailer dictionary delimiters not found".to_owned())?;

    let mut matches: Vec<(usize, usize, &[u8])> = Vec::new();
    for (from, to) in SUBSTITUTIONS {
        let mut search_from = open;
        while let Some(relative) = bytes::find(&buffer[search_from..close], from) {
            let at = search_from + relative;
            matches.push((at, from.len(), to));
            search_from = at + from.len();
        }
    }

    // Apply from the highest offset down so earlier splices don't shift not-yet-applied offsets.
    matches.sort_by(|a, b| b.0.cmp(&a.0));
    for (at, len, to) in matches {
        buffer.splice(at..at + len, to.iter().copied());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_eof_marker_is_idempotent() {
        let mut with_marker = b"%PDF-1.4\n...\n%%EOF\n".to_vec();
        let before = with_marker.clone();
        append_eof_marker(&mut with_marker);
        assert_eq!(with_marker, before);
    }

    #[test]
    fn append_eof_marker_adds_marker_when_missing() {
        let mut buffer = b"%PDF-1.4\n...no marker here".to_vec();
        append_eof_marker(&mut buffer);
        assert!(buffer.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn recompute_startxref_points_at_standalone_xref() {
        let mut buffer = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 >>\nstartxref\n0\n%%EOF".to_vec();
        recompute_startxref(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("startxref\n0\n"), "xref table is at offset 0: {text}");
    }

    #[test]
    fn recompute_startxref_ignores_xref_substring_in_startxref() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(b"header\n");
        let xref_offset = buffer.len();
        buffer.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 >>\n");
        buffer.extend_from_slice(b"startxref\n999999\n%%EOF");
        recompute_startxref(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains(&format!("startxref\n{xref_offset}\n")));
    }

    #[test]
    fn fix_trailer_typos_rewrites_keys_inside_trailer_only() {
        let mut buffer = b"/Sise elsewhere should stay\ntrailer\n<< /Sise 3 /root 1 0 R >>\n%%EOF".to_vec();
        fix_trailer_typos(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("/Sise elsewhere"), "text outside the trailer dict must be untouched");
        assert!(text.contains("<< /Size 3 /Root 1 0 R >>"));
    }
}
