pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Length in UTF-16 code units, the unit of DOM caret offsets.
pub(crate) fn utf16_len(s: &str) -> u32 {
    s.encode_utf16().count() as u32
}

pub(crate) fn utf16_to_byte_idx(s: &str, pos_utf16: u32) -> usize {
    if pos_utf16 == 0 {
        return 0;
    }
    let mut acc: u32 = 0;
    for (i, ch) in s.char_indices() {
        let w = ch.len_utf16() as u32;
        if acc + w > pos_utf16 {
            return i;
        }
        acc += w;
        if acc == pos_utf16 {
            return i + ch.len_utf8();
        }
    }
    s.len()
}

pub(crate) fn byte_idx_to_utf16(s: &str, byte_idx: usize) -> u32 {
    let mut idx = byte_idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    utf16_len(&s[..idx])
}
