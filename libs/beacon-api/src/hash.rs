/// FNV-style string hash used by the page scripts to derive short ids.
///
/// The input is first percent-encoded like `encodeURIComponent`, hashed with
/// 32-bit wrapping arithmetic, then the decimal hash with the encoded length
/// appended is rendered in base 36.
pub fn hash_string(input: &str) -> String {
    let encoded = encode_uri_component(input);
    let mut hval: u32 = 0x811c_9dc5;
    for b in encoded.bytes() {
        hval ^= u32::from(b);
        hval = hval
            .wrapping_add(hval << 1)
            .wrapping_add(hval << 4)
            .wrapping_add(hval << 7)
            .wrapping_add(hval << 8)
            .wrapping_add(hval << 24);
    }
    let digits = format!("{hval}{}", encoded.len());
    match digits.parse::<u64>() {
        Ok(n) => to_base36(n),
        Err(_) => digits,
    }
}

fn encode_uri_component(input: &str) -> String {
    // urlencoding escapes `!*'()`, which encodeURIComponent leaves alone.
    urlencoding::encode(input)
        .replace("%21", "!")
        .replace("%2A", "*")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_page_script_values() {
        assert_eq!(hash_string(""), "9y8m6cy");
        assert_eq!(hash_string("a"), "hkr122h");
        assert_eq!(hash_string("hello world"), "2nab7szh");
        assert_eq!(hash_string("https://example.com/?a=1&b=(x)!"), "4p7ovxf3");
        assert_eq!(hash_string("h\u{e9}llo"), "256a5psy");
    }
}
