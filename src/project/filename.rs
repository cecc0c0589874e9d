//! RFC 2047 encoded-word for the suggested download file name.

const CHARSET: &str = "utf-8";

/// Characters that must be escaped inside a "Q" encoded-word used in a header phrase
const WORD_SPECIALS: &[u8] = b"=_?\"#$%&'(),.:;<>@[\\]^`{|}~";

/// Encode a header word with the "Q" encoding, e.g. `=?utf-8?Q?app=2Ezip?=`.
pub fn encode_word(word: &str) -> String {
    let mut encoded = String::with_capacity(word.len() + 12);
    encoded.push_str("=?");
    encoded.push_str(CHARSET);
    encoded.push_str("?Q?");

    for byte in word.bytes() {
        match byte {
            b' ' => encoded.push('_'),
            0x21..=0x7e if !WORD_SPECIALS.contains(&byte) => encoded.push(byte as char),
            _ => encoded.push_str(&format!("={byte:02X}")),
        }
    }

    encoded.push_str("?=");
    encoded
}

/// `Content-Disposition` value announcing the artifact as a download
pub fn content_disposition(encoded_file_name: &str) -> String {
    format!("attachment; filename=\"{encoded_file_name}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encodes_default_archive_name() {
        assert_eq!(
            encode_word("business-application.zip"),
            "=?utf-8?Q?business-application=2Ezip?="
        );
    }

    #[test]
    fn test_encodes_spaces_and_non_ascii() {
        assert_eq!(encode_word("my app"), "=?utf-8?Q?my_app?=");
        assert_eq!(encode_word("café"), "=?utf-8?Q?caf=C3=A9?=");
    }

    #[test]
    fn test_content_disposition_header() {
        assert_eq!(
            content_disposition("=?utf-8?Q?a=2Ezip?="),
            "attachment; filename=\"=?utf-8?Q?a=2Ezip?=\""
        );
    }

    proptest! {
        #[test]
        fn encoded_word_is_header_safe(word in "\\PC{0,40}") {
            let encoded = encode_word(&word);
            let payload = &encoded["=?utf-8?Q?".len()..encoded.len() - 2];
            prop_assert!(encoded.is_ascii());
            prop_assert!(!payload.contains('"'));
            prop_assert!(!payload.contains(' '));
            prop_assert!(!payload.contains('?'));
        }
    }
}
