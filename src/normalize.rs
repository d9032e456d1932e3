//! Emoji and emoticon normalization.
//!
//! Glyphs become `:name:` tokens so every model sees plain text. The output
//! never contains anything the normalizer would rewrite again, which keeps
//! `normalize` idempotent.

/// Longest emoji sequence (in chars) we try to match. ZWJ families with skin
/// tones are the longest sequences in the Unicode data.
const MAX_EMOJI_CHARS: usize = 10;

/// ASCII emoticons, matched against whole whitespace-delimited tokens only.
const EMOTICONS: &[(&str, &str)] = &[
    (":)", "slightly_smiling_face"),
    (":-)", "slightly_smiling_face"),
    ("=)", "slightly_smiling_face"),
    (":]", "slightly_smiling_face"),
    (":(", "slightly_frowning_face"),
    (":-(", "slightly_frowning_face"),
    ("=(", "slightly_frowning_face"),
    (":[", "slightly_frowning_face"),
    (":D", "grinning_face_with_big_eyes"),
    (":-D", "grinning_face_with_big_eyes"),
    ("=D", "grinning_face_with_big_eyes"),
    ("xD", "grinning_squinting_face"),
    ("XD", "grinning_squinting_face"),
    (";)", "winking_face"),
    (";-)", "winking_face"),
    (":P", "face_with_tongue"),
    (":-P", "face_with_tongue"),
    (":p", "face_with_tongue"),
    (":-p", "face_with_tongue"),
    (":'(", "crying_face"),
    (":O", "face_with_open_mouth"),
    (":-O", "face_with_open_mouth"),
    (":o", "face_with_open_mouth"),
    (":|", "neutral_face"),
    (":-|", "neutral_face"),
    (":/", "confused_face"),
    (":-/", "confused_face"),
    (">:(", "angry_face"),
    (":*", "face_blowing_a_kiss"),
    (":-*", "face_blowing_a_kiss"),
    ("<3", "red_heart"),
    ("</3", "broken_heart"),
    ("^_^", "smiling_face_with_smiling_eyes"),
    ("T_T", "loudly_crying_face"),
];

/// Convert emoji glyphs and emoticons into `:name:` tokens and re-join the
/// text with single spaces.
pub fn normalize(text: &str) -> String {
    demojize(text)
        .split_whitespace()
        .map(|token| match emoticon_name(token) {
            Some(name) => format!(":{name}:"),
            None => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn emoticon_name(token: &str) -> Option<&'static str> {
    EMOTICONS
        .iter()
        .find(|(emoticon, _)| *emoticon == token)
        .map(|(_, name)| *name)
}

/// Replace every emoji sequence in place, preferring the longest match.
fn demojize(text: &str) -> String {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        match longest_emoji_at(text, &chars, i) {
            Some((len, emoji)) => {
                out.push(':');
                out.push_str(&token_name(emoji.name()));
                out.push(':');
                i += len;
            }
            None => {
                out.push(chars[i].1);
                i += 1;
            }
        }
    }

    out
}

fn longest_emoji_at(
    text: &str,
    chars: &[(usize, char)],
    start: usize,
) -> Option<(usize, &'static emojis::Emoji)> {
    let begin = chars[start].0;
    let max_len = MAX_EMOJI_CHARS.min(chars.len() - start);

    (1..=max_len).rev().find_map(|len| {
        let end = chars.get(start + len).map_or(text.len(), |(idx, _)| *idx);
        let candidate = &text[begin..end];
        // Plain ASCII runs (digits, '#', '*') are never rewritten on their own;
        // keycap sequences still match because they carry U+20E3.
        if candidate.is_ascii() {
            return None;
        }
        emojis::get(candidate).map(|emoji| (len, emoji))
    })
}

/// `"flag: Japan"` -> `"flag_japan"`.
fn token_name(name: &str) -> String {
    let mut token = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            token.push(c.to_ascii_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '_') && !token.ends_with('_') {
            token.push('_');
        }
    }
    token.trim_matches('_').to_string()
}
