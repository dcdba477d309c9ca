use std::collections::HashSet;

const CJK_UNIFIED_FIRST: char = '\u{4e00}';
const CJK_UNIFIED_LAST: char = '\u{9fa5}';

/// Lower-cases `text` and replaces every run of characters outside `[a-z0-9]` and the CJK
/// unified ideograph block with a single space.
pub fn normalize(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	let mut pending_space = false;

	for ch in text.chars().flat_map(char::to_lowercase) {
		if is_token_char(ch) {
			if pending_space && !out.is_empty() {
				out.push(' ');
			}

			out.push(ch);

			pending_space = false;
		} else {
			pending_space = true;
		}
	}

	out
}

/// Every token of `text` in document order, duplicates included.
///
/// Tokens are the whitespace-separated words of [`normalize`]; words of a single character
/// are discarded.
pub fn tokenize(text: &str) -> Vec<String> {
	normalize(text).split_whitespace().filter(|token| is_kept(token)).map(str::to_string).collect()
}

pub fn token_set(text: &str) -> HashSet<String> {
	tokenize(text).into_iter().collect()
}

/// Unique tokens of a query in first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for token in tokenize(query) {
		if seen.insert(token.clone()) {
			out.push(token);
		}
	}

	out
}

fn is_token_char(ch: char) -> bool {
	ch.is_ascii_lowercase()
		|| ch.is_ascii_digit()
		|| (CJK_UNIFIED_FIRST..=CJK_UNIFIED_LAST).contains(&ch)
}

fn is_kept(token: &str) -> bool {
	token.chars().nth(1).is_some()
}
