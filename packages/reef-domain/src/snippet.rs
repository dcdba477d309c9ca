const ELLIPSIS: &str = "...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnippetPolicy {
	pub window_chars: usize,
	pub stride_chars: usize,
	/// Content shorter than this is returned unmodified.
	pub passthrough_chars: usize,
}
impl Default for SnippetPolicy {
	fn default() -> Self {
		Self { window_chars: 150, stride_chars: 50, passthrough_chars: 200 }
	}
}

/// Picks the excerpt of `content` whose window contains the most distinct query terms.
///
/// Windows start every `stride_chars` characters. Ties keep the earliest window. The result
/// is prefixed or suffixed with `...` when it does not reach the start or end of `content`.
pub fn build_snippet(content: &str, query_terms: &[String], policy: &SnippetPolicy) -> String {
	let chars: Vec<char> = content.chars().collect();
	let len = chars.len();

	if len < policy.passthrough_chars {
		return content.to_string();
	}

	let window = policy.window_chars.max(1);
	let stride = policy.stride_chars.max(1);
	let scan_end = len.saturating_sub(window.saturating_sub(stride));
	let mut best_start = 0_usize;
	let mut best_count = 0_usize;

	for start in (0..scan_end).step_by(stride) {
		let end = (start + window).min(len);
		let lowered: String = chars[start..end].iter().flat_map(|ch| ch.to_lowercase()).collect();
		let count = query_terms.iter().filter(|term| lowered.contains(term.as_str())).count();

		if count > best_count {
			best_count = count;
			best_start = start;
		}
	}

	let end = (best_start + window).min(len);
	let mut out = String::with_capacity((end - best_start) * 4 + ELLIPSIS.len() * 2);

	if best_start > 0 {
		out.push_str(ELLIPSIS);
	}

	out.extend(&chars[best_start..end]);

	if end < len {
		out.push_str(ELLIPSIS);
	}

	out
}
