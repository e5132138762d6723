//! Input filters producing the "filtered input" elements are evaluated against

use scorecard_domain::InputFilter;
use std::collections::BTreeSet;

/// Longest prefix treated as a speaker label
const MAX_LABEL_LEN: usize = 40;

/// Apply filters in order
pub fn apply_filters(filters: &[InputFilter], text: &str) -> String {
    filters
        .iter()
        .fold(text.to_string(), |filtered, filter| apply_filter(filter, &filtered))
}

fn apply_filter(filter: &InputFilter, text: &str) -> String {
    match filter {
        InputFilter::StripSpeakerLabels => text
            .lines()
            .map(|line| split_speaker(line).map_or(line, |(_, utterance)| utterance))
            .collect::<Vec<_>>()
            .join("\n"),

        InputFilter::KeepSpeakers { speakers } => text
            .lines()
            .filter(|line| {
                split_speaker(line).is_some_and(|(label, _)| {
                    speakers.iter().any(|speaker| speaker.trim().eq_ignore_ascii_case(label))
                })
            })
            .collect::<Vec<_>>()
            .join("\n"),

        InputFilter::KeywordWindow { keywords, lines_before, lines_after } => {
            keyword_window(text, keywords, *lines_before, *lines_after)
        }

        InputFilter::CollapseWhitespace => text
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Split `"Agent: hello"` into `("Agent", "hello")`
fn split_speaker(line: &str) -> Option<(&str, &str)> {
    let (label, utterance) = line.split_once(':')?;
    let label = label.trim();
    let plausible = !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && label.chars().all(|c| c.is_alphanumeric() || c == ' ' || c == '_' || c == '-');
    plausible.then(|| (label, utterance.trim_start()))
}

fn keyword_window(text: &str, keywords: &[String], before: usize, after: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let keywords: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect();

    let mut kept = BTreeSet::new();
    for (index, line) in lines.iter().enumerate() {
        let lowered = line.to_lowercase();
        if keywords.iter().any(|keyword| lowered.contains(keyword.as_str())) {
            let start = index.saturating_sub(before);
            let end = (index + after).min(lines.len().saturating_sub(1));
            kept.extend(start..=end);
        }
    }

    kept.into_iter().map(|index| lines[index]).collect::<Vec<_>>().join("\n")
}
