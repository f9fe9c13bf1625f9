//! Lyrics timestamp synchronization.
//!
//! Estimates when each lyric line is sung from word counts and per-section
//! pacing, optionally stretching the result to a known song duration. Blank
//! lines are dropped and `[Section]` headers only move the clock forward.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.*?)\]$").expect("section header pattern is valid"));

/// Song section a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Verse,
    Chorus,
    Bridge,
    Intro,
    Outro,
}

impl SectionType {
    /// Classify a header tag such as `Verse 2` or `CHORUS`.
    ///
    /// Matching is by substring, first hit wins in the order verse, chorus,
    /// bridge, intro, outro.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.to_lowercase();
        if tag.contains("verse") {
            Some(Self::Verse)
        } else if tag.contains("chorus") || tag.contains("refrain") {
            Some(Self::Chorus)
        } else if tag.contains("bridge") {
            Some(Self::Bridge)
        } else if tag.contains("intro") || tag.contains("opening") {
            Some(Self::Intro)
        } else if tag.contains("outro") || tag.contains("ending") {
            Some(Self::Outro)
        } else {
            None
        }
    }
}

/// One lyric line with its estimated time span, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedLine {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pacing {
    words_per_second: f64,
    pause_after_line: f64,
    pause_after_section: f64,
}

const DEFAULT_PACING: Pacing = Pacing {
    words_per_second: 2.5,
    pause_after_line: 0.3,
    pause_after_section: 0.8,
};

/// Scale factors within this distance of 1.0 are not applied by
/// [`generate_lyrics_timestamps`].
const RESCALE_DEADBAND: f64 = 0.1;

const fn pacing_for(section: Option<SectionType>) -> Pacing {
    match section {
        Some(SectionType::Chorus) => Pacing {
            words_per_second: 3.0,
            pause_after_line: 0.2,
            ..DEFAULT_PACING
        },
        Some(SectionType::Bridge) => Pacing {
            words_per_second: 2.0,
            pause_after_line: 0.5,
            ..DEFAULT_PACING
        },
        Some(SectionType::Intro) => Pacing {
            words_per_second: 2.3,
            pause_after_line: 0.4,
            ..DEFAULT_PACING
        },
        Some(SectionType::Outro) => Pacing {
            words_per_second: 2.0,
            pause_after_line: 0.5,
            ..DEFAULT_PACING
        },
        Some(SectionType::Verse) | None => DEFAULT_PACING,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Estimate a time span for every lyric line.
///
/// With `song_duration`, the estimate is stretched to end at that time, but
/// only when the correction is larger than 10%.
#[must_use]
pub fn generate_lyrics_timestamps(lyrics: &str, song_duration: Option<f64>) -> Vec<SyncedLine> {
    let mut lines = Vec::new();
    let mut section = None;
    let mut clock = 0.0_f64;

    for raw in lyrics.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = SECTION_HEADER.captures(line) {
            section = caps.get(1).and_then(|tag| SectionType::from_tag(tag.as_str()));
            clock += pacing_for(section).pause_after_section;
            continue;
        }

        let pacing = pacing_for(section);
        let words = line.split_whitespace().count() as f64;
        let start = clock;
        let end = start + words / pacing.words_per_second;

        lines.push(SyncedLine {
            start_time: round2(start),
            end_time: round2(end),
            text: line.to_string(),
            section_type: section,
        });

        clock = end + pacing.pause_after_line;
    }

    if let Some(duration) = song_duration {
        if let Some(last_end) = lines.last().map(|l| l.end_time).filter(|&end| end > 0.0) {
            let scale = duration / last_end;
            if (scale - 1.0).abs() > RESCALE_DEADBAND {
                rescale(&mut lines, scale);
            }
        }
    }

    lines
}

/// Stretch lines so the last one ends at `song_duration`.
///
/// Unlike [`generate_lyrics_timestamps`] this always rescales, however small
/// the correction. Empty input, or input ending at or before zero, comes back
/// unchanged.
#[must_use]
pub fn adjust_timestamps_to_song_duration(
    mut lines: Vec<SyncedLine>,
    song_duration: f64,
) -> Vec<SyncedLine> {
    let Some(last_end) = lines.last().map(|l| l.end_time) else {
        return lines;
    };
    if last_end <= 0.0 {
        return lines;
    }

    rescale(&mut lines, song_duration / last_end);
    lines
}

fn rescale(lines: &mut [SyncedLine], scale: f64) {
    for line in lines {
        line.start_time = round2(line.start_time * scale);
        line.end_time = round2(line.end_time * scale);
    }
}

/// Render lines as LRC (`[mm:ss.xx]text`, one per line).
#[must_use]
pub fn format_lrc(lines: &[SyncedLine]) -> String {
    lines
        .iter()
        .map(|line| {
            let centis = (line.start_time.max(0.0) * 100.0).round() as u64;
            format!(
                "[{:02}:{:02}.{:02}]{}\n",
                centis / 6000,
                (centis / 100) % 60,
                centis % 100,
                line.text
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// 25 words at the default 2.5 words/second: exactly 10 seconds.
    fn ten_second_line() -> String {
        vec!["word"; 25].join(" ")
    }

    #[test]
    fn test_chorus_line() {
        let lines = generate_lyrics_timestamps("[Chorus]\nHello world today", None);

        assert_eq!(lines.len(), 1);
        assert!(approx(lines[0].start_time, 0.8));
        assert!(approx(lines[0].end_time, 1.8));
        assert_eq!(lines[0].text, "Hello world today");
        assert_eq!(lines[0].section_type, Some(SectionType::Chorus));
    }

    #[test]
    fn test_default_pacing_and_line_pause() {
        let lines = generate_lyrics_timestamps("one two three four five\nsix seven", None);

        assert_eq!(lines.len(), 2);
        assert!(approx(lines[0].start_time, 0.0));
        assert!(approx(lines[0].end_time, 2.0));
        assert!(approx(lines[1].start_time, 2.3));
        assert!(approx(lines[1].end_time, 3.1));
        assert_eq!(lines[1].section_type, None);
    }

    #[test]
    fn test_unknown_header_clears_section() {
        let lines = generate_lyrics_timestamps("[Bridge]\nla la\n[Pre-Hook]\nla la", None);

        assert_eq!(lines[0].section_type, Some(SectionType::Bridge));
        assert_eq!(lines[1].section_type, None);
    }

    #[test]
    fn test_small_correction_is_ignored() {
        let lines = generate_lyrics_timestamps(&ten_second_line(), Some(10.5));

        assert!(approx(lines[0].end_time, 10.0));
    }

    #[test]
    fn test_large_correction_is_applied() {
        let lines = generate_lyrics_timestamps(&ten_second_line(), Some(20.0));

        assert!(approx(lines[0].start_time, 0.0));
        assert!(approx(lines[0].end_time, 20.0));
    }

    #[test]
    fn test_adjust_always_rescales() {
        let lines = generate_lyrics_timestamps(&ten_second_line(), None);

        let adjusted = adjust_timestamps_to_song_duration(lines, 10.5);

        assert!(approx(adjusted[0].end_time, 10.5));
    }

    #[test]
    fn test_adjust_leaves_degenerate_input() {
        assert!(adjust_timestamps_to_song_duration(Vec::new(), 30.0).is_empty());

        let zero = vec![SyncedLine {
            start_time: 0.0,
            end_time: 0.0,
            text: "x".to_string(),
            section_type: None,
        }];
        assert_eq!(adjust_timestamps_to_song_duration(zero.clone(), 30.0), zero);
    }

    #[test]
    fn test_blank_input() {
        assert!(generate_lyrics_timestamps("", None).is_empty());
        assert!(generate_lyrics_timestamps("  \n\t\n   ", Some(120.0)).is_empty());
    }

    #[test]
    fn test_header_only_input() {
        assert!(generate_lyrics_timestamps("[Intro]\n[Outro]", Some(60.0)).is_empty());
    }

    #[test]
    fn test_tag_normalization() {
        assert_eq!(SectionType::from_tag("Verse 2"), Some(SectionType::Verse));
        assert_eq!(SectionType::from_tag("VERSE"), Some(SectionType::Verse));
        assert_eq!(SectionType::from_tag("verse: intro"), Some(SectionType::Verse));
        assert_eq!(SectionType::from_tag("Refrain"), Some(SectionType::Chorus));
        assert_eq!(SectionType::from_tag("Opening"), Some(SectionType::Intro));
        assert_eq!(SectionType::from_tag("Ending"), Some(SectionType::Outro));
        assert_eq!(SectionType::from_tag("Hook"), None);
    }

    #[test]
    fn test_format_lrc() {
        let lines = vec![
            SyncedLine {
                start_time: 0.8,
                end_time: 1.8,
                text: "Hello world today".to_string(),
                section_type: Some(SectionType::Chorus),
            },
            SyncedLine {
                start_time: 75.25,
                end_time: 78.0,
                text: "Later on".to_string(),
                section_type: None,
            },
        ];

        assert_eq!(
            format_lrc(&lines),
            "[00:00.80]Hello world today\n[01:15.25]Later on\n"
        );
    }

    #[test]
    fn test_format_lrc_edge_cases() {
        assert_eq!(format_lrc(&[]), "");

        let lines = vec![SyncedLine {
            start_time: -1.0,
            end_time: 0.5,
            text: "Early".to_string(),
            section_type: None,
        }];
        assert_eq!(format_lrc(&lines), "[00:00.00]Early\n");
    }

    #[test]
    fn test_serializes_section_as_type() {
        let lines = generate_lyrics_timestamps("[Verse 1]\nhi", None);
        let json = serde_json::to_value(&lines[0]).unwrap();

        assert_eq!(json["type"], "verse");
        assert_eq!(json["startTime"], 0.8);
        assert!(json.get("sectionType").is_none());
    }
}
