/*!
 * Tests for caption segmentation and karaoke markup
 */

use kreel::captions::{
    HighlightMode, SegmentationConfig, Segmenter, StylePreset, SubtitleStyle, SubtitleStyleFields,
    generate_ass_file, render_event,
};
use kreel::text::Token;
use kreel::timing::RawBoundaryEvent;
use proptest::prelude::*;

use crate::common;

fn segmenter(max_chars: usize, max_words: usize) -> Segmenter {
    Segmenter::new(
        SegmentationConfig {
            max_chars_per_line: max_chars,
            max_words_per_segment: max_words,
            ..SegmentationConfig::default()
        },
        true,
    )
}

/// Test the reference example end to end through markup
#[test]
fn test_renderEvent_withHolaMundo_shouldTagWordsAndPunctuation() {
    let feed = vec![
        Some(RawBoundaryEvent::new("Hola", 0.0, 500.0)),
        Some(RawBoundaryEvent::new("mundo", 600.0, 600.0)),
    ];
    let (tokens, timeline) = common::reconcile("Hola, mundo!", &feed, 1200);
    let segmentation = segmenter(20, 3).segment(&tokens, &timeline);
    assert_eq!(segmentation.events.len(), 1);

    let style = SubtitleStyle::default();
    let line = render_event(&segmentation.events[0], &style);
    assert_eq!(line.text, "{\\kf50}HOLA{\\kf0},{\\kf10} {\\kf60}MUNDO{\\kf0}!");
    assert_eq!((line.start_cs, line.end_cs), (0, 120));
    assert_eq!(
        line.to_dialogue(style.name()),
        "Dialogue: 0,0:00:00.00,0:00:01.20,Default,,0,0,0,,{\\kf50}HOLA{\\kf0},{\\kf10} {\\kf60}MUNDO{\\kf0}!"
    );
}

/// Test that a word wider than the line is emitted alone
#[test]
fn test_segment_withOversizedWord_shouldEmitSolitaryEvent() {
    let long_word = "a".repeat(60);
    let text = format!("short {} tail", long_word);
    let (tokens, timeline) = common::reconcile(&text, &[], 3000);
    let segmentation = segmenter(40, 3).segment(&tokens, &timeline);

    assert_eq!(segmentation.overflows.len(), 1);
    assert_eq!(segmentation.overflows[0].rendered_len, 60);
    let solitary = segmentation
        .events
        .iter()
        .find(|e| e.entries.iter().any(|t| t.token.raw_text == long_word))
        .unwrap();
    assert_eq!(solitary.word_count(), 1);
}

/// Test that the file header appears once with the style line
#[test]
fn test_generateAssFile_shouldContainSectionsOnce() {
    let (tokens, timeline) = common::reconcile("uno dos tres cuatro cinco", &[], 2500);
    let segmentation = segmenter(20, 3).segment(&tokens, &timeline);
    let style = StylePreset::Neon.style();
    let ass = generate_ass_file(&segmentation.events, &style, (1080, 1920));

    assert_eq!(ass.matches("[Script Info]").count(), 1);
    assert_eq!(ass.matches("[V4+ Styles]").count(), 1);
    assert_eq!(ass.matches("[Events]").count(), 1);
    assert!(ass.contains("PlayResX: 1080"));
    assert!(ass.contains(&style.to_style_line()));
    assert_eq!(ass.matches("Dialogue:").count(), segmentation.events.len());
}

/// Test that the highlight mode picks the karaoke tag
#[test]
fn test_renderEvent_withOutlineMode_shouldUseKo() {
    let style = SubtitleStyle::new(SubtitleStyleFields {
        highlight_mode: HighlightMode::Outline,
        use_uppercase: false,
        ..SubtitleStyleFields::default()
    })
    .unwrap();
    let (tokens, timeline) = common::reconcile("hi", &[Some(RawBoundaryEvent::new("hi", 0.0, 300.0))], 300);
    let segmentation = segmenter(20, 3).segment(&tokens, &timeline);
    assert_eq!(render_event(&segmentation.events[0], &style).text, "{\\ko30}hi");
}

fn reconstruct(events: &[kreel::captions::CaptionEvent]) -> Vec<Token> {
    events
        .iter()
        .flat_map(|e| e.entries.iter().map(|t| t.token.clone()))
        .collect()
}

proptest! {
    /// Events reproduce the token stream, respect the width and never overlap
    #[test]
    fn prop_segment_shouldReconstructTokensWithinWidth(
        words in prop::collection::vec("[a-z]{1,14}[,.!?]?", 1..30),
        max_chars in 8usize..30,
        max_words in 1usize..5,
    ) {
        let text = words.join(" ");
        let audio_ms = 400 * words.len() as u64;
        let (tokens, timeline) = common::reconcile(&text, &[], audio_ms);
        let segmentation = segmenter(max_chars, max_words).segment(&tokens, &timeline);

        prop_assert_eq!(reconstruct(&segmentation.events), tokens);

        for event in &segmentation.events {
            let width = event.rendered_text(true).chars().count();
            prop_assert!(width <= max_chars || event.word_count() == 1);
            prop_assert!(event.word_count() <= max_words);
            prop_assert!(event.start_ms <= event.end_ms);
        }
        for pair in segmentation.events.windows(2) {
            prop_assert!(pair[0].end_ms <= pair[1].start_ms);
        }
    }

    /// Karaoke tags of a line add up to the displayed duration
    #[test]
    fn prop_renderEvent_tagsShouldSumToLineDuration(
        words in prop::collection::vec("[a-z]{1,10}[,!]?", 1..20),
        slots in prop::collection::vec((1u64..900, 0u64..400), 20),
    ) {
        let text = words.join(" ");
        let mut cursor = 0u64;
        let feed: Vec<Option<RawBoundaryEvent>> = slots
            .iter()
            .take(words.len())
            .map(|&(duration, gap)| {
                let event = RawBoundaryEvent::new("w", (cursor + gap) as f64, duration as f64);
                cursor += gap + duration;
                Some(event)
            })
            .collect();
        let (tokens, timeline) = common::reconcile(&text, &feed, cursor + 1);
        let segmentation = segmenter(20, 3).segment(&tokens, &timeline);
        let style = SubtitleStyle::default();

        for event in &segmentation.events {
            let line = render_event(event, &style);
            let sum = common::karaoke_sum(&line.text);
            let expected = line.end_cs - line.start_cs;
            prop_assert!(sum.abs_diff(expected) <= 1, "sum {} vs {}", sum, expected);
        }
    }
}
