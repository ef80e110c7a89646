/*!
 * Tests for background alignment planning
 */

use kreel::render::{DurationPolicy, MediaInfo, PlannerConfig, plan_alignment};
use proptest::prelude::*;

/// Test that a square background is cropped to the vertical frame
#[test]
fn test_planAlignment_withSquareSource_shouldCenterCrop() {
    let source = MediaInfo {
        width: 1080,
        height: 1080,
        duration_ms: 20_000,
    };
    let plan = plan_alignment(&source, 12_000, &PlannerConfig::default()).unwrap();
    let crop = plan.crop_rect.unwrap();
    assert_eq!((crop.width, crop.height), (608, 1080));
    assert_eq!(crop.x, 236);
    assert_eq!(plan.duration_policy, DurationPolicy::Trim);
}

/// Test that a source within the aspect tolerance is not cropped
#[test]
fn test_planAlignment_withinTolerance_shouldSkipCrop() {
    let source = MediaInfo {
        width: 720,
        height: 1270,
        duration_ms: 4_000,
    };
    let plan = plan_alignment(&source, 4_001, &PlannerConfig::default()).unwrap();
    assert_eq!(plan.crop_rect, None);
    assert_eq!(plan.duration_policy, DurationPolicy::Loop);
    assert_eq!(plan.repeat_count, 2);
}

/// Test the plan JSON printed by the plan command
#[test]
fn test_alignmentPlan_json_shouldRoundTripThroughSerde() {
    let source = MediaInfo {
        width: 1920,
        height: 1080,
        duration_ms: 5_000,
    };
    let plan = plan_alignment(&source, 15_000, &PlannerConfig::default()).unwrap();
    let json = serde_json::to_string(&plan).unwrap();
    assert!(json.contains("\"crop_rect\":{\"x\":656,\"y\":0,\"w\":608,\"h\":1080}"));
    assert_eq!(serde_json::from_str::<kreel::render::AlignmentPlan>(&json).unwrap(), plan);
}

proptest! {
    /// The crop stays inside the source and the target is the narration length
    #[test]
    fn prop_planAlignment_shouldStayInsideSourceAndCoverNarration(
        width in 1u32..4000,
        height in 1u32..4000,
        source_ms in 1u64..120_000,
        narration_ms in 1u64..120_000,
        freeze in any::<bool>(),
    ) {
        let config = PlannerConfig {
            prefer_freeze_last_frame: freeze,
            ..PlannerConfig::default()
        };
        let source = MediaInfo { width, height, duration_ms: source_ms };
        let plan = plan_alignment(&source, narration_ms, &config).unwrap();

        prop_assert_eq!(plan.target_duration_ms, narration_ms);
        if let Some(crop) = plan.crop_rect {
            prop_assert!(crop.x + crop.width <= width);
            prop_assert!(crop.y + crop.height <= height);
            prop_assert!(crop.width > 0);
        }
        match plan.duration_policy {
            DurationPolicy::Loop => {
                prop_assert!(!freeze);
                prop_assert!(plan.repeat_count as u64 * source_ms >= narration_ms);
            }
            DurationPolicy::FreezeLastFrame => prop_assert!(freeze && source_ms < narration_ms),
            DurationPolicy::Trim => {
                prop_assert!(source_ms >= narration_ms);
                prop_assert_eq!(plan.repeat_count, 1);
            }
        }
    }
}
