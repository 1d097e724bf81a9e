//! Suggestion confidence scoring

use crate::services::vision::VisionAnalysis;

/// Score how trustworthy a generated name is, from the richness of the
/// analysis behind it. No description means no usable name: score 0.
///
/// Base 0.5 for a description, up to 0.1 more for a long one, 0.3 for any
/// tags plus up to 0.1 for many, 0.2 for a recognized scene. Clamped to 1.0.
pub fn score(analysis: &VisionAnalysis) -> f64 {
    let description = match analysis.description.as_deref() {
        Some(d) if !d.trim().is_empty() => d.trim(),
        _ => return 0.0,
    };

    let mut confidence: f64 = 0.5;

    let desc_len = description.len();
    if desc_len > 50 {
        confidence += (desc_len as f64 / 1000.0).min(0.1);
    }

    let tag_count = analysis.tags.len();
    if tag_count >= 1 {
        confidence += 0.3;
    }
    if tag_count > 3 {
        confidence += (tag_count as f64 / 50.0).min(0.1);
    }

    if analysis
        .scene
        .as_deref()
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false)
    {
        confidence += 0.2;
    }

    confidence.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(description: Option<&str>, tags: usize, scene: Option<&str>) -> VisionAnalysis {
        VisionAnalysis {
            description: description.map(|s| s.to_string()),
            tags: (0..tags).map(|i| format!("tag{}", i)).collect(),
            objects: vec![],
            scene: scene.map(|s| s.to_string()),
        }
    }

    #[test]
    fn no_description_scores_zero() {
        assert_eq!(score(&analysis(None, 5, Some("beach"))), 0.0);
        assert_eq!(score(&analysis(Some("   "), 5, Some("beach"))), 0.0);
    }

    #[test]
    fn description_alone_scores_base() {
        assert_eq!(score(&analysis(Some("a dog"), 0, None)), 0.5);
    }

    #[test]
    fn long_description_adds_length_bonus() {
        let long = "x".repeat(80);
        let s = score(&analysis(Some(&long), 0, None));
        assert!((s - 0.58).abs() < 1e-9);
    }

    #[test]
    fn tags_and_scene_stack() {
        let s = score(&analysis(Some("a dog"), 2, Some("beach")));
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn many_tags_add_bonus_but_clamp_at_one() {
        let long = "y".repeat(200);
        let s = score(&analysis(Some(&long), 10, Some("park")));
        assert_eq!(s, 1.0);
    }
}
