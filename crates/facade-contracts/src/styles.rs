/// A named enhancement transform. The description is sent verbatim as
/// the edit prompt when the session is in enhancement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleSpec {
    pub label: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_STYLE: &str = "Standard Clarity";

pub const ENHANCEMENT_STYLES: &[StyleSpec] = &[
    StyleSpec {
        label: "Standard Clarity",
        description: "Enhance this architectural rendering for clarity and realism: sharpen \
edges and material textures, balance exposure and white balance, recover shadow and \
highlight detail, and keep the geometry, composition and camera unchanged.",
    },
    StyleSpec {
        label: "Photorealistic",
        description: "Turn this architectural rendering into a photorealistic photograph: \
physically plausible materials, natural global illumination, realistic vegetation and sky, \
subtle lens characteristics, with the building geometry and viewpoint preserved exactly.",
    },
    StyleSpec {
        label: "Golden Hour",
        description: "Relight this architectural rendering at golden hour: low warm sun, long \
soft shadows, glowing facade highlights and a clear gradient sky, keeping the architecture \
and framing unchanged.",
    },
    StyleSpec {
        label: "Blue Hour Twilight",
        description: "Relight this architectural rendering at blue hour: deep blue sky, warm \
interior lights glowing through the glazing, gentle exterior lighting and reflections, \
keeping the architecture and framing unchanged.",
    },
    StyleSpec {
        label: "Overcast Soft Light",
        description: "Relight this architectural rendering under a bright overcast sky: soft \
diffuse light, minimal shadows, muted natural colours and accurate material tones, keeping \
the architecture and framing unchanged.",
    },
    StyleSpec {
        label: "Watercolor Sketch",
        description: "Render this architectural image as a loose watercolor presentation \
sketch: fine ink linework over transparent washes, paper texture and soft bleeding edges, \
preserving the composition and proportions.",
    },
    StyleSpec {
        label: "Clay Model",
        description: "Render this architectural image as a white clay massing model: uniform \
matte white material, soft ambient occlusion and studio lighting, removing colour and \
texture while preserving all geometry.",
    },
];

/// Case-insensitive lookup by label.
pub fn find_style(label: &str) -> Option<&'static StyleSpec> {
    let wanted = label.trim();
    ENHANCEMENT_STYLES
        .iter()
        .find(|style| style.label.eq_ignore_ascii_case(wanted))
}

pub fn style_labels() -> Vec<&'static str> {
    ENHANCEMENT_STYLES.iter().map(|style| style.label).collect()
}

pub fn compose_create_prompt(prompt: &str, style: &str) -> String {
    let prompt = prompt.trim();
    let style = style.trim();
    if style.is_empty() {
        return format!("Architectural rendering: {prompt}.");
    }
    format!("Architectural rendering: {prompt}. Style: {style}.")
}

#[cfg(test)]
mod tests {
    use super::{compose_create_prompt, find_style, style_labels, DEFAULT_STYLE};

    #[test]
    fn default_style_is_in_catalog() {
        let style = find_style(DEFAULT_STYLE).expect("default style");
        assert!(style.description.contains("clarity"));
        assert!(style_labels().contains(&"Golden Hour"));
    }

    #[test]
    fn lookup_is_case_insensitive_and_trimmed() {
        assert_eq!(
            find_style("  golden hour ").map(|style| style.label),
            Some("Golden Hour")
        );
        assert!(find_style("Neon Noir").is_none());
    }

    #[test]
    fn create_prompt_omits_blank_style() {
        assert_eq!(
            compose_create_prompt(" a timber pavilion ", ""),
            "Architectural rendering: a timber pavilion."
        );
        assert_eq!(
            compose_create_prompt("a timber pavilion", "Brutalist"),
            "Architectural rendering: a timber pavilion. Style: Brutalist."
        );
    }
}
