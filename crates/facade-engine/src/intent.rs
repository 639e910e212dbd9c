use facade_contracts::asset::ImageAsset;
use facade_contracts::errors::{FacadeError, Result};
use facade_contracts::styles::StyleSpec;

use crate::mask::BinaryMask;

pub const MIN_INTENSITY: u8 = 1;
pub const MAX_INTENSITY: u8 = 100;

/// One submit action's worth of edit parameters. Built fresh per submit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditIntent {
    pub prompt_text: String,
    pub style_label: String,
    pub intensity: u8,
    pub overlay: Option<ImageAsset>,
    pub mask: Option<BinaryMask>,
}

impl EditIntent {
    pub fn guided(prompt_text: &str, style_label: &str, intensity: u8) -> Result<Self> {
        let prompt_text = prompt_text.trim();
        if prompt_text.is_empty() {
            return Err(FacadeError::input("an edit instruction is required"));
        }
        if !(MIN_INTENSITY..=MAX_INTENSITY).contains(&intensity) {
            return Err(FacadeError::input(format!(
                "intensity must be between {MIN_INTENSITY} and {MAX_INTENSITY}, got {intensity}"
            )));
        }
        Ok(Self {
            prompt_text: prompt_text.to_string(),
            style_label: style_label.trim().to_string(),
            intensity,
            overlay: None,
            mask: None,
        })
    }

    /// Whole-image style transform: the style description is the prompt
    /// and intensity is always full.
    pub fn enhancement(style: &StyleSpec) -> Self {
        Self {
            prompt_text: style.description.to_string(),
            style_label: style.label.to_string(),
            intensity: MAX_INTENSITY,
            overlay: None,
            mask: None,
        }
    }

    pub fn with_overlay(mut self, overlay: Option<ImageAsset>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_mask(mut self, mask: Option<BinaryMask>) -> Self {
        self.mask = mask;
        self
    }

    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }
}

#[cfg(test)]
mod tests {
    use facade_contracts::errors::FacadeError;
    use facade_contracts::styles::find_style;

    use super::EditIntent;

    #[test]
    fn guided_intent_requires_prompt_and_valid_intensity() {
        assert!(matches!(
            EditIntent::guided("   ", "", 50),
            Err(FacadeError::InputValidation(_))
        ));
        assert!(matches!(
            EditIntent::guided("make the walls white", "", 0),
            Err(FacadeError::InputValidation(_))
        ));
        assert!(matches!(
            EditIntent::guided("make the walls white", "", 101),
            Err(FacadeError::InputValidation(_))
        ));
        let intent = EditIntent::guided(" make the walls white ", "Standard Clarity", 35).unwrap();
        assert_eq!(intent.prompt_text, "make the walls white");
        assert_eq!(intent.intensity, 35);
        assert!(!intent.is_masked());
    }

    #[test]
    fn enhancement_intent_uses_style_description_at_full_intensity() {
        let style = find_style("Golden Hour").unwrap();
        let intent = EditIntent::enhancement(style);
        assert_eq!(intent.prompt_text, style.description);
        assert_eq!(intent.style_label, "Golden Hour");
        assert_eq!(intent.intensity, 100);
        assert!(intent.mask.is_none());
    }
}
