//! Session orchestration: two views (create, enhance), a result modal
//! that can sit on top of either, one current base image with a bounded
//! undo chain, and a single in-flight remote call at a time.

use facade_contracts::asset::ImageAsset;
use facade_contracts::errors::{FacadeError, Result};
use facade_contracts::events::{EventWriter, SessionEvent};
use facade_contracts::history::{UndoHistory, DEFAULT_HISTORY_CAPACITY};
use facade_contracts::results::{GeneratedResult, ResultKind};
use facade_contracts::styles::{find_style, StyleSpec, DEFAULT_STYLE, ENHANCEMENT_STYLES};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::intent::{EditIntent, MAX_INTENSITY, MIN_INTENSITY};
use crate::mask::{BinaryMask, DisplayRect, MaskCapture, Point};
use crate::providers::ImageProvider;
use crate::request::ProviderOutput;
use crate::retry::{RetryNotice, RetryingInvoker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Create,
    Enhance,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Enhance => "enhance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhanceMode {
    /// Fixed named style applied to the whole image.
    Enhancement,
    /// Free-text instruction plus optional mask and overlay.
    GuidedEdit,
}

impl EnhanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enhancement => "enhancement",
            Self::GuidedEdit => "guided_edit",
        }
    }
}

/// Identity collaborator: is the current user signed in and approved.
pub trait AccessGate: Send + Sync {
    fn check(&self) -> std::result::Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn check(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticGate {
    denial: Option<String>,
}

impl StaticGate {
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            denial: Some(message.into()),
        }
    }
}

impl AccessGate for StaticGate {
    fn check(&self) -> std::result::Result<(), String> {
        match &self.denial {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }
}

pub struct SessionController {
    provider: Box<dyn ImageProvider>,
    invoker: RetryingInvoker,
    gate: Box<dyn AccessGate>,
    events: Option<EventWriter>,
    view: View,
    result_open: bool,
    base_image: Option<ImageAsset>,
    overlay: Option<ImageAsset>,
    history: UndoHistory,
    mask: MaskCapture,
    display_size: Option<(u32, u32)>,
    mode: EnhanceMode,
    style: &'static StyleSpec,
    edit_prompt: String,
    intensity: u8,
    current_result: Option<GeneratedResult>,
    loading: bool,
    last_error: Option<FacadeError>,
    suggestions: Vec<String>,
}

impl SessionController {
    pub fn new(provider: Box<dyn ImageProvider>, invoker: RetryingInvoker) -> Self {
        let style = find_style(DEFAULT_STYLE).unwrap_or(&ENHANCEMENT_STYLES[0]);
        Self {
            provider,
            invoker,
            gate: Box::new(AllowAll),
            events: None,
            view: View::Create,
            result_open: false,
            base_image: None,
            overlay: None,
            history: UndoHistory::new(DEFAULT_HISTORY_CAPACITY),
            mask: MaskCapture::new(1, 1),
            display_size: None,
            mode: EnhanceMode::Enhancement,
            style,
            edit_prompt: String::new(),
            intensity: MAX_INTENSITY,
            current_result: None,
            loading: false,
            last_error: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_gate(mut self, gate: Box<dyn AccessGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self.emit(SessionEvent::SessionStarted {
            provider: self.provider.name().to_string(),
            retry_attempts: self.invoker.policy().attempts,
        });
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn is_result_open(&self) -> bool {
        self.result_open
    }

    pub fn base_image(&self) -> Option<&ImageAsset> {
        self.base_image.as_ref()
    }

    pub fn overlay(&self) -> Option<&ImageAsset> {
        self.overlay.as_ref()
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn mode(&self) -> EnhanceMode {
        self.mode
    }

    pub fn style(&self) -> &'static StyleSpec {
        self.style
    }

    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    pub fn edit_prompt(&self) -> &str {
        &self.edit_prompt
    }

    pub fn current_result(&self) -> Option<&GeneratedResult> {
        self.current_result.as_ref()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&FacadeError> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn mask(&self) -> &MaskCapture {
        &self.mask
    }

    pub fn mask_mut(&mut self) -> &mut MaskCapture {
        &mut self.mask
    }

    pub fn set_view(&mut self, view: View) {
        if self.view == view {
            return;
        }
        self.view = view;
        self.sync_mask_enabled();
        self.emit_view_changed();
    }

    pub fn set_mode(&mut self, mode: EnhanceMode) {
        self.mode = mode;
        self.sync_mask_enabled();
    }

    pub fn select_style(&mut self, label: &str) -> Result<&'static StyleSpec> {
        match find_style(label) {
            Some(style) => {
                self.style = style;
                Ok(style)
            }
            None => Err(self.record(
                "select_style",
                FacadeError::input(format!("unknown style '{}'", label.trim())),
            )),
        }
    }

    /// Clamped to 1..=100; returns the stored value.
    pub fn set_intensity(&mut self, intensity: u8) -> u8 {
        self.intensity = intensity.clamp(MIN_INTENSITY, MAX_INTENSITY);
        self.intensity
    }

    pub fn set_edit_prompt(&mut self, prompt: &str) {
        self.edit_prompt = prompt.trim().to_string();
    }

    pub fn set_overlay(&mut self, overlay: ImageAsset) -> Result<()> {
        if let Err(err) = overlay.dimensions() {
            return Err(self.record(
                "set_overlay",
                FacadeError::FileRead(format!("{}: {err}", overlay.name)),
            ));
        }
        self.overlay = Some(overlay);
        Ok(())
    }

    pub fn clear_overlay(&mut self) {
        self.overlay = None;
    }

    /// New display geometry for the base image. Existing strokes are
    /// discarded because they were drawn for the old geometry.
    pub fn resize_display(&mut self, width: u32, height: u32) {
        self.display_size = Some((width.max(1), height.max(1)));
        self.reset_mask();
    }

    /// Where the mask surface sits in the display viewport: centered,
    /// letterboxed on the short axis. Without a viewport it sits at the
    /// origin at its own size.
    pub fn display_rect(&self) -> DisplayRect {
        let (width, height) = self.mask.dimensions();
        let (view_width, view_height) = self.display_size.unwrap_or((width, height));
        DisplayRect {
            left: view_width.saturating_sub(width) as f32 / 2.0,
            top: view_height.saturating_sub(height) as f32 / 2.0,
            width: width as f32,
            height: height as f32,
        }
    }

    /// Paints a stroke whose points are in display viewport coordinates.
    pub fn draw_display_stroke(&mut self, points: &[Point]) {
        let rect = self.display_rect();
        let mapped: Vec<Point> = points
            .iter()
            .map(|point| self.mask.map_pointer(*point, rect))
            .collect();
        self.mask.draw_stroke(&mapped);
    }

    /// Replaces the base image. In the enhance view the image being
    /// replaced goes onto the undo chain first.
    pub fn upload_base_image(&mut self, asset: ImageAsset) -> Result<()> {
        if let Err(err) = asset.dimensions() {
            return Err(self.record(
                "upload",
                FacadeError::FileRead(format!("{}: {err}", asset.name)),
            ));
        }
        let previous = self.base_image.replace(asset);
        if let (View::Enhance, Some(previous)) = (self.view, previous) {
            self.history.push(previous);
            self.emit_history_changed("upload");
        }
        self.overlay = None;
        self.reset_mask();
        Ok(())
    }

    /// Drops the base image without touching history.
    pub fn remove_base_image(&mut self) {
        self.base_image = None;
        self.reset_mask();
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.pop() else {
            return false;
        };
        self.base_image = Some(previous);
        self.overlay = None;
        self.reset_mask();
        self.emit_history_changed("undo");
        true
    }

    pub fn close_result(&mut self) {
        self.result_open = false;
    }

    pub fn generate(
        &mut self,
        prompt: &str,
        style: &str,
        resolution: &str,
    ) -> Result<GeneratedResult> {
        self.guarded("generate", |session| {
            if session.view != View::Create {
                return Err(FacadeError::input("switch to the create view to generate"));
            }
            let prompt = prompt.trim();
            if prompt.is_empty() {
                return Err(FacadeError::input("a prompt is required to generate an image"));
            }
            let output = session.invoke_remote(|| {
                session
                    .provider
                    .generate_image_from_text(prompt, style.trim(), resolution.trim())
            })?;
            let result = GeneratedResult::create(
                prompt,
                style.trim(),
                resolution.trim(),
                output.value.clone(),
            );
            Ok(session.store_result(result, &output))
        })
    }

    /// Submits the enhance view. `prompt` replaces the guided-edit text
    /// when given.
    pub fn process(&mut self, prompt: Option<&str>) -> Result<GeneratedResult> {
        self.guarded("process", |session| {
            if let Some(prompt) = prompt {
                session.set_edit_prompt(prompt);
            }
            if session.view != View::Enhance {
                return Err(FacadeError::input("switch to the enhance view to process"));
            }
            let Some(base) = session.base_image.clone() else {
                return Err(FacadeError::input("upload a base image first"));
            };
            let intent = session.current_intent()?;
            let output = session.invoke_remote(|| session.provider.edit_image(&base, &intent))?;
            let result = enhance_result(base, &intent, output.value.clone())?;
            Ok(session.store_result(result, &output))
        })
    }

    /// Replays the open result's request with its saved inputs.
    pub fn regenerate(&mut self) -> Result<GeneratedResult> {
        let Some(previous) = self.open_result("regenerate")? else {
            return Err(self.record("regenerate", FacadeError::input("no result to regenerate")));
        };
        self.result_open = false;
        self.guarded("regenerate", |session| match previous.kind {
            ResultKind::Create => {
                let resolution = previous.resolution.clone().unwrap_or_default();
                let output = session.invoke_remote(|| {
                    session.provider.generate_image_from_text(
                        &previous.prompt_text,
                        &previous.style_label,
                        &resolution,
                    )
                })?;
                let result = GeneratedResult::create(
                    &previous.prompt_text,
                    &previous.style_label,
                    &resolution,
                    output.value.clone(),
                );
                Ok(session.store_result(result, &output))
            }
            ResultKind::Enhance => {
                let Some(base) = previous.input_image.clone() else {
                    return Err(FacadeError::input("stored result has no input image"));
                };
                let mask = previous
                    .mask
                    .as_ref()
                    .map(BinaryMask::from_asset)
                    .transpose()?;
                let intent = EditIntent {
                    prompt_text: previous.prompt_text.clone(),
                    style_label: previous.style_label.clone(),
                    intensity: previous.intensity.unwrap_or(MAX_INTENSITY),
                    overlay: previous.overlay.clone(),
                    mask,
                };
                let output = session.invoke_remote(|| session.provider.edit_image(&base, &intent))?;
                let result = enhance_result(base, &intent, output.value.clone())?;
                Ok(session.store_result(result, &output))
            }
        })
    }

    /// Adopts an enhance result as the new base, keeping the undo chain.
    pub fn continue_editing(&mut self) -> Result<()> {
        let result = match self.open_result("continue_editing")? {
            Some(result) if result.kind == ResultKind::Enhance => result,
            _ => {
                return Err(self.record(
                    "continue_editing",
                    FacadeError::input("continue editing needs an open enhance result"),
                ))
            }
        };
        if let Some(previous) = self.base_image.take() {
            self.history.push(previous);
        }
        self.adopt_output(result.output_image);
        self.emit_history_changed("continue_editing");
        Ok(())
    }

    /// Adopts a create result as the new base and starts a fresh lineage.
    pub fn send_to_enhance(&mut self) -> Result<()> {
        let result = match self.open_result("send_to_enhance")? {
            Some(result) if result.kind == ResultKind::Create => result,
            _ => {
                return Err(self.record(
                    "send_to_enhance",
                    FacadeError::input("send to enhance needs an open create result"),
                ))
            }
        };
        self.history.clear();
        self.adopt_output(result.output_image);
        self.emit_history_changed("send_to_enhance");
        Ok(())
    }

    pub fn refine_prompt(&mut self, text: &str, context: &str) -> Result<Vec<String>> {
        self.guarded("refine", |session| {
            if text.trim().is_empty() {
                return Err(FacadeError::input("text to refine is required"));
            }
            let output =
                session.invoke_remote(|| session.provider.refine_text_prompt(text, context))?;
            session.suggestions = output.value.clone();
            session.emit(SessionEvent::SuggestionsReady {
                count: output.value.len(),
                request: output.request,
            });
            Ok(output.value)
        })
    }

    /// Copies suggestion `index` (zero-based) into the guided-edit prompt.
    pub fn apply_suggestion(&mut self, index: usize) -> Result<String> {
        let Some(suggestion) = self.suggestions.get(index).cloned() else {
            return Err(self.record(
                "apply_suggestion",
                FacadeError::input(format!(
                    "no suggestion {} (have {})",
                    index + 1,
                    self.suggestions.len()
                )),
            ));
        };
        self.edit_prompt = suggestion.clone();
        Ok(suggestion)
    }

    /// Snapshot of the session for display.
    pub fn status(&self) -> Value {
        json!({
            "provider": self.provider.name(),
            "view": self.view.as_str(),
            "result_open": self.result_open,
            "mode": self.mode.as_str(),
            "style": self.style.label,
            "intensity": self.intensity,
            "edit_prompt": self.edit_prompt,
            "base_image": self.base_image.as_ref().map(|asset| asset.name.clone()),
            "overlay": self.overlay.as_ref().map(|asset| asset.name.clone()),
            "history": self.history.names(),
            "mask": {
                "enabled": self.mask.is_enabled(),
                "size": [self.mask.dimensions().0, self.mask.dimensions().1],
                "covered_pixels": self.mask.covered_pixels(),
                "brush_radius": self.mask.brush_radius(),
            },
            "result": self.current_result.as_ref().map(GeneratedResult::manifest),
            "suggestions": self.suggestions,
            "loading": self.loading,
            "last_error": self.last_error.as_ref().map(ToString::to_string),
        })
    }

    fn current_intent(&self) -> Result<EditIntent> {
        let intent = match self.mode {
            EnhanceMode::Enhancement => EditIntent::enhancement(self.style),
            EnhanceMode::GuidedEdit => {
                EditIntent::guided(&self.edit_prompt, self.style.label, self.intensity)?
                    .with_mask(self.mask.derive_binary_mask())
            }
        };
        Ok(intent.with_overlay(self.overlay.clone()))
    }

    fn guarded<T>(
        &mut self,
        operation: &str,
        run: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.loading {
            return Err(self.record(operation, FacadeError::Busy));
        }
        if let Err(message) = self.gate.check() {
            return Err(self.record(operation, FacadeError::AccessDenied(message)));
        }
        self.loading = true;
        self.last_error = None;
        let outcome = run(self);
        self.loading = false;
        outcome.map_err(|err| self.record(operation, err))
    }

    fn invoke_remote<T>(&self, operation: impl FnMut() -> Result<T>) -> Result<T> {
        self.invoker.invoke_observed(operation, |notice: &RetryNotice| {
            self.emit(SessionEvent::RetryScheduled {
                attempt: notice.attempt,
                attempts: notice.attempts,
                delay_ms: u64::try_from(notice.delay.as_millis()).unwrap_or(u64::MAX),
                error: notice.error.to_string(),
            });
        })
    }

    fn open_result(&mut self, operation: &str) -> Result<Option<GeneratedResult>> {
        if !self.result_open {
            return Err(self.record(operation, FacadeError::input("no result is open")));
        }
        Ok(self.current_result.clone())
    }

    fn store_result<T>(
        &mut self,
        result: GeneratedResult,
        output: &ProviderOutput<T>,
    ) -> GeneratedResult {
        info!(
            provider = self.provider.name(),
            kind = result.kind.as_str(),
            output = %result.output_image.name,
            "result ready"
        );
        self.emit(SessionEvent::RequestBuilt {
            request: output.request.clone(),
        });
        self.emit(SessionEvent::ResultReady {
            result: result.manifest(),
            warnings: output.warnings.clone(),
        });
        self.current_result = Some(result.clone());
        self.result_open = true;
        result
    }

    fn adopt_output(&mut self, output: ImageAsset) {
        self.base_image = Some(output);
        self.overlay = None;
        self.result_open = false;
        let view_changed = self.view != View::Enhance;
        self.view = View::Enhance;
        self.reset_mask();
        if view_changed {
            self.emit_view_changed();
        }
    }

    fn record(&mut self, operation: &str, err: FacadeError) -> FacadeError {
        warn!(operation, kind = err.kind(), error = %err, "session operation failed");
        self.emit(SessionEvent::OperationFailed {
            operation: operation.to_string(),
            error_kind: err.kind().to_string(),
            message: err.to_string(),
        });
        self.last_error = Some(err.clone());
        err
    }

    fn reset_mask(&mut self) {
        let geometry = self
            .base_image
            .as_ref()
            .and_then(|base| base.dimensions().ok())
            .map(|native| match self.display_size {
                Some(viewport) => fit_within(native, viewport),
                None => native,
            })
            .unwrap_or((1, 1));
        self.mask.resize(geometry.0, geometry.1);
        self.sync_mask_enabled();
    }

    fn sync_mask_enabled(&mut self) {
        let enabled = self.view == View::Enhance
            && self.mode == EnhanceMode::GuidedEdit
            && self.base_image.is_some();
        self.mask.set_enabled(enabled);
    }

    fn emit_view_changed(&self) {
        self.emit(SessionEvent::ViewChanged {
            view: self.view.as_str().to_string(),
        });
    }

    fn emit_history_changed(&self, cause: &str) {
        self.emit(SessionEvent::HistoryChanged {
            cause: cause.to_string(),
            count: self.history.count(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let kind = event.kind();
        if let Err(err) = events.emit(event) {
            warn!(kind, error = %err, "failed to write session event");
        }
    }
}

fn enhance_result(
    base: ImageAsset,
    intent: &EditIntent,
    output: ImageAsset,
) -> Result<GeneratedResult> {
    Ok(GeneratedResult {
        kind: ResultKind::Enhance,
        prompt_text: intent.prompt_text.clone(),
        style_label: intent.style_label.clone(),
        resolution: None,
        input_image: Some(base),
        output_image: output,
        overlay: intent.overlay.clone(),
        mask: intent.mask.as_ref().map(BinaryMask::to_asset).transpose()?,
        intensity: Some(intent.intensity),
    })
}

/// Largest size with the image's aspect ratio that fits the viewport.
fn fit_within((width, height): (u32, u32), (max_width, max_height): (u32, u32)) -> (u32, u32) {
    let scale = (f64::from(max_width) / f64::from(width.max(1)))
        .min(f64::from(max_height) / f64::from(height.max(1)));
    (
        ((f64::from(width) * scale).round() as u32).max(1),
        ((f64::from(height) * scale).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use facade_contracts::asset::ImageAsset;
    use facade_contracts::errors::{FacadeError, Result};
    use facade_contracts::events::{read_events, EventWriter, SessionEvent};
    use facade_contracts::providers::ProviderKind;
    use facade_contracts::results::ResultKind;
    use facade_contracts::styles::find_style;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    use super::{fit_within, EnhanceMode, SessionController, StaticGate, View};
    use crate::intent::EditIntent;
    use crate::mask::Point;
    use crate::providers::{DryrunProvider, ImageProvider, ModelChoice};
    use crate::request::{Operation, ProviderOutput, ProviderRequest, RequestBody};
    use crate::retry::{RetryPolicy, RetryingInvoker};

    #[derive(Default)]
    struct Script {
        creates: Vec<String>,
        edits: Vec<(String, EditIntent)>,
        failures_left: u32,
        failure: Option<FacadeError>,
        outputs: u32,
    }

    /// In-test provider that records what it was asked and can fail on cue.
    #[derive(Clone, Default)]
    struct ScriptedProvider {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedProvider {
        fn failing(times: u32, failure: FacadeError) -> Self {
            let provider = Self::default();
            {
                let mut script = provider.script.lock().expect("script lock");
                script.failures_left = times;
                script.failure = Some(failure);
            }
            provider
        }

        fn next(&self) -> Result<ImageAsset> {
            let mut script = self.script.lock().expect("script lock");
            if script.failures_left > 0 {
                script.failures_left -= 1;
                if let Some(failure) = script.failure.clone() {
                    return Err(failure);
                }
            }
            script.outputs += 1;
            let shade = (script.outputs * 20).min(255) as u8;
            ImageAsset::from_rgba(
                format!("out-{}.png", script.outputs),
                &RgbaImage::from_pixel(6, 4, Rgba([shade, shade, shade, 255])),
            )
        }

        fn request(&self, operation: Operation) -> ProviderRequest {
            ProviderRequest {
                provider: ProviderKind::Dryrun,
                operation,
                endpoint: format!("scripted://{}", operation.as_str()),
                model: "scripted".to_string(),
                body: RequestBody::Json(json!({})),
                warnings: Vec::new(),
            }
        }
    }

    impl ImageProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Dryrun
        }

        fn build_create_request(&self, _: &str, _: &str, _: &str) -> Result<ProviderRequest> {
            Ok(self.request(Operation::Create))
        }

        fn build_edit_request(&self, _: &ImageAsset, _: &EditIntent) -> Result<ProviderRequest> {
            Ok(self.request(Operation::Edit))
        }

        fn build_refine_request(&self, _: &str, _: &str) -> Result<ProviderRequest> {
            Ok(self.request(Operation::Refine))
        }

        fn generate_image_from_text(
            &self,
            prompt: &str,
            _: &str,
            _: &str,
        ) -> Result<ProviderOutput<ImageAsset>> {
            let image = self.next()?;
            self.script
                .lock()
                .expect("script lock")
                .creates
                .push(prompt.to_string());
            Ok(ProviderOutput::new(image, &self.request(Operation::Create)))
        }

        fn edit_image(
            &self,
            base: &ImageAsset,
            intent: &EditIntent,
        ) -> Result<ProviderOutput<ImageAsset>> {
            let image = self.next()?;
            self.script
                .lock()
                .expect("script lock")
                .edits
                .push((base.name.clone(), intent.clone()));
            Ok(ProviderOutput::new(image, &self.request(Operation::Edit)))
        }

        fn refine_text_prompt(&self, prompt: &str, _: &str) -> Result<ProviderOutput<Vec<String>>> {
            Ok(ProviderOutput::new(
                vec![format!("{prompt} at dusk"), format!("{prompt} in fog")],
                &self.request(Operation::Refine),
            ))
        }
    }

    fn no_wait_invoker() -> RetryingInvoker {
        RetryingInvoker::new(RetryPolicy::default()).with_sleeper(Arc::new(|_: Duration| {}))
    }

    fn session_with(provider: &ScriptedProvider) -> SessionController {
        SessionController::new(Box::new(provider.clone()), no_wait_invoker())
    }

    fn image(name: &str, width: u32, height: u32) -> ImageAsset {
        ImageAsset::from_rgba(name, &RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255])))
            .expect("encode test image")
    }

    fn enhance_session(provider: &ScriptedProvider) -> anyhow::Result<SessionController> {
        let mut session = session_with(provider);
        session.set_view(View::Enhance);
        session.upload_base_image(image("base.png", 40, 30))?;
        Ok(session)
    }

    #[test]
    fn enhancement_uses_style_description_at_full_intensity() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        session.set_overlay(image("bench.png", 4, 4))?;
        session.select_style("Standard Clarity")?;
        session.set_intensity(20);

        let result = session.process(None)?;
        assert_eq!(result.kind, ResultKind::Enhance);
        assert!(session.is_result_open());

        let script = provider.script.lock().expect("script lock");
        let (base_name, intent) = &script.edits[0];
        let style = find_style("Standard Clarity").expect("style exists");
        assert_eq!(base_name, "base.png");
        assert_eq!(intent.prompt_text, style.description);
        assert_eq!(intent.intensity, 100);
        assert!(intent.mask.is_none());
        assert_eq!(intent.overlay.as_ref().map(|o| o.name.as_str()), Some("bench.png"));
        Ok(())
    }

    #[test]
    fn guided_edit_with_full_coverage_sends_all_white_mask() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        session.set_mode(EnhanceMode::GuidedEdit);
        assert!(session.mask().is_enabled());
        session.mask_mut().set_brush_radius(200.0);
        session
            .mask_mut()
            .draw_stroke(&[Point::new(0.0, 0.0), Point::new(40.0, 30.0)]);

        session.process(Some("make the walls white"))?;
        let script = provider.script.lock().expect("script lock");
        let intent = &script.edits[0].1;
        assert_eq!(intent.prompt_text, "make the walls white");
        let mask = intent.mask.as_ref().expect("mask derived from strokes");
        assert!(mask.is_fully_editable());
        assert!(mask.to_alpha_mask().pixels().all(|pixel| pixel[3] == 0));
        Ok(())
    }

    #[test]
    fn guided_edit_requires_prompt_and_leaves_state_untouched() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        session.set_mode(EnhanceMode::GuidedEdit);
        let err = session.process(Some("  ")).expect_err("prompt required");
        assert!(matches!(err, FacadeError::InputValidation(_)));
        assert_eq!(session.last_error(), Some(&err));
        assert!(session.current_result().is_none());
        assert!(provider.script.lock().expect("script lock").edits.is_empty());
        session.dismiss_error();
        assert!(session.last_error().is_none());
        Ok(())
    }

    #[test]
    fn process_without_base_image_is_rejected() {
        let provider = ScriptedProvider::default();
        let mut session = session_with(&provider);
        session.set_view(View::Enhance);
        assert!(matches!(
            session.process(None),
            Err(FacadeError::InputValidation(_))
        ));
    }

    #[test]
    fn undo_walks_back_through_uploads_then_stops() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = session_with(&provider);
        session.set_view(View::Enhance);
        for idx in 0..4 {
            session.upload_base_image(image(&format!("upload-{idx}.png"), 8, 8))?;
        }
        assert_eq!(session.history().count(), 3);

        session.set_overlay(image("overlay.png", 2, 2))?;
        assert!(session.undo());
        assert_eq!(session.base_image().map(|a| a.name.as_str()), Some("upload-2.png"));
        assert!(session.overlay().is_none());
        assert!(session.undo());
        assert!(session.undo());
        assert_eq!(session.base_image().map(|a| a.name.as_str()), Some("upload-0.png"));
        assert!(!session.can_undo());
        assert!(!session.undo());
        assert_eq!(session.base_image().map(|a| a.name.as_str()), Some("upload-0.png"));
        Ok(())
    }

    #[test]
    fn uploads_outside_enhance_view_replace_without_history() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = session_with(&provider);
        session.upload_base_image(image("first.png", 8, 8))?;
        session.upload_base_image(image("second.png", 8, 8))?;
        assert_eq!(session.history().count(), 0);
        assert_eq!(session.base_image().map(|a| a.name.as_str()), Some("second.png"));

        session.set_view(View::Enhance);
        session.upload_base_image(image("third.png", 8, 8))?;
        assert_eq!(session.history().names(), vec!["second.png".to_string()]);
        Ok(())
    }

    #[test]
    fn remove_base_image_does_not_push_history() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        session.remove_base_image();
        assert!(session.base_image().is_none());
        assert_eq!(session.history().count(), 0);
        session.upload_base_image(image("next.png", 8, 8))?;
        assert_eq!(session.history().count(), 0);
        Ok(())
    }

    #[test]
    fn continue_editing_pushes_base_and_adopts_output() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        session.upload_base_image(image("second.png", 40, 30))?;
        let before = session.history().count();

        session.set_overlay(image("overlay.png", 2, 2))?;
        let result = session.process(None)?;
        session.continue_editing()?;
        assert_eq!(session.history().count(), before + 1);
        assert_eq!(session.history().peek().map(|a| a.name.as_str()), Some("second.png"));
        assert_eq!(session.base_image(), Some(&result.output_image));
        assert!(session.overlay().is_none());
        assert!(!session.is_result_open());
        assert_eq!(session.view(), View::Enhance);
        Ok(())
    }

    #[test]
    fn send_to_enhance_starts_fresh_history() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        for idx in 0..5 {
            session.upload_base_image(image(&format!("u{idx}.png"), 8, 8))?;
        }
        assert!(session.history().count() > 0);

        session.set_view(View::Create);
        let result = session.generate("glass pavilion", "Minimal", "1K")?;
        assert!(matches!(
            session.continue_editing(),
            Err(FacadeError::InputValidation(_))
        ));
        session.send_to_enhance()?;
        assert_eq!(session.history().count(), 0);
        assert_eq!(session.base_image(), Some(&result.output_image));
        assert_eq!(session.view(), View::Enhance);
        assert!(!session.is_result_open());
        Ok(())
    }

    #[test]
    fn regenerate_replays_enhance_inputs() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        session.set_mode(EnhanceMode::GuidedEdit);
        session.set_intensity(55);
        session.mask_mut().draw_stroke(&[Point::new(5.0, 5.0), Point::new(10.0, 5.0)]);
        let first = session.process(Some("add a balcony"))?;

        // Changing the live editor state must not affect the replay.
        session.mask_mut().clear();
        session.set_intensity(90);
        let second = session.regenerate()?;
        assert_ne!(first.output_image, second.output_image);
        assert_eq!(second.input_image, first.input_image);
        assert!(session.is_result_open());

        let script = provider.script.lock().expect("script lock");
        assert_eq!(script.edits.len(), 2);
        let (original, replay) = (&script.edits[0].1, &script.edits[1].1);
        assert_eq!(replay.prompt_text, "add a balcony");
        assert_eq!(replay.intensity, 55);
        assert_eq!(replay.mask, original.mask);
        Ok(())
    }

    #[test]
    fn regenerate_replays_create_parameters() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = session_with(&provider);
        session.generate("brick tower", "Industrial", "16:9")?;
        let replay = session.regenerate()?;
        assert_eq!(replay.resolution.as_deref(), Some("16:9"));
        assert_eq!(
            provider.script.lock().expect("script lock").creates,
            vec!["brick tower", "brick tower"]
        );
        Ok(())
    }

    #[test]
    fn transient_failures_are_retried_and_failures_keep_state() -> anyhow::Result<()> {
        let provider =
            ScriptedProvider::failing(2, FacadeError::transport("scripted", "connection reset"));
        let mut session = session_with(&provider);
        let result = session.generate("chapel", "", "1K")?;
        assert_eq!(result.output_image.name, "out-1.png");

        let provider =
            ScriptedProvider::failing(5, FacadeError::rejection("scripted", Some(503), "busy"));
        let mut session = enhance_session(&provider)?;
        let base = session.base_image().cloned();
        let err = session.process(None).expect_err("always failing");
        assert_eq!(err, FacadeError::rejection("scripted", Some(503), "busy"));
        assert_eq!(session.base_image().cloned(), base);
        assert!(session.current_result().is_none());
        assert!(!session.is_loading());
        assert_eq!(session.history().count(), 0);
        Ok(())
    }

    #[test]
    fn access_gate_blocks_remote_operations() {
        let provider = ScriptedProvider::default();
        let gate = StaticGate::denied("account pending approval");
        let mut session = session_with(&provider).with_gate(Box::new(gate));
        let err = session
            .generate("villa", "", "1K")
            .expect_err("gate denies");
        assert_eq!(err, FacadeError::AccessDenied("account pending approval".to_string()));
        assert!(matches!(
            session.refine_prompt("villa", ""),
            Err(FacadeError::AccessDenied(_))
        ));
        assert!(provider.script.lock().expect("script lock").creates.is_empty());
    }

    #[test]
    fn denied_process_leaves_edit_prompt_untouched() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        session.set_mode(EnhanceMode::GuidedEdit);
        session.set_edit_prompt("add ivy to the facade");
        let mut session = session.with_gate(Box::new(StaticGate::denied("pending approval")));

        assert!(matches!(
            session.process(Some("paint the door red")),
            Err(FacadeError::AccessDenied(_))
        ));
        assert_eq!(session.edit_prompt(), "add ivy to the facade");
        assert!(provider.script.lock().expect("script lock").edits.is_empty());
        Ok(())
    }

    #[test]
    fn refine_then_apply_suggestion() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = session_with(&provider);
        let suggestions = session.refine_prompt("stone bridge", "Golden Hour")?;
        assert_eq!(suggestions.len(), 2);
        assert_eq!(session.apply_suggestion(1)?, "stone bridge in fog");
        assert_eq!(session.edit_prompt(), "stone bridge in fog");
        assert!(session.apply_suggestion(5).is_err());
        Ok(())
    }

    #[test]
    fn display_strokes_are_offset_into_the_letterboxed_surface() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        session.set_mode(EnhanceMode::GuidedEdit);
        session.resize_display(20, 20);
        let rect = session.display_rect();
        assert_eq!((rect.left, rect.top), (0.0, 2.5));
        assert_eq!((rect.width, rect.height), (20.0, 15.0));

        session.mask_mut().set_brush_radius(1.0);
        session.draw_display_stroke(&[Point::new(10.5, 3.5)]);
        let surface = session.mask().surface();
        assert!(surface.get_pixel(10, 0)[3] > 0);
        assert!(surface.get_pixel(10, 1)[3] > 0);
        assert_eq!(surface.get_pixel(10, 2)[3], 0);
        Ok(())
    }

    #[test]
    fn mask_tracks_display_geometry_and_mode() -> anyhow::Result<()> {
        let provider = ScriptedProvider::default();
        let mut session = enhance_session(&provider)?;
        assert_eq!(session.mask().dimensions(), (40, 30));
        assert!(!session.mask().is_enabled());

        session.set_mode(EnhanceMode::GuidedEdit);
        session.resize_display(20, 20);
        assert_eq!(session.mask().dimensions(), (20, 15));
        session.mask_mut().draw_stroke(&[Point::new(3.0, 3.0)]);
        assert!(session.mask().has_coverage());

        session.upload_base_image(image("tall.png", 10, 40))?;
        assert_eq!(session.mask().dimensions(), (5, 20));
        assert!(!session.mask().has_coverage());

        session.set_view(View::Create);
        assert!(!session.mask().is_enabled());
        Ok(())
    }

    #[test]
    fn events_are_written_for_results_and_failures() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("events.jsonl");
        let provider = DryrunProvider::new(ModelChoice {
            image: "dryrun-image-1".to_string(),
            text: "dryrun-text-1".to_string(),
        });
        let mut session = SessionController::new(Box::new(provider), no_wait_invoker())
            .with_events(EventWriter::new(&path, "session-test"));
        session.generate("pavilion", "", "32x32")?;
        let _ = session.generate("   ", "", "32x32");

        let records = read_events(&path)?;
        let kinds: Vec<&str> = records.iter().map(|record| record.event.kind()).collect();
        assert_eq!(
            kinds,
            vec!["session_started", "request_built", "result_ready", "operation_failed"]
        );
        assert!(records.iter().all(|record| record.session_id == "session-test"));
        let SessionEvent::OperationFailed {
            operation,
            error_kind,
            ..
        } = &records[3].event
        else {
            panic!("expected operation_failed, got {:?}", records[3].event);
        };
        assert_eq!(operation, "generate");
        assert_eq!(error_kind, "input_validation");
        Ok(())
    }

    #[test]
    fn oversized_resolution_fails_once_and_releases_loading() {
        let provider = DryrunProvider::new(ModelChoice {
            image: "dryrun-image-1".to_string(),
            text: "dryrun-text-1".to_string(),
        });
        let mut session = SessionController::new(Box::new(provider), no_wait_invoker());
        assert!(matches!(
            session.generate("tower", "", "60000x60000"),
            Err(FacadeError::InputValidation(_))
        ));
        assert!(!session.is_loading());
        assert!(session.current_result().is_none());
        assert!(matches!(session.last_error(), Some(FacadeError::InputValidation(_))));
    }

    #[test]
    fn retries_are_logged_as_events() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("events.jsonl");
        let provider =
            ScriptedProvider::failing(1, FacadeError::transport("scripted", "connection reset"));
        let mut session =
            session_with(&provider).with_events(EventWriter::new(&path, "session-retry"));
        session.generate("pavilion", "", "2K")?;

        let retries: Vec<SessionEvent> = read_events(&path)?
            .into_iter()
            .map(|record| record.event)
            .filter(|event| event.kind() == "retry_scheduled")
            .collect();
        assert_eq!(
            retries,
            vec![SessionEvent::RetryScheduled {
                attempt: 1,
                attempts: 3,
                delay_ms: 1000,
                error: "scripted transport error: connection reset".to_string(),
            }]
        );
        Ok(())
    }

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        assert_eq!(fit_within((400, 300), (200, 200)), (200, 150));
        assert_eq!(fit_within((100, 400), (200, 200)), (50, 200));
    }
}
