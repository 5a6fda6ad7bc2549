use std::cell::{Cell, RefCell};
use std::rc::Rc;

use facefit::{
    BlendMode, DetectedFace, FaceBox, FaceSwapError, FaceSwapper, LandmarkDetector, LandmarkSet,
    ModelState, OutputFormat, Point, Preset, SwapResult,
};
use image::RgbaImage;
use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

/// Options for a face swap, passed as a JavaScript object.
///
/// All fields are optional. When a `preset` is specified, its defaults apply
/// and individual fields override them.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SwapOptions {
    pub preset: Option<String>,
    pub blend_mode: Option<String>,
    pub feather_radius: Option<f32>,
    pub global_alpha: Option<f32>,
    pub format: Option<String>,
    pub quality: Option<f32>,
}

#[derive(Deserialize)]
struct JsBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

#[derive(Deserialize)]
struct JsPoint {
    x: f32,
    y: f32,
}

/// Face as reported by the JS detector.
#[derive(Deserialize)]
struct JsFace {
    #[serde(rename = "box")]
    bbox: JsBox,
    landmarks: Vec<JsPoint>,
    #[serde(default)]
    score: Option<f32>,
}

impl JsFace {
    fn into_detected(self) -> facefit::Result<DetectedFace> {
        let points = self
            .landmarks
            .into_iter()
            .map(|p| Point::new(p.x, p.y))
            .collect();
        let bbox = FaceBox::new(self.bbox.x, self.bbox.y, self.bbox.width, self.bbox.height);
        let mut face = DetectedFace::new(bbox, LandmarkSet::new(points)?);
        if let Some(score) = self.score {
            face.confidence = score;
        }
        Ok(face)
    }
}

/// A JS object with `loadModels()` and `detectFaces(rgba, width, height)`.
struct JsDetector {
    object: JsValue,
}

impl JsDetector {
    fn method(&self, name: &str) -> Result<js_sys::Function, String> {
        js_sys::Reflect::get(&self.object, &JsValue::from_str(name))
            .map_err(|e| describe(&e))?
            .dyn_into::<js_sys::Function>()
            .map_err(|_| format!("detector has no {name}() method"))
    }
}

/// Await `value` if it is a promise, or take it as-is.
async fn settle(value: JsValue) -> Result<JsValue, JsValue> {
    JsFuture::from(js_sys::Promise::resolve(&value)).await
}

impl LandmarkDetector for JsDetector {
    async fn load_models(&mut self) -> facefit::Result<()> {
        let load = self.method("loadModels").map_err(FaceSwapError::ModelLoadFailure)?;
        let pending = load
            .call0(&self.object)
            .map_err(|e| FaceSwapError::ModelLoadFailure(describe(&e)))?;
        settle(pending)
            .await
            .map_err(|e| FaceSwapError::ModelLoadFailure(describe(&e)))?;
        Ok(())
    }

    async fn detect_faces(&self, image: &RgbaImage) -> facefit::Result<Vec<DetectedFace>> {
        let detect = self.method("detectFaces").map_err(FaceSwapError::DetectionFailure)?;
        let pixels = js_sys::Uint8ClampedArray::from(image.as_raw().as_slice());
        let pending = detect
            .call3(
                &self.object,
                &pixels,
                &JsValue::from(image.width()),
                &JsValue::from(image.height()),
            )
            .map_err(|e| FaceSwapError::DetectionFailure(describe(&e)))?;
        let value = settle(pending)
            .await
            .map_err(|e| FaceSwapError::DetectionFailure(describe(&e)))?;

        let faces: Vec<JsFace> = serde_wasm_bindgen::from_value(value)
            .map_err(|e| FaceSwapError::DetectionFailure(format!("invalid detector output: {e}")))?;
        faces.into_iter().map(JsFace::into_detected).collect()
    }
}

/// Best-effort message from a thrown JS value.
fn describe(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    format!("{value:?}")
}

fn string_to_preset(preset: &str) -> Result<Preset, JsValue> {
    match preset {
        "natural" => Ok(Preset::Natural),
        "crisp" => Ok(Preset::Crisp),
        _ => Err(make_error(
            "INVALID_OPTION",
            &format!("unknown preset: {preset}"),
        )),
    }
}

fn string_to_blend_mode(mode: &str) -> Result<BlendMode, JsValue> {
    match mode {
        "cutout" => Ok(BlendMode::Cutout),
        "direct" => Ok(BlendMode::DirectPlacement),
        _ => Err(make_error(
            "INVALID_OPTION",
            &format!("unknown blend mode: {mode}"),
        )),
    }
}

fn string_to_format(format: &str, quality: Option<f32>) -> Result<OutputFormat, JsValue> {
    match format {
        "png" => Ok(OutputFormat::Png),
        "jpeg" => Ok(OutputFormat::Jpeg {
            quality: quality.unwrap_or(0.92),
        }),
        _ => Err(make_error(
            "INVALID_OPTION",
            &format!("unknown format: {format}"),
        )),
    }
}

/// Create a JS `Error` with a `code` property.
fn make_error(code: &str, message: &str) -> JsValue {
    let err = js_sys::Error::new(message);
    let _ = js_sys::Reflect::set(&err, &"code".into(), &JsValue::from_str(code));
    JsValue::from(err)
}

/// Convert a `FaceSwapError` into a JS `Error` with a user-facing message,
/// a machine-readable `code`, and the technical `detail`.
fn to_js_error(e: FaceSwapError) -> JsValue {
    let err = make_error(e.code(), &e.user_message());
    let _ = js_sys::Reflect::set(&err, &"detail".into(), &JsValue::from_str(&e.to_string()));
    err
}

fn parse_options(options: JsValue) -> Result<SwapOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(SwapOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options)
            .map_err(|e| make_error("INVALID_OPTION", &format!("invalid options: {e}")))
    }
}

/// Apply parsed `SwapOptions` to a `FaceSwapper`.
fn apply_options<D: LandmarkDetector>(
    mut swapper: FaceSwapper<D>,
    opts: &SwapOptions,
) -> Result<FaceSwapper<D>, JsValue> {
    if let Some(ref p) = opts.preset {
        swapper = swapper.preset(string_to_preset(p)?);
    }
    if let Some(ref mode) = opts.blend_mode {
        swapper = swapper.blend_mode(string_to_blend_mode(mode)?);
    }
    if let Some(radius) = opts.feather_radius {
        swapper = swapper.feather_radius(radius);
    }
    if let Some(alpha) = opts.global_alpha {
        swapper = swapper.global_alpha(alpha);
    }
    if let Some(ref fmt) = opts.format {
        swapper = swapper.output_format(string_to_format(fmt, opts.quality)?);
    }
    Ok(swapper)
}

/// Build a plain JS object from a `SwapResult`.
fn build_result_object(result: &SwapResult) -> Result<JsValue, JsValue> {
    let encoded = result.encode().map_err(to_js_error)?;
    let data_url = result.to_data_url().map_err(to_js_error)?;

    let obj = js_sys::Object::new();
    let data = js_sys::Uint8Array::from(&encoded[..]);
    js_sys::Reflect::set(&obj, &"data".into(), &data)?;
    js_sys::Reflect::set(&obj, &"dataUrl".into(), &JsValue::from_str(&data_url))?;
    js_sys::Reflect::set(
        &obj,
        &"filename".into(),
        &JsValue::from_str(facefit::OUTPUT_FILENAME),
    )?;
    js_sys::Reflect::set(&obj, &"width".into(), &JsValue::from(result.width()))?;
    js_sys::Reflect::set(&obj, &"height".into(), &JsValue::from(result.height()))?;
    js_sys::Reflect::set(
        &obj,
        &"scale".into(),
        &JsValue::from(result.placement.scale),
    )?;

    Ok(JsValue::from(obj))
}

fn busy_error() -> JsValue {
    make_error("BUSY", "A face swap is already in progress")
}

fn state_name(state: ModelState) -> &'static str {
    match state {
        ModelState::Uninitialized => "uninitialized",
        ModelState::Loading => "loading",
        ModelState::Ready => "ready",
        ModelState::Failed => "failed",
    }
}

#[wasm_bindgen(start)]
pub fn start() {
    // A second init (e.g. in tests) only means a logger is already installed.
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Face swapper bound to one JS landmark detector.
///
/// Load the models once with `loadModels()`, then call `swap()` as often as
/// needed. Only one operation runs at a time; a call made while another is
/// pending rejects with code `BUSY`.
#[wasm_bindgen]
pub struct FaceSwap {
    swapper: Rc<RefCell<FaceSwapper<JsDetector>>>,
    state: Rc<Cell<ModelState>>,
}

#[wasm_bindgen]
impl FaceSwap {
    /// @param detector - Object with `loadModels(): Promise<void>` and
    ///   `detectFaces(rgba, width, height): Promise<Face[]>`
    /// @param options - Optional object with fields: preset, blendMode,
    ///   featherRadius, globalAlpha, format, quality
    #[wasm_bindgen(constructor)]
    pub fn new(detector: JsValue, options: JsValue) -> Result<FaceSwap, JsValue> {
        let opts = parse_options(options)?;
        let swapper = apply_options(FaceSwapper::new(JsDetector { object: detector }), &opts)?;
        Ok(FaceSwap {
            swapper: Rc::new(RefCell::new(swapper)),
            state: Rc::new(Cell::new(ModelState::Uninitialized)),
        })
    }

    /// One of "uninitialized", "loading", "ready" or "failed".
    #[wasm_bindgen(getter, js_name = "modelState")]
    pub fn model_state(&self) -> String {
        state_name(self.state.get()).to_string()
    }

    /// Load the detector's models. Resolves immediately once they are ready.
    #[wasm_bindgen(js_name = "loadModels")]
    pub fn load_models(&self) -> js_sys::Promise {
        let cell = Rc::clone(&self.swapper);
        let state = Rc::clone(&self.state);
        future_to_promise(async move {
            // Held across the await: a concurrent call finds it taken.
            let mut swapper = cell.try_borrow_mut().map_err(|_| busy_error())?;
            if swapper.model_state() != ModelState::Ready {
                state.set(ModelState::Loading);
            }
            let loaded = swapper.load_models().await;
            state.set(swapper.model_state());
            loaded.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Swap the face in `upload` onto the rightmost face in `template`.
    ///
    /// Resolves to `{ data, dataUrl, filename, width, height, scale }`.
    ///
    /// @param template - Raw template image bytes (JPEG, PNG, or WebP)
    /// @param upload - Raw uploaded image bytes
    pub fn swap(&self, template: Vec<u8>, upload: Vec<u8>) -> js_sys::Promise {
        let cell = Rc::clone(&self.swapper);
        future_to_promise(async move {
            let mut swapper = cell.try_borrow_mut().map_err(|_| busy_error())?;
            let result = swapper
                .swap(&template, &upload)
                .await
                .map_err(to_js_error)?;
            build_result_object(&result)
        })
    }
}
