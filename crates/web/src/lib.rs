//! Browser front end for the Clip Sync Previewer.
//!
//! Reads the preview parameters from `location.hash`, mounts one muted
//! `<video>` per clip and one `<audio>` per narration track into the canvas
//! element, and lets [`previewer_core::Previewer`] decide what plays when.

use std::{cell::RefCell, collections::HashMap, rc::Rc, time::Duration};

use previewer_core::{Command, Event, PlayerConfig, PreviewParams, Previewer};
use wasm_bindgen::{closure::Closure, prelude::*, JsCast};
use web_sys::{console, Document, Element, HtmlAudioElement, HtmlElement, HtmlVideoElement, Window};

/// Entry point run by wasm-bindgen once the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let hash = window.location().hash()?;

    let previewer = match PreviewParams::from_fragment(&hash)
        .and_then(|params| Previewer::new(params, PlayerConfig::default()))
    {
        Ok(previewer) => previewer,
        Err(err) => {
            console::error_1(&JsValue::from_str(&format!(
                "cannot start previewer: {err}"
            )));
            return Ok(());
        }
    };

    let app = App::new(window, previewer)?;
    app.mount();
    Ok(())
}

#[derive(Clone)]
struct App {
    shared: Rc<RefCell<State>>,
}

struct State {
    previewer: Previewer,
    page: Page,
}

/// DOM elements owned by the previewer.
struct Page {
    window: Window,
    document: Document,
    canvas: Element,
    clips: HashMap<(usize, usize), HtmlVideoElement>,
    line_audio: HashMap<usize, HtmlAudioElement>,
    voice_over: Option<HtmlAudioElement>,
    play_button: Option<HtmlElement>,
}

impl App {
    fn new(window: Window, previewer: Previewer) -> Result<Self, JsValue> {
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas = canvas_element(&document, &previewer.config().canvas_id)?;
        canvas.set_class_name("canvas playing");

        let page = Page {
            window,
            document,
            canvas,
            clips: HashMap::new(),
            line_audio: HashMap::new(),
            voice_over: None,
            play_button: None,
        };

        Ok(Self {
            shared: Rc::new(RefCell::new(State { previewer, page })),
        })
    }

    fn mount(&self) {
        let mut commands = Vec::new();
        self.shared.borrow_mut().previewer.mount(&mut commands);
        self.run(commands);
    }

    fn dispatch(&self, event: Event) {
        let mut commands = Vec::new();
        self.shared
            .borrow_mut()
            .previewer
            .dispatch(event, &mut commands);
        self.run(commands);
    }

    fn run(&self, commands: Vec<Command>) {
        for command in commands {
            tracing::debug!(?command, "executing");
            if let Err(err) = self.execute(command) {
                console::error_2(&JsValue::from_str("previewer command failed"), &err);
            }
        }
    }

    fn execute(&self, command: Command) -> Result<(), JsValue> {
        let mut state = self.shared.borrow_mut();
        let page = &mut state.page;

        match command {
            Command::MountClip {
                line,
                clip,
                src,
                rate,
            } => {
                let video: HtmlVideoElement = page.document.create_element("video")?.dyn_into()?;
                video.set_muted(true);
                video.set_preload("auto");
                video.set_src(&src);
                video.set_playback_rate(rate);
                video.style().set_property("display", "none")?;

                let app = self.clone();
                let on_ended = Closure::wrap(Box::new(move || {
                    app.dispatch(Event::ClipEnded { line, clip });
                }) as Box<dyn FnMut()>);
                video.set_onended(Some(on_ended.as_ref().unchecked_ref()));
                on_ended.forget();

                page.canvas.append_child(&video)?;
                page.clips.insert((line, clip), video);
            }
            Command::MountLineAudio { line, src } => {
                let audio = audio_element(&page.document, &src)?;
                page.canvas.append_child(&audio)?;
                page.line_audio.insert(line, audio);
            }
            Command::MountVoiceOver { src } => {
                let audio = audio_element(&page.document, &src)?;
                page.canvas.append_child(&audio)?;
                page.voice_over = Some(audio);
            }
            Command::ShowPlayButton => {
                let button: HtmlElement = page.document.create_element("button")?.dyn_into()?;
                button.set_id("play");
                button.set_class_name("play-button");
                button.set_text_content(Some("Play"));

                let app = self.clone();
                let on_click = Closure::wrap(Box::new(move || {
                    app.dispatch(Event::PlayPressed);
                }) as Box<dyn FnMut()>);
                button.set_onclick(Some(on_click.as_ref().unchecked_ref()));
                on_click.forget();

                page.canvas.append_child(&button)?;
                page.play_button = Some(button);
            }
            Command::HidePlayButton => {
                if let Some(button) = page.play_button.take() {
                    button.remove();
                }
            }
            Command::ScheduleStart { delay } => {
                let app = self.clone();
                schedule(&page.window, delay, move || {
                    app.dispatch(Event::StartDelayElapsed)
                })?;
            }
            Command::PlayVoiceOver => {
                if let Some(audio) = &page.voice_over {
                    let _ = audio.play()?;
                }
            }
            Command::PlayLineAudio { line } => {
                if let Some(audio) = page.line_audio.get(&line) {
                    let _ = audio.play()?;
                }
            }
            Command::ShowClip { line, clip } => {
                if let Some(video) = page.clips.get(&(line, clip)) {
                    video.style().set_property("display", "block")?;
                }
            }
            Command::PlayClip { line, clip } => {
                if let Some(video) = page.clips.get(&(line, clip)) {
                    let _ = video.play()?;
                }
            }
            Command::StartPlaceholderTimer { line, clip, wait } => {
                let app = self.clone();
                schedule(&page.window, wait, move || {
                    app.dispatch(Event::PlaceholderElapsed { line, clip })
                })?;
            }
            Command::UnmountClip { line, clip } => {
                if let Some(video) = page.clips.remove(&(line, clip)) {
                    video.set_onended(None);
                    video.remove();
                }
            }
            Command::MarkFinished => {
                page.canvas.set_class_name("canvas finished");
            }
        }
        Ok(())
    }
}

fn canvas_element(document: &Document, id: &str) -> Result<Element, JsValue> {
    if let Some(existing) = document.get_element_by_id(id) {
        return Ok(existing);
    }
    let canvas = document.create_element("div")?;
    canvas.set_id(id);
    document
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))?
        .append_child(&canvas)?;
    Ok(canvas)
}

fn audio_element(document: &Document, src: &str) -> Result<HtmlAudioElement, JsValue> {
    let audio: HtmlAudioElement = document.create_element("audio")?.dyn_into()?;
    audio.set_preload("auto");
    audio.set_src(src);
    Ok(audio)
}

fn schedule(window: &Window, after: Duration, callback: impl FnOnce() + 'static) -> Result<i32, JsValue> {
    let millis = i32::try_from(after.as_millis()).unwrap_or_else(|_| {
        console::warn_1(&JsValue::from_str(&format!(
            "timer of {after:?} exceeds the browser limit; capping at {} ms",
            i32::MAX
        )));
        i32::MAX
    });
    let callback = Closure::once_into_js(callback);
    window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
}
