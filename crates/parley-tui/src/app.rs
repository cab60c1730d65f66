use std::path::PathBuf;
use std::sync::Arc;

use parley_core::format::code_blocks;
use parley_core::{
    build_model, list_models, ChatModel, ChatRole, Config, MessagePipeline, PendingImage,
    SendOutcome, SessionSnapshot, Settings, SharedSession,
};
use ratatui::{layout::Rect, widgets::ListState};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::input::{ChatInput, QUICK_PROMPTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Typing a message
    Editing,
    /// Typing the path of an image to attach
    AttachPath,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub input: ChatInput,
    pub attach_input: ChatInput,
    pub status: Option<String>,

    // Chat
    pub pipeline: MessagePipeline,
    pub send_task: Option<JoinHandle<SendOutcome>>,
    pub settings: Settings,
    pub config_path: Option<PathBuf>,

    // Model picker
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Transcript view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height, set during render
    pub chat_width: u16,  // inner width, set during render
    pub chat_lines: u16,  // wrapped line count of the last render
    pub follow_tail: bool,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(settings: Settings, model: Arc<dyn ChatModel>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            input: ChatInput::default(),
            attach_input: ChatInput::default(),
            status: None,

            pipeline: MessagePipeline::new(SharedSession::new(), model),
            send_task: None,
            settings,
            config_path: None,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_lines: 0,
            follow_tail: true,
            chat_area: None,

            animation_frame: 0,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.pipeline.session().snapshot()
    }

    /// A send is queued or running
    pub fn is_busy(&self) -> bool {
        self.send_task.is_some() || self.pipeline.session().is_busy()
    }

    /// Hand the input box over to the pipeline on a background task.
    ///
    /// Returns false when there's nothing to send or a send is still running.
    pub fn submit(&mut self) -> bool {
        if !self.input.can_send(self.is_busy()) {
            return false;
        }

        let (text, image) = self.input.take();
        let pipeline = self.pipeline.clone();
        self.send_task = Some(tokio::spawn(async move {
            pipeline.send_message(&text, image).await
        }));
        self.status = None;
        self.follow_tail = true;
        true
    }

    /// Collect the send task once it has finished
    pub async fn poll_send_task(&mut self) {
        let finished = self
            .send_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.send_task.take() {
            match task.await {
                Ok(outcome) => debug!(?outcome, "send finished"),
                Err(err) => error!(error = %err, "send task failed"),
            }
            self.follow_tail = true;
        }
    }

    /// Attach the image named in the path prompt, reporting problems in the status line
    pub fn attach_from_prompt(&mut self) {
        let (raw, _) = self.attach_input.take();
        let path = raw.trim().trim_matches(|c| c == '"' || c == '\'');
        self.input_mode = InputMode::Editing;

        if path.is_empty() {
            return;
        }

        match PendingImage::from_path(path) {
            Ok(image) => {
                info!(name = %image.preview().name, media_type = image.media_type(), "image attached");
                self.status = Some(format!("Attached {}", image.preview()));
                self.input.attach(image);
            }
            Err(err) => {
                self.status = Some(format!("Could not attach: {err:#}"));
            }
        }
    }

    pub fn remove_attachment(&mut self) {
        if let Some(image) = self.input.remove_image() {
            self.status = Some(format!("Removed {}", image.preview()));
        }
    }

    /// Prefill the input with quick prompt `index` (only offered on an empty chat)
    pub fn apply_quick_prompt(&mut self, index: usize) {
        if !self.snapshot().messages.is_empty() {
            return;
        }
        if let Some((_, prefill)) = QUICK_PROMPTS.get(index) {
            self.input.set_text(prefill);
            self.input_mode = InputMode::Editing;
        }
    }

    /// Code from the most recent assistant reply that has any
    pub fn last_code_block(&self) -> Option<String> {
        self.snapshot()
            .messages
            .iter()
            .rev()
            .filter(|m| m.role == ChatRole::Assistant)
            .find_map(|m| code_blocks(m.text()).pop())
    }

    /// Fetch the provider's models and open the picker on the current one
    pub async fn open_model_picker(&mut self) {
        if self.is_busy() {
            self.status = Some("Wait for the reply before switching models".to_string());
            return;
        }

        match list_models(&self.settings).await {
            Ok(models) if !models.is_empty() => {
                let current_idx = models
                    .iter()
                    .position(|m| m == &self.settings.model)
                    .unwrap_or(0);
                self.available_models = models;
                self.model_picker_state.select(Some(current_idx));
                self.show_model_picker = true;
            }
            Ok(_) => self.status = Some("No models available".to_string()),
            Err(err) => self.status = Some(format!("Could not list models: {err:#}")),
        }
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Switch to the highlighted model. The transcript starts over because
    /// the new model has none of the old history.
    pub fn select_model(&mut self) {
        self.show_model_picker = false;
        let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .cloned()
        else {
            return;
        };
        if self.is_busy() {
            return;
        }

        self.settings.model = model.clone();
        self.pipeline = MessagePipeline::new(SharedSession::new(), build_model(&self.settings));
        self.chat_scroll = 0;
        self.follow_tail = true;
        info!(model = %model, "switched model");

        if let Some(path) = &self.config_path {
            if let Err(err) = Config::save_model(path, &model) {
                let cause = format!("{err:#}");
                warn!(error = %cause, "could not save model choice");
            }
        }
        self.status = Some(format!("Switched to {model}"));
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn max_scroll(&self) -> u16 {
        self.chat_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_tail = self.chat_scroll >= self.max_scroll();
    }

    pub fn page_size(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }
}
