use std::path::{Path, PathBuf};
use std::sync::Arc;

use multitool_core::{
    ChatPanel, ChatRole, Config, Error, Gateway, GeminiClient, ImageEditor, ImageOutcome,
    Result as GatewayResult, TaskList,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::input::TextInput;
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Tasks,
    Chat,
    Image,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Tasks, Tab::Chat, Tab::Image];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Tasks => "Tasks",
            Tab::Chat => "Chat",
            Tab::Image => "Image Editor",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Tab::Tasks => 0,
            Tab::Chat => 1,
            Tab::Image => 2,
        }
    }

    pub fn next(&self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn prev(&self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Which field of the image form has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageField {
    Path,
    Instruction,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub tab: Tab,
    pub input_mode: InputMode,

    // Tasks panel
    pub tasks: TaskList,
    pub task_state: ListState,
    pub task_input: TextInput,

    // Chat panel
    pub chat: ChatPanel,
    pub chat_input: TextInput,
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the chat area, set during render
    pub chat_width: u16,  // Inner width of the chat area, set during render

    // Image editor panel
    pub image_editor: ImageEditor,
    pub image_path_input: TextInput,
    pub image_instruction_input: TextInput,
    pub image_field: ImageField,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: TextInput,

    // Chat area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,

    // Gateway
    pub config: Config,
    pub config_path: PathBuf,
    pub gateway: Option<Arc<dyn Gateway>>,
    pub gateway_error: Option<String>,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: Config, config_path: PathBuf, events: UnboundedSender<AppEvent>) -> Self {
        let (gateway, gateway_error) = build_gateway(&config);
        Self::with_gateway(config, config_path, gateway, events, gateway_error)
    }

    pub fn with_gateway(
        config: Config,
        config_path: PathBuf,
        gateway: Option<Arc<dyn Gateway>>,
        events: UnboundedSender<AppEvent>,
        gateway_error: Option<String>,
    ) -> Self {
        let tasks = TaskList::seeded();
        let mut task_state = ListState::default();
        if !tasks.is_empty() {
            task_state.select(Some(0));
        }

        Self {
            should_quit: false,
            tab: Tab::Tasks,
            input_mode: InputMode::Normal,

            tasks,
            task_state,
            task_input: TextInput::new(),

            chat: ChatPanel::new(),
            chat_input: TextInput::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            image_editor: ImageEditor::new(),
            image_path_input: TextInput::new(),
            image_instruction_input: TextInput::new(),
            image_field: ImageField::Path,

            animation_frame: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: TextInput::new(),

            chat_area: None,

            config,
            config_path,
            gateway,
            gateway_error,
            events,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.chat.is_loading() || self.image_editor.is_loading()
    }

    // Tabs
    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.input_mode = InputMode::Normal;
    }

    pub fn next_tab(&mut self) {
        self.select_tab(self.tab.next());
    }

    pub fn prev_tab(&mut self) {
        self.select_tab(self.tab.prev());
    }

    // Tasks panel
    pub fn task_nav_down(&mut self) {
        let len = self.tasks.len();
        if len > 0 {
            let i = self.task_state.selected().unwrap_or(0);
            self.task_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn task_nav_up(&mut self) {
        let i = self.task_state.selected().unwrap_or(0);
        self.task_state.select(Some(i.saturating_sub(1)));
    }

    pub fn task_nav_first(&mut self) {
        if !self.tasks.is_empty() {
            self.task_state.select(Some(0));
        }
    }

    pub fn task_nav_last(&mut self) {
        if !self.tasks.is_empty() {
            self.task_state.select(Some(self.tasks.len() - 1));
        }
    }

    pub fn selected_task_id(&self) -> Option<u64> {
        self.task_state
            .selected()
            .and_then(|i| self.tasks.items().get(i))
            .map(|t| t.id)
    }

    /// Add the typed task and select it
    pub fn submit_task(&mut self) -> bool {
        if self.tasks.add(self.task_input.value()).is_none() {
            return false;
        }
        self.task_input.clear();
        self.task_state.select(Some(self.tasks.len() - 1));
        true
    }

    pub fn toggle_selected_task(&mut self) -> bool {
        match self.selected_task_id() {
            Some(id) => self.tasks.toggle(id),
            None => false,
        }
    }

    pub fn delete_selected_task(&mut self) -> bool {
        let Some(i) = self.task_state.selected() else {
            return false;
        };
        let Some(id) = self.selected_task_id() else {
            return false;
        };
        if !self.tasks.remove(id) {
            return false;
        }

        // Adjust selection
        if self.tasks.is_empty() {
            self.task_state.select(None);
        } else if i >= self.tasks.len() {
            self.task_state.select(Some(self.tasks.len() - 1));
        }
        true
    }

    // Chat panel
    /// Send the typed message. Returns false when the input is blank or a
    /// reply is still pending; the input is kept in that case.
    pub fn send_chat(&mut self) -> bool {
        let Some(prompt) = self.chat.begin(self.chat_input.value()) else {
            return false;
        };
        self.chat_input.clear();
        self.animation_frame = 0;

        match self.gateway.clone() {
            Some(gateway) => {
                let tx = self.events.clone();
                tokio::spawn(async move {
                    let result = gateway.generate_text(&prompt).await;
                    let _ = tx.send(AppEvent::ChatReply(result));
                });
            }
            None => {
                self.chat.complete(Err(Error::ApiKeyMissing));
            }
        }

        self.scroll_chat_to_bottom();
        true
    }

    pub fn apply_chat_reply(&mut self, result: GatewayResult<String>) {
        if self.chat.complete(result) {
            self.scroll_chat_to_bottom();
        }
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        let max = self.chat_total_lines().saturating_sub(self.chat_visible_height());
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// Scroll chat to bottom so the latest reply (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self
            .chat_total_lines()
            .saturating_sub(self.chat_visible_height());
    }

    fn chat_visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Estimated rendered height of the conversation after wrapping
    fn chat_total_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in self.chat.messages() {
            total_lines = total_lines.saturating_add(1); // Role line
            for line in msg.text.lines() {
                let wrapped = line.chars().count() / wrap_width + 1;
                total_lines = total_lines.saturating_add(u16::try_from(wrapped).unwrap_or(u16::MAX));
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.chat.is_loading() {
            total_lines = total_lines.saturating_add(2);
        }
        total_lines
    }

    pub fn chat_role_label(role: ChatRole) -> &'static str {
        match role {
            ChatRole::User => "You:",
            ChatRole::Model => "Gemini:",
        }
    }

    // Image editor panel
    pub fn load_image(&mut self) -> bool {
        let raw = self.image_path_input.value().trim().to_string();
        if raw.is_empty() {
            return false;
        }
        let path = expand_home(&raw);
        let loaded = self.image_editor.load(&path).is_ok();
        if loaded {
            self.image_field = ImageField::Instruction;
        }
        loaded
    }

    pub fn start_image_edit(&mut self) -> bool {
        self.image_editor
            .set_instruction(self.image_instruction_input.value());
        let Some(job) = self.image_editor.begin_edit() else {
            return false;
        };
        self.animation_frame = 0;

        match self.gateway.clone() {
            Some(gateway) => {
                let tx = self.events.clone();
                tokio::spawn(async move {
                    let result = gateway.edit_image(&job.image, &job.instruction).await;
                    let _ = tx.send(AppEvent::ImageEdited(result));
                });
            }
            None => {
                self.image_editor.complete(Err(Error::ApiKeyMissing));
            }
        }
        true
    }

    pub fn apply_image_result(&mut self, result: GatewayResult<ImageOutcome>) {
        self.image_editor.complete(result);
    }

    /// Save into the configured output dir. On failure the editor carries
    /// the inline message.
    pub fn save_edited_image(&mut self) -> Option<PathBuf> {
        let dir = self.config.output_dir();
        self.image_editor.save_edited(&dir).ok()
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Model picker
    pub fn open_model_picker(&mut self) {
        self.available_models = GeminiClient::list_models();
        let current = self.config.text_model().to_string();
        if !self.available_models.contains(&current) {
            self.available_models.insert(0, current.clone());
        }
        let idx = self
            .available_models
            .iter()
            .position(|m| *m == current)
            .unwrap_or(0);
        self.model_picker_state.select(Some(idx));
        self.show_model_picker = true;
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

    pub fn select_model(&mut self) {
        if let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .cloned()
        {
            info!(model = %model, "Selected text model");
            self.config.text_model = Some(model);
            self.persist_config();
            self.rebuild_gateway();
        }
        self.show_model_picker = false;
    }

    // API key
    pub fn open_api_key_input(&mut self) {
        self.api_key_input.clear();
        self.show_api_key_input = true;
    }

    pub fn submit_api_key(&mut self) {
        let key = self.api_key_input.take();
        let key = key.trim();
        if !key.is_empty() {
            self.config.api_key = Some(key.to_string());
            self.persist_config();
            self.rebuild_gateway();
        }
        self.show_api_key_input = false;
    }

    fn persist_config(&self) {
        if let Err(e) = self.config.save_to(&self.config_path) {
            warn!(error = %e, path = %self.config_path.display(), "Could not save config");
        }
    }

    fn rebuild_gateway(&mut self) {
        let (gateway, gateway_error) = build_gateway(&self.config);
        self.gateway = gateway;
        self.gateway_error = gateway_error;
    }
}

fn build_gateway(config: &Config) -> (Option<Arc<dyn Gateway>>, Option<String>) {
    match GeminiClient::from_config(config) {
        Ok(client) => {
            info!(
                text_model = client.text_model(),
                image_model = client.image_model(),
                "Gemini gateway ready"
            );
            (Some(Arc::new(client)), None)
        }
        Err(e) => {
            warn!(error = %e, "Gemini gateway unavailable");
            (None, Some(e.to_string()))
        }
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| Path::new(raw).to_path_buf()),
        None => PathBuf::from(raw),
    }
}
