pub type UiResult<T> = Result<T, UiError>;

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Done,
    Failed,
    Running,
}

/// A titled error report with an optional follow-up hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBlock {
    pub title: String,
    pub body: String,
    pub hint: Option<String>,
}

impl MessageBlock {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableSpec {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

pub trait SpinnerHandle {
    fn finish_success(&self, message: &str);
    fn finish_error(&self, message: &str);
}

/// Line-oriented output used outside the dashboard: CLI reports, fatal errors
/// and the exit summary.
pub trait Renderer {
    fn text(&mut self, body: &str) -> UiResult<()>;
    fn section(&mut self, title: &str) -> UiResult<()>;
    fn warning(&mut self, body: &str) -> UiResult<()>;
    fn error_block(&mut self, block: &MessageBlock) -> UiResult<()>;
    fn key_values(&mut self, items: &[KeyValue]) -> UiResult<()>;
    fn step(&mut self, label: &str, state: StepState) -> UiResult<()>;
    fn table(&mut self, spec: &TableSpec) -> UiResult<()>;
    fn spinner(&mut self, label: &str) -> UiResult<Box<dyn SpinnerHandle>>;
}
