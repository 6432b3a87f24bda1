/// How a response body must be produced for a stage
///
/// JSON/GraphQL stages read a plain transfer body; DOM stages on
/// client-rendered pages need the fetcher to hand back rendered markup.
/// The engine only carries the mode; honoring it is the fetcher's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Plain,
    Rendered,
}

/// HTTP method of a stage request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Request descriptor built by stage functions and dispatched by the driver
///
/// Everything the fetch layer needs is carried here explicitly; stages hold
/// no ambient session state.
#[derive(Debug, Clone, Default)]
pub struct StageRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub render_mode: RenderMode,
}

impl StageRequest {
    /// Creates a plain GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Creates a POST request carrying a JSON body
    pub fn post_json(url: impl Into<String>, body: &serde_json::Value) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.to_string()),
            render_mode: RenderMode::Plain,
        }
    }

    /// Adds a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a set of headers
    pub fn headers(mut self, headers: &[(&str, &str)]) -> Self {
        for (name, value) in headers {
            self.headers
                .push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Marks the request as needing a rendered response body
    pub fn rendered(mut self) -> Self {
        self.render_mode = RenderMode::Rendered;
        self
    }
}
