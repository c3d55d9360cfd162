/// Raw result of fetching one listings page. Only site parsers and the
/// next-page check look inside it.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub source: String,
}

impl Page {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Page {
            url: url.into(),
            source: source.into(),
        }
    }
}
